use thiserror::Error;

/// 阅读核心的统一错误类型
///
/// 分章与分页本身不会失败，这里只覆盖存储、配置和后台任务
#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("存储错误: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("配置解析失败: {0}")]
    Config(#[from] toml::de::Error),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("找不到书籍: {0}")]
    BookNotFound(i64),
    #[error("后台分页任务失败: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, ReaderError>;
