//! 阅读核心的数据模型
//!
//! Book 通过值拥有它的章节；所有修改都经由显式的存储调用完成

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 外部渲染格式
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExternalFormat {
    Pdf,
    Epub,
    Docx,
    Unknown,
}

/// 书籍文件类型
///
/// 只有 `PlainText` 会进入分章/分页流程，其余格式交给原生阅读器
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookFormat {
    PlainText,
    External { kind: ExternalFormat, path: PathBuf },
}

impl BookFormat {
    /// 根据文件扩展名判断格式
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        let kind = match ext.as_str() {
            "txt" | "text" | "html" | "htm" => return BookFormat::PlainText,
            "pdf" => ExternalFormat::Pdf,
            "epub" => ExternalFormat::Epub,
            "docx" => ExternalFormat::Docx,
            _ => ExternalFormat::Unknown,
        };

        BookFormat::External {
            kind,
            path: path.to_path_buf(),
        }
    }

    /// 是否由核心负责分页
    pub fn is_text(&self) -> bool {
        matches!(self, BookFormat::PlainText)
    }
}

impl Default for BookFormat {
    fn default() -> Self {
        BookFormat::PlainText
    }
}

/// 章节
///
/// `index` 从 1 开始，按分章时的发现顺序连续分配
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub index: u32,
    pub title: String,
    pub body: String,
}

/// 书籍正文
///
/// 平铺模式和分章模式互斥
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "mode", content = "data", rename_all = "snake_case")]
pub enum BookText {
    Flat(String),
    Chapters(Vec<Chapter>),
}

impl BookText {
    pub fn chapter_count(&self) -> usize {
        match self {
            BookText::Flat(_) => 0,
            BookText::Chapters(chapters) => chapters.len(),
        }
    }
}

impl Default for BookText {
    fn default() -> Self {
        BookText::Flat(String::new())
    }
}

/// 书籍
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub format: BookFormat,
    pub text: BookText,
    /// 正文的 SHA-256，用于判断重新导入时内容是否变化
    pub content_digest: String,
    pub progress: ReadingProgress,
}

/// 书架列表用的摘要
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BookSummary {
    pub id: i64,
    pub title: String,
    pub format: BookFormat,
    pub chapter_count: usize,
}

/// 某一章最后阅读的页
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEntry {
    pub page: usize,
    pub updated_at: DateTime<Utc>,
}

/// 阅读进度：章节位置 -> 最后阅读页（稀疏）
///
/// 键是章节列表中的零基位置；平铺模式使用键 0
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ReadingProgress {
    entries: BTreeMap<usize, ProgressEntry>,
}

impl ReadingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_for(&self, chapter: usize) -> Option<usize> {
        self.entries.get(&chapter).map(|e| e.page)
    }

    pub fn set(&mut self, chapter: usize, page: usize, updated_at: DateTime<Utc>) {
        self.entries.insert(chapter, ProgressEntry { page, updated_at });
    }

    pub fn clear(&mut self, chapter: usize) -> Option<ProgressEntry> {
        self.entries.remove(&chapter)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ProgressEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// 最近一次更新的章节，打开书时优先显示
    pub fn resume_chapter(&self) -> Option<usize> {
        self.entries
            .iter()
            .max_by(|a, b| a.1.updated_at.cmp(&b.1.updated_at).then(b.0.cmp(a.0)))
            .map(|(chapter, _)| *chapter)
    }
}

/// 阅读位置 (章节位置, 页位置)，都是零基
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReadingPosition {
    pub chapter: usize,
    pub page: usize,
}

impl ReadingPosition {
    pub fn new(chapter: usize, page: usize) -> Self {
        Self { chapter, page }
    }
}
