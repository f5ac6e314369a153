// 阅读核心
// 原始文本 -> 章节 -> 页，以及建立在其上的阅读位置跟踪

pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod model;
pub mod pagination;
pub mod parser;
pub mod position;

#[cfg(test)]
mod integration_tests;

// 重新导出主要类型
pub use config::{load_config, FontFamily, PaginationConfig, ReaderConfig, SegmenterConfig};
pub use db::{LibraryStore, SqliteLibrary};
pub use error::{ReaderError, Result};
pub use import::Importer;
pub use model::{Book, BookFormat, BookText, Chapter, ReadingPosition, ReadingProgress};
pub use pagination::{
    FontDescriptor, HeuristicMeasurer, LayoutTicket, RenderContext, Repaginator, TextMeasurer,
    Viewport,
};
pub use parser::{Segmentation, Segmenter};
pub use position::{record_position, resolve_position, toggle_bookmark, ReaderSession};

/// 用默认配置分章
///
/// # 返回
/// 章节列表；为空时调用方按平铺模式保存原文
pub fn segment_into_chapters(title: &str, raw: &str) -> Vec<Chapter> {
    Segmenter::default().segment_into_chapters(title, raw)
}

/// 按字号、容器尺寸和留白分页
pub fn paginate<M>(
    text: &str,
    font_size: f32,
    container: Viewport,
    padding: f32,
    measurer: &M,
) -> Vec<String>
where
    M: TextMeasurer + ?Sized,
{
    let ctx = RenderContext::new(font_size, container, padding);
    pagination::paginate(text, &ctx, measurer)
}
