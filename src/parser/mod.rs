use crate::config::SegmenterConfig;
use crate::model::Chapter;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// 子模块声明
pub mod chapter_detector;
pub mod encoding;
pub mod html_segmenter;
pub mod text_segmenter;

pub use chapter_detector::ChapterDetector;
pub use encoding::{decode_text, DecodedText};
pub use html_segmenter::HtmlSegmenter;
pub use text_segmenter::TextSegmenter;

/// 第一个标题之前的内容使用的章节名
pub const INTRODUCTION_TITLE: &str = "Introduction";

static MARKUP_TAG: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)<\s*(html|body|p|div|h[1-6])[\s/>]").ok());

/// 输入内容的形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentShape {
    Html,
    PlainText,
}

/// HTML 路径内部的失败，由调用方就地恢复
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("文档中没有可识别的结构元素")]
    NoStructure,
}

/// 分章结果
///
/// 分章模式与平铺模式互斥：没有找到任何章节标题时，整段文本作为平铺正文
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segmentation {
    Chapters(Vec<Chapter>),
    Flat(String),
}

impl Segmentation {
    pub fn chapters(&self) -> &[Chapter] {
        match self {
            Segmentation::Chapters(chapters) => chapters,
            Segmentation::Flat(_) => &[],
        }
    }

    pub fn into_chapters(self) -> Vec<Chapter> {
        match self {
            Segmentation::Chapters(chapters) => chapters,
            Segmentation::Flat(_) => Vec::new(),
        }
    }
}

/// 判断内容是 HTML 还是纯文本
///
/// 出现 `<html`、`<body`、`<p`、`<div`、`<h1`..`<h6` 等标签时按 HTML 处理
pub fn detect_shape(raw: &str) -> ContentShape {
    if MARKUP_TAG.as_ref().is_some_and(|re| re.is_match(raw)) {
        ContentShape::Html
    } else {
        ContentShape::PlainText
    }
}

/// 分章器
///
/// 按内容形态选择 HTML 路径或纯文本路径；HTML 找不到结构时退回纯文本路径，
/// 最终退回平铺模式。整个过程不会失败。
pub struct Segmenter {
    config: SegmenterConfig,
    detector: ChapterDetector,
}

impl Segmenter {
    /// 创建新的分章器实例
    pub fn new(config: SegmenterConfig) -> Self {
        let detector = ChapterDetector::new(&config);
        Self { config, detector }
    }

    /// 分章
    ///
    /// # 参数
    /// - `title`: 书名（仅用于日志）
    /// - `raw`: 原始 HTML 或纯文本
    ///
    /// # 返回
    /// 章节列表，或者平铺正文
    pub fn segment(&self, title: &str, raw: &str) -> Segmentation {
        let shape = detect_shape(raw);
        debug!(title, ?shape, bytes = raw.len(), "Segmenting document");

        let result = match shape {
            ContentShape::Html => self.segment_html(title, raw),
            ContentShape::PlainText => {
                let chapters = TextSegmenter::new(&self.detector).segment(raw);
                if chapters.is_empty() {
                    Segmentation::Flat(raw.to_string())
                } else {
                    Segmentation::Chapters(chapters)
                }
            }
        };

        match &result {
            Segmentation::Chapters(chapters) => {
                info!(title, chapters = chapters.len(), "Segmented into chapters")
            }
            Segmentation::Flat(text) => {
                info!(title, chars = text.len(), "No chapter headings found, using flat mode")
            }
        }

        result
    }

    /// 只返回章节列表；为空表示调用方应按平铺模式保存原文
    pub fn segment_into_chapters(&self, title: &str, raw: &str) -> Vec<Chapter> {
        self.segment(title, raw).into_chapters()
    }

    fn segment_html(&self, title: &str, raw: &str) -> Segmentation {
        let document = Html::parse_document(raw);
        let segmenter = HtmlSegmenter::new(&self.config, &self.detector);

        match segmenter.segment(&document) {
            Ok(chapters) if !chapters.is_empty() => Segmentation::Chapters(chapters),
            Ok(_) => Segmentation::Flat(html_segmenter::readable_text(&document)),
            Err(err) => {
                warn!(title, "{err}, falling back to plain-text segmentation");
                let text = html_segmenter::readable_text(&document);
                let chapters = TextSegmenter::new(&self.detector).segment(&text);
                if chapters.is_empty() {
                    Segmentation::Flat(text)
                } else {
                    Segmentation::Chapters(chapters)
                }
            }
        }
    }
}

/// 按给定配置分章
pub fn segment_document(config: &SegmenterConfig, title: &str, raw: &str) -> Segmentation {
    Segmenter::new(config.clone()).segment(title, raw)
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

/// 两条路径共用的章节累加器
///
/// 遇到标题时收尾当前章节（去掉首尾空白后为空则丢弃），然后以标题开启新章节。
/// 第一个标题之前的内容归入 "Introduction"。一个标题都没有时结果为空。
pub(crate) struct ChapterAccumulator {
    chapters: Vec<Chapter>,
    title: String,
    blocks: Vec<String>,
    separator: &'static str,
    headings: usize,
}

impl ChapterAccumulator {
    pub(crate) fn new(separator: &'static str) -> Self {
        Self {
            chapters: Vec::new(),
            title: INTRODUCTION_TITLE.to_string(),
            blocks: Vec::new(),
            separator,
            headings: 0,
        }
    }

    /// 追加一段正文
    pub(crate) fn push_block(&mut self, text: &str) {
        self.blocks.push(text.to_string());
    }

    /// 遇到标题：收尾当前章节并开启新章节
    pub(crate) fn open(&mut self, heading: &str) {
        self.close();
        self.headings += 1;

        let heading = heading.trim();
        self.title = if heading.is_empty() {
            format!("Chapter {}", self.chapters.len() + 1)
        } else {
            heading.to_string()
        };
    }

    pub(crate) fn finish(mut self) -> Vec<Chapter> {
        self.close();
        if self.headings == 0 {
            return Vec::new();
        }
        self.chapters
    }

    fn close(&mut self) {
        let body = self.blocks.join(self.separator);
        self.blocks.clear();

        let body = body.trim();
        if body.is_empty() {
            return;
        }

        let index = self.chapters.len() as u32 + 1;
        self.chapters.push(Chapter {
            index,
            title: self.title.clone(),
            body: body.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_shape() {
        assert_eq!(detect_shape("<html><body><p>x</p></body></html>"), ContentShape::Html);
        assert_eq!(detect_shape("<P class=\"a\">Hello</P>"), ContentShape::Html);
        assert_eq!(detect_shape("<h2>CHAPTER I</h2>"), ContentShape::Html);
        assert_eq!(detect_shape("Plain text with 3 < 4 and <angle> words"), ContentShape::PlainText);
        assert_eq!(detect_shape(""), ContentShape::PlainText);
    }

    #[test]
    fn test_detect_shape_is_stable_across_calls() {
        let inputs = ["<div>a</div>", "no markup here", "<BODY >x", "<pre>code</pre>"];
        let first: Vec<ContentShape> = inputs.iter().map(|s| detect_shape(s)).collect();
        for _ in 0..3 {
            let again: Vec<ContentShape> = inputs.iter().map(|s| detect_shape(s)).collect();
            assert_eq!(again, first);
        }
        assert_eq!(
            first,
            vec![ContentShape::Html, ContentShape::PlainText, ContentShape::Html, ContentShape::PlainText]
        );
    }

    #[test]
    fn test_plain_text_example() {
        let segmenter = Segmenter::default();
        let chapters = segmenter.segment_into_chapters(
            "Book",
            "Intro text.\nCHAPTER ONE\nFirst body.\nCHAPTER TWO\nSecond body.",
        );

        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Introduction");
        assert_eq!(chapters[0].body, "Intro text.");
        assert_eq!(chapters[1].title, "CHAPTER ONE");
        assert_eq!(chapters[1].body, "First body.");
        assert_eq!(chapters[2].title, "CHAPTER TWO");
        assert_eq!(chapters[2].body, "Second body.");
        let indices: Vec<u32> = chapters.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn test_flat_fallback_for_both_paths() {
        let segmenter = Segmenter::default();
        let plain = "Just a story.\nNo headings at all.";
        let html = "<html><body><p>Just a story.</p><p>No headings.</p></body></html>";

        assert!(segmenter.segment_into_chapters("t", plain).is_empty());
        assert!(segmenter.segment_into_chapters("t", html).is_empty());

        assert_eq!(segmenter.segment("t", plain), Segmentation::Flat(plain.to_string()));
        assert_eq!(
            segmenter.segment("t", html),
            Segmentation::Flat("Just a story.\n\nNo headings.".to_string())
        );
    }

    #[test]
    fn test_html_without_structure_uses_text_path() {
        let segmenter = Segmenter::default();
        let html = "<html><body><div>Preface words<br>CHAPTER I<br>It begins.</div></body></html>";
        let chapters = segmenter.segment_into_chapters("t", html);

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "Introduction");
        assert_eq!(chapters[0].body, "Preface words");
        assert_eq!(chapters[1].title, "CHAPTER I");
        assert_eq!(chapters[1].body, "It begins.");
    }

    #[test]
    fn test_accumulator_drops_empty_chapters() {
        let mut acc = ChapterAccumulator::new("\n\n");
        acc.open("CHAPTER 1");
        acc.push_block("   ");
        acc.open("CHAPTER 2");
        acc.push_block("body");
        let chapters = acc.finish();

        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].index, 1);
        assert_eq!(chapters[0].title, "CHAPTER 2");
    }

    #[test]
    fn test_accumulator_without_headings_is_empty() {
        let mut acc = ChapterAccumulator::new("\n");
        acc.push_block("text without any heading");
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn test_accumulator_untitled_heading() {
        let mut acc = ChapterAccumulator::new("\n");
        acc.push_block("intro");
        acc.open("   ");
        acc.push_block("body");
        let chapters = acc.finish();
        assert_eq!(chapters[1].title, "Chapter 2");
    }
}
