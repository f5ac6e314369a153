use super::{ChapterAccumulator, ChapterDetector, SegmentError};
use crate::config::SegmenterConfig;
use crate::model::Chapter;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// 元素在分章中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Heading,
    Block,
}

/// HTML 分章
///
/// 标题候选按优先级识别：
/// 1. 显式标记为章节标题的元素（如 `h3.chapter`）
/// 2. 文本以章节关键字开头的二级标题
/// 3. 都没有时不分章
///
/// 标题和段落按原文档顺序合并遍历，文档顺序优先于元素类型。
pub struct HtmlSegmenter<'a> {
    config: &'a SegmenterConfig,
    detector: &'a ChapterDetector,
}

impl<'a> HtmlSegmenter<'a> {
    pub fn new(config: &'a SegmenterConfig, detector: &'a ChapterDetector) -> Self {
        Self { config, detector }
    }

    /// 分章
    ///
    /// # 返回
    /// - `Ok(chapters)`: 找到标题时的章节列表；一个标题都没有时为空（平铺模式）
    /// - `Err(SegmentError::NoStructure)`: 文档里没有任何可识别的标题或段落元素
    pub fn segment(&self, document: &Html) -> Result<Vec<Chapter>, SegmentError> {
        let mut roles = HashMap::new();

        for selector in compile_selectors(&self.config.paragraph_selectors) {
            for element in document.select(&selector) {
                roles.insert(element.id(), Role::Block);
            }
        }

        for selector in compile_selectors(&self.config.keyword_heading_selectors) {
            for element in document.select(&selector) {
                if self.detector.is_heading(&inline_text(element)) {
                    roles.insert(element.id(), Role::Heading);
                }
            }
        }

        // 显式标记优先级最高，最后写入
        for selector in compile_selectors(&self.config.heading_selectors) {
            for element in document.select(&selector) {
                roles.insert(element.id(), Role::Heading);
            }
        }

        if roles.is_empty() {
            return Err(SegmentError::NoStructure);
        }

        let mut accepted = HashSet::new();
        let mut accumulator = ChapterAccumulator::new("\n\n");
        let mut headings = 0usize;
        let mut blocks = 0usize;

        for node in document.root_element().descendants() {
            let element = match ElementRef::wrap(node) {
                Some(element) => element,
                None => continue,
            };
            let role = match roles.get(&element.id()) {
                Some(role) => *role,
                None => continue,
            };

            // 已收集元素内部的匹配不再重复计入
            if element.ancestors().any(|a| accepted.contains(&a.id())) {
                continue;
            }
            accepted.insert(element.id());

            let text = inline_text(element);
            match role {
                Role::Heading => {
                    headings += 1;
                    accumulator.open(&text);
                }
                Role::Block => {
                    if !text.is_empty() {
                        blocks += 1;
                        accumulator.push_block(&text);
                    }
                }
            }
        }

        debug!(headings, blocks, "Collected HTML structure");
        Ok(accumulator.finish())
    }
}

fn compile_selectors(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(err) => {
                warn!(selector = %s, "Skipping invalid selector: {err:?}");
                None
            }
        })
        .collect()
}

fn is_skipped(name: &str) -> bool {
    matches!(name, "head" | "script" | "style" | "title" | "noscript" | "template")
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "blockquote"
            | "pre"
            | "li"
            | "ul"
            | "ol"
            | "tr"
            | "table"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "hr"
    )
}

/// 元素的单行文本，空白折叠为单个空格
pub fn inline_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_inline(element, &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_inline(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if is_skipped(name) {
                continue;
            }
            if name == "br" {
                out.push(' ');
                continue;
            }
            let block = is_block(name);
            if block {
                out.push(' ');
            }
            collect_inline(child_element, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// 文档的可读文本：块级元素之间用空行分隔，用于平铺模式和纯文本回退
pub fn readable_text(document: &Html) -> String {
    let mut raw = String::new();
    collect_readable(document.root_element(), &mut raw);

    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn collect_readable(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if is_skipped(name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = is_block(name);
            if block {
                out.push('\n');
            }
            collect_readable(child_element, out);
            if block {
                out.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(html: &str) -> Result<Vec<Chapter>, SegmentError> {
        let config = SegmenterConfig::default();
        let detector = ChapterDetector::new(&config);
        let document = Html::parse_document(html);
        HtmlSegmenter::new(&config, &detector).segment(&document)
    }

    #[test]
    fn test_gutenberg_style_h2_chapters() {
        let html = r#"
            <html><body>
                <h1>Pride and Prejudice</h1>
                <p>A preface paragraph.</p>
                <h2>CHAPTER I.</h2>
                <p>It is a truth universally acknowledged.</p>
                <p>However little known the feelings.</p>
                <h2>Chapter II.</h2>
                <p>Mr. Bennet was among the earliest.</p>
            </body></html>
        "#;

        let chapters = segment(html).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].title, "Introduction");
        assert_eq!(chapters[0].body, "A preface paragraph.");
        assert_eq!(chapters[1].title, "CHAPTER I.");
        assert_eq!(
            chapters[1].body,
            "It is a truth universally acknowledged.\n\nHowever little known the feelings."
        );
        assert_eq!(chapters[2].title, "Chapter II.");
        assert_eq!(chapters[2].index, 3);
    }

    #[test]
    fn test_non_chapter_h2_is_ignored() {
        let html = r#"
            <body>
                <h2>Contents</h2>
                <h2>CHAPTER 1</h2>
                <p>Body one.</p>
            </body>
        "#;

        let chapters = segment(html).unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, "CHAPTER 1");
        assert_eq!(chapters[0].body, "Body one.");
    }

    #[test]
    fn test_explicit_class_marker_without_keyword() {
        let html = r#"
            <body>
                <h3 class="chapter">The Beginning</h3>
                <p>First.</p>
                <h4>An event subheading</h4>
                <p>Second.</p>
                <h3 class="chapter">The End</h3>
                <p>Last.</p>
            </body>
        "#;

        let chapters = segment(html).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "The Beginning");
        assert_eq!(chapters[0].body, "First.\n\nAn event subheading\n\nSecond.");
        assert_eq!(chapters[1].title, "The End");
    }

    #[test]
    fn test_document_order_is_authoritative() {
        // 标题和段落交错嵌套在不同层级中
        let html = r#"
            <body>
                <div><p>Opening.</p></div>
                <section>
                    <h3 class="chapter">One</h3>
                    <div><p>Inside one.</p></div>
                </section>
                <p>Still one.</p>
                <section><h2>CHAPTER TWO</h2></section>
                <p>Inside two.</p>
            </body>
        "#;

        let chapters = segment(html).unwrap();
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Introduction", "One", "CHAPTER TWO"]);
        assert_eq!(chapters[1].body, "Inside one.\n\nStill one.");
        assert_eq!(chapters[2].body, "Inside two.");
    }

    #[test]
    fn test_nested_matches_are_not_duplicated() {
        let html = r#"
            <body>
                <h2>CHAPTER 1</h2>
                <blockquote><p>Quoted line.</p></blockquote>
            </body>
        "#;

        let chapters = segment(html).unwrap();
        assert_eq!(chapters[0].body, "Quoted line.");
    }

    #[test]
    fn test_empty_chapters_are_dropped() {
        let html = r#"
            <body>
                <h2>CHAPTER 1</h2>
                <p>   </p>
                <h2>CHAPTER 2</h2>
                <p>Real content.</p>
            </body>
        "#;

        let chapters = segment(html).unwrap();
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].index, 1);
        assert_eq!(chapters[0].title, "CHAPTER 2");
    }

    #[test]
    fn test_no_headings_is_flat() {
        let chapters = segment("<body><p>One.</p><p>Two.</p></body>").unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn test_no_structure_is_error() {
        let result = segment("<body><div>Just a div<br>CHAPTER 1</div></body>");
        assert_eq!(result, Err(SegmentError::NoStructure));
    }

    #[test]
    fn test_heading_text_is_normalized() {
        let html = "<body><h2>  CHAPTER\n   <em>IV</em>  </h2><p>Text.</p></body>";
        let chapters = segment(html).unwrap();
        assert_eq!(chapters[0].title, "CHAPTER IV");
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let config = SegmenterConfig {
            paragraph_selectors: vec!["p".to_string(), "p[".to_string()],
            ..SegmenterConfig::default()
        };
        let detector = ChapterDetector::new(&config);
        let document = Html::parse_document("<h2>CHAPTER 1</h2><p>Body.</p>");
        let chapters = HtmlSegmenter::new(&config, &detector).segment(&document).unwrap();
        assert_eq!(chapters.len(), 1);
    }

    #[test]
    fn test_readable_text() {
        let document = Html::parse_document(
            "<html><head><title>T</title><style>p{}</style></head>\
             <body><p>First  para.</p><div>Line a<br>Line b</div><script>x()</script></body></html>",
        );
        assert_eq!(readable_text(&document), "First para.\n\nLine a\n\nLine b");
    }

    #[test]
    fn test_inline_text_br_becomes_space() {
        let document = Html::parse_document("<p>one<br>two <b>three</b></p>");
        let selector = Selector::parse("p").unwrap();
        let p = document.select(&selector).next().unwrap();
        assert_eq!(inline_text(p), "one two three");
    }
}
