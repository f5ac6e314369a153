use crate::config::SegmenterConfig;
use regex::Regex;
use tracing::warn;

/// 章节标题检测器
///
/// 规则统一为「去掉首尾空白后，以章节关键字开头（不区分大小写）」，
/// 另外可以配置额外的行首正则（例如中文的「第X章」）。
#[derive(Debug, Clone)]
pub struct ChapterDetector {
    /// 章节标题匹配模式列表
    patterns: Vec<Regex>,
}

impl ChapterDetector {
    /// 根据配置创建检测器
    ///
    /// 无效的额外正则会被记录并跳过
    pub fn new(config: &SegmenterConfig) -> Self {
        let mut patterns = Vec::new();

        let keyword = config.chapter_keyword.trim();
        if !keyword.is_empty() {
            match Regex::new(&format!("(?i)^{}", regex::escape(keyword))) {
                Ok(re) => patterns.push(re),
                Err(err) => warn!(keyword, "Invalid chapter keyword: {err}"),
            }
        }

        for pattern in &config.extra_heading_patterns {
            let anchored = if pattern.starts_with('^') {
                pattern.clone()
            } else {
                format!("^(?:{})", pattern)
            };
            match Regex::new(&anchored) {
                Ok(re) => patterns.push(re),
                Err(err) => warn!(pattern = %pattern, "Skipping invalid heading pattern: {err}"),
            }
        }

        Self { patterns }
    }

    /// 文本是否是章节标题
    pub fn is_heading(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| p.is_match(trimmed))
    }
}

impl Default for ChapterDetector {
    fn default() -> Self {
        Self::new(&SegmenterConfig::default())
    }
}
