//! 阅读核心的可调配置
//!
//! 分章关键字、HTML 选择器和分页参数都集中在这里，可以从 TOML 文件加载。
//! 缺失或无效的字段回退到默认值。

use crate::error::Result;
use crate::pagination::{FontDescriptor, RenderContext, Viewport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// 顶层配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default)]
    pub segmenter: SegmenterConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl ReaderConfig {
    /// 从 TOML 字符串解析配置
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// 分章配置
///
/// 各个历史版本里散落的差异（关键字、哪些 class 算章节标题）统一成显式选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// 章节关键字，不区分大小写的行首匹配
    #[serde(default = "default_chapter_keyword")]
    pub chapter_keyword: String,
    /// 显式标记为章节标题的元素
    #[serde(default = "default_heading_selectors")]
    pub heading_selectors: Vec<String>,
    /// 只有文本以章节关键字开头时才算标题的元素
    #[serde(default = "default_keyword_heading_selectors")]
    pub keyword_heading_selectors: Vec<String>,
    /// 正文段落和事件式小标题
    #[serde(default = "default_paragraph_selectors")]
    pub paragraph_selectors: Vec<String>,
    /// 额外的行首正则，例如 `^第[一二三四五六七八九十百千\d]+章`
    #[serde(default)]
    pub extra_heading_patterns: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            chapter_keyword: default_chapter_keyword(),
            heading_selectors: default_heading_selectors(),
            keyword_heading_selectors: default_keyword_heading_selectors(),
            paragraph_selectors: default_paragraph_selectors(),
            extra_heading_patterns: Vec::new(),
        }
    }
}

/// 字体族
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontFamily {
    #[default]
    System,
    Serif,
    Monospaced,
    Rounded,
}

impl std::fmt::Display for FontFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FontFamily::System => "System",
            FontFamily::Serif => "Serif",
            FontFamily::Monospaced => "Monospaced",
            FontFamily::Rounded => "Rounded",
        };
        write!(f, "{}", label)
    }
}

/// 分页配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f32,
    #[serde(default = "default_max_font_size")]
    pub max_font_size: f32,
    /// 四周留白（像素）
    #[serde(default = "default_padding")]
    pub padding: f32,
    #[serde(default)]
    pub font_family: FontFamily,
    /// 行高相对字号的倍数
    #[serde(default = "default_line_height")]
    pub line_height: f32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            min_font_size: default_min_font_size(),
            max_font_size: default_max_font_size(),
            padding: default_padding(),
            font_family: FontFamily::default(),
            line_height: default_line_height(),
        }
    }
}

impl PaginationConfig {
    /// 把字号限制在允许范围内
    ///
    /// 字号为 NaN 时使用默认字号；上下限不是有限值或者上下限颠倒时使用默认范围
    pub fn clamp_font_size(&self, size: f32) -> f32 {
        let (lo, hi) = self.font_size_bounds();
        let size = if size.is_nan() {
            warn!("Font size is NaN, using default {}", default_font_size());
            default_font_size()
        } else {
            size
        };
        size.clamp(lo, hi)
    }

    fn font_size_bounds(&self) -> (f32, f32) {
        let (lo, hi) = (self.min_font_size, self.max_font_size);
        if lo.is_finite() && hi.is_finite() && lo <= hi {
            return (lo, hi);
        }
        warn!(
            min = lo,
            max = hi,
            "Invalid font size bounds, using defaults {}..{}",
            default_min_font_size(),
            default_max_font_size()
        );
        (default_min_font_size(), default_max_font_size())
    }

    /// 为给定视口构建渲染上下文
    pub fn render_context(&self, viewport: Viewport) -> RenderContext {
        RenderContext {
            font: FontDescriptor {
                size: self.clamp_font_size(self.font_size),
                family: self.font_family,
            },
            viewport,
            padding: self.padding.max(0.0),
        }
    }
}

/// 从磁盘加载配置
///
/// 文件不存在或内容无效时记录警告并返回默认配置
pub fn load_config(path: &Path) -> ReaderConfig {
    let contents = match fs::read_to_string(path) {
        Ok(data) => {
            info!(path = %path.display(), "Loaded reader config");
            data
        }
        Err(err) => {
            warn!(path = %path.display(), "Falling back to default config: {err}");
            return ReaderConfig::default();
        }
    };

    match ReaderConfig::from_toml_str(&contents) {
        Ok(cfg) => {
            debug!("Parsed reader configuration from disk");
            cfg
        }
        Err(err) => {
            warn!(path = %path.display(), "Invalid config TOML: {err}");
            ReaderConfig::default()
        }
    }
}

fn default_chapter_keyword() -> String {
    "CHAPTER".to_string()
}

fn default_heading_selectors() -> Vec<String> {
    vec![
        "h1.chapter".to_string(),
        "h2.chapter".to_string(),
        "h3.chapter".to_string(),
    ]
}

fn default_keyword_heading_selectors() -> Vec<String> {
    vec!["h2".to_string()]
}

fn default_paragraph_selectors() -> Vec<String> {
    vec![
        "p".to_string(),
        "h4".to_string(),
        "h5".to_string(),
        "blockquote".to_string(),
    ]
}

fn default_font_size() -> f32 {
    18.0
}

fn default_min_font_size() -> f32 {
    12.0
}

fn default_max_font_size() -> f32 {
    30.0
}

fn default_padding() -> f32 {
    16.0
}

fn default_line_height() -> f32 {
    1.2
}
