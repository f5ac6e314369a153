//! 分页
//!
//! 把一段正文按渲染上下文切成若干页。分页基于重排：换行一律视为空白，
//! 按空白切词后逐词贪心装页，每追加一个词测量一次高度，不回溯、不断字。

use crate::config::FontFamily;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod measure;
pub mod relayout;

pub use measure::{FontDescriptor, HeuristicMeasurer, TextMeasurer};
pub use relayout::{LayoutTicket, Repaginator};

/// 容器尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// 渲染上下文：(字体, 容器尺寸, 留白)
///
/// 任何一项变化都必须从头重新分页，旧的页列表整体作废
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    pub font: FontDescriptor,
    pub viewport: Viewport,
    pub padding: f32,
}

impl RenderContext {
    pub fn new(font_size: f32, viewport: Viewport, padding: f32) -> Self {
        Self {
            font: FontDescriptor::new(font_size, FontFamily::System),
            viewport,
            padding,
        }
    }

    pub fn with_family(mut self, family: FontFamily) -> Self {
        self.font.family = family;
        self
    }

    pub fn usable_width(&self) -> f32 {
        (self.viewport.width - 2.0 * self.padding).max(0.0)
    }

    pub fn usable_height(&self) -> f32 {
        (self.viewport.height - 2.0 * self.padding).max(0.0)
    }
}

/// 把正文切成单词序列
///
/// `\r\n`、`\r`、`\n` 与空格等价，原有的行结构不跨页保留
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// 分页
///
/// # 参数
/// - `text`: 章节（或整本书）正文
/// - `ctx`: 渲染上下文
/// - `measurer`: 宿主提供的文本测量
///
/// # 返回
/// 页文本列表。空文本返回一个空页；单个超高的词独占一页，不会被丢弃。
pub fn paginate<M>(text: &str, ctx: &RenderContext, measurer: &M) -> Vec<String>
where
    M: TextMeasurer + ?Sized,
{
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return vec![String::new()];
    }

    let usable_w = ctx.usable_width();
    let usable_h = ctx.usable_height();

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut oversized = 0usize;

    for token in &tokens {
        let candidate_len = if current.is_empty() {
            token.len()
        } else {
            current.len() + 1 + token.len()
        };
        let mut candidate = String::with_capacity(candidate_len);
        candidate.push_str(&current);
        if !candidate.is_empty() {
            candidate.push(' ');
        }
        candidate.push_str(token);

        if measurer.measure_height(&candidate, &ctx.font, usable_w) <= usable_h {
            current = candidate;
            continue;
        }

        if current.is_empty() {
            // 单个词就超出可用高度：独占一页
            oversized += 1;
            current = candidate;
        } else {
            pages.push(std::mem::take(&mut current));
            if measurer.measure_height(token, &ctx.font, usable_w) > usable_h {
                oversized += 1;
            }
            current.push_str(token);
        }
    }

    if !current.is_empty() {
        pages.push(current);
    }

    debug!(
        tokens = tokens.len(),
        pages = pages.len(),
        oversized,
        font_size = ctx.font.size,
        "Paginated text"
    );

    pages
}
