use crate::config::FontFamily;
use serde::{Deserialize, Serialize};

/// 字体描述
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub size: f32,
    pub family: FontFamily,
}

impl FontDescriptor {
    pub fn new(size: f32, family: FontFamily) -> Self {
        Self { size, family }
    }
}

/// 文本测量能力，由宿主环境提供
///
/// 返回 `text` 在给定字体、最大宽度下排版后的高度。
/// 对固定宽度和字体，高度必须随文本增长单调不减。
pub trait TextMeasurer: Send + Sync {
    fn measure_height(&self, text: &str, font: &FontDescriptor, max_width: f32) -> f32;
}

impl<F> TextMeasurer for F
where
    F: Fn(&str, &FontDescriptor, f32) -> f32 + Send + Sync,
{
    fn measure_height(&self, text: &str, font: &FontDescriptor, max_width: f32) -> f32 {
        self(text, font, max_width)
    }
}

/// 启发式测量器
///
/// 用按字符类别估算的字宽模拟贪心折行，没有平台字体时使用（测试、命令行工具）。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicMeasurer {
    /// 行高相对字号的倍数
    pub line_height: f32,
}

impl HeuristicMeasurer {
    pub fn new(line_height: f32) -> Self {
        Self {
            line_height: line_height.max(0.1),
        }
    }

    /// 估算一段不含空白的文本宽度（像素）
    pub fn text_width(&self, text: &str, font: &FontDescriptor) -> f32 {
        text.chars()
            .map(|ch| glyph_em_width(ch, font.family))
            .sum::<f32>()
            * font.size
            * family_scale(font.family)
    }

    fn line_count(&self, text: &str, font: &FontDescriptor, max_width: f32) -> usize {
        let max_width = max_width.max(1.0);
        let space = glyph_em_width(' ', font.family) * font.size * family_scale(font.family);

        let mut lines = 0usize;
        let mut line_w = 0.0f32;

        for word in text.split_whitespace() {
            let w = self.text_width(word, font);

            if lines > 0 && line_w > 0.0 && line_w + space + w <= max_width {
                line_w += space + w;
                continue;
            }

            // 新起一行；超宽的单词按字符折成多行
            if w > max_width {
                let extra = (w / max_width).ceil().max(1.0) as usize;
                lines += extra;
                line_w = w - (extra - 1) as f32 * max_width;
            } else {
                lines += 1;
                line_w = w;
            }
        }

        lines
    }
}

impl Default for HeuristicMeasurer {
    fn default() -> Self {
        Self::new(1.2)
    }
}

impl TextMeasurer for HeuristicMeasurer {
    fn measure_height(&self, text: &str, font: &FontDescriptor, max_width: f32) -> f32 {
        self.line_count(text, font, max_width) as f32 * font.size * self.line_height
    }
}

fn glyph_em_width(ch: char, family: FontFamily) -> f32 {
    if is_wide_cjk(ch) {
        return 1.0;
    }
    if family == FontFamily::Monospaced {
        return 0.6;
    }
    match ch {
        ' ' => 0.28,
        'i' | 'j' | 'l' | 't' | 'f' | 'I' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' => 0.3,
        'm' | 'w' | 'M' | 'W' => 0.85,
        '0'..='9' => 0.55,
        c if c.is_uppercase() => 0.68,
        _ => 0.52,
    }
}

fn is_wide_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x2E80..=0x9FFF | 0xAC00..=0xD7AF | 0xF900..=0xFAFF | 0xFF00..=0xFF60 | 0x20000..=0x2FFFF)
}

fn family_scale(family: FontFamily) -> f32 {
    match family {
        FontFamily::System => 1.0,
        FontFamily::Serif => 1.03,
        FontFamily::Rounded => 1.02,
        FontFamily::Monospaced => 1.0,
    }
}
