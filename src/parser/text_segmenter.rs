use super::{ChapterAccumulator, ChapterDetector};
use crate::model::Chapter;
use tracing::debug;

/// 纯文本分章
///
/// 逐行扫描，去掉首尾空白后命中章节规则的行作为标题，其余行按原顺序用换行拼成正文。
pub struct TextSegmenter<'a> {
    detector: &'a ChapterDetector,
}

impl<'a> TextSegmenter<'a> {
    pub fn new(detector: &'a ChapterDetector) -> Self {
        Self { detector }
    }

    /// 分章
    ///
    /// # 参数
    /// - `text`: 纯文本，`\n` 与 `\r\n` 都可作为行结束
    ///
    /// # 返回
    /// 章节列表；一个标题都没有时为空
    pub fn segment(&self, text: &str) -> Vec<Chapter> {
        let mut accumulator = ChapterAccumulator::new("\n");
        let mut headings = 0usize;

        for line in text.lines() {
            let trimmed = line.trim();
            if self.detector.is_heading(trimmed) {
                headings += 1;
                accumulator.open(trimmed);
            } else {
                accumulator.push_block(trimmed);
            }
        }

        debug!(headings, "Scanned plain text for chapter headings");
        accumulator.finish()
    }
}
