use encoding_rs::{Encoding, GBK, UTF_8};
use tracing::{debug, warn};

/// 解码结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// 实际使用的编码名称
    pub encoding: &'static str,
    /// 是否出现了无法解码的字节（已替换为 U+FFFD）
    pub had_errors: bool,
}

/// 把导入的原始字节解码为文本
///
/// 依次尝试：BOM、UTF-8、GBK 特征；都不满足时按 UTF-8 有损解码
///
/// # 参数
/// - `bytes`: 文件字节数据
///
/// # 返回
/// 解码后的文本（不含 BOM）和编码信息
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    let encoding = detect_encoding(bytes);
    let (text, used, had_errors) = encoding.decode(bytes);

    if had_errors {
        warn!(encoding = used.name(), "Decoding produced replacement characters");
    } else {
        debug!(encoding = used.name(), bytes = bytes.len(), "Decoded text");
    }

    DecodedText {
        text: text.into_owned(),
        encoding: used.name(),
        had_errors,
    }
}

/// 检测字节编码
fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_length)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }

    if looks_like_gbk(bytes) {
        return GBK;
    }

    UTF_8
}

/// 字节序列是否像 GBK 编码
///
/// 首字节 0x81-0xFE，次字节 0x40-0xFE；超过一半的非 ASCII 字节对符合即认为是 GBK
fn looks_like_gbk(bytes: &[u8]) -> bool {
    let mut gbk_pairs = 0usize;
    let mut total_pairs = 0usize;

    let mut i = 0;
    while i < bytes.len().saturating_sub(1) {
        let (b1, b2) = (bytes[i], bytes[i + 1]);

        if b1 < 0x80 {
            i += 1;
            continue;
        }

        total_pairs += 1;
        if (0x81..=0xFE).contains(&b1) && (0x40..=0xFE).contains(&b2) {
            gbk_pairs += 1;
            i += 2;
        } else {
            i += 1;
        }
    }

    total_pairs > 0 && gbk_pairs * 2 > total_pairs
}
