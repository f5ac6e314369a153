use crate::config::SegmenterConfig;
use crate::db::LibraryStore;
use crate::error::Result;
use crate::model::{BookFormat, BookText};
use crate::parser::{decode_text, Segmentation, Segmenter};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// 计算正文摘要（SHA-256 十六进制）
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// 导入器
///
/// 负责把已经读入内存的内容分章并写入书库。文件选择、复制和网络下载
/// 都在外部完成，这里只接收字符串或字节。
pub struct Importer {
    segmenter: Segmenter,
}

impl Importer {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            segmenter: Segmenter::new(config),
        }
    }

    /// 导入一段文本（纯文本或 HTML）
    ///
    /// # 参数
    /// - `store`: 书库
    /// - `title`: 书名
    /// - `raw`: 原始内容
    ///
    /// # 返回
    /// 新书的 id
    pub fn import_text<S>(&self, store: &mut S, title: &str, raw: &str) -> Result<i64>
    where
        S: LibraryStore + ?Sized,
    {
        let text = self.segment(title, raw);
        let digest = content_digest(raw.as_bytes());
        let book_id = store.insert_book(title, &BookFormat::PlainText, &text, &digest)?;

        info!(book_id, title, chapters = text.chapter_count(), "Imported book");
        Ok(book_id)
    }

    /// 导入原始字节，先自动检测编码
    pub fn import_bytes<S>(&self, store: &mut S, title: &str, bytes: &[u8]) -> Result<i64>
    where
        S: LibraryStore + ?Sized,
    {
        let decoded = decode_text(bytes);
        if decoded.had_errors {
            warn!(title, encoding = decoded.encoding, "Imported text contains undecodable bytes");
        }
        self.import_text(store, title, &decoded.text)
    }

    /// 导入磁盘上的文件
    ///
    /// 文本类文件读入并分章；PDF/EPUB/DOCX 等只登记路径，交给原生阅读器
    pub fn import_file<S>(&self, store: &mut S, path: &Path) -> Result<i64>
    where
        S: LibraryStore + ?Sized,
    {
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Untitled")
            .to_string();
        let bytes = fs::read(path)?;

        let format = BookFormat::from_path(path);
        if format.is_text() {
            return self.import_bytes(store, &title, &bytes);
        }

        let digest = content_digest(&bytes);
        let book_id = store.insert_book(&title, &format, &BookText::Flat(String::new()), &digest)?;
        info!(book_id, title = %title, ?format, "Registered externally rendered book");
        Ok(book_id)
    }

    /// 重新导入：重新分章并替换正文，阅读进度保留
    ///
    /// # 返回
    /// 内容有变化时返回 true；摘要相同则不做任何修改
    pub fn reimport<S>(&self, store: &mut S, book_id: i64, raw: &str) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        let book = store.load_book(book_id)?;
        let digest = content_digest(raw.as_bytes());
        if book.content_digest == digest {
            debug!(book_id, "Content unchanged, skipping re-import");
            return Ok(false);
        }

        let text = self.segment(&book.title, raw);
        store.replace_text(book_id, &text, &digest)?;

        info!(
            book_id,
            before = book.text.chapter_count(),
            after = text.chapter_count(),
            "Re-imported book"
        );
        Ok(true)
    }

    /// 删除书籍及其章节和进度
    pub fn delete_book<S>(&self, store: &mut S, book_id: i64) -> Result<()>
    where
        S: LibraryStore + ?Sized,
    {
        store.delete_book(book_id)?;
        info!(book_id, "Deleted book");
        Ok(())
    }

    fn segment(&self, title: &str, raw: &str) -> BookText {
        match self.segmenter.segment(title, raw) {
            Segmentation::Chapters(chapters) => BookText::Chapters(chapters),
            Segmentation::Flat(content) => BookText::Flat(content),
        }
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}
