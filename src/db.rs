use crate::error::{ReaderError, Result};
use crate::model::{Book, BookFormat, BookSummary, BookText, Chapter, ProgressEntry, ReadingProgress};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    PRAGMA encoding = 'UTF-8';
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        format TEXT NOT NULL,
        flat_content TEXT,
        content_digest TEXT NOT NULL,
        added_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS chapters (
        book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        chapter_index INTEGER NOT NULL,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        PRIMARY KEY (book_id, chapter_index)
    );

    CREATE TABLE IF NOT EXISTS reading_progress (
        book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
        chapter_position INTEGER NOT NULL,
        page INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (book_id, chapter_position)
    );
";

/// 持久化边界
///
/// 书籍、章节和阅读进度的增删改查。所有修改都是显式调用，
/// 一本书的进度写入在单条语句或单个事务内完成。
pub trait LibraryStore {
    /// 新增一本书，返回分配的 id
    fn insert_book(
        &mut self,
        title: &str,
        format: &BookFormat,
        text: &BookText,
        content_digest: &str,
    ) -> Result<i64>;

    /// 读取完整的书（含章节和进度）
    fn load_book(&self, book_id: i64) -> Result<Book>;

    /// 替换正文（重新导入），保留阅读进度
    fn replace_text(&mut self, book_id: i64, text: &BookText, content_digest: &str) -> Result<()>;

    /// 删除书籍，章节和进度一并删除
    fn delete_book(&mut self, book_id: i64) -> Result<()>;

    fn list_books(&self) -> Result<Vec<BookSummary>>;

    fn load_progress(&self, book_id: i64) -> Result<ReadingProgress>;

    /// 写入（`Some`）或清除（`None`）某一章的进度
    fn save_progress_entry(
        &mut self,
        book_id: i64,
        chapter: usize,
        entry: Option<ProgressEntry>,
    ) -> Result<()>;
}

/// 初始化数据库
pub fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// 基于 SQLite 的书库
pub struct SqliteLibrary {
    conn: Connection,
}

impl SqliteLibrary {
    /// 打开（或创建）数据库文件
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = init_db(path)?;
        info!(path = %path.display(), "Opened library database");
        Ok(Self { conn })
    }

    /// 内存数据库，用于测试和临时会话
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn ensure_book(&self, book_id: i64) -> Result<()> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT id FROM books WHERE id = ?1", [book_id], |row| row.get(0))
            .optional()?;
        exists.map(|_| ()).ok_or(ReaderError::BookNotFound(book_id))
    }

    fn load_chapters(&self, book_id: i64) -> Result<Vec<Chapter>> {
        let mut stmt = self.conn.prepare(
            "SELECT chapter_index, title, body FROM chapters WHERE book_id = ?1 ORDER BY chapter_index",
        )?;
        let chapters = stmt
            .query_map([book_id], |row| {
                Ok(Chapter {
                    index: row.get(0)?,
                    title: row.get(1)?,
                    body: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(chapters)
    }
}

/// 把正文写入 books.flat_content / chapters 表
///
/// 平铺模式写 flat_content 且不写章节；分章模式 flat_content 为 NULL
fn write_text(tx: &rusqlite::Transaction<'_>, book_id: i64, text: &BookText) -> Result<()> {
    tx.execute("DELETE FROM chapters WHERE book_id = ?1", [book_id])?;

    match text {
        BookText::Flat(content) => {
            tx.execute(
                "UPDATE books SET flat_content = ?1 WHERE id = ?2",
                params![content, book_id],
            )?;
        }
        BookText::Chapters(chapters) => {
            tx.execute("UPDATE books SET flat_content = NULL WHERE id = ?1", [book_id])?;
            let mut stmt = tx.prepare(
                "INSERT INTO chapters (book_id, chapter_index, title, body) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chapter in chapters {
                stmt.execute(params![book_id, chapter.index, chapter.title, chapter.body])?;
            }
        }
    }

    Ok(())
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl LibraryStore for SqliteLibrary {
    fn insert_book(
        &mut self,
        title: &str,
        format: &BookFormat,
        text: &BookText,
        content_digest: &str,
    ) -> Result<i64> {
        let format_json = serde_json::to_string(format)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO books (title, format, content_digest) VALUES (?1, ?2, ?3)",
            params![title, format_json, content_digest],
        )?;
        let book_id = tx.last_insert_rowid();
        write_text(&tx, book_id, text)?;
        tx.commit()?;

        debug!(book_id, chapters = text.chapter_count(), "Inserted book");
        Ok(book_id)
    }

    fn load_book(&self, book_id: i64) -> Result<Book> {
        let row = self
            .conn
            .query_row(
                "SELECT title, format, flat_content, content_digest FROM books WHERE id = ?1",
                [book_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let (title, format_json, flat_content, content_digest) =
            row.ok_or(ReaderError::BookNotFound(book_id))?;
        let format: BookFormat = serde_json::from_str(&format_json)?;

        let text = match flat_content {
            Some(content) => BookText::Flat(content),
            None => BookText::Chapters(self.load_chapters(book_id)?),
        };

        Ok(Book {
            id: book_id,
            title,
            format,
            text,
            content_digest,
            progress: self.load_progress(book_id)?,
        })
    }

    fn replace_text(&mut self, book_id: i64, text: &BookText, content_digest: &str) -> Result<()> {
        self.ensure_book(book_id)?;

        let tx = self.conn.transaction()?;
        write_text(&tx, book_id, text)?;
        tx.execute(
            "UPDATE books SET content_digest = ?1 WHERE id = ?2",
            params![content_digest, book_id],
        )?;
        tx.commit()?;

        debug!(book_id, chapters = text.chapter_count(), "Replaced book text");
        Ok(())
    }

    fn delete_book(&mut self, book_id: i64) -> Result<()> {
        let affected = self.conn.execute("DELETE FROM books WHERE id = ?1", [book_id])?;
        if affected == 0 {
            return Err(ReaderError::BookNotFound(book_id));
        }
        debug!(book_id, "Deleted book");
        Ok(())
    }

    fn list_books(&self) -> Result<Vec<BookSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.id, b.title, b.format,
                    (SELECT COUNT(*) FROM chapters c WHERE c.book_id = b.id)
             FROM books b ORDER BY b.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, title, format_json, chapter_count)| {
                Ok(BookSummary {
                    id,
                    title,
                    format: serde_json::from_str(&format_json)?,
                    chapter_count: chapter_count.max(0) as usize,
                })
            })
            .collect()
    }

    fn load_progress(&self, book_id: i64) -> Result<ReadingProgress> {
        let mut stmt = self.conn.prepare(
            "SELECT chapter_position, page, updated_at FROM reading_progress WHERE book_id = ?1",
        )?;
        let rows = stmt
            .query_map([book_id], |row| {
                let chapter: i64 = row.get(0)?;
                let page: i64 = row.get(1)?;
                let updated_at: String = row.get(2)?;
                Ok((chapter, page, parse_timestamp(2, &updated_at)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut progress = ReadingProgress::new();
        for (chapter, page, updated_at) in rows {
            progress.set(chapter.max(0) as usize, page.max(0) as usize, updated_at);
        }
        Ok(progress)
    }

    fn save_progress_entry(
        &mut self,
        book_id: i64,
        chapter: usize,
        entry: Option<ProgressEntry>,
    ) -> Result<()> {
        self.ensure_book(book_id)?;

        match entry {
            Some(entry) => {
                self.conn.execute(
                    "INSERT INTO reading_progress (book_id, chapter_position, page, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(book_id, chapter_position)
                     DO UPDATE SET page = excluded.page, updated_at = excluded.updated_at",
                    params![
                        book_id,
                        chapter as i64,
                        entry.page as i64,
                        entry.updated_at.to_rfc3339()
                    ],
                )?;
                debug!(book_id, chapter, page = entry.page, "Saved reading position");
            }
            None => {
                self.conn.execute(
                    "DELETE FROM reading_progress WHERE book_id = ?1 AND chapter_position = ?2",
                    params![book_id, chapter as i64],
                )?;
                debug!(book_id, chapter, "Cleared reading position");
            }
        }

        Ok(())
    }
}
