//! 阅读位置跟踪
//!
//! 把持久化的「章节 -> 最后阅读页」映射解析为当前分页下的 (章节, 页)，
//! 并在位置变化时立即写回存储。

use crate::db::LibraryStore;
use crate::error::Result;
use crate::model::{BookText, Chapter, ProgressEntry, ReadingPosition, ReadingProgress};
use crate::pagination::{LayoutTicket, RenderContext, Repaginator, TextMeasurer};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// 解析阅读位置
///
/// # 参数
/// - `progress`: 书的进度映射
/// - `chapter_count`: 章节数，平铺模式为 0
/// - `chapter`: 即将显示的章节位置
/// - `page_count`: 该章节在当前渲染上下文下的页数
///
/// # 返回
/// 有效的位置。超出范围的章节和页都被夹到最后一个有效值；没有记录时为第 0 页。
pub fn resolve_position(
    progress: &ReadingProgress,
    chapter_count: usize,
    chapter: usize,
    page_count: usize,
) -> ReadingPosition {
    let chapter = chapter.min(chapter_count.saturating_sub(1));
    let last_page = page_count.saturating_sub(1);

    let page = match progress.page_for(chapter) {
        Some(saved) if saved > last_page => {
            debug!(chapter, saved, last_page, "Clamping stale saved page");
            last_page
        }
        Some(saved) => saved,
        None => 0,
    };

    ReadingPosition { chapter, page }
}

/// 记录阅读位置并立即持久化
///
/// 先更新内存中的进度，再写存储；写入失败时返回错误，内存状态保持可用
pub fn record_position<S>(
    store: &mut S,
    book_id: i64,
    progress: &mut ReadingProgress,
    position: ReadingPosition,
) -> Result<()>
where
    S: LibraryStore + ?Sized,
{
    let entry = ProgressEntry {
        page: position.page,
        updated_at: Utc::now(),
    };
    progress.set(position.chapter, entry.page, entry.updated_at);
    store.save_progress_entry(book_id, position.chapter, Some(entry))
}

/// 清除某一章的阅读位置
pub fn clear_position<S>(
    store: &mut S,
    book_id: i64,
    progress: &mut ReadingProgress,
    chapter: usize,
) -> Result<()>
where
    S: LibraryStore + ?Sized,
{
    progress.clear(chapter);
    store.save_progress_entry(book_id, chapter, None)
}

/// 书签切换
///
/// 当前页已是该章保存的位置时清除，否则保存当前页
///
/// # 返回
/// 切换后当前页是否处于书签状态
pub fn toggle_bookmark<S>(
    store: &mut S,
    book_id: i64,
    progress: &mut ReadingProgress,
    position: ReadingPosition,
) -> Result<bool>
where
    S: LibraryStore + ?Sized,
{
    if progress.page_for(position.chapter) == Some(position.page) {
        clear_position(store, book_id, progress, position.chapter)?;
        Ok(false)
    } else {
        record_position(store, book_id, progress, position)?;
        Ok(true)
    }
}

/// 一次打开的阅读会话
///
/// 持有正文、当前渲染上下文、当前章的页列表和位置。
/// 翻页和切章时位置立即持久化（可关闭）；渲染上下文变化时整体重新分页并重新解析位置。
pub struct ReaderSession<M: ?Sized> {
    book_id: i64,
    title: String,
    text: BookText,
    progress: ReadingProgress,
    ctx: RenderContext,
    measurer: Arc<M>,
    pages: Vec<String>,
    position: ReadingPosition,
    repaginator: Repaginator,
    record_on_navigate: bool,
}

impl<M> ReaderSession<M>
where
    M: TextMeasurer + ?Sized + 'static,
{
    /// 打开一本书
    ///
    /// 优先显示最近更新过进度的章节，没有进度时从第 0 章开始
    pub fn open<S>(store: &S, book_id: i64, ctx: RenderContext, measurer: Arc<M>) -> Result<Self>
    where
        S: LibraryStore + ?Sized,
    {
        let book = store.load_book(book_id)?;
        let chapter = book.progress.resume_chapter().unwrap_or(0);

        let mut session = Self {
            book_id,
            title: book.title,
            text: book.text,
            progress: book.progress,
            ctx,
            measurer,
            pages: Vec::new(),
            position: ReadingPosition::default(),
            repaginator: Repaginator::new(),
            record_on_navigate: true,
        };
        session.load_chapter(chapter);

        info!(
            book_id,
            chapters = session.chapter_count(),
            chapter = session.position.chapter,
            page = session.position.page,
            "Opened reader session"
        );
        Ok(session)
    }

    /// 翻页和切章时是否自动保存位置；关闭后只有书签操作会写进度
    pub fn with_record_on_navigate(mut self, enabled: bool) -> Self {
        self.record_on_navigate = enabled;
        self
    }

    pub fn book_id(&self) -> i64 {
        self.book_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn chapter_count(&self) -> usize {
        self.text.chapter_count()
    }

    pub fn chapters(&self) -> &[Chapter] {
        match &self.text {
            BookText::Chapters(chapters) => chapters,
            BookText::Flat(_) => &[],
        }
    }

    /// 当前章节，平铺模式为 None
    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.chapters().get(self.position.chapter)
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn current_page(&self) -> &str {
        self.pages
            .get(self.position.page)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn position(&self) -> ReadingPosition {
        self.position
    }

    pub fn progress(&self) -> &ReadingProgress {
        &self.progress
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// 跳到当前章的某一页，超出范围时夹到最后一页
    pub fn go_to_page<S>(&mut self, store: &mut S, page: usize) -> Result<ReadingPosition>
    where
        S: LibraryStore + ?Sized,
    {
        self.position.page = page.min(self.pages.len().saturating_sub(1));
        self.persist_navigation(store)?;
        Ok(self.position)
    }

    /// 下一页；已在最后一页时不动并返回 false
    pub fn next_page<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        if self.position.page + 1 >= self.pages.len() {
            return Ok(false);
        }
        self.go_to_page(store, self.position.page + 1)?;
        Ok(true)
    }

    /// 上一页；已在第一页时不动并返回 false
    pub fn prev_page<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        if self.position.page == 0 {
            return Ok(false);
        }
        self.go_to_page(store, self.position.page - 1)?;
        Ok(true)
    }

    /// 下一章：用当前渲染上下文重新分页，并恢复该章保存的页
    pub fn next_chapter<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        let target = self.position.chapter + 1;
        if target >= self.chapter_count() {
            return Ok(false);
        }
        self.load_chapter(target);
        self.persist_navigation(store)?;
        Ok(true)
    }

    /// 上一章
    pub fn prev_chapter<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        if self.position.chapter == 0 || self.chapter_count() == 0 {
            return Ok(false);
        }
        self.load_chapter(self.position.chapter - 1);
        self.persist_navigation(store)?;
        Ok(true)
    }

    /// 渲染上下文变化：同步重新分页并重新解析位置
    pub fn relayout(&mut self, ctx: RenderContext) -> ReadingPosition {
        let ticket = self.begin_relayout(ctx);
        let pages = self
            .repaginator
            .run(ticket, self.current_text(), &self.ctx, self.measurer.as_ref());
        if let Some(pages) = pages {
            self.apply_layout(ticket, pages);
        }
        self.position
    }

    /// 登记一次渲染上下文变化，之前未完成的分页全部作废
    pub fn begin_relayout(&mut self, ctx: RenderContext) -> LayoutTicket {
        self.ctx = ctx;
        let ticket = self.repaginator.begin();
        debug!(
            book_id = self.book_id,
            generation = ticket.generation(),
            font_size = ctx.font.size,
            "Layout changed"
        );
        ticket
    }

    /// 登记渲染上下文变化，并返回在后台线程池里分页的任务
    ///
    /// 返回的 future 不借用会话，可以在它完成前再次调用本方法；
    /// 被后来者取代的任务结果为 `None`，或者在 [`Self::apply_layout`] 时被丢弃
    pub fn background_relayout(
        &mut self,
        ctx: RenderContext,
    ) -> (
        LayoutTicket,
        impl Future<Output = Result<Option<Vec<String>>>> + Send + 'static,
    ) {
        let ticket = self.begin_relayout(ctx);
        let repaginator = self.repaginator.clone();
        let text = self.current_text().to_string();
        let measurer = Arc::clone(&self.measurer);

        let task = async move {
            repaginator
                .run_in_background(ticket, text, ctx, measurer)
                .await
        };
        (ticket, task)
    }

    /// 应用分页结果；票据已过期时丢弃并返回 false
    pub fn apply_layout(&mut self, ticket: LayoutTicket, pages: Vec<String>) -> bool {
        if !self.repaginator.is_current(ticket) {
            debug!(
                book_id = self.book_id,
                generation = ticket.generation(),
                "Ignoring stale layout"
            );
            return false;
        }
        self.pages = pages;
        self.position = resolve_position(
            &self.progress,
            self.chapter_count(),
            self.position.chapter,
            self.pages.len(),
        );
        true
    }

    /// 当前页是否是该章保存的位置
    pub fn is_bookmarked(&self) -> bool {
        self.progress.page_for(self.position.chapter) == Some(self.position.page)
    }

    /// 切换当前页的书签
    pub fn toggle_bookmark<S>(&mut self, store: &mut S) -> Result<bool>
    where
        S: LibraryStore + ?Sized,
    {
        toggle_bookmark(store, self.book_id, &mut self.progress, self.position)
    }

    fn current_text(&self) -> &str {
        match &self.text {
            BookText::Flat(content) => content,
            BookText::Chapters(chapters) => chapters
                .get(self.position.chapter)
                .map(|c| c.body.as_str())
                .unwrap_or(""),
        }
    }

    fn load_chapter(&mut self, chapter: usize) {
        self.position.chapter = chapter.min(self.chapter_count().saturating_sub(1));
        let ticket = self.repaginator.begin();
        let pages = self
            .repaginator
            .run(ticket, self.current_text(), &self.ctx, self.measurer.as_ref());
        if let Some(pages) = pages {
            self.apply_layout(ticket, pages);
        }
    }

    fn persist_navigation<S>(&mut self, store: &mut S) -> Result<()>
    where
        S: LibraryStore + ?Sized,
    {
        if !self.record_on_navigate {
            return Ok(());
        }
        record_position(store, self.book_id, &mut self.progress, self.position)
    }
}
