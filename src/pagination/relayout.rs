use super::{paginate, RenderContext, TextMeasurer};
use crate::error::{ReaderError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// 一次布局变化对应的票据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutTicket(u64);

impl LayoutTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// 可取消、可重启的重新分页
///
/// 每次渲染上下文变化都领取新票据；旧票据的分页结果一律丢弃（以最后一次变化为准）。
#[derive(Debug, Clone, Default)]
pub struct Repaginator {
    generation: Arc<AtomicU64>,
}

impl Repaginator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一次新的布局变化，之前的票据全部过期
    pub fn begin(&self) -> LayoutTicket {
        LayoutTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// 票据是否仍是最新的
    pub fn is_current(&self, ticket: LayoutTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// 同步分页
    ///
    /// # 返回
    /// 票据在分页前后都有效时返回页列表，否则返回 None
    pub fn run<M>(
        &self,
        ticket: LayoutTicket,
        text: &str,
        ctx: &RenderContext,
        measurer: &M,
    ) -> Option<Vec<String>>
    where
        M: TextMeasurer + ?Sized,
    {
        if !self.is_current(ticket) {
            debug!(generation = ticket.0, "Skipping superseded pagination");
            return None;
        }

        let pages = paginate(text, ctx, measurer);

        if self.is_current(ticket) {
            Some(pages)
        } else {
            debug!(
                generation = ticket.0,
                pages = pages.len(),
                "Discarding pagination result for outdated layout"
            );
            None
        }
    }

    /// 在阻塞线程池中分页，避免占用异步执行器
    pub async fn run_in_background<M>(
        &self,
        ticket: LayoutTicket,
        text: String,
        ctx: RenderContext,
        measurer: Arc<M>,
    ) -> Result<Option<Vec<String>>>
    where
        M: TextMeasurer + ?Sized + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.run(ticket, &text, &ctx, measurer.as_ref()))
            .await
            .map_err(|e| ReaderError::Join(e.to_string()))
    }
}
