//! 任务队列 - 基础设施层
//!
//! 限制同时运行的异步任务数量，保护下游共享资源（题库接口、AI 接口、页面）。
//!
//! - 入队顺序即出队顺序（FIFO），完成顺序不保证
//! - 任务结束（成功、失败或 panic）后立即拉起下一个等待中的任务
//! - 单个任务失败不影响其他任务
//! - `clear()` 只取消尚未开始的任务，运行中的任务自然结束

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use futures::future::{join_all, BoxFuture, FutureExt};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use crate::error::QueueError;

/// 队列状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub running: usize,
    pub pending: usize,
    pub limit: usize,
    /// 历史最高并发数
    pub peak: usize,
}

/// 已入队、尚未开始的任务
trait QueuedTask: Send {
    fn run(self: Box<Self>) -> BoxFuture<'static, ()>;
    fn cancel(self: Box<Self>);
}

struct Job<F, T> {
    label: String,
    work: F,
    tx: oneshot::Sender<Result<T>>,
}

impl<F, Fut, T> QueuedTask for Job<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    fn run(self: Box<Self>) -> BoxFuture<'static, ()> {
        let Job { label, work, tx } = *self;
        async move {
            let result = work().await;
            if let Err(e) = &result {
                warn!("[队列] 任务失败 {}: {}", label, e);
            }
            // 调用方已放弃等待时结果直接丢弃
            let _ = tx.send(result);
        }
        .boxed()
    }

    fn cancel(self: Box<Self>) {
        let _ = self.tx.send(Err(QueueError::Cancelled.into()));
    }
}

struct QueueState {
    pending: VecDeque<Box<dyn QueuedTask>>,
    running: usize,
    limit: usize,
    peak: usize,
    next_id: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    idle: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        // 锁内不会 panic，中毒时直接取回数据
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 在并发上限内尽可能多地启动等待中的任务
    fn pump(self: &Arc<Self>) {
        loop {
            let task = {
                let mut state = self.state();
                if state.running >= state.limit {
                    return;
                }
                let Some(task) = state.pending.pop_front() else {
                    return;
                };
                state.running += 1;
                state.peak = state.peak.max(state.running);
                debug!("[队列] 开始任务，当前并发: {}", state.running);
                task
            };

            let guard = RunningGuard {
                inner: Arc::clone(self),
            };
            tokio::spawn(async move {
                let _guard = guard;
                task.run().await;
            });
        }
    }

    fn finish_one(self: &Arc<Self>) {
        let idle = {
            let mut state = self.state();
            state.running = state.running.saturating_sub(1);
            state.running == 0 && state.pending.is_empty()
        };
        if idle {
            self.idle.notify_waiters();
        }
        self.pump();
    }
}

/// 任务结束时释放并发名额，panic 时同样生效
struct RunningGuard {
    inner: Arc<Inner>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.finish_one();
    }
}

/// 并发受限的任务队列
///
/// 需要在 tokio 运行时内使用
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// 创建队列，`limit` 为同时运行的任务上限（最小为 1）
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    running: 0,
                    limit: limit.max(1),
                    peak: 0,
                    next_id: 0,
                }),
                idle: Notify::new(),
            }),
        }
    }

    /// 添加任务
    ///
    /// 任务立即入队并尝试启动；返回的 future 在任务完成后给出结果。
    /// 任务在开始前被 `clear()` 时返回 [`QueueError::Cancelled`]，
    /// 任务 panic 时返回 [`QueueError::Panicked`]。
    pub fn enqueue<F, Fut, T>(&self, work: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue_labeled(None, work)
    }

    /// 添加带标签的任务（标签只用于日志）
    pub fn enqueue_labeled<F, Fut, T>(
        &self,
        label: Option<String>,
        work: F,
    ) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.inner.state();
            state.next_id += 1;
            let label = label.unwrap_or_else(|| format!("#{}", state.next_id));
            state.pending.push_back(Box::new(Job { label, work, tx }));
        }
        self.inner.pump();

        async move {
            match rx.await {
                Ok(result) => result,
                // 发送端未发送就被丢弃：任务 panic
                Err(_) => Err(QueueError::Panicked.into()),
            }
        }
    }

    /// 批量添加任务，结果顺序与输入一致
    pub async fn enqueue_batch<F, Fut, T>(&self, works: Vec<F>) -> Vec<Result<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let futures: Vec<Pin<Box<dyn Future<Output = Result<T>> + Send>>> = works
            .into_iter()
            .enumerate()
            .map(|(index, work)| {
                Box::pin(self.enqueue_labeled(Some(format!("batch-{}", index)), work)) as _
            })
            .collect();
        join_all(futures).await
    }

    /// 等待所有任务完成（无运行中、无等待中）
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.inner.state();
                if state.running == 0 && state.pending.is_empty() {
                    break;
                }
            }
            notified.await;
        }
        debug!("[队列] 所有任务已完成");
    }

    /// 取消所有尚未开始的任务，运行中的任务不受影响
    pub fn clear(&self) -> usize {
        let (cancelled, idle) = {
            let mut state = self.inner.state();
            let cancelled: Vec<_> = state.pending.drain(..).collect();
            (cancelled, state.running == 0)
        };
        let count = cancelled.len();
        for task in cancelled {
            task.cancel();
        }
        if idle {
            self.inner.idle.notify_waiters();
        }
        info!("[队列] 队列已清空，取消 {} 个等待中的任务", count);
        count
    }

    /// 调整并发上限，调高时立即启动等待中的任务
    pub fn set_concurrency_limit(&self, limit: usize) {
        self.inner.state().limit = limit.max(1);
        info!("[队列] 并发限制设置为: {}", limit.max(1));
        self.inner.pump();
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state();
        QueueStatus {
            running: state.running,
            pending: state.pending.len(),
            limit: state.limit,
            peak: state.peak,
        }
    }
}
