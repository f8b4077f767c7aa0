//! 批量答题 - 流程层
//!
//! 对一组题目执行一次"查询 → 填写"，题目经 `TaskQueue` 限流并发处理。
//!
//! - 每道题开始前检查暂停/停止，命中则提前结束（已得到的结果照常返回）
//! - 单道题出错只记为失败，不影响其他题目
//! - 进度在运行中可随时读取

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::BatchError;
use crate::infrastructure::TaskQueue;
use crate::models::answer::multi_choice_warning;
use crate::models::{Item, ItemOutcome, ItemStatus, OutcomeStatus, Progress, RunResult};
use crate::services::{AnswerApplier, AnswerResolver};
use crate::workflow::run_control::RunControl;

/// 批量答题参数
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency_limit: usize,
    /// 相邻两道题开始处理的间隔
    pub inter_item_delay: Duration,
    /// 跳过已填写/已确认正确的题目
    pub skip_answered: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            inter_item_delay: Duration::from_millis(500),
            skip_answered: false,
        }
    }
}

pub struct BatchAnswerer {
    resolver: Arc<AnswerResolver>,
    applier: Arc<dyn AnswerApplier>,
    queue: TaskQueue,
    options: BatchOptions,
    control: Arc<RunControl>,
    progress: Arc<Mutex<Progress>>,
    running: AtomicBool,
}

/// 运行结束时清除运行标记
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock(progress: &Mutex<Progress>) -> MutexGuard<'_, Progress> {
    progress.lock().unwrap_or_else(|e| e.into_inner())
}

impl BatchAnswerer {
    pub fn new(resolver: Arc<AnswerResolver>, applier: Arc<dyn AnswerApplier>, options: BatchOptions) -> Self {
        Self {
            resolver,
            applier,
            queue: TaskQueue::new(options.concurrency_limit),
            options,
            control: Arc::new(RunControl::new()),
            progress: Arc::new(Mutex::new(Progress::default())),
            running: AtomicBool::new(false),
        }
    }

    /// 与其他流程共用同一个任务队列
    pub fn with_queue(mut self, queue: TaskQueue) -> Self {
        self.queue = queue;
        self
    }

    /// 暂停/停止控制
    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    /// 请求停止；空闲时发出则下一次 `run` 不处理任何题目
    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 当前进度快照
    pub fn progress(&self) -> Progress {
        *lock(&self.progress)
    }

    /// 执行一次批量答题
    pub async fn run(&self, items: Vec<Item>) -> Result<RunResult, BatchError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("[答题] 已经在答题中");
            return Err(BatchError::AlreadyRunning);
        }
        let _flag = RunningFlag(&self.running);
        let _scope = self.control.run_scope();

        let total = items.len();
        *lock(&self.progress) = Progress {
            total,
            ..Default::default()
        };
        info!("[答题] 🚀 开始答题: {} 道题目", total);

        let mut slots: Vec<Option<(Item, ItemOutcome)>> = vec![None; total];
        let mut pending = Vec::new();
        let mut untouched = Vec::new();
        let mut interrupted = false;

        let mut items = items.into_iter().enumerate().peekable();
        while let Some((index, item)) = items.next() {
            if self.options.skip_answered
                && matches!(item.status(), ItemStatus::Applied | ItemStatus::VerifiedCorrect)
            {
                lock(&self.progress).skipped += 1;
                let outcome = ItemOutcome::skipped(item.id(), "已作答");
                slots[index] = Some((item, outcome));
                continue;
            }

            if let Some(reason) = self.control.checkpoint() {
                info!("[答题] {}，剩余题目不再处理", reason);
                interrupted = true;
                untouched.push((index, item));
                untouched.extend(items.by_ref());
                break;
            }

            let resolver = Arc::clone(&self.resolver);
            let applier = Arc::clone(&self.applier);
            let progress = Arc::clone(&self.progress);
            let fallback = item.clone();
            let task = self.queue.enqueue_labeled(Some(item.id().to_string()), move || async move {
                let (item, outcome) = answer_one(&resolver, applier.as_ref(), item).await;
                record(&progress, &outcome);
                Ok((item, outcome))
            });
            pending.push((index, fallback, task));

            if items.peek().is_some() && !self.options.inter_item_delay.is_zero() {
                sleep(self.options.inter_item_delay).await;
            }
        }

        let (started, tasks): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|(index, fallback, task)| ((index, fallback), task))
            .unzip();

        for ((index, mut fallback), result) in started.into_iter().zip(join_all(tasks).await) {
            slots[index] = Some(match result {
                Ok(done) => done,
                Err(e) => {
                    error!("[答题] ❌ 题目 {} 处理异常: {}", fallback.id(), e);
                    let outcome = ItemOutcome::failed(fallback.id(), None, e.to_string());
                    record(&self.progress, &outcome);
                    fallback.set_status(ItemStatus::Failed);
                    (fallback, outcome)
                }
            });
        }

        // 题目按输入顺序返回，未处理的题目放回原位
        let mut ordered: Vec<Option<Item>> = vec![None; total];
        let mut outcomes = Vec::with_capacity(total);
        for (index, slot) in slots.into_iter().enumerate() {
            if let Some((item, outcome)) = slot {
                ordered[index] = Some(item);
                outcomes.push(outcome);
            }
        }
        for (index, item) in untouched {
            ordered[index] = Some(item);
        }
        let result_items: Vec<Item> = ordered.into_iter().flatten().collect();

        let progress = self.progress();
        info!(
            "[答题] ✅ 答题结束: 成功 {}, 失败 {}, 跳过 {} / 共 {} (成功率 {}%)",
            progress.succeeded,
            progress.failed,
            progress.skipped,
            progress.total,
            progress.success_rate()
        );

        Ok(RunResult {
            progress,
            outcomes,
            items: result_items,
            interrupted,
        })
    }
}

fn record(progress: &Mutex<Progress>, outcome: &ItemOutcome) {
    let mut progress = lock(progress);
    match outcome.status {
        OutcomeStatus::Success => progress.succeeded += 1,
        OutcomeStatus::Failed => progress.failed += 1,
        OutcomeStatus::Skipped => progress.skipped += 1,
    }
}

/// 处理一道题：查询答案并填写
async fn answer_one(resolver: &AnswerResolver, applier: &dyn AnswerApplier, mut item: Item) -> (Item, ItemOutcome) {
    let Some(resolution) = resolver.resolve(&item, item.attempted_answers()).await else {
        warn!("[答题] 题目 {} 未找到答案", item.id());
        let outcome = ItemOutcome::skipped(item.id(), "未找到答案");
        return (item, outcome);
    };
    item.set_status(ItemStatus::Resolved);

    match applier.apply(&item, &resolution.value).await {
        Ok(true) => {
            item.set_status(ItemStatus::Applied);
            let warning = multi_choice_warning(item.question_type(), &resolution.value);
            if let Some(w) = &warning {
                warn!("[答题] 题目 {} {}", item.id(), w);
            }
            info!(
                "[答题] ✓ 题目 {} 答题成功 ({}): {}",
                item.id(),
                resolution.source,
                resolution.value
            );
            let outcome = ItemOutcome::success(item.id(), &resolution, warning);
            (item, outcome)
        }
        Ok(false) => {
            error!("[答题] ✗ 题目 {} 填充失败", item.id());
            item.set_status(ItemStatus::Failed);
            let outcome = ItemOutcome::failed(item.id(), Some(resolution.value), "填充失败");
            (item, outcome)
        }
        Err(e) => {
            error!("[答题] ✗ 题目 {} 填充异常: {}", item.id(), e);
            item.set_status(ItemStatus::Failed);
            let outcome = ItemOutcome::failed(item.id(), Some(resolution.value), e.to_string());
            (item, outcome)
        }
    }
}
