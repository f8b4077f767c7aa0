//! 纠错引擎 - 流程层
//!
//! 对批改接口报告的错题循环执行：
//!
//! ```text
//! 查询答案（排除已尝试） → 填写 → 等待保存 → 重新批改 → 拆分
//! ```
//!
//! 每一轮只处理上一轮仍然错误的题目。批改后不在错题列表中的题目视为纠正成功，
//! 其答案在后台上传（经去重）；仍然错误的题目带着尝试记录进入下一轮。
//! 达到最大轮数或被停止时，剩余题目标记为失败。
//!
//! 单道题的查询/填写失败只算"本轮没有进展"；批改接口失败则中止整个纠错，
//! 已确认的结果和已发起的上传保留在错误中返回。
//!
//! 批改接口判对的其余题目，其平台认可的答案同样经去重上传。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::error::CorrectionError;
use crate::infrastructure::TaskQueue;
use crate::models::{
    CorrectionResult, CorrectionRound, GradedItem, GradingReport, GradingSummary, IdAliasMap, Item,
    ItemCorrection, ItemStatus, QuestionType, UploadRecord, WrongItem,
};
use crate::services::{AnswerApplier, AnswerResolver, UploadDeduplicator, UploadReport, VerificationOracle};
use crate::utils::logging::log_round_start;
use crate::workflow::run_control::RunControl;

/// 填写后等待平台保存的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    /// 固定等待后批改一次
    Fixed(Duration),
    /// 反复批改，间隔从 `initial_delay` 开始翻倍，直到相邻两次结果一致
    Poll {
        initial_delay: Duration,
        max_attempts: usize,
    },
}

/// 纠错参数
#[derive(Debug, Clone)]
pub struct CorrectionConfig {
    pub max_rounds: usize,
    pub settle: SettleStrategy,
    pub inter_round_delay: Duration,
    /// 是否纠正简答题（`fetch_and_correct` 默认丢弃简答题）
    pub correct_short_answers: bool,
    /// 上传记录中的平台标识
    pub platform: String,
    /// 保留的轮次记录上限
    pub history_limit: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            settle: SettleStrategy::Fixed(Duration::from_millis(3000)),
            inter_round_delay: Duration::from_millis(500),
            correct_short_answers: false,
            platform: "czbk".to_string(),
            history_limit: 100,
        }
    }
}

/// 运行结束时清除运行标记
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// 一次纠错过程中累积的结果
struct Ledger {
    total: usize,
    order: HashMap<String, usize>,
    finished: Vec<Item>,
    per_item: Vec<ItemCorrection>,
    rounds: Vec<CorrectionRound>,
    rounds_used: usize,
}

impl Ledger {
    fn new(items: &[Item]) -> Self {
        Self {
            total: items.len(),
            order: items
                .iter()
                .enumerate()
                .map(|(i, item)| (item.id().to_string(), i))
                .collect(),
            finished: Vec::new(),
            per_item: Vec::new(),
            rounds: Vec::new(),
            rounds_used: 0,
        }
    }

    fn succeed(&mut self, mut item: Item, round: usize) {
        item.set_status(ItemStatus::VerifiedCorrect);
        self.per_item.push(ItemCorrection {
            id: item.id().to_string(),
            success: true,
            round,
            final_answer: item.last_attempt().map(str::to_string),
            attempted_answers: item.attempted_answers().to_vec(),
            message: None,
        });
        self.finished.push(item);
    }

    fn fail(&mut self, mut item: Item, message: &str) {
        item.set_status(ItemStatus::Failed);
        self.per_item.push(ItemCorrection {
            id: item.id().to_string(),
            success: false,
            round: self.rounds_used,
            final_answer: None,
            attempted_answers: item.attempted_answers().to_vec(),
            message: Some(message.to_string()),
        });
        self.finished.push(item);
    }

    /// 生成结果，`unfinished` 为中止时尚未结束的题目
    fn into_result(self, unfinished: Vec<Item>) -> CorrectionResult {
        let Ledger {
            total,
            order,
            mut finished,
            mut per_item,
            rounds,
            rounds_used,
        } = self;

        finished.extend(unfinished);
        let position = |id: &str| order.get(id).copied().unwrap_or(usize::MAX);
        finished.sort_by_key(|item| position(item.id()));
        per_item.sort_by_key(|r| position(&r.id));

        let success_count = per_item.iter().filter(|r| r.success).count();
        let failed_count = per_item.iter().filter(|r| !r.success).count();

        CorrectionResult {
            total,
            success_count,
            failed_count,
            rounds_used,
            per_item_results: per_item,
            rounds,
            items: finished,
            grading: None,
        }
    }
}

pub struct CorrectionEngine {
    resolver: Arc<AnswerResolver>,
    applier: Arc<dyn AnswerApplier>,
    oracle: Arc<dyn VerificationOracle>,
    uploads: Arc<UploadDeduplicator>,
    queue: TaskQueue,
    config: CorrectionConfig,
    aliases: IdAliasMap,
    control: Arc<RunControl>,
    running: AtomicBool,
    history: Mutex<VecDeque<CorrectionRound>>,
    upload_handles: Mutex<Vec<JoinHandle<UploadReport>>>,
}

impl CorrectionEngine {
    pub fn new(
        resolver: Arc<AnswerResolver>,
        applier: Arc<dyn AnswerApplier>,
        oracle: Arc<dyn VerificationOracle>,
        uploads: Arc<UploadDeduplicator>,
        queue: TaskQueue,
        config: CorrectionConfig,
    ) -> Self {
        Self {
            resolver,
            applier,
            oracle,
            uploads,
            queue,
            config,
            aliases: IdAliasMap::new(),
            control: Arc::new(RunControl::new()),
            running: AtomicBool::new(false),
            history: Mutex::new(VecDeque::new()),
            upload_handles: Mutex::new(Vec::new()),
        }
    }

    /// 批改接口返回的 ID 按别名表归一化
    pub fn with_aliases(mut self, aliases: IdAliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_control(mut self, control: Arc<RunControl>) -> Self {
        self.control = control;
        self
    }

    pub fn control(&self) -> Arc<RunControl> {
        Arc::clone(&self.control)
    }

    /// 请求停止，在下一轮开始前生效；空闲时发出则下一次纠错不执行任何一轮
    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 最近 `limit` 轮的记录（按时间顺序）
    pub fn history(&self, limit: usize) -> Vec<CorrectionRound> {
        let history = lock(&self.history);
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    pub fn clear_history(&self) {
        lock(&self.history).clear();
    }

    /// 等待所有后台上传完成，返回汇总
    pub async fn wait_uploads(&self) -> UploadReport {
        let handles: Vec<_> = lock(&self.upload_handles).drain(..).collect();
        let mut report = UploadReport::default();
        for result in join_all(handles).await {
            match result {
                Ok(r) => report.merge(r),
                Err(e) => error!("[纠错] 上传任务异常终止: {}", e),
            }
        }
        report
    }

    /// 当前批改统计，不触发纠错
    pub async fn grading_summary(&self) -> anyhow::Result<GradingSummary> {
        Ok(self.oracle.fetch_grading().await?.summary)
    }

    /// 从批改接口获取错题并纠错
    ///
    /// 判对题目的答案先交给上传去重。无法转换的错题记录会被跳过；简答题默认不纠正。
    /// 没有错题时返回空结果。结果中带有纠错前的批改统计。
    pub async fn fetch_and_correct(&self) -> Result<CorrectionResult, CorrectionError> {
        if self.is_running() {
            warn!("[纠错] 正在纠错中");
            return Err(CorrectionError::AlreadyRunning);
        }

        let report = self
            .oracle
            .fetch_grading()
            .await
            .map_err(|e| CorrectionError::OracleUnavailable {
                round: 0,
                source: e.into(),
                partial: Box::new(CorrectionResult::empty()),
            })?;
        let GradingReport { wrong, correct, summary } = report;
        self.upload_graded(&correct, &HashSet::new());

        let items = self.prepare_items(wrong);
        if items.is_empty() {
            info!("[纠错] ✅ 没有需要纠正的错题");
            return Ok(CorrectionResult {
                grading: Some(summary),
                ..CorrectionResult::empty()
            });
        }

        match self.correct(items, self.config.max_rounds).await {
            Ok(mut result) => {
                result.grading = Some(summary);
                Ok(result)
            }
            Err(CorrectionError::OracleUnavailable { round, source, mut partial }) => {
                partial.grading = Some(summary);
                Err(CorrectionError::OracleUnavailable { round, source, partial })
            }
            Err(e) => Err(e),
        }
    }

    /// 把批改判对的题目交给上传去重，`skip` 中的题目由纠错结果自行上传
    fn upload_graded(&self, graded: &[GradedItem], skip: &HashSet<String>) {
        let records: Vec<UploadRecord> = graded
            .iter()
            .filter(|g| !g.answer.trim().is_empty())
            .filter_map(|g| match Item::try_from(g) {
                Ok(item) => {
                    let canonical = self.aliases.canonical(item.id()).to_string();
                    if skip.contains(&canonical) {
                        return None;
                    }
                    let item = item.with_id(canonical);
                    Some(UploadRecord::verified(&item, &g.answer, &self.config.platform))
                }
                Err(e) => {
                    debug!("[纠错] 判对题目 {} 无法上传: {}", g.id, e);
                    None
                }
            })
            .collect();

        if !records.is_empty() {
            debug!("[纠错] 上传 {} 道判对题目的答案", records.len());
            let handle = self.uploads.upload_in_background(records);
            lock(&self.upload_handles).push(handle);
        }
    }

    /// 把错题记录转换为待纠错题目
    fn prepare_items(&self, wrong: Vec<WrongItem>) -> Vec<Item> {
        let mut items: Vec<Item> = Vec::new();
        for record in wrong {
            let raw_id = record.id.clone();
            match Item::try_from(record) {
                Ok(item) => {
                    if item.question_type() == QuestionType::ShortAnswer && !self.config.correct_short_answers {
                        debug!("[纠错] 跳过简答题 {}", item.id());
                        continue;
                    }
                    let canonical = self.aliases.canonical(item.id()).to_string();
                    if items.iter().any(|i| i.id() == canonical) {
                        continue;
                    }
                    items.push(item.with_id(canonical));
                }
                Err(e) => warn!("[纠错] ⚠️ 错题 {} 数据无效，已跳过: {}", raw_id, e),
            }
        }
        items
    }

    /// 对错题执行多轮纠错
    ///
    /// 同一时间只允许一次纠错，重复调用返回 [`CorrectionError::AlreadyRunning`]。
    pub async fn correct(&self, items: Vec<Item>, max_rounds: usize) -> Result<CorrectionResult, CorrectionError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("[纠错] 正在纠错中");
            return Err(CorrectionError::AlreadyRunning);
        }
        let _flag = RunningFlag(&self.running);
        let _scope = self.control.run_scope();

        // 批改接口按规范 ID 报告错题，传入的页面ID 先换成规范 ID
        let mut working: Vec<Item> = Vec::with_capacity(items.len());
        for item in items {
            let canonical = self.aliases.canonical(item.id()).to_string();
            let mut item = item.with_id(canonical);
            if working.iter().any(|w| w.id() == item.id()) {
                warn!("[纠错] 题目 {} 重复，已忽略", item.id());
                continue;
            }
            item.reseed();
            working.push(item);
        }

        let mut ledger = Ledger::new(&working);
        info!("[纠错] 🔧 开始纠错: {} 道错题，最多 {} 轮", working.len(), max_rounds);

        let mut stop_reason = None;
        for round in 1..=max_rounds {
            if working.is_empty() {
                break;
            }
            if let Some(reason) = self.control.checkpoint() {
                info!("[纠错] {}，结束纠错", reason);
                stop_reason = Some(reason);
                break;
            }

            ledger.rounds_used = round;
            log_round_start(round, max_rounds, working.len());

            // 1. 查询并填写
            let attempted_count = working.len();
            let (attempted, resolved_count) = self.attempt_round(working).await;
            working = attempted;

            // 2-3. 等待保存并重新批改
            let report = match self.settle_and_verify(round).await {
                Ok(report) => report,
                Err(e) => {
                    error!("[纠错] ❌ 第 {} 轮批改失败，纠错中止: {}", round, e);
                    return Err(CorrectionError::OracleUnavailable {
                        round,
                        source: e.into(),
                        partial: Box::new(ledger.into_result(working)),
                    });
                }
            };
            let wrong_ids: HashSet<String> = report
                .wrong
                .iter()
                .map(|w| self.aliases.canonical(&w.id).to_string())
                .collect();
            let working_ids: HashSet<String> = working.iter().map(|i| i.id().to_string()).collect();
            self.upload_graded(&report.correct, &working_ids);

            // 4-5. 拆分：不在错题列表中的即为纠正成功
            let mut next = Vec::new();
            let mut records = Vec::new();
            for mut item in working {
                if wrong_ids.contains(item.id()) {
                    item.set_status(ItemStatus::VerifiedWrong);
                    item.reseed();
                    next.push(item);
                } else {
                    info!(
                        "[纠错] ✅ 题目 {} 纠正成功: {}",
                        item.id(),
                        item.last_attempt().unwrap_or("-")
                    );
                    if let Some(answer) = item.last_attempt() {
                        records.push(UploadRecord::verified(&item, answer, &self.config.platform));
                    }
                    ledger.succeed(item, round);
                }
            }
            working = next;

            if !records.is_empty() {
                let handle = self.uploads.upload_in_background(records);
                lock(&self.upload_handles).push(handle);
            }

            let record = CorrectionRound {
                round_number: round,
                attempted_count,
                resolved_count,
                still_wrong_ids: working.iter().map(|i| i.id().to_string()).collect(),
            };
            info!(
                "[纠错] 第 {} 轮结束: 查到答案 {}/{}，仍错误 {} 道",
                round,
                resolved_count,
                attempted_count,
                record.still_wrong_ids.len()
            );
            self.push_history(record.clone());
            ledger.rounds.push(record);

            // 6. 轮间间隔
            if !working.is_empty() && round < max_rounds && !self.config.inter_round_delay.is_zero() {
                sleep(self.config.inter_round_delay).await;
            }
        }

        let message = match stop_reason {
            Some(reason) => format!("纠错{}", reason),
            None => format!("{} 轮后仍未纠正", ledger.rounds_used),
        };
        for item in working {
            warn!(
                "[纠错] ❌ 题目 {} 纠错失败，已尝试: {:?}",
                item.id(),
                item.attempted_answers()
            );
            ledger.fail(item, &message);
        }

        let result = ledger.into_result(Vec::new());
        info!(
            "[纠错] 🏁 纠错完成: 成功 {}, 失败 {} / 共 {}，用了 {} 轮",
            result.success_count, result.failed_count, result.total, result.rounds_used
        );
        Ok(result)
    }

    /// 并发查询并填写一轮，返回 (题目, 查到答案的数量)
    async fn attempt_round(&self, working: Vec<Item>) -> (Vec<Item>, usize) {
        let mut fallbacks = Vec::with_capacity(working.len());
        let mut tasks = Vec::with_capacity(working.len());

        for item in working {
            let resolver = Arc::clone(&self.resolver);
            let applier = Arc::clone(&self.applier);
            fallbacks.push(item.clone());
            tasks.push(self.queue.enqueue_labeled(Some(item.id().to_string()), move || async move {
                Ok(attempt_one(&resolver, applier.as_ref(), item).await)
            }));
        }

        let mut resolved_count = 0;
        let mut items = Vec::with_capacity(fallbacks.len());
        for (fallback, result) in fallbacks.into_iter().zip(join_all(tasks).await) {
            match result {
                Ok((item, resolved)) => {
                    if resolved {
                        resolved_count += 1;
                    }
                    items.push(item);
                }
                Err(e) => {
                    warn!("[纠错] 题目 {} 本轮处理异常: {}", fallback.id(), e);
                    items.push(fallback);
                }
            }
        }
        (items, resolved_count)
    }

    /// 等待平台保存后重新批改
    async fn settle_and_verify(&self, round: usize) -> anyhow::Result<GradingReport> {
        match self.config.settle {
            SettleStrategy::Fixed(delay) => {
                debug!("[纠错] 第 {} 轮等待 {}ms 后批改", round, delay.as_millis());
                sleep(delay).await;
                self.oracle.fetch_grading().await
            }
            SettleStrategy::Poll {
                initial_delay,
                max_attempts,
            } => {
                let mut delay = initial_delay;
                sleep(delay).await;
                let mut previous = self.oracle.fetch_grading().await?;

                for attempt in 2..=max_attempts {
                    delay *= 2;
                    sleep(delay).await;
                    let current = self.oracle.fetch_grading().await?;
                    if same_ids(&previous.wrong, &current.wrong) {
                        debug!("[纠错] 第 {} 轮批改结果在第 {} 次查询时稳定", round, attempt);
                        return Ok(current);
                    }
                    previous = current;
                }

                warn!("[纠错] ⚠️ 第 {} 轮批改结果未稳定，使用最后一次结果", round);
                Ok(previous)
            }
        }
    }

    fn push_history(&self, record: CorrectionRound) {
        let mut history = lock(&self.history);
        history.push_back(record);
        while history.len() > self.config.history_limit {
            history.pop_front();
        }
    }
}

fn same_ids(a: &[WrongItem], b: &[WrongItem]) -> bool {
    let ids = |items: &[WrongItem]| items.iter().map(|w| w.id.clone()).collect::<HashSet<_>>();
    ids(a) == ids(b)
}

/// 为一道错题查询新答案并填写，返回 (题目, 是否查到答案)
///
/// 查不到答案时题目保持原样；填写失败时答案仍计入尝试记录。
async fn attempt_one(resolver: &AnswerResolver, applier: &dyn AnswerApplier, mut item: Item) -> (Item, bool) {
    let excluded = item.attempted_answers().to_vec();
    let Some(resolution) = resolver.resolve(&item, &excluded).await else {
        warn!("[纠错] 题目 {} 未能生成答案", item.id());
        return (item, false);
    };

    item.record_attempt(resolution.value.clone());
    item.set_status(ItemStatus::Resolved);
    info!("[纠错] 💡 题目 {} 新答案: {}", item.id(), resolution.value);

    match applier.apply(&item, &resolution.value).await {
        Ok(true) => item.set_status(ItemStatus::Applied),
        Ok(false) => warn!("[纠错] 题目 {} 填写未生效", item.id()),
        Err(e) => warn!("[纠错] 题目 {} 填写失败: {}", item.id(), e),
    }
    (item, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemKind;
    use crate::services::{AiModel, CacheLookup, UploadConfig, UploadSink};
    use crate::services::CacheHit;
    use anyhow::Result;
    use async_trait::async_trait;

    struct EmptyCache;

    #[async_trait]
    impl CacheLookup for EmptyCache {
        async fn lookup(&self, _: &str, _: &str, _: QuestionType) -> Result<Option<CacheHit>> {
            Ok(None)
        }
    }

    /// 依次给出 "1", "2", "3"...（跳过已排除的）
    struct CountingModel;

    #[async_trait]
    impl AiModel for CountingModel {
        async fn infer(&self, _: &str, _: QuestionType, _: &[String], excluded: &[String]) -> Result<Option<String>> {
            Ok(Some((excluded.len() + 1).to_string()))
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl AnswerApplier for AcceptAll {
        async fn apply(&self, _: &Item, _: &str) -> Result<bool> {
            Ok(true)
        }
    }

    /// 题目答案达到 `needed` 次尝试后才算正确
    struct AttemptOracle {
        needed: HashMap<String, usize>,
        seen: Mutex<HashMap<String, usize>>,
        calls: Mutex<usize>,
    }

    impl AttemptOracle {
        fn new(needed: &[(&str, usize)]) -> Self {
            Self {
                needed: needed.iter().map(|(id, n)| (id.to_string(), *n)).collect(),
                seen: Mutex::new(HashMap::new()),
                calls: Mutex::new(0),
            }
        }

        fn bump(&self, id: &str) {
            *self.seen.lock().unwrap().entry(id.to_string()).or_insert(0) += 1;
        }
    }

    #[async_trait]
    impl VerificationOracle for AttemptOracle {
        async fn fetch_wrong_items(&self) -> Result<Vec<WrongItem>> {
            *self.calls.lock().unwrap() += 1;
            let seen = self.seen.lock().unwrap();
            Ok(self
                .needed
                .iter()
                .filter(|(id, n)| seen.get(*id).copied().unwrap_or(0) < **n)
                .map(|(id, _)| WrongItem {
                    id: id.clone(),
                    question_type: "3".into(),
                    content: "题目".into(),
                    options: vec![],
                    wrong_answer: String::new(),
                })
                .collect())
        }
    }

    struct TrackingApplier(Arc<AttemptOracle>);

    #[async_trait]
    impl AnswerApplier for TrackingApplier {
        async fn apply(&self, item: &Item, _: &str) -> Result<bool> {
            self.0.bump(item.id());
            Ok(true)
        }
    }

    struct NullSink;

    #[async_trait]
    impl UploadSink for NullSink {
        async fn upload(&self, _: &UploadRecord) -> Result<bool> {
            Ok(true)
        }
    }

    fn fill(id: &str) -> Item {
        Item::new(id, format!("题目 {}", id), ItemKind::FillBlank).unwrap()
    }

    fn engine(oracle: Arc<AttemptOracle>, config: CorrectionConfig) -> CorrectionEngine {
        let resolver = AnswerResolver::new(
            Arc::new(EmptyCache),
            Some(Arc::new(CountingModel)),
            Duration::from_millis(500),
        );
        let uploads = UploadDeduplicator::new(Arc::new(NullSink), UploadConfig::default());
        CorrectionEngine::new(
            Arc::new(resolver),
            Arc::new(TrackingApplier(oracle.clone())),
            oracle,
            Arc::new(uploads),
            TaskQueue::new(3),
            config,
        )
    }

    fn fast_config() -> CorrectionConfig {
        CorrectionConfig {
            settle: SettleStrategy::Fixed(Duration::ZERO),
            inter_round_delay: Duration::ZERO,
            ..CorrectionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_items_corrected_over_rounds() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 1), ("b", 2)]));
        let engine = engine(oracle, fast_config());

        let result = engine.correct(vec![fill("a"), fill("b")], 3).await.unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.rounds_used, 2);
        assert_eq!(result.result_of("b").unwrap().final_answer.as_deref(), Some("2"));
        assert_eq!(result.result_of("b").unwrap().attempted_answers, vec!["1", "2"]);
        assert_eq!(result.rounds[0].still_wrong_ids, vec!["b".to_string()]);
        assert_eq!(engine.history(10).len(), 2);

        let report = engine.wait_uploads().await;
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn test_exhausted_rounds_mark_failed() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 10)]));
        let engine = engine(oracle, fast_config());

        let result = engine.correct(vec![fill("a")], 2).await.unwrap();

        assert_eq!(result.failed_count, 1);
        assert_eq!(result.status_of("a"), Some(ItemStatus::Failed));
        assert_eq!(result.result_of("a").unwrap().attempted_answers.len(), 2);
        assert_eq!(result.result_of("a").unwrap().round, 2);
    }

    #[tokio::test]
    async fn test_stop_before_first_round() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 1)]));
        let control = Arc::new(RunControl::new());
        let engine = engine(oracle.clone(), fast_config()).with_control(control.clone());

        control.pause();
        let result = engine.correct(vec![fill("a")], 3).await.unwrap();

        assert_eq!(result.rounds_used, 0);
        assert_eq!(result.status_of("a"), Some(ItemStatus::Failed));
        assert_eq!(*oracle.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_poll_settles_on_stable_response() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 1)]));
        let config = CorrectionConfig {
            settle: SettleStrategy::Poll {
                initial_delay: Duration::from_millis(1),
                max_attempts: 4,
            },
            ..fast_config()
        };
        let engine = engine(oracle.clone(), config);

        let result = engine.correct(vec![fill("a")], 3).await.unwrap();
        assert_eq!(result.success_count, 1);
        // 第一次与第二次结果一致即停止
        assert_eq!(*oracle.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fetch_and_correct_filters_short_answers() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 1)]));
        let engine = engine(oracle, fast_config());

        let items = engine.prepare_items(vec![
            WrongItem {
                id: "s".into(),
                question_type: "4".into(),
                content: "简述".into(),
                options: vec![],
                wrong_answer: String::new(),
            },
            WrongItem {
                id: "bad".into(),
                question_type: "0".into(),
                content: "只有一个选项".into(),
                options: vec!["x".into()],
                wrong_answer: String::new(),
            },
            WrongItem {
                id: "a".into(),
                question_type: "3".into(),
                content: "填空".into(),
                options: vec![],
                wrong_answer: "旧".into(),
            },
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), "a");

        let result = engine.fetch_and_correct().await.unwrap();
        assert_eq!(result.success_count, 1);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let oracle = Arc::new(AttemptOracle::new(&[("a", 10)]));
        let config = CorrectionConfig {
            history_limit: 2,
            ..fast_config()
        };
        let engine = engine(oracle, config);

        engine.correct(vec![fill("a")], 3).await.unwrap();
        let history = engine.history(10);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].round_number, 2);
        assert_eq!(engine.history(1)[0].round_number, 3);

        engine.clear_history();
        assert!(engine.history(10).is_empty());
    }
}
