//! 纠错流程场景测试
//!
//! 用内存中的"答题卡"同时充当填写端和批改端：填写即保存，批改时对比标准答案。
//! 答题卡按页面ID 记录，和真实平台一样。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use answer_correction::error::CorrectionError;
use answer_correction::models::{
    GradedItem, GradingReport, GradingSummary, IdAliasMap, Item, ItemKind, ItemStatus, QuestionType, UploadRecord,
    WrongItem,
};
use answer_correction::services::{
    AiModel, AnswerApplier, CacheHit, CacheLookup, UploadConfig, UploadSink, VerificationOracle,
};
use answer_correction::workflow::{CorrectionConfig, SettleStrategy};
use answer_correction::{AnswerResolver, CorrectionEngine, TaskQueue, UploadDeduplicator};

struct EmptyCache;

#[async_trait]
impl CacheLookup for EmptyCache {
    async fn lookup(&self, _: &str, _: &str, _: QuestionType) -> Result<Option<CacheHit>> {
        Ok(None)
    }
}

/// 题库接口不可用
struct BrokenCache;

#[async_trait]
impl CacheLookup for BrokenCache {
    async fn lookup(&self, _: &str, _: &str, _: QuestionType) -> Result<Option<CacheHit>> {
        Err(anyhow!("题库接口超时"))
    }
}

/// 按题目内容给出预设的答案序列（逗号分隔），第 n 次尝试给出第 n 个
struct ScriptedModel {
    scripts: HashMap<String, Vec<String>>,
}

impl ScriptedModel {
    fn new(scripts: &[(&str, &str)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(id, answers)| (id.to_string(), answers.split(',').map(str::to_string).collect()))
                .collect(),
        }
    }
}

#[async_trait]
impl AiModel for ScriptedModel {
    async fn infer(&self, content: &str, _: QuestionType, _: &[String], excluded: &[String]) -> Result<Option<String>> {
        Ok(self
            .scripts
            .get(content)
            .and_then(|answers| answers.get(excluded.len()))
            .cloned())
    }
}

/// 指定题目调用失败，其余按预设作答
struct FlakyModel {
    inner: ScriptedModel,
    failing: HashSet<String>,
}

#[async_trait]
impl AiModel for FlakyModel {
    async fn infer(&self, content: &str, kind: QuestionType, options: &[String], excluded: &[String]) -> Result<Option<String>> {
        if self.failing.contains(content) {
            return Err(anyhow!("模型返回 500"));
        }
        self.inner.infer(content, kind, options, excluded).await
    }
}

/// 永远给出一个新的错误答案
struct NeverRightModel;

#[async_trait]
impl AiModel for NeverRightModel {
    async fn infer(&self, _: &str, _: QuestionType, _: &[String], excluded: &[String]) -> Result<Option<String>> {
        Ok(Some(format!("错{}", excluded.len())))
    }
}

/// 内存答题卡
#[derive(Default)]
struct AnswerSheet {
    expected: HashMap<String, String>,
    saved: Mutex<HashMap<String, String>>,
    /// 第几次批改时报错（从 1 开始）
    fail_on_call: Option<usize>,
    oracle_calls: AtomicUsize,
    apply_delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    /// 每次填写时题目已有的尝试次数
    attempt_log: Mutex<Vec<(String, usize)>>,
    /// 填写时报错的题目
    apply_errors: HashSet<String>,
    /// 填写不生效的题目
    apply_refused: HashSet<String>,
    aliases: IdAliasMap,
}

impl AnswerSheet {
    fn new(expected: &[(&str, &str)]) -> Self {
        Self {
            expected: expected.iter().map(|(id, v)| (id.to_string(), v.to_string())).collect(),
            ..Default::default()
        }
    }

    fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    fn with_saved(self, saved: &[(&str, &str)]) -> Self {
        self.saved
            .lock()
            .unwrap()
            .extend(saved.iter().map(|(id, v)| (id.to_string(), v.to_string())));
        self
    }

    fn with_apply_errors(mut self, ids: &[&str]) -> Self {
        self.apply_errors = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    fn with_apply_refused(mut self, ids: &[&str]) -> Self {
        self.apply_refused = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    fn with_aliases(mut self, aliases: IdAliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    fn saved(&self, page_id: &str) -> Option<String> {
        self.saved.lock().unwrap().get(page_id).cloned()
    }
}

#[async_trait]
impl AnswerApplier for AnswerSheet {
    async fn apply(&self, item: &Item, value: &str) -> Result<bool> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.attempt_log
            .lock()
            .unwrap()
            .push((item.id().to_string(), item.attempted_answers().len()));

        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let page_id = self.aliases.platform_id(item.id()).to_string();
        if self.apply_errors.contains(&page_id) {
            return Err(anyhow!("页面元素不存在"));
        }
        if self.apply_refused.contains(&page_id) {
            return Ok(false);
        }
        self.saved.lock().unwrap().insert(page_id, value.to_string());
        Ok(true)
    }
}

#[async_trait]
impl VerificationOracle for AnswerSheet {
    async fn fetch_wrong_items(&self) -> Result<Vec<WrongItem>> {
        Ok(self.fetch_grading().await?.wrong)
    }

    async fn fetch_grading(&self) -> Result<GradingReport> {
        let call = self.oracle_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(anyhow!("批改接口返回 502"));
        }

        let saved = self.saved.lock().unwrap();
        let mut ids: Vec<&String> = self.expected.keys().collect();
        ids.sort();

        let mut report = GradingReport::default();
        for id in ids {
            match saved.get(id) {
                Some(answer) if Some(answer) == self.expected.get(id) => {
                    report.summary.correct += 1;
                    report.correct.push(GradedItem {
                        id: id.clone(),
                        question_type: "3".into(),
                        content: id.clone(),
                        options: vec![],
                        answer: answer.clone(),
                    });
                }
                answer => {
                    report.summary.wrong += 1;
                    report.wrong.push(WrongItem {
                        id: id.clone(),
                        question_type: "3".into(),
                        content: id.clone(),
                        options: vec![],
                        wrong_answer: answer.cloned().unwrap_or_default(),
                    });
                }
            }
        }
        Ok(report)
    }
}

/// 记录每道题的上传次数
#[derive(Default)]
struct CountingSink {
    uploads: Mutex<HashMap<String, usize>>,
}

impl CountingSink {
    fn count(&self, id: &str) -> usize {
        self.uploads.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl UploadSink for CountingSink {
    async fn upload(&self, record: &UploadRecord) -> Result<bool> {
        *self
            .uploads
            .lock()
            .unwrap()
            .entry(record.question_id.clone())
            .or_insert(0) += 1;
        Ok(true)
    }
}

struct Harness {
    engine: CorrectionEngine,
    sheet: Arc<AnswerSheet>,
    sink: Arc<CountingSink>,
    queue: TaskQueue,
}

fn harness(sheet: AnswerSheet, model: impl AiModel + 'static, concurrency: usize) -> Harness {
    build_harness(sheet, Arc::new(EmptyCache), model, concurrency, IdAliasMap::new())
}

fn build_harness(
    sheet: AnswerSheet,
    cache: Arc<dyn CacheLookup>,
    model: impl AiModel + 'static,
    concurrency: usize,
    aliases: IdAliasMap,
) -> Harness {
    let sheet = Arc::new(sheet);
    let sink = Arc::new(CountingSink::default());
    let queue = TaskQueue::new(concurrency);

    let resolver = AnswerResolver::new(cache, Some(Arc::new(model)), Duration::from_secs(1))
        .with_aliases(aliases.clone());
    let uploads = UploadDeduplicator::new(
        sink.clone(),
        UploadConfig {
            batch_size: 5,
            batch_delay: Duration::ZERO,
        },
    );
    let config = CorrectionConfig {
        settle: SettleStrategy::Fixed(Duration::ZERO),
        inter_round_delay: Duration::ZERO,
        ..CorrectionConfig::default()
    };

    let engine = CorrectionEngine::new(
        Arc::new(resolver),
        sheet.clone(),
        sheet.clone(),
        Arc::new(uploads),
        queue.clone(),
        config,
    )
    .with_aliases(aliases);

    Harness {
        engine,
        sheet,
        sink,
        queue,
    }
}

fn fill(id: &str) -> Item {
    Item::new(id, id, ItemKind::FillBlank).unwrap()
}

#[tokio::test]
async fn test_two_rounds_fix_everything() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙"), ("C", "丙")]);
    let model = ScriptedModel::new(&[("A", "甲"), ("B", "错,乙"), ("C", "丙")]);
    let h = harness(sheet, model, 3);

    let result = assert_ok!(h.engine.correct(vec![fill("A"), fill("B"), fill("C")], 3).await);

    assert_eq!(result.total, 3);
    assert_eq!(result.success_count, 3);
    assert_eq!(result.failed_count, 0);
    assert_eq!(result.rounds_used, 2);
    assert_eq!(result.rounds[0].still_wrong_ids, vec!["B".to_string()]);
    assert_eq!(result.rounds[1].attempted_count, 1);
    assert_eq!(result.result_of("A").unwrap().round, 1);
    assert_eq!(result.result_of("B").unwrap().round, 2);
    assert_eq!(result.result_of("B").unwrap().final_answer.as_deref(), Some("乙"));

    let report = h.engine.wait_uploads().await;
    assert_eq!(report.succeeded, 3);
    assert_eq!(h.sink.count("B"), 1);
}

#[tokio::test]
async fn test_every_item_ends_final() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙"), ("C", "丙"), ("D", "丁")]);
    // C 查不到答案，D 永远答错
    let model = ScriptedModel::new(&[("A", "甲"), ("B", "错,乙"), ("D", "错1,错2,错3")]);
    let h = harness(sheet, model, 2);

    let items = vec![fill("A"), fill("B"), fill("C"), fill("D")];
    let result = assert_ok!(h.engine.correct(items, 3).await);

    assert_eq!(result.items.len(), 4);
    assert!(result.items.iter().all(|item| item.status().is_final()));
    assert_eq!(result.status_of("C"), Some(ItemStatus::Failed));
    assert!(result.result_of("C").unwrap().attempted_answers.is_empty());
    assert_eq!(result.status_of("D"), Some(ItemStatus::Failed));
    assert_eq!(result.result_of("D").unwrap().attempted_answers, vec!["错1", "错2", "错3"]);
}

#[tokio::test]
async fn test_attempts_never_regress() {
    let sheet = AnswerSheet::new(&[("A", "正确"), ("B", "正确")]);
    let h = harness(sheet, NeverRightModel, 2);

    assert_ok!(h.engine.correct(vec![fill("A"), fill("B")], 4).await);

    let log = h.sheet.attempt_log.lock().unwrap().clone();
    for id in ["A", "B"] {
        let counts: Vec<usize> = log.iter().filter(|(i, _)| i == id).map(|(_, n)| *n).collect();
        assert_eq!(counts, vec![1, 2, 3, 4], "题目 {} 的尝试记录出现回退", id);
    }
}

#[tokio::test]
async fn test_terminates_when_answers_stay_wrong() {
    let sheet = AnswerSheet::new(&[("A", "正确")]);
    let h = harness(sheet, NeverRightModel, 3);

    let result = assert_ok!(h.engine.correct(vec![fill("A")], 5).await);

    assert_eq!(result.rounds_used, 5);
    assert_eq!(result.failed_count, 1);
    assert_eq!(h.sheet.oracle_calls.load(Ordering::SeqCst), 5);
    assert_eq!(
        result.result_of("A").unwrap().message.as_deref(),
        Some("5 轮后仍未纠正")
    );
}

#[tokio::test]
async fn test_single_round_failure_keeps_attempt() {
    let sheet = AnswerSheet::new(&[("A", "正确")]);
    let h = harness(sheet, NeverRightModel, 3);

    let result = assert_ok!(h.engine.correct(vec![fill("A")], 1).await);

    assert_eq!(result.status_of("A"), Some(ItemStatus::Failed));
    assert_eq!(result.result_of("A").unwrap().attempted_answers.len(), 1);
    assert_eq!(h.engine.wait_uploads().await.requested, 0);
}

#[tokio::test]
async fn test_oracle_failure_keeps_partial_result() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙"), ("C", "丙")]).failing_on(2);
    let model = ScriptedModel::new(&[("A", "甲"), ("B", "错,乙"), ("C", "丙")]);
    let h = harness(sheet, model, 3);

    let err = assert_err!(h.engine.correct(vec![fill("A"), fill("B"), fill("C")], 3).await);

    match &err {
        CorrectionError::OracleUnavailable { round, .. } => assert_eq!(*round, 2),
        other => panic!("意外的错误: {}", other),
    }
    let partial = err.partial().unwrap();
    assert_eq!(partial.success_count, 2);
    assert_eq!(partial.status_of("A"), Some(ItemStatus::VerifiedCorrect));
    assert_eq!(partial.status_of("C"), Some(ItemStatus::VerifiedCorrect));
    assert!(partial.result_of("B").is_none());
    assert_eq!(partial.rounds.len(), 1);

    // 第一轮的上传已经发出，且每道题只上传一次
    let report = h.engine.wait_uploads().await;
    assert_eq!(report.succeeded, 2);
    assert_eq!(h.sink.count("A"), 1);
    assert_eq!(h.sink.count("C"), 1);
    assert_eq!(h.sink.count("B"), 0);
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let ids: Vec<String> = (1..=8).map(|i| format!("Q{}", i)).collect();
    let expected: Vec<(&str, &str)> = ids.iter().map(|id| (id.as_str(), "对")).collect();
    let sheet = AnswerSheet::new(&expected).with_apply_delay(Duration::from_millis(20));
    let h = harness(sheet, ScriptedModel::new(&expected), 2);

    let items = ids.iter().map(|id| fill(id)).collect();
    let result = assert_ok!(h.engine.correct(items, 3).await);

    assert_eq!(result.success_count, 8);
    assert!(h.sheet.peak_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(h.queue.status().peak <= 2);
}

#[tokio::test]
async fn test_repeated_runs_upload_once() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙")]);
    let model = ScriptedModel::new(&[("A", "甲"), ("B", "乙")]);
    let h = harness(sheet, model, 3);

    assert_ok!(h.engine.correct(vec![fill("A"), fill("B")], 3).await);
    assert_ok!(h.engine.correct(vec![fill("A"), fill("B")], 3).await);

    let report = h.engine.wait_uploads().await;
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(h.sink.count("A"), 1);
    assert_eq!(h.sink.count("B"), 1);
}

#[tokio::test]
async fn test_overlapping_run_rejected() {
    let sheet = AnswerSheet::new(&[("A", "甲")]).with_apply_delay(Duration::from_millis(50));
    let model = ScriptedModel::new(&[("A", "甲")]);
    let h = harness(sheet, model, 3);

    let (first, second) = tokio::join!(
        h.engine.correct(vec![fill("A")], 3),
        h.engine.correct(vec![fill("A")], 3),
    );

    let result = assert_ok!(first);
    assert_eq!(result.success_count, 1);
    assert!(matches!(assert_err!(second), CorrectionError::AlreadyRunning));
    assert!(!h.engine.is_running());
}

#[tokio::test]
async fn test_fetch_and_correct_without_wrong_items() {
    let sheet = AnswerSheet::new(&[]);
    let h = harness(sheet, NeverRightModel, 3);

    let result = assert_ok!(h.engine.fetch_and_correct().await);

    assert_eq!(result.total, 0);
    assert_eq!(result.rounds_used, 0);
    assert_eq!(h.sheet.oracle_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_page_ids_are_canonicalized_before_matching() {
    let aliases = IdAliasMap::from_pairs([("q1", "page-1")]).unwrap();
    let sheet = AnswerSheet::new(&[("page-1", "对")]).with_aliases(aliases.clone());
    let h = build_harness(sheet, Arc::new(EmptyCache), NeverRightModel, 2, aliases);

    // 按页面ID 传入，批改接口同样报告页面ID
    let result = assert_ok!(h.engine.correct(vec![fill("page-1")], 2).await);

    assert_eq!(result.success_count, 0);
    assert_eq!(result.status_of("q1"), Some(ItemStatus::Failed));
    assert_eq!(result.result_of("q1").unwrap().attempted_answers, vec!["错0", "错1"]);
    assert_eq!(h.sheet.saved("page-1").as_deref(), Some("错1"));

    let report = h.engine.wait_uploads().await;
    assert_eq!(report.requested, 0);
    assert_eq!(h.sink.count("q1") + h.sink.count("page-1"), 0);
}

#[tokio::test]
async fn test_aliased_item_corrected_and_uploaded_under_canonical_id() {
    let aliases = IdAliasMap::from_pairs([("q1", "page-1")]).unwrap();
    let sheet = AnswerSheet::new(&[("page-1", "对")]).with_aliases(aliases.clone());
    let model = ScriptedModel::new(&[("page-1", "错,对")]);
    let h = build_harness(sheet, Arc::new(EmptyCache), model, 2, aliases);

    let result = assert_ok!(h.engine.correct(vec![fill("page-1")], 3).await);

    assert_eq!(result.status_of("q1"), Some(ItemStatus::VerifiedCorrect));
    assert_eq!(result.result_of("q1").unwrap().round, 2);
    assert_eq!(h.sheet.saved("page-1").as_deref(), Some("对"));

    h.engine.wait_uploads().await;
    assert_eq!(h.sink.count("q1"), 1);
    assert_eq!(h.sink.count("page-1"), 0);
}

#[tokio::test]
async fn test_graded_correct_items_uploaded_once() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙"), ("C", "丙")]).with_saved(&[("A", "甲"), ("C", "丙")]);
    let model = ScriptedModel::new(&[("B", "乙")]);
    let h = harness(sheet, model, 3);

    let first = assert_ok!(h.engine.fetch_and_correct().await);
    assert_eq!(first.grading, Some(GradingSummary { correct: 2, wrong: 1 }));
    assert_eq!(first.total, 1);
    assert_eq!(first.success_count, 1);

    // 全部正确后再次获取：没有错题，判对的题目不会重复上传
    let second = assert_ok!(h.engine.fetch_and_correct().await);
    assert_eq!(second.grading, Some(GradingSummary { correct: 3, wrong: 0 }));
    assert_eq!(second.total, 0);

    let summary = assert_ok!(h.engine.grading_summary().await);
    assert_eq!(summary.accuracy(), 100);

    let report = h.engine.wait_uploads().await;
    assert_eq!(report.succeeded, 3);
    for id in ["A", "B", "C"] {
        assert_eq!(h.sink.count(id), 1, "题目 {} 上传次数不对", id);
    }
}

#[tokio::test]
async fn test_resolver_failures_do_not_abort_round() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("X", "叉")]);
    let model = FlakyModel {
        inner: ScriptedModel::new(&[("A", "甲"), ("X", "叉")]),
        failing: HashSet::from(["X".to_string()]),
    };
    let h = build_harness(sheet, Arc::new(BrokenCache), model, 2, IdAliasMap::new());

    let result = assert_ok!(h.engine.correct(vec![fill("A"), fill("X")], 2).await);

    assert_eq!(result.status_of("A"), Some(ItemStatus::VerifiedCorrect));
    assert_eq!(result.status_of("X"), Some(ItemStatus::Failed));
    assert!(result.result_of("X").unwrap().attempted_answers.is_empty());
    assert_eq!(result.rounds[0].resolved_count, 1);
    assert_eq!(result.rounds[1].still_wrong_ids, vec!["X".to_string()]);
}

#[tokio::test]
async fn test_apply_failures_keep_item_in_working_set() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("E", "诶"), ("R", "啊")])
        .with_apply_errors(&["E"])
        .with_apply_refused(&["R"]);
    let model = ScriptedModel::new(&[("A", "甲"), ("E", "诶,诶2"), ("R", "啊,啊2")]);
    let h = harness(sheet, model, 3);

    let result = assert_ok!(h.engine.correct(vec![fill("A"), fill("E"), fill("R")], 2).await);

    assert_eq!(result.success_count, 1);
    assert_eq!(result.result_of("A").unwrap().round, 1);
    // 填写失败的答案仍计入尝试记录，下一轮换新答案
    for id in ["E", "R"] {
        let outcome = result.result_of(id).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.attempted_answers.len(), 2);
        assert_eq!(h.sheet.saved(id), None);
    }
    assert_eq!(result.rounds[0].still_wrong_ids, vec!["E".to_string(), "R".to_string()]);
}

#[tokio::test]
async fn test_cancelled_tasks_retry_next_round() {
    let sheet = AnswerSheet::new(&[("A", "甲"), ("B", "乙"), ("C", "丙")]).with_apply_delay(Duration::from_millis(50));
    let model = ScriptedModel::new(&[("A", "甲"), ("B", "乙"), ("C", "丙")]);
    let h = harness(sheet, model, 1);

    let (result, cancelled) = tokio::join!(h.engine.correct(vec![fill("A"), fill("B"), fill("C")], 3), async {
        // A 正在填写，B 和 C 还在排队
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.queue.clear()
    });

    assert_eq!(cancelled, 2);
    let result = assert_ok!(result);
    assert_eq!(result.success_count, 3);
    assert_eq!(result.rounds[0].resolved_count, 1);
    assert_eq!(result.result_of("A").unwrap().round, 1);
    for id in ["B", "C"] {
        let outcome = result.result_of(id).unwrap();
        assert_eq!(outcome.round, 2);
        assert_eq!(outcome.attempted_answers.len(), 1);
    }
}

#[tokio::test]
async fn test_stop_while_idle_skips_next_run_only() {
    let sheet = AnswerSheet::new(&[("A", "甲")]);
    let model = ScriptedModel::new(&[("A", "甲")]);
    let h = harness(sheet, model, 2);

    h.engine.stop();
    let stopped = assert_ok!(h.engine.correct(vec![fill("A")], 3).await);
    assert_eq!(stopped.rounds_used, 0);
    assert_eq!(stopped.result_of("A").unwrap().message.as_deref(), Some("纠错已停止"));
    assert_eq!(h.sheet.oracle_calls.load(Ordering::SeqCst), 0);

    let result = assert_ok!(h.engine.correct(vec![fill("A")], 3).await);
    assert_eq!(result.success_count, 1);
}
