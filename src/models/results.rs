//! 运行结果
//!
//! 答题和纠错的结构化汇总，供展示层使用

use serde::Serialize;

use crate::models::item::{GradedItem, Item, ItemStatus, WrongItem};

/// 答案来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnswerSource {
    /// 云端题库命中
    Cache,
    /// AI 生成
    AiModel,
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerSource::Cache => write!(f, "题库"),
            AnswerSource::AiModel => write!(f, "AI"),
        }
    }
}

/// 单次查询结果（不持久化）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionResult {
    pub value: String,
    pub source: AnswerSource,
    pub confidence: f64,
}

/// 答题进度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Progress {
    /// 已处理数量
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// 成功率（百分比）
    pub fn success_rate(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.succeeded as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

/// 单题处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    Failed,
    Skipped,
}

/// 单题答题记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<AnswerSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ItemOutcome {
    pub fn success(id: &str, resolution: &ResolutionResult, warning: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            status: OutcomeStatus::Success,
            answer: Some(resolution.value.clone()),
            source: Some(resolution.source),
            reason: None,
            warning,
        }
    }

    pub fn failed(id: &str, answer: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: OutcomeStatus::Failed,
            answer,
            source: None,
            reason: Some(reason.into()),
            warning: None,
        }
    }

    pub fn skipped(id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            status: OutcomeStatus::Skipped,
            answer: None,
            source: None,
            reason: Some(reason.into()),
            warning: None,
        }
    }
}

/// 一次批量答题的结果
#[derive(Debug, Clone)]
pub struct RunResult {
    pub progress: Progress,
    pub outcomes: Vec<ItemOutcome>,
    /// 处理后的题目（含最新状态）
    pub items: Vec<Item>,
    /// 是否因暂停/停止提前结束
    pub interrupted: bool,
}

/// 一轮纠错的诊断记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorrectionRound {
    pub round_number: usize,
    pub attempted_count: usize,
    pub resolved_count: usize,
    pub still_wrong_ids: Vec<String>,
}

/// 单题纠错结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemCorrection {
    pub id: String,
    pub success: bool,
    /// 成功时为确认正确的轮次，失败时为总轮数
    pub round: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    pub attempted_answers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 一次纠错的结果
#[derive(Debug, Clone, Default)]
pub struct CorrectionResult {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub rounds_used: usize,
    pub per_item_results: Vec<ItemCorrection>,
    pub rounds: Vec<CorrectionRound>,
    /// 纠错结束时的题目（含尝试记录和最终状态）
    pub items: Vec<Item>,
    /// 纠错开始前的批改统计（由 `fetch_and_correct` 填写）
    pub grading: Option<GradingSummary>,
}

impl CorrectionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 按 ID 查找题目的最终状态
    pub fn status_of(&self, id: &str) -> Option<ItemStatus> {
        self.items.iter().find(|i| i.id() == id).map(|i| i.status())
    }

    /// 按 ID 查找单题结果
    pub fn result_of(&self, id: &str) -> Option<&ItemCorrection> {
        self.per_item_results.iter().find(|r| r.id == id)
    }
}

/// 一次批改的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GradingSummary {
    pub correct: usize,
    pub wrong: usize,
}

impl GradingSummary {
    pub fn total(&self) -> usize {
        self.correct + self.wrong
    }

    /// 正确率（百分比）
    pub fn accuracy(&self) -> u32 {
        if self.total() == 0 {
            0
        } else {
            ((self.correct as f64 / self.total() as f64) * 100.0).round() as u32
        }
    }
}

/// 一次批改的完整结果
#[derive(Debug, Clone, Default)]
pub struct GradingReport {
    pub wrong: Vec<WrongItem>,
    pub correct: Vec<GradedItem>,
    pub summary: GradingSummary,
}

impl GradingReport {
    /// 只知道错题时的批改结果
    pub fn from_wrong(wrong: Vec<WrongItem>) -> Self {
        Self {
            summary: GradingSummary {
                correct: 0,
                wrong: wrong.len(),
            },
            wrong,
            correct: Vec::new(),
        }
    }
}
