use thiserror::Error;

use crate::models::CorrectionResult;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 数值必须大于 0
    #[error("配置项 {name} 必须大于 0")]
    MustBePositive { name: &'static str },
    /// 未知的等待策略
    #[error("未知的等待策略: {0} (可选: fixed / poll)")]
    UnknownSettleMode(String),
}

/// 题目数据校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    /// 题目ID为空
    #[error("题目ID不能为空")]
    EmptyId,
    /// 题目内容为空
    #[error("题目 {id} 内容为空")]
    EmptyContent { id: String },
    /// 未知题型
    #[error("题目 {id} 题型未知: {code}")]
    UnknownType { id: String, code: String },
    /// 选择题选项不足
    #[error("题目 {id} 为选择题，但只有 {count} 个选项")]
    TooFewOptions { id: String, count: usize },
    /// 同一个别名指向了多个题目
    #[error("别名 {alias} 同时指向 {first} 和 {second}")]
    ConflictingAlias {
        alias: String,
        first: String,
        second: String,
    },

    /// 一道题只能对应一个页面ID
    #[error("题目 {canonical} 有多个页面ID: {first} / {second}")]
    DuplicatePlatformId {
        canonical: String,
        first: String,
        second: String,
    },
}

/// 任务队列错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// 任务在开始前被清空
    #[error("队列已清空，任务被取消")]
    Cancelled,
    /// 任务执行中 panic
    #[error("任务执行异常终止")]
    Panicked,
}

/// 批量答题错误
#[derive(Debug, Error)]
pub enum BatchError {
    /// 已有一次答题在运行
    #[error("已经在答题中")]
    AlreadyRunning,
}

/// 纠错错误
#[derive(Debug, Error)]
pub enum CorrectionError {
    /// 已有一次纠错在运行
    #[error("正在纠错中")]
    AlreadyRunning,
    /// 批改接口不可用，本次纠错中止
    ///
    /// `partial` 保留中止前已经确认的结果
    #[error("批改接口不可用 (第 {round} 轮): {source}")]
    OracleUnavailable {
        round: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        partial: Box<CorrectionResult>,
    },
}

impl CorrectionError {
    /// 中止前已经累积的部分结果
    pub fn partial(&self) -> Option<&CorrectionResult> {
        match self {
            CorrectionError::OracleUnavailable { partial, .. } => Some(partial),
            CorrectionError::AlreadyRunning => None,
        }
    }
}
