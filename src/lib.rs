//! # Answer Correction
//!
//! 自动答题与循环纠错：查询答案、填写到页面、按批改结果多轮纠正错题，
//! 并把确认正确的答案上传到云端题库。
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `TaskQueue` - 并发受限的任务队列
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层（Services）
//! - `AnswerResolver` - 题库优先、AI 兜底的答案查询
//! - `UploadDeduplicator` - 上传去重
//! - `LlmService` / `AnswerBankClient` / `PageApplier` / `PageOracle` - 外部协作方实现
//!
//! ### ③ 流程层（Workflow）
//! - `BatchAnswerer` - 首轮作答
//! - `CorrectionEngine` - 多轮纠错
//!
//! ### ④ 编排层（Orchestration）
//! - `App` - 组装并执行完整流程

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{BatchError, ConfigError, CorrectionError, ItemError, QueueError};
pub use infrastructure::{JsExecutor, TaskQueue};
pub use models::{CorrectionResult, Item, ItemKind, ItemStatus, QuestionType, RunResult};
pub use orchestrator::App;
pub use services::{AnswerResolver, UploadDeduplicator};
pub use workflow::{BatchAnswerer, CorrectionEngine};
