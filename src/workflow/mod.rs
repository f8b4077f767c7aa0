//! 流程层（Workflow）
//!
//! - `BatchAnswerer` - 一组题目的首轮作答（查询 → 填写）
//! - `CorrectionEngine` - 错题的多轮纠错（查询 → 填写 → 等待 → 批改 → 拆分）
//! - `RunControl` - 协作式暂停/停止

pub mod batch_answerer;
pub mod correction_engine;
pub mod run_control;

pub use batch_answerer::{BatchAnswerer, BatchOptions};
pub use correction_engine::{CorrectionConfig, CorrectionEngine, SettleStrategy};
pub use run_control::{Interruption, RunControl};
