//! 基础设施层
//!
//! 持有稀缺资源（页面、并发名额），只暴露能力，不认识题目流程

pub mod js_executor;
pub mod task_queue;

pub use js_executor::JsExecutor;
pub use task_queue::{QueueStatus, TaskQueue};
