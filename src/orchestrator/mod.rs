//! 编排层（Orchestration Layer）
//!
//! 本层是整个系统的"指挥中心"，负责资源和流程调度。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (加载题目、组装能力)
//!     ↓
//! workflow (BatchAnswerer / CorrectionEngine)
//!     ↓
//! services (能力层：题库 / LLM / 页面填写 / 批改 / 上传去重)
//!     ↓
//! infrastructure (基础设施：JsExecutor / TaskQueue)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层持有 Browser
//! 2. **向下依赖**：编排层 → workflow → services → infrastructure
//! 3. **无业务逻辑**：只做调度和统计

pub mod app;

pub use app::App;
