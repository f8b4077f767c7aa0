//! 业务能力层（Services）
//!
//! 描述"我能做什么"，每个服务只处理单道题目或单条记录，不关心轮次和流程。

pub mod answer_bank;
pub mod answer_resolver;
pub mod llm_service;
pub mod page_applier;
pub mod page_oracle;
pub mod ports;
pub mod upload_dedup;

pub use answer_bank::AnswerBankClient;
pub use answer_resolver::AnswerResolver;
pub use llm_service::LlmService;
pub use page_applier::PageApplier;
pub use page_oracle::PageOracle;
pub use ports::{AiModel, AnswerApplier, CacheHit, CacheLookup, UploadSink, VerificationOracle};
pub use upload_dedup::{UploadConfig, UploadDeduplicator, UploadReport};
