//! 外部协作方接口
//!
//! 流程层只依赖这些 trait，具体实现（浏览器页面、题库接口、LLM）在运行时注入，
//! 测试中用内存实现替换。

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{GradingReport, Item, QuestionType, UploadRecord, WrongItem};

/// 把答案填写到题目上
#[async_trait]
pub trait AnswerApplier: Send + Sync {
    /// 返回 `false` 表示填写未生效
    async fn apply(&self, item: &Item, value: &str) -> Result<bool>;
}

/// 批改接口：报告当前仍然错误的题目
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn fetch_wrong_items(&self) -> Result<Vec<WrongItem>>;

    /// 完整批改结果，含已判对的题目
    ///
    /// 只能报告错题的实现保持默认即可（判对列表为空）。
    async fn fetch_grading(&self) -> Result<GradingReport> {
        let wrong = self.fetch_wrong_items().await?;
        Ok(GradingReport::from_wrong(wrong))
    }
}

/// 题库命中
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub value: String,
    pub confidence: f64,
}

/// 题库查询
#[async_trait]
pub trait CacheLookup: Send + Sync {
    /// 未命中返回 `Ok(None)`
    async fn lookup(
        &self,
        id: &str,
        content: &str,
        question_type: QuestionType,
    ) -> Result<Option<CacheHit>>;
}

/// AI 作答
#[async_trait]
pub trait AiModel: Send + Sync {
    /// `excluded` 为已确认错误的答案，模型应避开
    async fn infer(
        &self,
        content: &str,
        question_type: QuestionType,
        options: &[String],
        excluded: &[String],
    ) -> Result<Option<String>>;
}

/// 上传已确认的答案
#[async_trait]
pub trait UploadSink: Send + Sync {
    async fn upload(&self, record: &UploadRecord) -> Result<bool>;
}
