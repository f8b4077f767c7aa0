//! 云端题库客户端 - 业务能力层
//!
//! 通过 HTTP 查询题库答案、上传已确认的答案。
//! 请求头携带 `X-API-Key`，查询和上传共用同一个 reqwest 客户端。

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::models::{QuestionType, UploadRecord};
use crate::services::ports::{CacheHit, CacheLookup, UploadSink};

const SEARCH_PATH: &str = "/api/search";
const UPLOAD_PATH: &str = "/api/upload";

/// 题库未给出置信度时使用的默认值
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// 查询响应（字段可能直接在顶层，也可能包在 `data` 中）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPayload {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
}

pub struct AnswerBankClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    platform: String,
}

impl AnswerBankClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.resolver_timeout_ms))
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(Self {
            http,
            base_url: config.answer_bank_base_url.trim_end_matches('/').to_string(),
            api_key: config.answer_bank_api_key.clone(),
            platform: config.platform.clone(),
        })
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.post(format!("{}{}", self.base_url, path));
        if self.api_key.is_empty() {
            request
        } else {
            request.header("X-API-Key", &self.api_key)
        }
    }

    /// 从查询响应中提取答案
    fn parse_search_response(body: Value) -> Result<Option<CacheHit>> {
        let payload = match body.get("data") {
            Some(data) if data.is_object() => data.clone(),
            Some(Value::Null) => return Ok(None),
            _ => body,
        };
        let payload: SearchPayload = serde_json::from_value(payload).context("题库响应格式异常")?;

        Ok(payload
            .answer
            .filter(|a| !a.trim().is_empty())
            .map(|value| CacheHit {
                value,
                confidence: payload.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            }))
    }
}

#[async_trait]
impl CacheLookup for AnswerBankClient {
    async fn lookup(&self, id: &str, content: &str, question_type: QuestionType) -> Result<Option<CacheHit>> {
        let body = json!({
            "questionId": id,
            "questionContent": content,
            "type": question_type.code(),
            "platform": self.platform,
        });

        let response = self.post(SEARCH_PATH).json(&body).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let value: Value = response.json().await.context("题库响应不是 JSON")?;

        debug!("[题库] 查询 {} 完成", id);
        Self::parse_search_response(value)
    }
}

#[async_trait]
impl UploadSink for AnswerBankClient {
    async fn upload(&self, record: &UploadRecord) -> Result<bool> {
        debug!(
            "[题库] 上传数据: {} type={} answer={}",
            record.question_id, record.question_type, record.answer
        );

        let response = self.post(UPLOAD_PATH).json(record).send().await?;
        Ok(response.status().is_success())
    }
}
