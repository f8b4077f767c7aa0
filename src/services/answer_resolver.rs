//! 答案查询 - 业务能力层
//!
//! 两级查询：先查题库，未命中再调用 AI。
//! 两级都失败（或超时）返回 `None`，调用方应跳过该题，而不是当作空答案。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::models::answer::normalize_answer;
use crate::models::{AnswerSource, IdAliasMap, Item, ResolutionResult};
use crate::services::ports::{AiModel, CacheLookup};

/// AI 答案的置信度
pub const AI_CONFIDENCE: f64 = 0.7;

pub struct AnswerResolver {
    cache: Arc<dyn CacheLookup>,
    model: Option<Arc<dyn AiModel>>,
    timeout: Duration,
    ai_enabled: bool,
    aliases: IdAliasMap,
}

impl AnswerResolver {
    pub fn new(cache: Arc<dyn CacheLookup>, model: Option<Arc<dyn AiModel>>, timeout: Duration) -> Self {
        Self {
            cache,
            model,
            timeout,
            ai_enabled: true,
            aliases: IdAliasMap::new(),
        }
    }

    pub fn with_ai_enabled(mut self, enabled: bool) -> Self {
        self.ai_enabled = enabled;
        self
    }

    pub fn with_aliases(mut self, aliases: IdAliasMap) -> Self {
        self.aliases = aliases;
        self
    }

    /// 查询答案
    ///
    /// `excluded` 中的答案已被证明错误：题库命中其中之一时改用 AI，
    /// AI 仍给出其中之一时视为失败。超时与失败同样处理。
    pub async fn resolve(&self, item: &Item, excluded: &[String]) -> Option<ResolutionResult> {
        match timeout(self.timeout, self.resolve_inner(item, excluded)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("[查询] ⚠️ 题目 {} 查询超时 ({}ms)", item.id(), self.timeout.as_millis());
                None
            }
        }
    }

    async fn resolve_inner(&self, item: &Item, excluded: &[String]) -> Option<ResolutionResult> {
        let question_type = item.question_type();
        let is_excluded = |value: &str| {
            let normalized = normalize_answer(value, question_type);
            excluded
                .iter()
                .any(|e| normalize_answer(e, question_type) == normalized)
        };

        // 题库
        let id = self.aliases.canonical(item.id());
        match self.cache.lookup(id, item.content(), question_type).await {
            Ok(Some(hit)) if !hit.value.trim().is_empty() => {
                if is_excluded(&hit.value) {
                    debug!("[查询] 题目 {} 题库答案已被排除: {}", item.id(), hit.value);
                } else {
                    info!("[查询] ✓ 题目 {} 题库命中", item.id());
                    return Some(ResolutionResult {
                        value: hit.value,
                        source: AnswerSource::Cache,
                        confidence: hit.confidence,
                    });
                }
            }
            Ok(_) => debug!("[查询] 题目 {} 题库未命中", item.id()),
            Err(e) => warn!("[查询] 题目 {} 题库查询失败: {}", item.id(), e),
        }

        // AI
        if !self.ai_enabled {
            return None;
        }
        let model = self.model.as_ref()?;
        match model
            .infer(item.content(), question_type, item.options(), excluded)
            .await
        {
            Ok(Some(value)) if !value.trim().is_empty() => {
                if is_excluded(&value) {
                    warn!("[查询] ⚠️ 题目 {} AI 给出了已排除的答案: {}", item.id(), value);
                    return None;
                }
                info!("[查询] ✓ 题目 {} AI 作答", item.id());
                Some(ResolutionResult {
                    value,
                    source: AnswerSource::AiModel,
                    confidence: AI_CONFIDENCE,
                })
            }
            Ok(_) => {
                warn!("[查询] 题目 {} AI 未给出答案", item.id());
                None
            }
            Err(e) => {
                warn!("[查询] 题目 {} AI 调用失败: {}", item.id(), e);
                None
            }
        }
    }
}
