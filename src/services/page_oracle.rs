//! 批改接口 - 业务能力层
//!
//! 以页面登录态调用平台的批改接口，解析出当前仍然错误的题目。
//! 作业 ID 取自页面地址：`/writePaper/busywork/<id>`（作答中）或
//! `/lookPaper/busywork/<id>`（已提交）。

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::infrastructure::JsExecutor;
use crate::models::{GradedItem, GradingReport, WrongItem};
use crate::services::ports::VerificationOracle;

/// 批改响应中各题型所在的字段及题型代码
const SECTIONS: [(&str, &str); 5] = [
    ("danxuan", "0"),
    ("duoxuan", "1"),
    ("panduan", "2"),
    ("tiankong", "3"),
    ("jianda", "4"),
];

/// 页面位置
#[derive(Debug, Deserialize)]
struct PageLocation {
    pathname: String,
}

pub struct PageOracle {
    executor: JsExecutor,
    grading_url: String,
}

impl PageOracle {
    /// `grading_url` 为批改接口的公共前缀
    pub fn new(executor: JsExecutor, grading_url: impl Into<String>) -> Self {
        Self {
            executor,
            grading_url: grading_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// 从页面路径提取 (作业ID, 是否已提交)
    fn parse_work_id(pathname: &str) -> Result<(String, bool)> {
        let re = Regex::new(r"/(writePaper|lookPaper)/busywork/(\w+)")?;
        let caps = re
            .captures(pathname)
            .ok_or_else(|| anyhow::anyhow!("无法从页面地址获取作业ID: {}", pathname))?;
        Ok((caps[2].to_string(), &caps[1] == "lookPaper"))
    }

    /// 去掉 HTML 标签
    fn strip_html(text: &str) -> String {
        match Regex::new(r"<[^>]+>") {
            Ok(re) => re.replace_all(text, "").trim().to_string(),
            Err(_) => text.trim().to_string(),
        }
    }

    /// 解析题目选项：JSON 字符串或 `questionOptionList`
    fn parse_options(question: &Value) -> Vec<String> {
        if let Some(raw) = question["options"].as_str() {
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(options) => return options.iter().map(|o| Self::strip_html(o)).collect(),
                Err(_) => warn!("[批改] 解析选项失败: {}", question["id"]),
            }
        }
        question["questionOptionList"]
            .as_array()
            .map(|list| {
                list.iter()
                    .filter_map(|opt| opt["text"].as_str())
                    .map(Self::strip_html)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 取字符串或数字字段
    fn id_like(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// 已判对题目的答案：`answer`，其次 `rightAnswer`，最后学生答案
    fn accepted_answer(question: &Value) -> String {
        ["answer", "rightAnswer", "stuAnswer"]
            .iter()
            .filter_map(|key| question[*key].as_str())
            .map(str::trim)
            .find(|a| !a.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// 解析批改响应
    pub fn parse_grading_response(body: &Value) -> Result<GradingReport> {
        let data = body.get("resultObject").filter(|v| !v.is_null()).ok_or_else(|| {
            anyhow::anyhow!(
                "批改接口返回错误: {}",
                body["errorMessage"].as_str().unwrap_or("未找到resultObject")
            )
        })?;

        let mut report = GradingReport::default();

        for (section, type_code) in SECTIONS {
            let Some(questions) = data[section]["lists"].as_array() else {
                debug!("[批改] {} 题型不存在或没有lists", section);
                continue;
            };

            for q in questions {
                let Some(correct) = q["correct"].as_bool() else {
                    continue;
                };
                let Some(id) = Self::id_like(&q["id"]) else {
                    warn!("[批改] 题目缺少 id，已忽略");
                    continue;
                };
                let content = q["questionContentText"]
                    .as_str()
                    .or_else(|| q["questionContent"].as_str())
                    .unwrap_or_default();
                let question_type =
                    Self::id_like(&q["questionType"]).unwrap_or_else(|| type_code.to_string());

                if correct {
                    report.summary.correct += 1;
                    report.correct.push(GradedItem {
                        id,
                        question_type,
                        content: Self::strip_html(content),
                        options: Self::parse_options(q),
                        answer: Self::accepted_answer(q),
                    });
                } else {
                    report.summary.wrong += 1;
                    report.wrong.push(WrongItem {
                        id,
                        question_type,
                        content: Self::strip_html(content),
                        options: Self::parse_options(q),
                        wrong_answer: q["stuAnswer"].as_str().unwrap_or_default().to_string(),
                    });
                }
            }
        }

        Ok(report)
    }
}

#[async_trait]
impl VerificationOracle for PageOracle {
    async fn fetch_wrong_items(&self) -> Result<Vec<WrongItem>> {
        Ok(self.fetch_grading().await?.wrong)
    }

    async fn fetch_grading(&self) -> Result<GradingReport> {
        let location: PageLocation = self
            .executor
            .eval_as("({ pathname: window.location.pathname })")
            .await
            .context("无法读取页面地址")?;
        let (work_id, submitted) = Self::parse_work_id(&location.pathname)?;

        let body = if submitted {
            let url = format!(
                "{}/findStudentBusywork?busyworkId={}&t={}",
                self.grading_url,
                work_id,
                chrono::Utc::now().timestamp_millis()
            );
            self.executor.fetch_json(&url, None).await?
        } else {
            let url = format!("{}/startBusywork", self.grading_url);
            let form = format!("busyworkId={}", work_id);
            self.executor.fetch_json(&url, Some(&form)).await?
        };

        let report = Self::parse_grading_response(&body)?;
        info!(
            "[批改] 🔍 正确 {} 道, 错误 {} 道 (正确率 {}%)",
            report.summary.correct,
            report.summary.wrong,
            report.summary.accuracy()
        );
        Ok(report)
    }
}
