//! 页面脚本执行 - 基础设施层
//!
//! 答题页是唯一的浏览器资源。填写答案、读取批改结果都要在页面上下文里执行脚本，
//! 这样请求才会带上登录态。

use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// 答题页上的脚本执行器
///
/// 克隆后共享同一个页面，不认识题目，也不处理答题流程。
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 执行脚本，脚本返回值按 JSON 取回
    pub async fn eval(&self, script: impl Into<String>) -> Result<JsonValue> {
        let evaluation = self.page.evaluate(script.into()).await?;
        Ok(evaluation.into_value()?)
    }

    /// 执行脚本并把返回值反序列化为 `T`
    pub async fn eval_as<T: DeserializeOwned>(&self, script: impl Into<String>) -> Result<T> {
        let value = self.eval(script).await?;
        serde_json::from_value(value).context("页面脚本返回值格式不符")
    }

    /// 在页面内发起 fetch 并返回 JSON 响应
    ///
    /// 请求携带页面 cookie。`form_body` 不为空时以表单 POST 提交，否则 GET。
    /// HTTP 非 2xx 视为错误。
    pub async fn fetch_json(&self, url: &str, form_body: Option<&str>) -> Result<JsonValue> {
        let url_literal = serde_json::to_string(url)?;
        let init = match form_body {
            Some(body) => format!(
                r#"{{
                    method: 'POST',
                    credentials: 'include',
                    headers: {{
                        'Accept': 'application/json, text/plain, */*',
                        'Content-Type': 'application/x-www-form-urlencoded'
                    }},
                    body: {}
                }}"#,
                serde_json::to_string(body)?
            ),
            None => r#"{
                    method: 'GET',
                    credentials: 'include',
                    headers: { 'Accept': 'application/json, text/plain, */*' }
                }"#
            .to_string(),
        };

        let js_code = format!(
            r#"(async () => {{
                try {{
                    const response = await fetch({url}, {init});
                    if (!response.ok) {{
                        return {{ ok: false, error: 'HTTP ' + response.status }};
                    }}
                    return {{ ok: true, data: await response.json() }};
                }} catch (e) {{
                    return {{ ok: false, error: String(e) }};
                }}
            }})()"#,
            url = url_literal,
            init = init
        );

        let response = self.eval(js_code).await?;
        if response["ok"].as_bool() == Some(true) {
            Ok(response["data"].clone())
        } else {
            let message = response["error"].as_str().unwrap_or("未知错误");
            anyhow::bail!("页面请求失败 {}: {}", url, message)
        }
    }
}
