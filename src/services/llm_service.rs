//! LLM 作答 - 业务能力层
//!
//! 题库查不到时由大模型作答。纠错轮次会带上已被证明错误的答案，
//! 要求模型换一个。接口走 OpenAI 兼容协议，`LLM_API_BASE_URL` 可指向任意兼容服务。

use anyhow::{anyhow, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::answer::{normalize_judgment, parse_letters};
use crate::models::QuestionType;
use crate::services::ports::AiModel;

/// 作答只需要短回复
const ANSWER_MAX_TOKENS: u32 = 512;
const ANSWER_TEMPERATURE: f32 = 0.2;

/// AI 作答服务
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.llm_api_key)
                .with_api_base(&config.llm_api_base_url),
        );

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 发送一轮对话（system + user），返回去掉首尾空白的回复
    pub async fn ask(&self, system_prompt: &str, question: &str) -> Result<String> {
        debug!("[AI] 请求模型 {}，题目 {} 字符", self.model_name, question.chars().count());

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(question)
                    .build()?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(ANSWER_TEMPERATURE)
            .max_tokens(ANSWER_MAX_TOKENS)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| anyhow!("[AI] 模型请求失败: {}", e))?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("[AI] 模型没有返回内容"))?;

        Ok(reply.trim().to_string())
    }

    /// 构建作答消息
    ///
    /// 返回 (user_message, system_message)
    fn build_answer_messages(
        content: &str,
        question_type: QuestionType,
        options: &[String],
        excluded: &[String],
    ) -> (String, String) {
        let system_message = "你是一个严谨的答题助手，擅长各学科的选择、判断、填空和简答题。\
                              你只输出答案本身，不输出解析过程。"
            .to_string();

        let format_rule = match question_type {
            QuestionType::SingleChoice => "只返回一个选项字母，例如：B",
            QuestionType::MultiChoice => "返回所有正确选项的字母，用英文逗号分隔，例如：A,C",
            QuestionType::Boolean => "只返回“对”或“错”",
            QuestionType::FillBlank => "只返回要填写的内容，多个空用英文逗号分隔",
            QuestionType::ShortAnswer => "用简洁的文字直接作答",
        };

        let options_text = if options.is_empty() {
            String::new()
        } else {
            let lines: Vec<String> = options
                .iter()
                .enumerate()
                .map(|(i, opt)| format!("  {}. {}", (b'A' + i as u8) as char, opt))
                .collect();
            format!("\n选项：\n{}\n", lines.join("\n"))
        };

        let excluded_text = if excluded.is_empty() {
            String::new()
        } else {
            format!(
                "\n【注意】以下答案已被证明是错误的，请避免重复：{}\n\
                 请给出标准答案，注意区分大小写、空格和标点符号。\n",
                excluded.join(", ")
            )
        };

        let user_message = format!(
            r#"请回答下面的{}。

题目：{}
{}{}
【输出要求】
{}，不要返回任何其他内容。"#,
            question_type.name(),
            content,
            options_text,
            excluded_text,
            format_rule
        );

        (user_message, system_message)
    }

    /// 解析作答响应
    ///
    /// 无法从响应中提取合法答案时返回 `None`
    fn parse_answer_response(
        response: &str,
        question_type: QuestionType,
        option_count: usize,
    ) -> Result<Option<String>> {
        // 去掉推理模型的思考过程
        let think = Regex::new(r"(?s)<think>.*?</think>")?;
        let response = think.replace_all(response, "");
        let prefix = Regex::new(r"^\s*(?:最终)?答案\s*[:：]\s*")?;

        // 多行时优先取"答案："所在行，否则取最后一行
        let line = response
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .find(|l| prefix.is_match(l))
            .or_else(|| response.lines().map(str::trim).filter(|l| !l.is_empty()).last())
            .unwrap_or_default();
        let answer = prefix.replace(line, "").trim().to_string();

        if answer.is_empty() {
            return Ok(None);
        }

        let parsed = match question_type {
            QuestionType::SingleChoice | QuestionType::MultiChoice => {
                let letters: Vec<char> = parse_letters(&answer)
                    .into_iter()
                    .filter(|c| ((*c as u8 - b'A') as usize) < option_count)
                    .collect();
                match (question_type, letters.as_slice()) {
                    (_, []) => None,
                    (QuestionType::SingleChoice, [first, ..]) => Some(first.to_string()),
                    _ => Some(
                        letters
                            .iter()
                            .map(char::to_string)
                            .collect::<Vec<_>>()
                            .join(","),
                    ),
                }
            }
            QuestionType::Boolean => normalize_judgment(&answer)
                .or_else(|| {
                    if answer.starts_with('错') || answer.contains("错误") {
                        Some("错")
                    } else if answer.starts_with('对') || answer.starts_with("正确") {
                        Some("对")
                    } else {
                        None
                    }
                })
                .map(str::to_string),
            QuestionType::FillBlank | QuestionType::ShortAnswer => Some(answer),
        };

        if parsed.is_none() {
            warn!("无法解析 LLM 响应: '{}'", response.trim());
        }
        Ok(parsed)
    }
}

#[async_trait]
impl AiModel for LlmService {
    async fn infer(
        &self,
        content: &str,
        question_type: QuestionType,
        options: &[String],
        excluded: &[String],
    ) -> Result<Option<String>> {
        debug!(
            "开始 AI 作答，题型: {}, 排除答案: {}, 模型: {}",
            question_type,
            excluded.len(),
            self.model_name
        );

        let (user_message, system_message) =
            Self::build_answer_messages(content, question_type, options, excluded);
        let response = self.ask(&system_message, &user_message).await?;

        Self::parse_answer_response(&response, question_type, options.len())
    }
}
