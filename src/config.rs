use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::ConfigError;
use crate::services::UploadConfig;
use crate::workflow::{BatchOptions, CorrectionConfig, SettleStrategy};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 并发与节奏 ---
    /// 同时处理的题目数量
    pub concurrency_limit: usize,
    /// 相邻两道题开始处理的间隔（毫秒）
    pub inter_item_delay_ms: u64,
    /// 单次查询超时（毫秒）
    pub resolver_timeout_ms: u64,
    // --- 答题 ---
    /// 是否启用 AI 作答
    pub ai_enabled: bool,
    /// 跳过已作答的题目
    pub skip_answered: bool,
    // --- 纠错 ---
    /// 最大纠错轮数
    pub max_correction_rounds: usize,
    /// 填写后等待平台保存的时间（毫秒）
    pub round_settle_delay_ms: u64,
    /// 两轮之间的间隔（毫秒）
    pub inter_round_delay_ms: u64,
    /// 等待策略：fixed / poll
    pub settle_mode: String,
    /// poll 模式下最多查询批改接口的次数
    pub settle_poll_max_attempts: usize,
    /// 是否纠正简答题
    pub correct_short_answers: bool,
    // --- 上传 ---
    pub upload_batch_size: usize,
    pub upload_batch_delay_ms: u64,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 题库 API 配置 ---
    pub answer_bank_base_url: String,
    pub answer_bank_api_key: String,
    /// 上传记录中的平台标识
    pub platform: String,
    // --- 浏览器 ---
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 目标URL
    pub target_url: String,
    /// 批改接口前缀
    pub grading_url: String,
    /// TOML 题目文件存放目录
    pub items_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            inter_item_delay_ms: 500,
            resolver_timeout_ms: 90_000,
            ai_enabled: true,
            skip_answered: false,
            max_correction_rounds: 3,
            round_settle_delay_ms: 3000,
            inter_round_delay_ms: 500,
            settle_mode: "fixed".to_string(),
            settle_poll_max_attempts: 5,
            correct_short_answers: false,
            upload_batch_size: 5,
            upload_batch_delay_ms: 200,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "deepseek-chat".to_string(),
            answer_bank_base_url: "http://localhost:8000".to_string(),
            answer_bank_api_key: String::new(),
            platform: "czbk".to_string(),
            browser_debug_port: 2001,
            target_url: "https://stu.ityxb.com".to_string(),
            grading_url: "https://stu.ityxb.com/back/bxg/my/busywork".to_string(),
            items_folder: "items".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

/// 读取并解析环境变量，缺失或无法解析时使用默认值
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("环境变量 {} 的值 '{}' 无法解析，使用默认值", name, value);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            concurrency_limit: env_or("CONCURRENCY_LIMIT", default.concurrency_limit),
            inter_item_delay_ms: env_or("INTER_ITEM_DELAY_MS", default.inter_item_delay_ms),
            resolver_timeout_ms: env_or("RESOLVER_TIMEOUT_MS", default.resolver_timeout_ms),
            ai_enabled: env_or("AI_ENABLED", default.ai_enabled),
            skip_answered: env_or("SKIP_ANSWERED", default.skip_answered),
            max_correction_rounds: env_or("MAX_CORRECTION_ROUNDS", default.max_correction_rounds),
            round_settle_delay_ms: env_or("ROUND_SETTLE_DELAY_MS", default.round_settle_delay_ms),
            inter_round_delay_ms: env_or("INTER_ROUND_DELAY_MS", default.inter_round_delay_ms),
            settle_mode: std::env::var("SETTLE_MODE").unwrap_or(default.settle_mode),
            settle_poll_max_attempts: env_or("SETTLE_POLL_MAX_ATTEMPTS", default.settle_poll_max_attempts),
            correct_short_answers: env_or("CORRECT_SHORT_ANSWERS", default.correct_short_answers),
            upload_batch_size: env_or("UPLOAD_BATCH_SIZE", default.upload_batch_size),
            upload_batch_delay_ms: env_or("UPLOAD_BATCH_DELAY_MS", default.upload_batch_delay_ms),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            answer_bank_base_url: std::env::var("ANSWER_BANK_BASE_URL").unwrap_or(default.answer_bank_base_url),
            answer_bank_api_key: std::env::var("ANSWER_BANK_API_KEY").unwrap_or(default.answer_bank_api_key),
            platform: std::env::var("PLATFORM").unwrap_or(default.platform),
            browser_debug_port: env_or("BROWSER_DEBUG_PORT", default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            grading_url: std::env::var("GRADING_URL").unwrap_or(default.grading_url),
            items_folder: std::env::var("ITEMS_FOLDER").unwrap_or(default.items_folder),
            verbose_logging: env_or("VERBOSE_LOGGING", default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::MustBePositive { name: "concurrency_limit" });
        }
        if self.max_correction_rounds == 0 {
            return Err(ConfigError::MustBePositive { name: "max_correction_rounds" });
        }
        if self.upload_batch_size == 0 {
            return Err(ConfigError::MustBePositive { name: "upload_batch_size" });
        }
        if self.resolver_timeout_ms == 0 {
            return Err(ConfigError::MustBePositive { name: "resolver_timeout_ms" });
        }
        self.settle_strategy()?;
        Ok(())
    }

    pub fn settle_strategy(&self) -> Result<SettleStrategy, ConfigError> {
        let delay = Duration::from_millis(self.round_settle_delay_ms);
        match self.settle_mode.trim().to_lowercase().as_str() {
            "fixed" => Ok(SettleStrategy::Fixed(delay)),
            "poll" => {
                if self.settle_poll_max_attempts == 0 {
                    return Err(ConfigError::MustBePositive {
                        name: "settle_poll_max_attempts",
                    });
                }
                Ok(SettleStrategy::Poll {
                    initial_delay: delay,
                    max_attempts: self.settle_poll_max_attempts,
                })
            }
            other => Err(ConfigError::UnknownSettleMode(other.to_string())),
        }
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency_limit: self.concurrency_limit,
            inter_item_delay: Duration::from_millis(self.inter_item_delay_ms),
            skip_answered: self.skip_answered,
        }
    }

    pub fn correction_config(&self) -> Result<CorrectionConfig, ConfigError> {
        Ok(CorrectionConfig {
            max_rounds: self.max_correction_rounds,
            settle: self.settle_strategy()?,
            inter_round_delay: Duration::from_millis(self.inter_round_delay_ms),
            correct_short_answers: self.correct_short_answers,
            platform: self.platform.clone(),
            ..CorrectionConfig::default()
        })
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            batch_size: self.upload_batch_size,
            batch_delay: Duration::from_millis(self.upload_batch_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.max_correction_rounds, 3);
        assert_eq!(config.round_settle_delay_ms, 3000);
        assert_eq!(config.upload_batch_size, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = Config {
            concurrency_limit: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MustBePositive { name: "concurrency_limit" })
        ));
    }

    #[test]
    fn test_settle_modes() {
        let config = Config {
            settle_mode: "Poll".into(),
            ..Config::default()
        };
        assert_eq!(
            config.settle_strategy().unwrap(),
            SettleStrategy::Poll {
                initial_delay: Duration::from_millis(3000),
                max_attempts: 5
            }
        );

        let config = Config {
            settle_mode: "sometimes".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.settle_strategy(),
            Err(ConfigError::UnknownSettleMode(_))
        ));
    }

    #[test]
    fn test_sub_configs() {
        let config = Config::default();
        assert_eq!(config.batch_options().inter_item_delay, Duration::from_millis(500));
        assert_eq!(config.upload_config().batch_size, 5);

        let correction = config.correction_config().unwrap();
        assert_eq!(correction.max_rounds, 3);
        assert_eq!(correction.settle, SettleStrategy::Fixed(Duration::from_millis(3000)));
    }
}
