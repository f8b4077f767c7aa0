//! 应用编排 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、配置校验、连接浏览器、创建 JsExecutor
//! 2. **加载题目**：扫描 TOML 题目文件，建立 ID 别名表
//! 3. **组装能力**：题库、LLM、页面填写、批改接口注入到流程层
//! 4. **执行流程**：首轮作答 → 批改 → 循环纠错 → 等待上传
//! 5. **全局统计**：汇总输出
//!
//! 只做调度和统计，不做具体业务判断。

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::CorrectionError;
use crate::infrastructure::{JsExecutor, TaskQueue};
use crate::models::{load_all_toml_files, IdAliasMap, Item};
use crate::services::{
    AiModel, AnswerBankClient, AnswerResolver, LlmService, PageApplier, PageOracle, UploadDeduplicator,
};
use crate::utils::logging::{init_log_file, log_items_loaded, log_phase, log_startup, print_final_stats};
use crate::workflow::{BatchAnswerer, CorrectionEngine};

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    executor: JsExecutor,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        init_log_file(&config.output_log_file)?;
        log_startup(&config);

        let (browser, page) =
            browser::connect_to_quiz_page(config.browser_debug_port, &config.target_url).await?;

        Ok(Self {
            config,
            _browser: browser,
            executor: JsExecutor::new(page),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        let (items, aliases) = self.load_items().await?;
        if items.is_empty() {
            warn!("⚠️ 没有找到待处理的题目，程序结束");
            return Ok(());
        }

        let (answerer, engine) = self.build_pipeline(aliases)?;

        log_phase("首轮作答");
        let run = answerer.run(items).await?;
        for outcome in run.outcomes.iter().filter(|o| o.warning.is_some()) {
            warn!("[答题] 题目 {}: {}", outcome.id, outcome.warning.as_deref().unwrap_or_default());
        }

        log_phase("循环纠错");
        let correction = match engine.fetch_and_correct().await {
            Ok(result) => Some(result),
            Err(CorrectionError::OracleUnavailable { round, source, partial }) => {
                error!("❌ 批改接口不可用 (第 {} 轮)，纠错中止: {}", round, source);
                Some(*partial)
            }
            Err(e) => {
                error!("❌ 纠错失败: {}", e);
                None
            }
        };

        let uploads = engine.wait_uploads().await;
        print_final_stats(
            &run.progress,
            correction.as_ref(),
            &uploads,
            &self.config.output_log_file,
        );

        Ok(())
    }

    /// 加载所有题目并建立别名表
    async fn load_items(&self) -> Result<(Vec<Item>, IdAliasMap)> {
        info!("\n📁 正在扫描待处理的题目...");
        let sets = load_all_toml_files(&self.config.items_folder).await?;

        let aliases = IdAliasMap::from_pairs(
            sets.iter()
                .flat_map(|set| set.aliases.iter())
                .map(|a| (a.canonical.clone(), a.alias.clone())),
        )?;

        let mut items: Vec<Item> = Vec::new();
        let mut rejected_count = 0;
        for set in sets {
            let name = set.name.clone();
            let (valid, rejected) = set.into_items(&aliases);
            for (id, e) in &rejected {
                warn!("[{}] 题目 {} 已跳过: {}", name, id, e);
            }
            rejected_count += rejected.len();

            for item in valid {
                if items.iter().any(|i| i.id() == item.id()) {
                    warn!("[{}] 题目 {} 与其他文件重复，已忽略", name, item.id());
                    continue;
                }
                items.push(item);
            }
        }

        log_items_loaded(items.len(), rejected_count);
        Ok((items, aliases))
    }

    /// 组装首轮作答和纠错所需的能力
    fn build_pipeline(&self, aliases: IdAliasMap) -> Result<(BatchAnswerer, CorrectionEngine)> {
        let config = &self.config;
        let bank = Arc::new(AnswerBankClient::new(config)?);

        let model: Option<Arc<dyn AiModel>> = if config.ai_enabled && !config.llm_api_key.is_empty() {
            Some(Arc::new(LlmService::new(config)))
        } else {
            if config.ai_enabled {
                warn!("⚠️ 未配置 LLM_API_KEY，AI 作答不可用");
            }
            None
        };

        let resolver = Arc::new(
            AnswerResolver::new(bank.clone(), model, config.resolver_timeout())
                .with_ai_enabled(config.ai_enabled)
                .with_aliases(aliases.clone()),
        );
        let applier = Arc::new(PageApplier::new(self.executor.clone()).with_aliases(aliases.clone()));
        let oracle = Arc::new(PageOracle::new(self.executor.clone(), config.grading_url.clone()));
        let uploads = Arc::new(UploadDeduplicator::new(bank, config.upload_config()));

        // 首轮作答和纠错共用一个并发上限
        let queue = TaskQueue::new(config.concurrency_limit);
        let answerer = BatchAnswerer::new(resolver.clone(), applier.clone(), config.batch_options())
            .with_queue(queue.clone());
        let engine = CorrectionEngine::new(
            resolver,
            applier,
            oracle,
            uploads,
            queue,
            config.correction_config()?,
        )
        .with_aliases(aliases);

        Ok((answerer, engine))
    }
}
