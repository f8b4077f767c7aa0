use anyhow::Result;
use answer_correction::utils::logging;
use answer_correction::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志（先于配置，配置解析的警告才能输出）
    let verbose = std::env::var("VERBOSE_LOGGING").is_ok_and(|v| v.trim() == "true");
    logging::init(verbose);

    // 加载配置
    let config = Config::from_env();

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
