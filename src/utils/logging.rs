//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use std::fs;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{CorrectionResult, Progress};
use crate::services::UploadReport;

/// 初始化 tracing 订阅器
///
/// 优先使用 `RUST_LOG`，否则按 `verbose` 选择 debug / info。
/// 重复调用不会报错（测试中可多次调用）。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n答题纠错日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动答题 + 循环纠错");
    info!("📊 并发数: {}", config.concurrency_limit);
    info!("🔁 最大纠错轮数: {}", config.max_correction_rounds);
    info!("⏱️ 等待策略: {} ({}ms)", config.settle_mode, config.round_settle_delay_ms);
    info!("🤖 AI 作答: {}", if config.ai_enabled { "开启" } else { "关闭" });
    info!("{}", "=".repeat(60));
}

/// 记录题目加载信息
pub fn log_items_loaded(total: usize, rejected: usize) {
    info!("✓ 找到 {} 道待处理的题目", total);
    if rejected > 0 {
        info!("⚠️ {} 条记录数据无效，已跳过", rejected);
    }
}

/// 记录阶段开始
pub fn log_phase(title: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📦 {}", title);
    info!("{}", "=".repeat(60));
}

/// 记录一轮纠错开始
pub fn log_round_start(round: usize, max_rounds: usize, remaining: usize) {
    info!("\n{}", "─".repeat(60));
    info!("[纠错] 📍 第 {}/{} 轮纠错", round, max_rounds);
    info!("[纠错] 待纠错题目: {} 道", remaining);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    answering: &Progress,
    correction: Option<&CorrectionResult>,
    uploads: &UploadReport,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "✅ 答题成功: {}/{} ({}%)",
        answering.succeeded,
        answering.total,
        answering.success_rate()
    );
    info!("❌ 答题失败: {}", answering.failed);
    info!("⏭️ 跳过: {}", answering.skipped);
    if let Some(grading) = correction.and_then(|r| r.grading) {
        info!(
            "🔍 批改: 正确 {}, 错误 {} (正确率 {}%)",
            grading.correct,
            grading.wrong,
            grading.accuracy()
        );
    }
    if let Some(result) = correction {
        info!(
            "🔧 纠错: 成功 {}, 失败 {} / 共 {} (用了 {} 轮)",
            result.success_count, result.failed_count, result.total, result.rounds_used
        );
    }
    info!(
        "📤 上传: 成功 {}, 失败 {}, 跳过 {}",
        uploads.succeeded, uploads.failed, uploads.skipped
    );
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
