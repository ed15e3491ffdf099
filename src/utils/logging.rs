/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, RunMode};

/// 初始化全局日志，`RUST_LOG` 可覆盖默认级别
///
/// 重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 顺序处理模式");
    info!(
        "📋 任务范围: {}..={}",
        config.first_task_id, config.last_task_id
    );
    info!(
        "🤖 模型: {} (备用: {})",
        config.model,
        config.fallback_model.as_deref().unwrap_or("无")
    );
    let mode = match config.run_mode {
        RunMode::AbortOnFatal => "遇到致命错误立即终止",
        RunMode::SkipFailedItem => "跳过失败任务继续",
    };
    info!("⚙️ 运行模式: {}", mode);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(
    submitted: usize,
    skipped_solved: usize,
    skipped_processed: usize,
    failed: usize,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 已提交: {}", submitted);
    info!("⏭️ 已解决跳过: {}", skipped_solved);
    info!("⏭️ 已处理跳过: {}", skipped_processed);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 超长文本只保留开头和结尾
pub fn preview_head_tail(text: &str, edge: usize) -> String {
    let count = text.chars().count();
    if count <= edge * 2 {
        return text.to_string();
    }
    let head: String = text.chars().take(edge).collect();
    let tail: String = text.chars().skip(count - edge).collect();
    format!("{} ... {}", head.trim(), tail.trim())
}
