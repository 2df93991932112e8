// ==========================================
// 雏鸡订单分配系统 - 日志初始化
// ==========================================
// 使用 tracing + tracing-subscriber
// 环境变量:
// - RUST_LOG: 日志级别过滤器（默认: info）
// - CHICKFLOW_LOG_FORMAT: text（默认）| json
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// # 示例
/// ```no_run
/// use chickflow::logging;
/// logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("CHICKFLOW_LOG_FORMAT")
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        // 生产环境接入日志采集时使用
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(true)
            .init();
    }
}

/// 初始化测试环境的日志系统（可重复调用）
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("chickflow=debug"))
        .with_test_writer()
        .try_init();
}
