// ==========================================
// 雏鸡订单分配系统 - HTTP 服务入口
// ==========================================
// 环境变量: 见 config::ServerConfig::from_env
// 初始管理员: 空库时读取 CHICKFLOW_ADMIN_USERNAME / CHICKFLOW_ADMIN_PASSWORD
// ==========================================

use chickflow::app::{build_router, AppState};
use chickflow::config::ServerConfig;
use chickflow::logging;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", chickflow::APP_NAME);
    tracing::info!("系统版本: {}", chickflow::VERSION);
    tracing::info!("==================================================");

    let config = ServerConfig::from_env()?;
    tracing::info!("使用数据库: {}", config.db_path);

    let state = Arc::new(AppState::new(&config).map_err(anyhow::Error::msg)?);
    bootstrap_admin(&state);

    if state.start_worker().is_some() {
        tracing::info!("后台分配 worker 已启动");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("HTTP 服务监听: {}", config.bind_addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("服务已停止");
    Ok(())
}

/// 空库时创建初始管理员
fn bootstrap_admin(state: &AppState) {
    let Ok(password) = std::env::var("CHICKFLOW_ADMIN_PASSWORD") else {
        return;
    };
    let username = std::env::var("CHICKFLOW_ADMIN_USERNAME")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "admin".to_string());

    match state.auth_api.ensure_bootstrap_admin(&username, &password) {
        Ok(Some(user)) => tracing::info!(username = %user.username, "初始管理员已创建"),
        Ok(None) => tracing::debug!("已存在用户，跳过初始管理员"),
        Err(e) => tracing::warn!(error = %e, "初始管理员创建失败"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "无法监听退出信号");
        std::future::pending::<()>().await;
    }
    tracing::info!("收到退出信号");
}
