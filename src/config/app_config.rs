// ==========================================
// 雏鸡订单分配系统 - 进程配置
// ==========================================
// 来源: 环境变量（CHICKFLOW_*），缺省值见 ServerConfig::default
// ==========================================

use std::path::PathBuf;
use thiserror::Error;

/// 开发/测试用的访问令牌签名密钥；只有 CHICKFLOW_DEV_MODE 打开时 from_env 才会使用
pub const DEV_JWT_SECRET: &str = "chickflow-dev-secret-change-me";

/// 进程配置错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServerConfigError {
    #[error("未设置 CHICKFLOW_JWT_SECRET（本地开发可设置 CHICKFLOW_DEV_MODE=1 使用内置密钥）")]
    MissingJwtSecret,
}

/// 服务进程配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// true: 供给确认后同步执行分配；false: 交给后台分配 worker
    pub run_inline: bool,
}

/// 测试与本地开发用的缺省配置（签名密钥为 DEV_JWT_SECRET）
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: get_default_db_path(),
            bind_addr: "0.0.0.0:5000".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_hours: 24,
            run_inline: false,
        }
    }
}

impl ServerConfig {
    /// 从环境变量读取配置
    ///
    /// # 错误
    /// - 未设置 CHICKFLOW_JWT_SECRET 且未打开 CHICKFLOW_DEV_MODE
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_vars(env_non_empty)
    }

    /// 按给定的变量查找函数组装配置（未设置或格式错误的项使用默认值）
    pub fn from_vars<F>(var: F) -> Result<Self, ServerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = var("CHICKFLOW_DB_PATH") {
            config.db_path = v;
        }
        if let Some(v) = var("CHICKFLOW_BIND_ADDR") {
            config.bind_addr = v;
        }
        match var("CHICKFLOW_JWT_SECRET") {
            Some(v) => config.jwt_secret = v,
            None if var("CHICKFLOW_DEV_MODE").is_some_and(|v| is_truthy(&v)) => {
                tracing::warn!("开发模式: 使用内置签名密钥，令牌可被伪造，不要用于生产");
            }
            None => return Err(ServerConfigError::MissingJwtSecret),
        }
        if let Some(v) = var("CHICKFLOW_TOKEN_TTL_HOURS") {
            match v.parse::<i64>() {
                Ok(hours) if hours > 0 => config.token_ttl_hours = hours,
                _ => tracing::warn!(value = %v, "CHICKFLOW_TOKEN_TTL_HOURS 格式错误，使用默认值"),
            }
        }
        if let Some(v) = var("CHICKFLOW_RUN_INLINE") {
            config.run_inline = is_truthy(&v);
        }

        Ok(config)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 获取默认数据库路径
///
/// 优先级: CHICKFLOW_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Some(path) = env_non_empty("CHICKFLOW_DB_PATH") {
        return path;
    }

    let mut path = PathBuf::from("./chickflow.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        let dir = data_dir.join("chickflow-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("chickflow");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("chickflow.db");
        }
    }

    path.to_string_lossy().to_string()
}
