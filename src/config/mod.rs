// ==========================================
// 雏鸡订单分配系统 - 配置层
// ==========================================
// 职责: 进程配置（环境变量）+ 分配规则（config_kv 表）
// ==========================================

pub mod app_config;
pub mod config_manager;
pub mod rules_reader;

// 重导出核心配置管理器
pub use app_config::{get_default_db_path, ServerConfig, ServerConfigError, DEV_JWT_SECRET};
pub use config_manager::{config_keys, ConfigItem, ConfigManager};
pub use rules_reader::{AllocationRules, AllocationRulesReader, ConfigError, StaticRules};
