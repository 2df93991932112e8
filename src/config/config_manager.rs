// ==========================================
// 雏鸡订单分配系统 - 配置管理器
// ==========================================
// 职责: 分配规则加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::rules_reader::{AllocationRulesReader, ConfigError};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 配置项（接口展示用）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    pub value: String,
    /// 是否为默认值（config_kv 中无记录）
    pub is_default: bool,
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, ConfigError> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取并解析整数配置，格式错误时回退默认值并告警
    fn get_number_or_default<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let value = self.get_config_or_default(key, &default.to_string())?;
        Ok(value.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = key,
                raw_value = %value,
                "配置值格式错误，使用默认值"
            );
            default
        }))
    }

    /// 列出全部已知配置（含默认值）
    pub fn list_configs(&self) -> Result<Vec<ConfigItem>, ConfigError> {
        let mut items = Vec::with_capacity(config_keys::ALL.len());
        for (key, default) in config_keys::ALL {
            let stored = self.get_config_value(key)?;
            items.push(ConfigItem {
                key: key.to_string(),
                is_default: stored.is_none(),
                value: stored.unwrap_or_else(|| default.to_string()),
            });
        }
        Ok(items)
    }

    /// 更新配置（仅允许已知键，值需为非负整数且在合理范围内）
    ///
    /// # 返回
    /// - Ok(ConfigItem): 更新后的配置
    /// - Err: 未知键或值非法
    pub fn update_config(&self, key: &str, value: &str) -> Result<ConfigItem, ConfigError> {
        if !config_keys::ALL.iter().any(|(k, _)| *k == key) {
            return Err(format!("未知配置键: {}", key).into());
        }

        let parsed: i64 = value
            .trim()
            .parse()
            .map_err(|_| format!("配置值必须为整数: {}={}", key, value))?;
        let valid = match key {
            config_keys::MAX_PER_ORDER_PER_DAY => parsed > 0,
            config_keys::PICKUP_DEADLINE_HOUR => (0..=23).contains(&parsed),
            config_keys::WAITING_PERIOD_DAYS => parsed >= 0,
            _ => false,
        };
        if !valid {
            return Err(format!("配置值超出范围: {}={}", key, value).into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, parsed.to_string()],
        )?;

        tracing::info!(config_key = key, value = parsed, "配置已更新");

        Ok(ConfigItem {
            key: key.to_string(),
            value: parsed.to_string(),
            is_default: false,
        })
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 分配运行日志中记录当次生效的规则
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let config_map: HashMap<String, String> = self
            .list_configs()?
            .into_iter()
            .map(|item| (item.key, item.value))
            .collect();

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// AllocationRulesReader Trait 实现
// ==========================================
impl AllocationRulesReader for ConfigManager {
    fn get_max_per_order_per_day(&self) -> Result<i64, ConfigError> {
        let value = self.get_number_or_default(config_keys::MAX_PER_ORDER_PER_DAY, 1000i64)?;
        Ok(if value > 0 { value } else { 1000 })
    }

    fn get_pickup_deadline_hour(&self) -> Result<u32, ConfigError> {
        let value = self.get_number_or_default(config_keys::PICKUP_DEADLINE_HOUR, 14u32)?;
        Ok(value.min(23))
    }

    fn get_waiting_period_days(&self) -> Result<i64, ConfigError> {
        let value = self.get_number_or_default(config_keys::WAITING_PERIOD_DAYS, 7i64)?;
        Ok(value.max(0))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分配上限
    pub const MAX_PER_ORDER_PER_DAY: &str = "max_per_order_per_day";

    // 提货
    pub const PICKUP_DEADLINE_HOUR: &str = "pickup_deadline_hour";

    // 候补
    pub const WAITING_PERIOD_DAYS: &str = "waiting_period_days";

    /// 全部配置键及默认值
    pub const ALL: [(&str, &str); 3] = [
        (MAX_PER_ORDER_PER_DAY, "1000"),
        (PICKUP_DEADLINE_HOUR, "14"),
        (WAITING_PERIOD_DAYS, "7"),
    ];
}
