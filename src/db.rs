// ==========================================
// 雏鸡订单分配系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 幂等建表：服务启动与测试共用同一份 schema
// ==========================================

use rusqlite::types::Type;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 打开连接、建表，并包装为仓储共享连接
pub fn open_shared_connection(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 幂等建表
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS customer (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_code TEXT NOT NULL UNIQUE,
            farm_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            zone TEXT,
            address TEXT,
            tier TEXT NOT NULL,
            last_fulfilled_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT NOT NULL UNIQUE,
            customer_id INTEGER NOT NULL REFERENCES customer(id),
            order_qty INTEGER NOT NULL CHECK (order_qty > 0),
            requested_delivery_date TEXT NOT NULL,
            status TEXT NOT NULL,
            order_date TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_orders_date_status
          ON orders(requested_delivery_date, status);

        CREATE INDEX IF NOT EXISTS idx_orders_customer
          ON orders(customer_id);

        CREATE TABLE IF NOT EXISTS order_sequence (
            year INTEGER PRIMARY KEY,
            last_seq INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS supply_record (
            date TEXT PRIMARY KEY,
            expected_supply INTEGER NOT NULL CHECK (expected_supply >= 0),
            actual_supply INTEGER CHECK (actual_supply IS NULL OR actual_supply >= 0),
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS supply_audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            old_actual_supply INTEGER,
            new_actual_supply INTEGER NOT NULL,
            reason TEXT NOT NULL,
            operator TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS allocation (
            allocation_id TEXT PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES orders(id),
            customer_id INTEGER NOT NULL REFERENCES customer(id),
            allocation_date TEXT NOT NULL,
            allocated_qty INTEGER NOT NULL CHECK (allocated_qty > 0),
            status TEXT NOT NULL,
            pickup_deadline TEXT,
            picked_up_at TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_allocation_date
          ON allocation(allocation_date, status);

        CREATE INDEX IF NOT EXISTS idx_allocation_order
          ON allocation(order_id);

        CREATE TABLE IF NOT EXISTS waitlist_entry (
            entry_id TEXT PRIMARY KEY,
            order_id INTEGER NOT NULL REFERENCES orders(id),
            customer_id INTEGER NOT NULL REFERENCES customer(id),
            unmet_qty INTEGER NOT NULL CHECK (unmet_qty > 0),
            target_date TEXT NOT NULL,
            enqueued_at TEXT NOT NULL,
            status TEXT NOT NULL,
            fulfilled_date TEXT,
            updated_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_waitlist_waiting_order
          ON waitlist_entry(order_id) WHERE status = 'WAITING';

        CREATE TABLE IF NOT EXISTS app_user (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL,
            customer_id INTEGER REFERENCES customer(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        -- 一个客户档案最多关联一个账号
        CREATE UNIQUE INDEX IF NOT EXISTS idx_app_user_customer
          ON app_user(customer_id) WHERE customer_id IS NOT NULL;

        CREATE TABLE IF NOT EXISTS notification (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recipient_type TEXT NOT NULL,
            recipient_id INTEGER,
            recipient_contact TEXT NOT NULL,
            kind TEXT NOT NULL,
            subject TEXT,
            message TEXT NOT NULL,
            status TEXT NOT NULL,
            error_message TEXT,
            sent_at TEXT,
            created_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 将数据库中的枚举文本解码为领域枚举
///
/// 解码失败时返回 FromSqlConversionFailure，保留列号便于排查
pub fn decode_enum<T>(
    idx: usize,
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("无法识别的枚举值: {}", raw).into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_decode_enum() {
        use crate::domain::types::OrderStatus;

        assert_eq!(
            decode_enum(0, "WAITLISTED", OrderStatus::parse).unwrap(),
            OrderStatus::Waitlisted
        );
        assert!(decode_enum(3, "BOGUS", OrderStatus::parse).is_err());
    }
}
