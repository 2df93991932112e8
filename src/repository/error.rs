// ==========================================
// 雏鸡订单分配系统 - 仓储层错误类型
// ==========================================
// 约束失败按 SQLite 消息归类: UNIQUE / FOREIGN KEY / CHECK
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("SQLite 错误: {0}")]
    Sqlite(String),

    /// 重复的客户编码 / 订单号 / 用户名等
    #[error("唯一约束违反: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束违反: {0}")]
    ForeignKeyViolation(String),

    /// CHECK 约束（数量非负、状态取值等）
    #[error("数据校验失败: {0}")]
    ValidationError(String),

    /// 条件更新未命中（状态已被其他操作改变）
    #[error("无效的状态转换: entity={entity}, from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else if msg.contains("CHECK") {
                    RepositoryError::ValidationError(msg)
                } else {
                    RepositoryError::Sqlite(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::not_found("Unknown", "Unknown"),
            _ => RepositoryError::Sqlite(err.to_string()),
        }
    }
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_约束失败归类() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (code TEXT NOT NULL UNIQUE, qty INTEGER NOT NULL CHECK (qty >= 0));
             INSERT INTO t VALUES ('A', 1);",
        )
        .unwrap();

        let dup: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('A', 2)", [])
            .unwrap_err()
            .into();
        assert!(matches!(dup, RepositoryError::UniqueConstraintViolation(_)));

        let negative: RepositoryError = conn
            .execute("INSERT INTO t VALUES ('B', -1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(negative, RepositoryError::ValidationError(_)));
    }
}
