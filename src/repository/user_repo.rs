// ==========================================
// 雏鸡订单分配系统 - 用户仓储
// ==========================================

use crate::db::decode_enum;
use crate::domain::types::UserRole;
use crate::domain::user::User;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, role, customer_id, is_active, created_at";

pub struct UserRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UserRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<User> {
        let role: String = row.get(4)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: decode_enum(4, &role, UserRole::parse)?,
            customer_id: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    /// 新建用户（password_hash 为已哈希的 PHC 串）
    pub fn insert(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
        customer_id: Option<i64>,
    ) -> RepositoryResult<User> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO app_user (username, email, password_hash, role, customer_id, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
            "#,
            params![username, email, password_hash, role.as_str(), customer_id, Utc::now()],
        )?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM app_user WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row)?)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM app_user WHERE id = ?1", USER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    pub fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM app_user WHERE username = ?1", USER_COLUMNS);
        Ok(conn
            .query_row(&sql, params![username], Self::map_row)
            .optional()?)
    }

    /// 查找已关联该客户档案的账号
    pub fn find_by_customer_id(&self, customer_id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM app_user WHERE customer_id = ?1", USER_COLUMNS);
        Ok(conn
            .query_row(&sql, params![customer_id], Self::map_row)
            .optional()?)
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE app_user SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("User", id));
        }
        Ok(())
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM app_user", [], |row| row.get(0))?)
    }
}
