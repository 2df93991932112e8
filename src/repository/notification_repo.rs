// ==========================================
// 雏鸡订单分配系统 - 通知日志仓储
// ==========================================
// 用途: 记录每一次通知发送尝试（成功/失败）
// ==========================================

use crate::db::decode_enum;
use crate::domain::notification::{Notification, OutgoingMessage};
use crate::domain::types::{NotificationKind, NotificationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const NOTIFICATION_COLUMNS: &str = r#"
    id, recipient_type, recipient_id, recipient_contact, kind, subject,
    message, status, error_message, sent_at, created_at
"#;

fn parse_kind(s: &str) -> Option<NotificationKind> {
    match s {
        "SMS" => Some(NotificationKind::Sms),
        "EMAIL" => Some(NotificationKind::Email),
        "PUSH" => Some(NotificationKind::Push),
        _ => None,
    }
}

pub struct NotificationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NotificationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<Notification> {
        let kind: String = row.get(4)?;
        let status: String = row.get(7)?;
        Ok(Notification {
            id: row.get(0)?,
            recipient_type: row.get(1)?,
            recipient_id: row.get(2)?,
            recipient_contact: row.get(3)?,
            kind: decode_enum(4, &kind, parse_kind)?,
            subject: row.get(5)?,
            message: row.get(6)?,
            status: decode_enum(7, &status, NotificationStatus::parse)?,
            error_message: row.get(8)?,
            sent_at: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    /// 记录一次发送尝试
    ///
    /// # 参数
    /// - error: None 表示发送成功
    pub fn record(
        &self,
        message: &OutgoingMessage,
        error: Option<&str>,
    ) -> RepositoryResult<Notification> {
        let conn = self.get_conn()?;
        let now = Utc::now();
        let (status, sent_at) = match error {
            None => (NotificationStatus::Sent, Some(now)),
            Some(_) => (NotificationStatus::Failed, None),
        };

        conn.execute(
            r#"
            INSERT INTO notification (
                recipient_type, recipient_id, recipient_contact, kind, subject,
                message, status, error_message, sent_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                message.recipient_type,
                message.recipient_id,
                message.recipient_contact,
                message.kind.as_str(),
                message.subject,
                message.message,
                status.as_str(),
                error,
                sent_at,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM notification WHERE id = ?1", NOTIFICATION_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row)?)
    }

    /// 查询收件人的通知（最新在前）
    pub fn list_for_recipient(
        &self,
        recipient_type: &str,
        recipient_id: i64,
        limit: usize,
    ) -> RepositoryResult<Vec<Notification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM notification
            WHERE recipient_type = ?1 AND recipient_id = ?2
            ORDER BY id DESC LIMIT ?3
            "#,
            NOTIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let notifications = stmt
            .query_map(params![recipient_type, recipient_id, limit as i64], Self::map_row)?
            .collect::<rusqlite::Result<Vec<Notification>>>()?;
        Ok(notifications)
    }
}
