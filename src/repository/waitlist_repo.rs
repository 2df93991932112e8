// ==========================================
// 雏鸡订单分配系统 - 候补仓储
// ==========================================
// 红线: 每个订单最多一条 WAITING 候补（部分唯一索引）
// 红线: 更新候补保留原入队时间，排队位置不因重算丢失
// ==========================================

use crate::db::decode_enum;
use crate::domain::allocation::{WaitlistEntry, WaitlistView};
use crate::domain::customer::CustomerSummary;
use crate::domain::types::{CustomerTier, WaitlistStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = r#"
    w.entry_id, w.order_id, w.customer_id, w.unmet_qty, w.target_date,
    w.enqueued_at, w.status, w.fulfilled_date
"#;

/// 候补状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistCounts {
    pub total: i64,
    pub waiting: i64,
    pub fulfilled: i64,
}

// ==========================================
// WaitlistRepository - 候补仓储
// ==========================================
pub struct WaitlistRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WaitlistRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_entry(row: &Row) -> rusqlite::Result<WaitlistEntry> {
        let status: String = row.get(6)?;
        Ok(WaitlistEntry {
            entry_id: row.get(0)?,
            order_id: row.get(1)?,
            customer_id: row.get(2)?,
            unmet_qty: row.get(3)?,
            target_date: row.get(4)?,
            enqueued_at: row.get(5)?,
            status: decode_enum(6, &status, WaitlistStatus::parse)?,
            fulfilled_date: row.get(7)?,
            priority_rank: 0,
        })
    }

    /// 查询等待中的候补（含订单号与客户摘要，未排序）
    ///
    /// # 参数
    /// - up_to: 仅返回 target_date <= up_to 的候补
    pub fn list_waiting_views(&self, up_to: Option<NaiveDate>) -> RepositoryResult<Vec<WaitlistView>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, o.order_number, c.id, c.farm_name, c.tier
            FROM waitlist_entry w
            JOIN orders o ON o.id = w.order_id
            JOIN customer c ON c.id = w.customer_id
            WHERE w.status = 'WAITING' AND (?1 IS NULL OR w.target_date <= ?1)
            "#,
            ENTRY_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let views = stmt
            .query_map(params![up_to], |row| {
                let tier: String = row.get(11)?;
                Ok(WaitlistView {
                    entry: Self::map_entry(row)?,
                    order_number: row.get(8)?,
                    customer: Some(CustomerSummary {
                        id: row.get(9)?,
                        farm_name: row.get(10)?,
                        tier: decode_enum(11, &tier, CustomerTier::parse)?,
                    }),
                })
            })?
            .collect::<rusqlite::Result<Vec<WaitlistView>>>()?;

        Ok(views)
    }

    /// 查询订单当前等待中的候补
    pub fn find_waiting(&self, order_id: i64) -> RepositoryResult<Option<WaitlistEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM waitlist_entry w WHERE w.order_id = ?1 AND w.status = 'WAITING'",
            ENTRY_COLUMNS
        );
        Ok(conn.query_row(&sql, params![order_id], Self::map_entry).optional()?)
    }

    /// 查询订单的全部候补记录（按入队时间）
    pub fn list_by_order(&self, order_id: i64) -> RepositoryResult<Vec<WaitlistEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM waitlist_entry w WHERE w.order_id = ?1 ORDER BY w.enqueued_at",
            ENTRY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![order_id], Self::map_entry)?
            .collect::<rusqlite::Result<Vec<WaitlistEntry>>>()?;
        Ok(entries)
    }

    /// 统计等待中的候补数
    pub fn count_waiting(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM waitlist_entry WHERE status = 'WAITING'",
            [],
            |row| row.get(0),
        )?)
    }

    /// 统计某日产生的候补（按 target_date）
    pub fn counts_for_date(&self, date: NaiveDate) -> RepositoryResult<WaitlistCounts> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'WAITING' THEN 1 ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN status = 'FULFILLED' THEN 1 ELSE 0 END), 0)
            FROM waitlist_entry WHERE target_date = ?1
            "#,
            params![date],
            |row| {
                Ok(WaitlistCounts {
                    total: row.get(0)?,
                    waiting: row.get(1)?,
                    fulfilled: row.get(2)?,
                })
            },
        )?)
    }

    /// 缺口日期区间内的全部候补记录（含客户等级）
    pub fn list_between(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<(WaitlistEntry, CustomerTier)>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}, c.tier
            FROM waitlist_entry w
            JOIN customer c ON c.id = w.customer_id
            WHERE w.target_date >= ?1 AND w.target_date <= ?2
            ORDER BY w.target_date, w.enqueued_at
            "#,
            ENTRY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![date_from, date_to], |row| {
                let tier: String = row.get(8)?;
                Ok((Self::map_entry(row)?, decode_enum(8, &tier, CustomerTier::parse)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 登记候补（按订单插入或更新）
    pub fn enqueue(
        &self,
        order_id: i64,
        customer_id: i64,
        unmet_qty: i64,
        target_date: NaiveDate,
    ) -> RepositoryResult<WaitlistEntry> {
        let conn = self.get_conn()?;
        Self::upsert_waiting_in(&conn, order_id, customer_id, unmet_qty, target_date)?;

        let sql = format!(
            "SELECT {} FROM waitlist_entry w WHERE w.order_id = ?1 AND w.status = 'WAITING'",
            ENTRY_COLUMNS
        );
        Ok(conn.query_row(&sql, params![order_id], Self::map_entry)?)
    }

    /// 取消订单等待中的候补
    ///
    /// # 返回
    /// - true: 存在并已取消
    /// - false: 没有等待中的候补
    pub fn cancel_waiting(&self, order_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE waitlist_entry SET status = 'CANCELLED', updated_at = ?1
            WHERE order_id = ?2 AND status = 'WAITING'
            "#,
            params![Utc::now(), order_id],
        )?;
        Ok(affected > 0)
    }

    // ==========================================
    // 事务内辅助函数（供分配仓储复用）
    // ==========================================

    /// 插入或更新等待中的候补
    ///
    /// 已存在时只更新 unmet_qty，入队时间与 target_date 保持不变
    pub(crate) fn upsert_waiting_in(
        conn: &Connection,
        order_id: i64,
        customer_id: i64,
        unmet_qty: i64,
        target_date: NaiveDate,
    ) -> RepositoryResult<()> {
        let now = Utc::now();
        let affected = conn.execute(
            r#"
            UPDATE waitlist_entry SET unmet_qty = ?1, updated_at = ?2
            WHERE order_id = ?3 AND status = 'WAITING'
            "#,
            params![unmet_qty, now, order_id],
        )?;

        if affected == 0 {
            conn.execute(
                r#"
                INSERT INTO waitlist_entry (
                    entry_id, order_id, customer_id, unmet_qty, target_date,
                    enqueued_at, status, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'WAITING', ?6)
                "#,
                params![
                    Uuid::new_v4().to_string(),
                    order_id,
                    customer_id,
                    unmet_qty,
                    target_date,
                    now,
                ],
            )?;
        }
        Ok(())
    }

    /// 关闭等待中的候补（无等待候补时为空操作）
    pub(crate) fn fulfill_waiting_in(
        conn: &Connection,
        order_id: i64,
        fulfilled_date: NaiveDate,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"
            UPDATE waitlist_entry
            SET status = 'FULFILLED', fulfilled_date = ?1, updated_at = ?2
            WHERE order_id = ?3 AND status = 'WAITING'
            "#,
            params![fulfilled_date, Utc::now(), order_id],
        )?;
        Ok(())
    }
}
