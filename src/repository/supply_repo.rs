// ==========================================
// 雏鸡订单分配系统 - 每日供给仓储
// ==========================================
// 红线: actual_supply 只能由空值写入一次（条件更新）
// 红线: 覆写已确认的实际供给必须同时写审计记录
// ==========================================

use crate::domain::supply::{SupplyAudit, SupplyRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SUPPLY_COLUMNS: &str =
    "date, expected_supply, actual_supply, notes, created_at, updated_at";

/// 确认实际供给的结果
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// 本次写入成功
    Confirmed(SupplyRecord),
    /// 已被确认过（记录保持不变）
    AlreadyConfirmed(SupplyRecord),
}

// ==========================================
// SupplyRepository - 供给仓储
// ==========================================
pub struct SupplyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SupplyRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<SupplyRecord> {
        Ok(SupplyRecord {
            date: row.get(0)?,
            expected_supply: row.get(1)?,
            actual_supply: row.get(2)?,
            notes: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    pub(crate) fn find_by_date_in(
        conn: &Connection,
        date: NaiveDate,
    ) -> rusqlite::Result<Option<SupplyRecord>> {
        let sql = format!("SELECT {} FROM supply_record WHERE date = ?1", SUPPLY_COLUMNS);
        conn.query_row(&sql, params![date], Self::map_row).optional()
    }

    /// 按日期查询供给
    pub fn find_by_date(&self, date: NaiveDate) -> RepositoryResult<Option<SupplyRecord>> {
        let conn = self.get_conn()?;
        Ok(Self::find_by_date_in(&conn, date)?)
    }

    /// 写入预计供给（存在则更新，不影响实际供给）
    pub fn upsert_expected(
        &self,
        date: NaiveDate,
        expected_supply: i64,
        notes: Option<&str>,
    ) -> RepositoryResult<SupplyRecord> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO supply_record (date, expected_supply, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(date) DO UPDATE SET
                expected_supply = excluded.expected_supply,
                notes = COALESCE(excluded.notes, supply_record.notes),
                updated_at = excluded.updated_at
            "#,
            params![date, expected_supply, notes, now],
        )?;

        Self::find_by_date_in(&conn, date)?
            .ok_or_else(|| RepositoryError::not_found("SupplyRecord", date))
    }

    /// 确认实际供给
    ///
    /// # 返回
    /// - Confirmed: 写入成功（记录不存在时新建，预计值取实际值）
    /// - AlreadyConfirmed: 已确认，未做任何修改
    pub fn confirm_actual(
        &self,
        date: NaiveDate,
        actual_supply: i64,
        notes: Option<&str>,
    ) -> RepositoryResult<ConfirmOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let affected = tx.execute(
            r#"
            UPDATE supply_record
            SET actual_supply = ?1, notes = COALESCE(?2, notes), updated_at = ?3
            WHERE date = ?4 AND actual_supply IS NULL
            "#,
            params![actual_supply, notes, now, date],
        )?;

        if affected == 0 {
            if let Some(existing) = Self::find_by_date_in(&tx, date)? {
                return Ok(ConfirmOutcome::AlreadyConfirmed(existing));
            }
            tx.execute(
                r#"
                INSERT INTO supply_record (
                    date, expected_supply, actual_supply, notes, created_at, updated_at
                ) VALUES (?1, ?2, ?2, ?3, ?4, ?4)
                "#,
                params![date, actual_supply, notes, now],
            )?;
        }

        let record = Self::find_by_date_in(&tx, date)?
            .ok_or_else(|| RepositoryError::not_found("SupplyRecord", date))?;
        tx.commit()?;
        Ok(ConfirmOutcome::Confirmed(record))
    }

    /// 覆写实际供给（带审计）
    ///
    /// # 参数
    /// - reason: 覆写原因（必填）
    /// - operator: 操作人
    pub fn override_actual(
        &self,
        date: NaiveDate,
        actual_supply: i64,
        reason: &str,
        operator: &str,
    ) -> RepositoryResult<SupplyRecord> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let existing = Self::find_by_date_in(&tx, date)?
            .ok_or_else(|| RepositoryError::not_found("SupplyRecord", date))?;

        tx.execute(
            "UPDATE supply_record SET actual_supply = ?1, updated_at = ?2 WHERE date = ?3",
            params![actual_supply, now, date],
        )?;
        tx.execute(
            r#"
            INSERT INTO supply_audit (
                date, old_actual_supply, new_actual_supply, reason, operator, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![date, existing.actual_supply, actual_supply, reason, operator, now],
        )?;

        let record = Self::find_by_date_in(&tx, date)?
            .ok_or_else(|| RepositoryError::not_found("SupplyRecord", date))?;
        tx.commit()?;
        Ok(record)
    }

    /// 查询日期区间内的供给（按日期降序）
    pub fn list_range(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> RepositoryResult<Vec<SupplyRecord>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM supply_record WHERE 1 = 1", SUPPLY_COLUMNS);
        let mut args: Vec<Value> = Vec::new();
        if let Some(from) = date_from {
            sql.push_str(" AND date >= ?");
            args.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = date_to {
            sql.push_str(" AND date <= ?");
            args.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY date DESC");

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(args), Self::map_row)?
            .collect::<rusqlite::Result<Vec<SupplyRecord>>>()?;
        Ok(records)
    }

    /// 查询某日的覆写审计记录
    pub fn list_audits(&self, date: NaiveDate) -> RepositoryResult<Vec<SupplyAudit>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, date, old_actual_supply, new_actual_supply, reason, operator, created_at
            FROM supply_audit WHERE date = ?1 ORDER BY id
            "#,
        )?;
        let audits = stmt
            .query_map(params![date], |row| {
                Ok(SupplyAudit {
                    id: row.get(0)?,
                    date: row.get(1)?,
                    old_actual_supply: row.get(2)?,
                    new_actual_supply: row.get(3)?,
                    reason: row.get(4)?,
                    operator: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<SupplyAudit>>>()?;
        Ok(audits)
    }
}
