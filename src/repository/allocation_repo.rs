// ==========================================
// 雏鸡订单分配系统 - 分配仓储
// ==========================================
// 职责: 分配记录查询 + 单日“读快照-算方案-写方案”事务
// 红线: 单日分配在一个事务内完成（全成或全不成）
// 红线: 重算只替换候选订单在当日的待提货分配，已提货记录不可变
// ==========================================

use crate::db::decode_enum;
use crate::domain::allocation::Allocation;
use crate::domain::allocation_plan::{
    AllocationCandidate, BacklogEntry, DatePlan, DateSnapshot, WaitlistChange,
};
use crate::domain::order::Order;
use crate::domain::types::{AllocationStatus, CustomerTier, OrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::order_repo::OrderRepository;
use crate::repository::supply_repo::SupplyRepository;
use crate::repository::waitlist_repo::WaitlistRepository;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

const ALLOCATION_COLUMNS: &str = r#"
    allocation_id, order_id, customer_id, allocation_date, allocated_qty,
    status, pickup_deadline, picked_up_at, created_at
"#;

const OPEN_STATUS_SQL: &str = "('PENDING', 'PARTIALLY_ALLOCATED', 'WAITLISTED')";

/// 分配查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationFilter {
    pub date: Option<NaiveDate>,
    pub order_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub status: Option<AllocationStatus>,
}

/// 按客户等级汇总的分配
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAllocationSummary {
    pub tier: CustomerTier,
    pub count: i64,
    pub total_qty: i64,
}

/// 单个客户的分配量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerVolume {
    pub customer_id: i64,
    pub customer_code: String,
    pub farm_name: String,
    pub tier: CustomerTier,
    pub allocation_count: i64,
    pub total_qty: i64,
}

/// 单日分配汇总
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAllocationTotal {
    pub date: NaiveDate,
    pub allocated: i64,
    pub allocation_count: i64,
}

/// 提货确认结果
#[derive(Debug, Clone)]
pub struct PickupOutcome {
    pub allocation: Allocation,
    pub order: Order,
    /// 本次提货使订单完成
    pub order_fulfilled: bool,
}

// ==========================================
// AllocationRepository - 分配仓储
// ==========================================
pub struct AllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn map_row(row: &Row) -> rusqlite::Result<Allocation> {
        let status: String = row.get(5)?;
        Ok(Allocation {
            allocation_id: row.get(0)?,
            order_id: row.get(1)?,
            customer_id: row.get(2)?,
            allocation_date: row.get(3)?,
            allocated_qty: row.get(4)?,
            status: decode_enum(5, &status, AllocationStatus::parse)?,
            pickup_deadline: row.get(6)?,
            picked_up_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn find_by_id_in(conn: &Connection, allocation_id: &str) -> rusqlite::Result<Option<Allocation>> {
        let sql = format!(
            "SELECT {} FROM allocation WHERE allocation_id = ?1",
            ALLOCATION_COLUMNS
        );
        conn.query_row(&sql, params![allocation_id], Self::map_row)
            .optional()
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 按ID查询分配
    pub fn find_by_id(&self, allocation_id: &str) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        Ok(Self::find_by_id_in(&conn, allocation_id)?)
    }

    /// 条件查询分配（按日期、创建时间排序）
    pub fn list(&self, filter: &AllocationFilter) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM allocation WHERE 1 = 1", ALLOCATION_COLUMNS);
        let mut args: Vec<Value> = Vec::new();
        if let Some(date) = filter.date {
            sql.push_str(" AND allocation_date = ?");
            args.push(Value::Text(date.format("%Y-%m-%d").to_string()));
        }
        if let Some(order_id) = filter.order_id {
            sql.push_str(" AND order_id = ?");
            args.push(Value::Integer(order_id));
        }
        if let Some(customer_id) = filter.customer_id {
            sql.push_str(" AND customer_id = ?");
            args.push(Value::Integer(customer_id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY allocation_date, created_at, allocation_id");

        let mut stmt = conn.prepare(&sql)?;
        let allocations = stmt
            .query_map(params_from_iter(args), Self::map_row)?
            .collect::<rusqlite::Result<Vec<Allocation>>>()?;
        Ok(allocations)
    }

    /// 订单的有效分配总量
    pub fn effective_qty_for_order(&self, order_id: i64) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            r#"
            SELECT COALESCE(SUM(allocated_qty), 0) FROM allocation
            WHERE order_id = ?1 AND status != 'CANCELLED'
            "#,
            params![order_id],
            |row| row.get(0),
        )?)
    }

    /// 日期区间内逐日的有效分配汇总（无分配的日期不返回）
    pub fn daily_totals(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<DailyAllocationTotal>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT allocation_date, COALESCE(SUM(allocated_qty), 0), COUNT(*)
            FROM allocation
            WHERE allocation_date >= ?1 AND allocation_date <= ?2 AND status != 'CANCELLED'
            GROUP BY allocation_date
            ORDER BY allocation_date
            "#,
        )?;
        let totals = stmt
            .query_map(params![date_from, date_to], |row| {
                Ok(DailyAllocationTotal {
                    date: row.get(0)?,
                    allocated: row.get(1)?,
                    allocation_count: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(totals)
    }

    /// 某日按客户等级汇总的有效分配（等级降序）
    pub fn tier_breakdown(&self, date: NaiveDate) -> RepositoryResult<Vec<TierAllocationSummary>> {
        self.tier_breakdown_between(date, date)
    }

    /// 日期区间内按客户等级汇总的有效分配（等级降序）
    pub fn tier_breakdown_between(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<TierAllocationSummary>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.tier, COUNT(a.allocation_id), COALESCE(SUM(a.allocated_qty), 0)
            FROM allocation a
            JOIN customer c ON c.id = a.customer_id
            WHERE a.allocation_date >= ?1 AND a.allocation_date <= ?2
              AND a.status != 'CANCELLED'
            GROUP BY c.tier
            "#,
        )?;
        let mut rows = stmt
            .query_map(params![date_from, date_to], |row| {
                let tier: String = row.get(0)?;
                Ok(TierAllocationSummary {
                    tier: decode_enum(0, &tier, CustomerTier::parse)?,
                    count: row.get(1)?,
                    total_qty: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.sort_by(|a, b| b.tier.cmp(&a.tier));
        Ok(rows)
    }

    /// 日期区间内分配量最多的客户（分配量降序，同量按客户ID升序）
    pub fn top_customers(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
        limit: usize,
    ) -> RepositoryResult<Vec<CustomerVolume>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.id, c.customer_code, c.farm_name, c.tier,
                   COUNT(a.allocation_id), COALESCE(SUM(a.allocated_qty), 0) AS total_qty
            FROM allocation a
            JOIN customer c ON c.id = a.customer_id
            WHERE a.allocation_date >= ?1 AND a.allocation_date <= ?2
              AND a.status != 'CANCELLED'
            GROUP BY c.id
            ORDER BY total_qty DESC, c.id ASC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt
            .query_map(params![date_from, date_to, limit as i64], |row| {
                let tier: String = row.get(3)?;
                Ok(CustomerVolume {
                    customer_id: row.get(0)?,
                    customer_code: row.get(1)?,
                    farm_name: row.get(2)?,
                    tier: decode_enum(3, &tier, CustomerTier::parse)?,
                    allocation_count: row.get(4)?,
                    total_qty: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 单日分配事务
    // ==========================================

    /// 在单个事务内执行“读快照 → 计算方案 → 写入方案”
    ///
    /// # 参数
    /// - date: 分配日期
    /// - plan_fn: 纯计算函数，根据快照给出方案；返回错误时事务回滚、不写任何数据
    ///
    /// # 返回
    /// - Ok((快照, 方案)): 已提交
    /// - Err: 计算失败或写入失败（均已回滚）
    pub fn with_date_plan<E, F>(
        &self,
        date: NaiveDate,
        plan_fn: F,
    ) -> Result<(DateSnapshot, DatePlan), E>
    where
        F: FnOnce(&DateSnapshot) -> Result<DatePlan, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::from)?;

        let snapshot = Self::load_snapshot_in(&tx, date).map_err(RepositoryError::from)?;
        let plan = plan_fn(&snapshot)?;

        Self::apply_plan_in(&tx, date, &plan)?;
        tx.commit().map_err(RepositoryError::from)?;

        debug!(
            date = %date,
            grants = plan.grants.len(),
            transitions = plan.transitions.len(),
            waitlist_changes = plan.waitlist.len(),
            "单日分配方案已提交"
        );
        Ok((snapshot, plan))
    }

    /// 读取单日快照（只读，调用方负责事务）
    pub(crate) fn load_snapshot_in(
        conn: &Connection,
        date: NaiveDate,
    ) -> rusqlite::Result<DateSnapshot> {
        let supply = SupplyRepository::find_by_date_in(conn, date)?;

        let allocated_on_date: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(allocated_qty), 0) FROM allocation
            WHERE allocation_date = ?1 AND status != 'CANCELLED'
            "#,
            params![date],
            |row| row.get(0),
        )?;

        let replaceable_on_date: i64 = conn.query_row(
            &format!(
                r#"
                SELECT COALESCE(SUM(a.allocated_qty), 0)
                FROM allocation a
                JOIN orders o ON o.id = a.order_id
                WHERE a.allocation_date = ?1 AND a.status = 'PENDING'
                  AND o.requested_delivery_date = ?1 AND o.status IN {}
                "#,
                OPEN_STATUS_SQL
            ),
            params![date],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT o.id, o.order_number, o.customer_id, c.tier, o.order_date,
                   o.order_qty, o.status,
                   COALESCE((SELECT SUM(a.allocated_qty) FROM allocation a
                             WHERE a.order_id = o.id AND a.status != 'CANCELLED'
                               AND a.allocation_date != ?1), 0),
                   COALESCE((SELECT SUM(a.allocated_qty) FROM allocation a
                             WHERE a.order_id = o.id AND a.status = 'PICKED_UP'
                               AND a.allocation_date = ?1), 0)
            FROM orders o
            JOIN customer c ON c.id = o.customer_id
            WHERE o.requested_delivery_date = ?1 AND o.status IN {}
            "#,
            OPEN_STATUS_SQL
        ))?;
        let candidates = stmt
            .query_map(params![date], |row| {
                let tier: String = row.get(3)?;
                let status: String = row.get(6)?;
                Ok(AllocationCandidate {
                    order_id: row.get(0)?,
                    order_number: row.get(1)?,
                    customer_id: row.get(2)?,
                    tier: decode_enum(3, &tier, CustomerTier::parse)?,
                    order_date: row.get(4)?,
                    order_qty: row.get(5)?,
                    status: decode_enum(6, &status, OrderStatus::parse)?,
                    allocated_elsewhere: row.get(7)?,
                    picked_up_on_date: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT w.entry_id, w.order_id, o.order_number, w.customer_id, c.tier,
                   w.enqueued_at, w.unmet_qty, w.target_date, o.status,
                   COALESCE((SELECT SUM(a.allocated_qty) FROM allocation a
                             WHERE a.order_id = w.order_id AND a.status != 'CANCELLED'
                               AND a.allocation_date = ?1), 0)
            FROM waitlist_entry w
            JOIN orders o ON o.id = w.order_id
            JOIN customer c ON c.id = w.customer_id
            WHERE w.status = 'WAITING' AND w.target_date <= ?1
            "#,
        )?;
        let waiting = stmt
            .query_map(params![date], |row| {
                let tier: String = row.get(4)?;
                let status: String = row.get(8)?;
                Ok(BacklogEntry {
                    entry_id: row.get(0)?,
                    order_id: row.get(1)?,
                    order_number: row.get(2)?,
                    customer_id: row.get(3)?,
                    tier: decode_enum(4, &tier, CustomerTier::parse)?,
                    enqueued_at: row.get(5)?,
                    unmet_qty: row.get(6)?,
                    target_date: row.get(7)?,
                    order_status: decode_enum(8, &status, OrderStatus::parse)?,
                    allocated_on_date: row.get(9)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DateSnapshot {
            date,
            supply,
            allocated_on_date,
            replaceable_on_date,
            candidates,
            waiting,
        })
    }

    /// 写入单日方案（调用方负责事务）
    fn apply_plan_in(conn: &Connection, date: NaiveDate, plan: &DatePlan) -> RepositoryResult<()> {
        let now = Utc::now();

        // 1. 删除候选订单当日的待提货分配
        for order_id in &plan.replaced_order_ids {
            conn.execute(
                r#"
                DELETE FROM allocation
                WHERE order_id = ?1 AND allocation_date = ?2 AND status = 'PENDING'
                "#,
                params![order_id, date],
            )?;
        }

        // 2. 插入新分配
        {
            let mut stmt = conn.prepare(
                r#"
                INSERT INTO allocation (
                    allocation_id, order_id, customer_id, allocation_date,
                    allocated_qty, status, pickup_deadline, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, 'PENDING', ?6, ?7)
                "#,
            )?;
            for grant in plan.grants.iter().filter(|g| g.qty > 0) {
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    grant.order_id,
                    grant.customer_id,
                    date,
                    grant.qty,
                    grant.pickup_deadline,
                    now,
                ])?;
            }
        }

        // 3. 订单状态迁移（保持原状态的跳过）
        for t in plan.transitions.iter().filter(|t| t.from != t.to) {
            OrderRepository::transition_in(conn, t.order_id, t.from, t.to)?;
        }

        // 4. 候补变更
        for change in &plan.waitlist {
            match change {
                WaitlistChange::Upsert {
                    order_id,
                    customer_id,
                    unmet_qty,
                    target_date,
                } => WaitlistRepository::upsert_waiting_in(
                    conn,
                    *order_id,
                    *customer_id,
                    *unmet_qty,
                    *target_date,
                )?,
                WaitlistChange::Fulfill {
                    order_id,
                    fulfilled_date,
                } => WaitlistRepository::fulfill_waiting_in(conn, *order_id, *fulfilled_date)?,
            }
        }

        Ok(())
    }

    // ==========================================
    // 提货确认
    // ==========================================

    /// 确认提货
    ///
    /// # 红线
    /// - 分配只能从 PENDING 变为 PICKED_UP
    /// - 订单已提货总量达到订购量时订单完成，并记录客户最近提货日期
    pub fn mark_picked_up(
        &self,
        allocation_id: &str,
        picked_up_at: DateTime<Utc>,
    ) -> RepositoryResult<PickupOutcome> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let existing = Self::find_by_id_in(&tx, allocation_id)?
            .ok_or_else(|| RepositoryError::not_found("Allocation", allocation_id))?;

        let affected = tx.execute(
            r#"
            UPDATE allocation SET status = 'PICKED_UP', picked_up_at = ?1
            WHERE allocation_id = ?2 AND status = 'PENDING'
            "#,
            params![picked_up_at, allocation_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: "Allocation".to_string(),
                from: existing.status.to_string(),
                to: AllocationStatus::PickedUp.to_string(),
            });
        }

        let picked_total: i64 = tx.query_row(
            r#"
            SELECT COALESCE(SUM(allocated_qty), 0) FROM allocation
            WHERE order_id = ?1 AND status = 'PICKED_UP'
            "#,
            params![existing.order_id],
            |row| row.get(0),
        )?;

        let order = OrderRepository::find_by_id_in(&tx, existing.order_id)?
            .ok_or_else(|| RepositoryError::not_found("Order", existing.order_id))?;

        let order_fulfilled =
            order.status == OrderStatus::Allocated && picked_total >= order.order_qty;
        if order_fulfilled {
            OrderRepository::transition_in(
                &tx,
                order.id,
                OrderStatus::Allocated,
                OrderStatus::Fulfilled,
            )?;
            tx.execute(
                "UPDATE customer SET last_fulfilled_date = ?1, updated_at = ?2 WHERE id = ?3",
                params![existing.allocation_date, Utc::now(), order.customer_id],
            )?;
        }

        let allocation = Self::find_by_id_in(&tx, allocation_id)?
            .ok_or_else(|| RepositoryError::not_found("Allocation", allocation_id))?;
        let order = OrderRepository::find_by_id_in(&tx, existing.order_id)?
            .ok_or_else(|| RepositoryError::not_found("Order", existing.order_id))?;

        tx.commit()?;
        Ok(PickupOutcome {
            allocation,
            order,
            order_fulfilled,
        })
    }
}
