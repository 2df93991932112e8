// ==========================================
// 雏鸡订单分配系统 - 订单数据仓储
// ==========================================
// 红线: 订单号在事务内按年分配，失败不占用序号
// 红线: 状态更新一律使用条件更新 (WHERE status = from)
// ==========================================

use crate::db::decode_enum;
use crate::domain::order::{format_order_number, Order, OrderChanges, OrderFilter};
use crate::domain::types::{CustomerTier, OrderStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::waitlist_repo::WaitlistRepository;
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ORDER_COLUMNS: &str = r#"
    id, order_number, customer_id, order_qty, requested_delivery_date,
    status, order_date, notes, created_at, updated_at
"#;

/// 级联取消结果
#[derive(Debug, Clone)]
pub struct CancelledOrder {
    pub order: Order,
    pub released_dates: Vec<NaiveDate>,
}

/// 单个等级的订单满足情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierOrderOutcome {
    pub tier: CustomerTier,
    pub total_orders: i64,
    pub fulfilled_orders: i64,
}

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub(crate) fn map_row(row: &Row) -> rusqlite::Result<Order> {
        let status: String = row.get(5)?;
        Ok(Order {
            id: row.get(0)?,
            order_number: row.get(1)?,
            customer_id: row.get(2)?,
            order_qty: row.get(3)?,
            requested_delivery_date: row.get(4)?,
            status: decode_enum(5, &status, OrderStatus::parse)?,
            order_date: row.get(6)?,
            notes: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub(crate) fn find_by_id_in(conn: &Connection, id: i64) -> rusqlite::Result<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        conn.query_row(&sql, params![id], Self::map_row).optional()
    }

    /// 新建订单（分配订单号）
    ///
    /// # 参数
    /// - customer_id: 客户ID（调用方已校验存在且在用）
    /// - order_qty: 订购数量（> 0）
    /// - requested_delivery_date: 期望交付日期
    /// - notes: 备注
    ///
    /// # 红线
    /// - 序号递增与订单插入在同一事务内完成
    pub fn insert_with_number(
        &self,
        customer_id: i64,
        order_qty: i64,
        requested_delivery_date: NaiveDate,
        notes: Option<&str>,
    ) -> RepositoryResult<Order> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        // 1. 按年分配序号
        tx.execute(
            r#"
            INSERT INTO order_sequence (year, last_seq) VALUES (?1, 1)
            ON CONFLICT(year) DO UPDATE SET last_seq = last_seq + 1
            "#,
            params![now.year()],
        )?;
        let seq: i64 = tx.query_row(
            "SELECT last_seq FROM order_sequence WHERE year = ?1",
            params![now.year()],
            |row| row.get(0),
        )?;
        let order_number = format_order_number(now, seq);

        // 2. 插入订单
        tx.execute(
            r#"
            INSERT INTO orders (
                order_number, customer_id, order_qty, requested_delivery_date,
                status, order_date, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?6, ?6)
            "#,
            params![
                order_number,
                customer_id,
                order_qty,
                requested_delivery_date,
                OrderStatus::Pending.as_str(),
                now,
                notes,
            ],
        )?;
        let id = tx.last_insert_rowid();

        let order = Self::find_by_id_in(&tx, id)?
            .ok_or_else(|| RepositoryError::not_found("Order", id))?;

        tx.commit()?;
        Ok(order)
    }

    /// 按ID查询订单
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Ok(Self::find_by_id_in(&conn, id)?)
    }

    /// 分页查询订单（按ID键集分页）
    ///
    /// # 参数
    /// - filter: 过滤条件
    /// - after_id: 上一页最后一条的ID（首页为 None）
    /// - limit: 每页条数
    pub fn list_page(
        &self,
        filter: &OrderFilter,
        after_id: Option<i64>,
        limit: usize,
    ) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM orders WHERE 1 = 1", ORDER_COLUMNS);
        let mut args: Vec<Value> = Vec::new();

        if let Some(after_id) = after_id {
            sql.push_str(" AND id > ?");
            args.push(Value::Integer(after_id));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(customer_id) = filter.customer_id {
            sql.push_str(" AND customer_id = ?");
            args.push(Value::Integer(customer_id));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND requested_delivery_date >= ?");
            args.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND requested_delivery_date <= ?");
            args.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY id LIMIT ?");
        args.push(Value::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(params_from_iter(args), Self::map_row)?
            .collect::<rusqlite::Result<Vec<Order>>>()?;

        Ok(orders)
    }

    /// 统计某交付日期的订单状态分布
    pub fn status_counts_for_date(
        &self,
        date: NaiveDate,
    ) -> RepositoryResult<HashMap<OrderStatus, i64>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT status, COUNT(*) FROM orders
            WHERE requested_delivery_date = ?1
            GROUP BY status
            "#,
        )?;

        let rows = stmt
            .query_map(params![date], |row| {
                let status: String = row.get(0)?;
                Ok((decode_enum(0, &status, OrderStatus::parse)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().collect())
    }

    /// 交付日期区间内按客户等级统计订单数与已满足订单数（ALLOCATED / FULFILLED）
    pub fn tier_outcomes_between(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<Vec<TierOrderOutcome>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT c.tier, COUNT(o.id),
                   COALESCE(SUM(CASE WHEN o.status IN ('ALLOCATED', 'FULFILLED') THEN 1 ELSE 0 END), 0)
            FROM orders o
            JOIN customer c ON c.id = o.customer_id
            WHERE o.requested_delivery_date >= ?1 AND o.requested_delivery_date <= ?2
              AND o.status != 'CANCELLED'
            GROUP BY c.tier
            "#,
        )?;
        let mut rows = stmt
            .query_map(params![date_from, date_to], |row| {
                let tier: String = row.get(0)?;
                Ok(TierOrderOutcome {
                    tier: decode_enum(0, &tier, CustomerTier::parse)?,
                    total_orders: row.get(1)?,
                    fulfilled_orders: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.sort_by(|a, b| b.tier.cmp(&a.tier));
        Ok(rows)
    }

    /// 统计未结订单数（PENDING / PARTIALLY_ALLOCATED / WAITLISTED）
    pub fn count_open(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let [a, b, c] = OrderStatus::open_statuses();
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE status IN (?1, ?2, ?3)",
            params![a.as_str(), b.as_str(), c.as_str()],
            |row| row.get(0),
        )?)
    }

    /// 取消订单并级联取消其待提货分配与等待中的候补
    ///
    /// # 返回
    /// - Ok(CancelledOrder): 取消后的订单 + 被释放的待提货分配所在日期（升序去重）
    /// - Err(InvalidStateTransition): 订单状态已变化，或存在已提货分配
    ///
    /// # 红线
    /// - 三张表的变更在同一事务内完成
    pub fn cancel_cascade(&self, order_id: i64, from: OrderStatus) -> RepositoryResult<CancelledOrder> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let picked_up: i64 = tx.query_row(
            "SELECT COUNT(*) FROM allocation WHERE order_id = ?1 AND status = 'PICKED_UP'",
            params![order_id],
            |row| row.get(0),
        )?;
        if picked_up > 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: "Order".to_string(),
                from: "PICKED_UP".to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        let affected = tx.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![OrderStatus::Cancelled.as_str(), now, order_id, from.as_str()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: "Order".to_string(),
                from: from.to_string(),
                to: OrderStatus::Cancelled.to_string(),
            });
        }

        let released_dates = {
            let mut stmt = tx.prepare(
                r#"
                SELECT DISTINCT allocation_date FROM allocation
                WHERE order_id = ?1 AND status = 'PENDING'
                ORDER BY allocation_date
                "#,
            )?;
            let rows = stmt.query_map(params![order_id], |row| row.get::<_, NaiveDate>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        tx.execute(
            "UPDATE allocation SET status = 'CANCELLED' WHERE order_id = ?1 AND status = 'PENDING'",
            params![order_id],
        )?;
        tx.execute(
            r#"
            UPDATE waitlist_entry SET status = 'CANCELLED', updated_at = ?1
            WHERE order_id = ?2 AND status = 'WAITING'
            "#,
            params![now, order_id],
        )?;

        let order = Self::find_by_id_in(&tx, order_id)?
            .ok_or_else(|| RepositoryError::not_found("Order", order_id))?;

        tx.commit()?;
        Ok(CancelledOrder {
            order,
            released_dates,
        })
    }

    /// 修改未结订单的数量 / 期望交付日期 / 备注
    ///
    /// # 参数
    /// - current: 调用方读取到的订单（状态、数量、日期作为条件更新的前提）
    /// - changes: 修改内容
    ///
    /// # 规则
    /// - 新数量不得少于锁定量（已提货 + 其他日期的有效分配）
    /// - 存在有效分配的订单不可改期；改期时取消等待中的候补
    /// - 减量时候补缺口同步收紧，缺口归零则关闭候补
    ///
    /// # 返回
    /// - Err(InvalidStateTransition): 订单已被并发修改，或改期时已有分配
    /// - Err(ValidationError): 新数量少于锁定量
    pub fn update_details(&self, current: &Order, changes: &OrderChanges) -> RepositoryResult<Order> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let order_id = current.id;
        let old_date = current.requested_delivery_date;

        let (effective, locked): (i64, i64) = tx.query_row(
            r#"
            SELECT
                COALESCE(SUM(allocated_qty), 0),
                COALESCE(SUM(CASE WHEN status = 'PENDING' AND allocation_date = ?2
                                  THEN 0 ELSE allocated_qty END), 0)
            FROM allocation
            WHERE order_id = ?1 AND status != 'CANCELLED'
            "#,
            params![order_id, old_date],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let new_qty = changes.order_qty.unwrap_or(current.order_qty);
        let new_date = changes.requested_delivery_date.unwrap_or(old_date);
        if new_date != old_date && effective > 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: format!("Order#{}", order_id),
                from: old_date.to_string(),
                to: new_date.to_string(),
            });
        }
        if new_qty < locked {
            return Err(RepositoryError::ValidationError(format!(
                "订购数量 {} 少于已锁定数量 {}",
                new_qty, locked
            )));
        }

        let affected = tx.execute(
            r#"
            UPDATE orders
            SET order_qty = ?1, requested_delivery_date = ?2, notes = COALESCE(?3, notes), updated_at = ?4
            WHERE id = ?5 AND status = ?6 AND order_qty = ?7 AND requested_delivery_date = ?8
            "#,
            params![
                new_qty,
                new_date,
                changes.notes,
                now,
                order_id,
                current.status.as_str(),
                current.order_qty,
                old_date,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: format!("Order#{}", order_id),
                from: current.status.to_string(),
                to: current.status.to_string(),
            });
        }

        if new_date != old_date {
            tx.execute(
                r#"
                UPDATE waitlist_entry SET status = 'CANCELLED', updated_at = ?1
                WHERE order_id = ?2 AND status = 'WAITING'
                "#,
                params![now, order_id],
            )?;
        } else if new_qty < current.order_qty {
            let cap = new_qty - locked;
            if cap > 0 {
                tx.execute(
                    r#"
                    UPDATE waitlist_entry SET unmet_qty = MIN(unmet_qty, ?1), updated_at = ?2
                    WHERE order_id = ?3 AND status = 'WAITING'
                    "#,
                    params![cap, now, order_id],
                )?;
            } else {
                WaitlistRepository::fulfill_waiting_in(&tx, order_id, old_date)?;
            }
        }

        let order = Self::find_by_id_in(&tx, order_id)?
            .ok_or_else(|| RepositoryError::not_found("Order", order_id))?;

        tx.commit()?;
        Ok(order)
    }

    /// 条件更新订单状态（事务内使用）
    ///
    /// 未命中（状态已被并发修改）时返回 InvalidStateTransition
    pub(crate) fn transition_in(
        conn: &Connection,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> RepositoryResult<()> {
        let affected = conn.execute(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
            params![to.as_str(), Utc::now(), order_id, from.as_str()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::InvalidStateTransition {
                entity: format!("Order#{}", order_id),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
