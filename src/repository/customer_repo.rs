// ==========================================
// 雏鸡订单分配系统 - 客户数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::db::decode_enum;
use crate::domain::customer::{Customer, NewCustomer};
use crate::domain::types::CustomerTier;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CUSTOMER_COLUMNS: &str = r#"
    id, customer_code, farm_name, phone, email, zone, address,
    tier, last_fulfilled_date, is_active, created_at, updated_at
"#;

// ==========================================
// CustomerRepository - 客户仓储
// ==========================================
pub struct CustomerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerRepository {
    /// 从共享连接创建仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub(crate) fn map_row(row: &Row) -> rusqlite::Result<Customer> {
        let tier: String = row.get(7)?;
        Ok(Customer {
            id: row.get(0)?,
            customer_code: row.get(1)?,
            farm_name: row.get(2)?,
            phone: row.get(3)?,
            email: row.get(4)?,
            zone: row.get(5)?,
            address: row.get(6)?,
            tier: decode_enum(7, &tier, CustomerTier::parse)?,
            last_fulfilled_date: row.get(8)?,
            is_active: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    /// 新建客户
    ///
    /// # 返回
    /// - Ok(Customer): 新建的客户（含自增ID）
    /// - Err(UniqueConstraintViolation): customer_code 重复
    pub fn insert(&self, new_customer: &NewCustomer) -> RepositoryResult<Customer> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        conn.execute(
            r#"
            INSERT INTO customer (
                customer_code, farm_name, phone, email, zone, address,
                tier, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            "#,
            params![
                new_customer.customer_code,
                new_customer.farm_name,
                new_customer.phone,
                new_customer.email,
                new_customer.zone,
                new_customer.address,
                new_customer.tier.as_str(),
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {} FROM customer WHERE id = ?1", CUSTOMER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row)?)
    }

    /// 按客户编码插入或更新（CSV 导入使用）
    ///
    /// # 返回
    /// - Ok((Customer, true)): 新建
    /// - Ok((Customer, false)): 更新已有客户
    pub fn upsert_by_code(&self, new_customer: &NewCustomer) -> RepositoryResult<(Customer, bool)> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM customer WHERE customer_code = ?1",
                params![new_customer.customer_code],
                |row| row.get(0),
            )
            .optional()?;

        let (id, created) = match existing {
            Some(id) => {
                conn.execute(
                    r#"
                    UPDATE customer
                    SET farm_name = ?1, phone = ?2, email = ?3, zone = ?4,
                        address = ?5, tier = ?6, updated_at = ?7
                    WHERE id = ?8
                    "#,
                    params![
                        new_customer.farm_name,
                        new_customer.phone,
                        new_customer.email,
                        new_customer.zone,
                        new_customer.address,
                        new_customer.tier.as_str(),
                        now,
                        id,
                    ],
                )?;
                (id, false)
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO customer (
                        customer_code, farm_name, phone, email, zone, address,
                        tier, is_active, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
                    "#,
                    params![
                        new_customer.customer_code,
                        new_customer.farm_name,
                        new_customer.phone,
                        new_customer.email,
                        new_customer.zone,
                        new_customer.address,
                        new_customer.tier.as_str(),
                        now,
                    ],
                )?;
                (conn.last_insert_rowid(), true)
            }
        };

        let sql = format!("SELECT {} FROM customer WHERE id = ?1", CUSTOMER_COLUMNS);
        let customer = conn.query_row(&sql, params![id], Self::map_row)?;
        Ok((customer, created))
    }

    /// 按ID查询客户
    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Customer>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM customer WHERE id = ?1", CUSTOMER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row).optional()?)
    }

    /// 查询客户列表
    ///
    /// # 参数
    /// - tier: 可选等级过滤
    /// - zone: 可选区域过滤
    /// - is_active: 是否在用（默认只看在用客户）
    pub fn list(
        &self,
        tier: Option<CustomerTier>,
        zone: Option<&str>,
        is_active: bool,
    ) -> RepositoryResult<Vec<Customer>> {
        let conn = self.get_conn()?;

        let mut sql = format!("SELECT {} FROM customer WHERE is_active = ?", CUSTOMER_COLUMNS);
        let mut args: Vec<Value> = vec![Value::Integer(is_active as i64)];

        if let Some(tier) = tier {
            sql.push_str(" AND tier = ?");
            args.push(Value::Text(tier.as_str().to_string()));
        }
        if let Some(zone) = zone {
            sql.push_str(" AND zone = ?");
            args.push(Value::Text(zone.to_string()));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let customers = stmt
            .query_map(params_from_iter(args), Self::map_row)?
            .collect::<rusqlite::Result<Vec<Customer>>>()?;

        Ok(customers)
    }

    /// 调整客户等级
    pub fn update_tier(&self, id: i64, tier: CustomerTier) -> RepositoryResult<Customer> {
        let conn = self.get_conn()?;

        let affected = conn.execute(
            "UPDATE customer SET tier = ?1, updated_at = ?2 WHERE id = ?3",
            params![tier.as_str(), Utc::now(), id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("Customer", id));
        }

        let sql = format!("SELECT {} FROM customer WHERE id = ?1", CUSTOMER_COLUMNS);
        Ok(conn.query_row(&sql, params![id], Self::map_row)?)
    }

    /// 统计在用客户数
    pub fn count_active(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM customer WHERE is_active = 1",
            [],
            |row| row.get(0),
        )?)
    }

    /// 在用客户按等级计数
    pub fn count_active_by_tier(&self) -> RepositoryResult<HashMap<CustomerTier, i64>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT tier, COUNT(*) FROM customer WHERE is_active = 1 GROUP BY tier")?;
        let rows = stmt
            .query_map([], |row| {
                let tier: String = row.get(0)?;
                Ok((decode_enum(0, &tier, CustomerTier::parse)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
    }

    /// 记录客户最近一次提货日期
    pub fn touch_last_fulfilled(&self, id: i64, date: NaiveDate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE customer SET last_fulfilled_date = ?1, updated_at = ?2 WHERE id = ?3",
            params![date, Utc::now(), id],
        )?;
        Ok(())
    }
}
