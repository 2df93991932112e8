// ==========================================
// 雏鸡订单分配系统 - 订单领域模型
// ==========================================
// 红线: order_qty > 0；状态变更必须经过状态机校验
// ==========================================

use crate::domain::customer::CustomerSummary;
use crate::domain::types::OrderStatus;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_number: String, // 订单号 ORD-{年}-{序号}
    pub customer_id: i64,

    pub order_qty: i64,
    pub requested_delivery_date: NaiveDate,
    pub status: OrderStatus,

    pub order_date: DateTime<Utc>, // 下单时间（排序键之一）
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 订单 + 客户摘要（接口返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<CustomerSummary>,
    /// 已分配数量（不含已取消分配）
    pub allocated_qty: i64,
}

/// 订单修改内容（None 表示该项不变）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderChanges {
    pub order_qty: Option<i64>,
    pub requested_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl OrderChanges {
    pub fn is_empty(&self) -> bool {
        self.order_qty.is_none() && self.requested_delivery_date.is_none() && self.notes.is_none()
    }
}

/// 订单查询过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<i64>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl OrderFilter {
    /// 是否命中（内存过滤，与仓储 SQL 口径一致）
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }
        if let Some(customer_id) = self.customer_id {
            if order.customer_id != customer_id {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if order.requested_delivery_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if order.requested_delivery_date > to {
                return false;
            }
        }
        true
    }
}

/// 生成订单号
///
/// 格式: ORD-{YYYY}-{seq:06}，序号按年单调递增
pub fn format_order_number(order_date: DateTime<Utc>, seq: i64) -> String {
    format!("ORD-{}-{:06}", order_date.year(), seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_order_number() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(format_order_number(ts, 1), "ORD-2026-000001");
        assert_eq!(format_order_number(ts, 123456), "ORD-2026-123456");
    }

    #[test]
    fn test_order_filter_matches() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let order = Order {
            id: 1,
            order_number: "ORD-2026-000001".to_string(),
            customer_id: 7,
            order_qty: 100,
            requested_delivery_date: date,
            status: OrderStatus::Pending,
            order_date: Utc::now(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(OrderFilter::default().matches(&order));
        assert!(OrderFilter {
            customer_id: Some(7),
            date_from: Some(date),
            date_to: Some(date),
            ..Default::default()
        }
        .matches(&order));
        assert!(!OrderFilter {
            status: Some(OrderStatus::Allocated),
            ..Default::default()
        }
        .matches(&order));
        assert!(!OrderFilter {
            date_from: date.succ_opt(),
            ..Default::default()
        }
        .matches(&order));
    }
}
