// ==========================================
// 雏鸡订单分配系统 - 分配优先级排序
// ==========================================
// 职责: 候选订单与候补队列的确定性排序
// 红线: 排序必须是全序（订单号唯一，作为最终决胜键）
// ==========================================

use crate::domain::allocation::WaitlistView;
use crate::domain::allocation_plan::{AllocationCandidate, BacklogEntry};
use crate::domain::types::CustomerTier;
use std::cmp::Ordering;

// ==========================================
// AllocationPrioritySorter - 优先级排序
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationPrioritySorter {
    // 无状态引擎,不需要注入依赖
}

impl AllocationPrioritySorter {
    pub fn new() -> Self {
        Self {}
    }

    /// 排序候选订单
    ///
    /// 排序键:
    /// 1) 客户等级降序 (GOLD > SILVER > STANDARD)
    /// 2) 下单时间升序 (先到先得)
    /// 3) 订单号升序
    pub fn sort_candidates(&self, mut candidates: Vec<AllocationCandidate>) -> Vec<AllocationCandidate> {
        candidates.sort_by(|a, b| self.compare_candidates(a, b));
        candidates
    }

    pub fn compare_candidates(&self, a: &AllocationCandidate, b: &AllocationCandidate) -> Ordering {
        compare_keys(
            (a.tier, a.order_date, &a.order_number),
            (b.tier, b.order_date, &b.order_number),
        )
    }

    /// 排序候补队列
    ///
    /// 排序键:
    /// 1) 客户等级降序
    /// 2) 入队时间升序
    /// 3) 订单号升序
    pub fn sort_backlog(&self, mut entries: Vec<BacklogEntry>) -> Vec<BacklogEntry> {
        entries.sort_by(|a, b| {
            compare_keys(
                (a.tier, a.enqueued_at, &a.order_number),
                (b.tier, b.enqueued_at, &b.order_number),
            )
        });
        entries
    }

    /// 排序候补视图并写入 1 起始的名次
    pub fn rank_waitlist(&self, mut views: Vec<WaitlistView>) -> Vec<WaitlistView> {
        views.sort_by(|a, b| {
            let tier_a = a.customer.as_ref().map(|c| c.tier).unwrap_or(CustomerTier::Standard);
            let tier_b = b.customer.as_ref().map(|c| c.tier).unwrap_or(CustomerTier::Standard);
            compare_keys(
                (tier_a, a.entry.enqueued_at, &a.order_number),
                (tier_b, b.entry.enqueued_at, &b.order_number),
            )
        });
        for (idx, view) in views.iter_mut().enumerate() {
            view.entry.priority_rank = (idx + 1) as u32;
        }
        views
    }
}

/// (等级降序, 时间升序, 订单号升序)
fn compare_keys<T: Ord>(a: (CustomerTier, T, &String), b: (CustomerTier, T, &String)) -> Ordering {
    b.0.cmp(&a.0)
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(b.2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn candidate(number: &str, tier: CustomerTier, minutes: i64) -> AllocationCandidate {
        AllocationCandidate {
            order_id: 0,
            order_number: number.to_string(),
            customer_id: 0,
            tier,
            order_date: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
            order_qty: 10,
            status: OrderStatus::Pending,
            allocated_elsewhere: 0,
            picked_up_on_date: 0,
        }
    }

    #[test]
    fn test_tier_dominates_order_date() {
        let sorter = AllocationPrioritySorter::new();
        let sorted = sorter.sort_candidates(vec![
            candidate("ORD-2026-000001", CustomerTier::Standard, 0),
            candidate("ORD-2026-000002", CustomerTier::Gold, 30),
            candidate("ORD-2026-000003", CustomerTier::Silver, 10),
        ]);

        let numbers: Vec<_> = sorted.iter().map(|c| c.order_number.as_str()).collect();
        assert_eq!(
            numbers,
            vec!["ORD-2026-000002", "ORD-2026-000003", "ORD-2026-000001"]
        );
    }

    #[test]
    fn test_order_number_breaks_ties() {
        let sorter = AllocationPrioritySorter::new();
        let sorted = sorter.sort_candidates(vec![
            candidate("ORD-2026-000009", CustomerTier::Gold, 0),
            candidate("ORD-2026-000004", CustomerTier::Gold, 0),
        ]);
        assert_eq!(sorted[0].order_number, "ORD-2026-000004");
    }
}
