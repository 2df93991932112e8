// ==========================================
// 看板与报表集成测试
// ==========================================

mod test_helpers;

use chickflow::domain::order::OrderFilter;
use chickflow::domain::types::{CustomerTier, OrderStatus};
use chickflow::engine::EngineError;
use chrono::Duration;
use test_helpers::{delivery_day, TestEnv};

/// A(Gold 60) + B(Standard 50)，供给 100
fn scenario(env: &TestEnv) {
    let day = delivery_day();
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    env.order(&gold, 60, day);
    env.order(&standard, 50, day);
    env.confirm_supply(day, 100);
    env.orchestrator.run_date(day).unwrap();
}

#[test]
fn test_空库看板全为零() {
    let env = TestEnv::new();
    let stats = env.stats.dashboard_stats(delivery_day()).unwrap();

    assert_eq!(stats.today.expected_supply, 0);
    assert_eq!(stats.today.actual_supply, 0);
    assert_eq!(stats.today.allocated, 0);
    assert_eq!(stats.today.remaining, 0);
    assert_eq!(stats.today.total_orders, 0);
    assert_eq!(stats.overall.total_customers, 0);
    assert_eq!(stats.overall.pending_orders, 0);
    assert_eq!(stats.overall.waitlist_count, 0);
}

#[test]
fn test_分配后看板统计() {
    let env = TestEnv::new();
    scenario(&env);

    let stats = env.stats.dashboard_stats(delivery_day()).unwrap();
    assert_eq!(stats.today.expected_supply, 100);
    assert_eq!(stats.today.actual_supply, 100);
    assert_eq!(stats.today.allocated, 100);
    assert_eq!(stats.today.remaining, 0);
    assert_eq!(stats.today.total_orders, 2);
    assert_eq!(stats.today.allocations, 2);
    assert_eq!(stats.overall.total_customers, 2);
    // B 部分分配仍算未完结
    assert_eq!(stats.overall.pending_orders, 1);
    assert_eq!(stats.overall.waitlist_count, 1);
}

#[test]
fn test_日报按等级汇总() {
    let env = TestEnv::new();
    scenario(&env);

    let summary = env.stats.daily_summary(delivery_day()).unwrap();
    assert_eq!(summary.inventory.expected_supply, 100);
    assert_eq!(summary.inventory.actual_supply, Some(100));
    assert_eq!(summary.inventory.allocated, 100);
    assert_eq!(summary.inventory.remaining, 0);

    assert_eq!(summary.allocations.total_count, 2);
    assert_eq!(summary.allocations.total_qty, 100);
    let gold = summary
        .allocations
        .by_tier
        .iter()
        .find(|t| t.tier == CustomerTier::Gold)
        .unwrap();
    assert_eq!(gold.total_qty, 60);

    assert_eq!(summary.orders.total, 2);
    assert_eq!(summary.orders.allocated, 1);
    assert_eq!(summary.orders.partially_allocated, 1);
}

#[test]
fn test_周报七天明细() {
    let env = TestEnv::new();
    scenario(&env);
    let end = delivery_day() + Duration::days(2);

    let weekly = env.stats.weekly_summary(end).unwrap();
    assert_eq!(weekly.period.end_date, end);
    assert_eq!(weekly.period.start_date, end - Duration::days(6));
    assert_eq!(weekly.daily_breakdown.len(), 7);
    assert_eq!(weekly.totals.supply, 100);
    assert_eq!(weekly.totals.allocated, 100);
    assert_eq!(weekly.totals.remaining, 0);

    let day = weekly
        .daily_breakdown
        .iter()
        .find(|d| d.date == delivery_day())
        .unwrap();
    assert_eq!(day.allocation_count, 2);
    assert!(weekly
        .daily_breakdown
        .iter()
        .filter(|d| d.date != delivery_day())
        .all(|d| d.supply == 0 && d.allocated == 0));
}

#[test]
fn test_月报汇总与日均() {
    let env = TestEnv::new();
    scenario(&env);

    let monthly = env.stats.monthly_summary(2026, 3).unwrap();
    assert_eq!(monthly.period.year, 2026);
    assert_eq!(monthly.period.month, 3);
    assert_eq!(monthly.totals.supply, 100);
    assert_eq!(monthly.totals.allocated, 100);
    assert_eq!(monthly.totals.allocation_count, 2);
    assert_eq!(monthly.totals.remaining, 0);
    assert_eq!(monthly.totals.working_days, 1);
    assert_eq!(monthly.daily_average.supply, 100.0);
    let standard = monthly
        .tier_breakdown
        .iter()
        .find(|t| t.tier == CustomerTier::Standard)
        .unwrap();
    assert_eq!(standard.total_qty, 40);

    // 其他月份没有数据
    let april = env.stats.monthly_summary(2026, 4).unwrap();
    assert_eq!(april.totals.working_days, 0);
    assert_eq!(april.daily_average.allocated, 0.0);

    assert!(matches!(
        env.stats.monthly_summary(2026, 13),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_客户分析头部客户与满足率() {
    let env = TestEnv::new();
    scenario(&env);

    let analytics = env.stats.customer_analytics(delivery_day(), 30).unwrap();
    assert_eq!(analytics.period.end_date, delivery_day());
    assert_eq!(analytics.period.start_date, delivery_day() - Duration::days(30));

    let codes: Vec<&str> = analytics
        .top_customers
        .iter()
        .map(|c| c.customer_code.as_str())
        .collect();
    assert_eq!(codes, vec!["A001", "B001"]);
    assert_eq!(analytics.top_customers[0].total_qty, 60);
    assert_eq!(analytics.top_customers[1].total_qty, 40);

    let gold_count = analytics
        .tier_distribution
        .iter()
        .find(|t| t.tier == CustomerTier::Gold)
        .unwrap();
    assert_eq!(gold_count.count, 1);

    let gold = analytics
        .fulfillment_by_tier
        .iter()
        .find(|t| t.tier == CustomerTier::Gold)
        .unwrap();
    assert_eq!((gold.total_orders, gold.fulfilled_orders), (1, 1));
    assert_eq!(gold.fulfillment_rate, 100.0);
    let standard = analytics
        .fulfillment_by_tier
        .iter()
        .find(|t| t.tier == CustomerTier::Standard)
        .unwrap();
    assert_eq!(standard.fulfilled_orders, 0);
    assert_eq!(standard.fulfillment_rate, 0.0);

    assert!(matches!(
        env.stats.customer_analytics(delivery_day(), 0),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_候补分析兑现率与等待天数() {
    let env = TestEnv::new();
    scenario(&env);

    let before = env.stats.waitlist_analysis(delivery_day(), 30).unwrap();
    assert_eq!(before.overall.total_waitlist_entries, 1);
    assert_eq!(before.overall.still_waiting, 1);
    assert_eq!(before.overall.fulfilled, 0);
    assert_eq!(before.overall.fulfillment_rate, 0.0);

    // 次日供给 10 兑现 B 的候补缺口
    let next_day = delivery_day() + Duration::days(1);
    env.confirm_supply(next_day, 10);
    env.orchestrator.run_date(next_day).unwrap();

    let after = env.stats.waitlist_analysis(next_day, 30).unwrap();
    assert_eq!(after.overall.total_waitlist_entries, 1);
    assert_eq!(after.overall.fulfilled, 1);
    assert_eq!(after.overall.still_waiting, 0);
    assert_eq!(after.overall.fulfillment_rate, 100.0);
    assert_eq!(after.overall.avg_wait_time_days, 1.0);
    assert_eq!(after.by_tier.len(), 1);
    assert_eq!(after.by_tier[0].tier, CustomerTier::Standard);
}

#[test]
fn test_订单列表惰性分页且可重复迭代() {
    let env = TestEnv::new();
    let customer = env.customer("A001", CustomerTier::Silver);
    for i in 0..7 {
        env.order(&customer, 10 + i, delivery_day());
    }

    let list = env
        .order_book
        .list_orders(OrderFilter {
            status: Some(OrderStatus::Pending),
            ..Default::default()
        })
        .with_page_size(3);

    let first: Vec<i64> = list.iter().map(|o| o.unwrap().order_qty).collect();
    assert_eq!(first, vec![10, 11, 12, 13, 14, 15, 16]);

    // 每次 iter() 都从头开始
    let second: Vec<i64> = list.iter().take(2).map(|o| o.unwrap().id).collect();
    assert_eq!(second.len(), 2);
    assert_eq!(list.iter().count(), 7);

    let none = env.order_book.list_orders(OrderFilter {
        status: Some(OrderStatus::Cancelled),
        ..Default::default()
    });
    assert_eq!(none.iter().count(), 0);
}
