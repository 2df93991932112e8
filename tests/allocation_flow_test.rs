// ==========================================
// 单日分配流程集成测试
// ==========================================
// 职责: 供给确认 → 分配 → 候补 → 提货 → 取消重算 的端到端行为
// ==========================================

mod test_helpers;

use chickflow::config::AllocationRules;
use chickflow::domain::order::OrderChanges;
use chickflow::domain::types::{AllocationStatus, CustomerTier, OrderStatus, WaitlistStatus};
use chickflow::engine::EngineError;
use chickflow::repository::AllocationFilter;
use chrono::{Duration, Utc};
use test_helpers::{delivery_day, TestEnv};

fn allocations_of(env: &TestEnv, order_id: i64) -> Vec<chickflow::Allocation> {
    env.allocation_repo
        .list(&AllocationFilter {
            order_id: Some(order_id),
            ..Default::default()
        })
        .unwrap()
}

// ==========================================
// 基本场景
// ==========================================

#[test]
fn test_合同客户优先_普通客户部分分配并候补() {
    let env = TestEnv::new();
    let day = delivery_day();
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);

    // 普通客户先下单，等级仍然优先
    let order_b = env.order(&standard, 50, day);
    let order_a = env.order(&gold, 60, day);
    env.confirm_supply(day, 100);

    let outcome = env.orchestrator.run_date(day).unwrap();

    assert_eq!(outcome.supply_available, 100);
    assert_eq!(outcome.allocated_total, 100);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(outcome.allocated.len(), 2);
    assert_eq!(outcome.allocated[0].order_id, order_a.id);
    assert_eq!(outcome.allocated[0].qty, 60);
    assert_eq!(outcome.allocated[1].order_id, order_b.id);
    assert_eq!(outcome.allocated[1].qty, 40);
    assert_eq!(outcome.waitlisted.len(), 1);
    assert_eq!(outcome.waitlisted[0].order_id, order_b.id);
    assert_eq!(outcome.waitlisted[0].qty, 10);

    assert_eq!(env.reload(&order_a).status, OrderStatus::Allocated);
    assert_eq!(env.reload(&order_b).status, OrderStatus::PartiallyAllocated);

    let entry = env.waitlist_repo.find_waiting(order_b.id).unwrap().unwrap();
    assert_eq!(entry.unmet_qty, 10);
    assert_eq!(entry.target_date, day);
    assert_eq!(entry.status, WaitlistStatus::Waiting);

    let alloc_a = allocations_of(&env, order_a.id);
    assert_eq!(alloc_a.len(), 1);
    assert_eq!(alloc_a[0].status, AllocationStatus::Pending);
    assert!(alloc_a[0].pickup_deadline.is_some());
}

#[test]
fn test_重复运行结果不变() {
    let env = TestEnv::new();
    let day = delivery_day();
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    let order_a = env.order(&gold, 60, day);
    let order_b = env.order(&standard, 50, day);
    env.confirm_supply(day, 100);

    env.orchestrator.run_date(day).unwrap();
    let first_a = allocations_of(&env, order_a.id);

    let second = env.orchestrator.run_date(day).unwrap();
    assert_eq!(second.committed_qty, 60);
    assert_eq!(second.allocated_total, 40);

    // 已完全分配的订单不再参与重算，分配记录保持不变
    assert_eq!(allocations_of(&env, order_a.id), first_a);
    assert_eq!(env.allocation_repo.effective_qty_for_order(order_b.id).unwrap(), 40);
    assert_eq!(env.reload(&order_b).status, OrderStatus::PartiallyAllocated);
    assert_eq!(
        env.waitlist_repo.find_waiting(order_b.id).unwrap().unwrap().unmet_qty,
        10
    );
}

#[test]
fn test_分配总量不超过供给() {
    let env = TestEnv::new();
    let day = delivery_day();
    let tiers = [CustomerTier::Gold, CustomerTier::Silver, CustomerTier::Standard];
    let mut orders = Vec::new();
    for i in 0..9 {
        let customer = env.customer(&format!("C{:03}", i), tiers[i % 3]);
        orders.push(env.order(&customer, 7 + i as i64, day));
    }
    env.confirm_supply(day, 37);

    let outcome = env.orchestrator.run_date(day).unwrap();
    assert_eq!(outcome.allocated_total, 37);

    let total: i64 = orders
        .iter()
        .map(|o| env.allocation_repo.effective_qty_for_order(o.id).unwrap())
        .sum();
    assert_eq!(total, 37);

    for order in &orders {
        let granted = env.allocation_repo.effective_qty_for_order(order.id).unwrap();
        assert!(granted <= order.order_qty);
    }
}

#[test]
fn test_未确认时按预计供给分配() {
    let env = TestEnv::new();
    let day = delivery_day();
    let customer = env.customer("S001", CustomerTier::Silver);
    let order = env.order(&customer, 50, day);
    env.ledger.set_expected_supply(day, 30, None).unwrap();

    let outcome = env.orchestrator.run_date(day).unwrap();
    assert_eq!(outcome.supply_available, 30);
    assert_eq!(env.allocation_repo.effective_qty_for_order(order.id).unwrap(), 30);
}

#[test]
fn test_单日上限() {
    let env = TestEnv::with_rules(AllocationRules {
        max_per_order_per_day: 25,
        ..AllocationRules::default()
    });
    let day = delivery_day();
    let customer = env.customer("G001", CustomerTier::Gold);
    let order = env.order(&customer, 40, day);
    env.confirm_supply(day, 100);

    let outcome = env.orchestrator.run_date(day).unwrap();
    assert_eq!(outcome.allocated_total, 25);
    assert_eq!(outcome.remaining, 75);
    assert_eq!(env.reload(&order).status, OrderStatus::PartiallyAllocated);
}

// ==========================================
// 错误场景
// ==========================================

#[test]
fn test_无供给数据不写入() {
    let env = TestEnv::new();
    let day = delivery_day();
    let customer = env.customer("A001", CustomerTier::Gold);
    let order = env.order(&customer, 10, day);

    let err = env.orchestrator.run_date(day).unwrap_err();
    assert!(matches!(err, EngineError::NoSupplyData { .. }));

    assert!(allocations_of(&env, order.id).is_empty());
    assert_eq!(env.reload(&order).status, OrderStatus::Pending);
    assert!(env.waitlist_repo.find_waiting(order.id).unwrap().is_none());
}

#[test]
fn test_覆写后超额承诺() {
    let env = TestEnv::new();
    let day = delivery_day();
    let customer = env.customer("A001", CustomerTier::Gold);
    let order = env.order(&customer, 60, day);
    env.confirm_supply(day, 100);
    env.orchestrator.run_date(day).unwrap();

    // 已完全分配的 60 不可重算，供给下调到 40 后超额
    env.ledger
        .override_actual_supply(day, 40, "hatchery recount", "admin")
        .unwrap();
    let err = env.orchestrator.run_date(day).unwrap_err();
    assert!(matches!(
        err,
        EngineError::OverCommitted {
            committed: 60,
            supply: 40,
            ..
        }
    ));
    assert_eq!(env.allocation_repo.effective_qty_for_order(order.id).unwrap(), 60);

    let audits = env.ledger.list_audits(day).unwrap();
    assert_eq!(audits.len(), 1);
}

#[test]
fn test_非法数量不落库() {
    let env = TestEnv::new();
    let day = delivery_day();
    let customer = env.customer("A001", CustomerTier::Gold);

    let err = env.order_book.create_order(customer.id, 0, day, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity(_)));
    let err = env.order_book.create_order(customer.id, -5, day, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity(_)));

    let err = env.order_book.create_order(9999, 10, day, None).unwrap_err();
    assert!(matches!(err, EngineError::UnknownCustomer(9999)));

    let count = env
        .order_book
        .list_orders(Default::default())
        .iter()
        .count();
    assert_eq!(count, 0);
}

#[test]
fn test_重复确认供给() {
    let env = TestEnv::new();
    let day = delivery_day();
    env.confirm_supply(day, 100);

    let err = env.ledger.confirm_actual_supply(day, 120, None).unwrap_err();
    assert!(matches!(err, EngineError::AlreadyConfirmed { .. }));
    assert_eq!(env.ledger.get_supply(day).unwrap().actual_supply, Some(100));

    let err = env.ledger.set_expected_supply(day, -1, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity(_)));
}

// ==========================================
// 提货与取消
// ==========================================

#[test]
fn test_提货完成订单() {
    let env = TestEnv::new();
    let day = delivery_day();
    let customer = env.customer("A001", CustomerTier::Gold);
    let order = env.order(&customer, 60, day);
    env.confirm_supply(day, 100);
    env.orchestrator.run_date(day).unwrap();

    let allocation = allocations_of(&env, order.id).remove(0);
    let outcome = env
        .allocation_repo
        .mark_picked_up(&allocation.allocation_id, Utc::now())
        .unwrap();

    assert!(outcome.order_fulfilled);
    assert_eq!(outcome.order.status, OrderStatus::Fulfilled);
    assert_eq!(outcome.allocation.status, AllocationStatus::PickedUp);

    let customer = env.customer_repo.find_by_id(customer.id).unwrap().unwrap();
    assert_eq!(customer.last_fulfilled_date, Some(day));

    // 已提货不可重复确认，也不可取消
    assert!(env
        .allocation_repo
        .mark_picked_up(&allocation.allocation_id, Utc::now())
        .is_err());
    let err = env.order_book.cancel_order(order.id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[test]
fn test_取消订单后重算释放供给() {
    let env = TestEnv::inline();
    let day = delivery_day();
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    let order_a = env.order(&gold, 60, day);
    let order_b = env.order(&standard, 50, day);

    // 同步模式: 确认供给即执行分配
    env.confirm_supply(day, 100);
    assert_eq!(env.reload(&order_b).status, OrderStatus::PartiallyAllocated);

    let cancelled = env.order_book.cancel_order(order_a.id).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(allocations_of(&env, order_a.id)
        .iter()
        .all(|a| a.status == AllocationStatus::Cancelled));

    // 取消释放的 60 由重算分给 B
    assert_eq!(env.reload(&order_b).status, OrderStatus::Allocated);
    assert_eq!(env.allocation_repo.effective_qty_for_order(order_b.id).unwrap(), 50);
    assert!(env.waitlist_repo.find_waiting(order_b.id).unwrap().is_none());

    let err = env.order_book.cancel_order(order_a.id).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[test]
fn test_级联取消返回全部释放日期() {
    let env = TestEnv::new();
    let day = delivery_day();
    let next_day = day + Duration::days(1);
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    env.order(&gold, 60, day);
    let order_b = env.order(&standard, 50, day);

    env.confirm_supply(day, 100);
    env.orchestrator.run_date(day).unwrap();
    // 次日剩余供给晋升给 B 的候补缺口
    env.confirm_supply(next_day, 10);
    let outcome = env.orchestrator.run_date(next_day).unwrap();
    assert_eq!(outcome.promoted.len(), 1);

    let current = env.reload(&order_b);
    let cancelled = env
        .order_repo
        .cancel_cascade(order_b.id, current.status)
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.released_dates, vec![day, next_day]);
    assert!(allocations_of(&env, order_b.id)
        .iter()
        .all(|a| a.status == AllocationStatus::Cancelled));
}

// ==========================================
// 修改订单
// ==========================================

fn qty_change(qty: i64) -> OrderChanges {
    OrderChanges {
        order_qty: Some(qty),
        ..Default::default()
    }
}

#[test]
fn test_修改订单数量必须大于0() {
    let env = TestEnv::new();
    let customer = env.customer("A001", CustomerTier::Silver);
    let order = env.order(&customer, 30, delivery_day());

    for qty in [0, -5] {
        let err = env.order_book.update_order(order.id, qty_change(qty)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity(_)));
    }
    let err = env
        .order_book
        .update_order(order.id, OrderChanges::default())
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidInput(_)));
    assert_eq!(env.reload(&order).order_qty, 30);
}

#[test]
fn test_减少数量后重算同日分配() {
    let env = TestEnv::inline();
    let day = delivery_day();
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    let order_a = env.order(&gold, 60, day);
    let order_b = env.order(&standard, 50, day);
    env.confirm_supply(day, 100);
    assert_eq!(env.reload(&order_b).status, OrderStatus::PartiallyAllocated);

    // A 已全额分配，不可再改
    let err = env.order_book.update_order(order_a.id, qty_change(30)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    // B 减到 40 后重算即可全额满足，候补关闭
    let updated = env.order_book.update_order(order_b.id, qty_change(40)).unwrap();
    assert_eq!(updated.order_qty, 40);
    assert_eq!(env.reload(&order_b).status, OrderStatus::Allocated);
    assert_eq!(env.allocation_repo.effective_qty_for_order(order_b.id).unwrap(), 40);
    assert!(env.waitlist_repo.find_waiting(order_b.id).unwrap().is_none());
    assert_eq!(env.allocation_repo.effective_qty_for_order(order_a.id).unwrap(), 60);
}

#[test]
fn test_数量不得少于其他日期已分配量() {
    let env = TestEnv::new();
    let day = delivery_day();
    let next_day = day + Duration::days(1);
    let gold = env.customer("A001", CustomerTier::Gold);
    let standard = env.customer("B001", CustomerTier::Standard);
    env.order(&gold, 60, day);
    let order_b = env.order(&standard, 50, day);
    env.confirm_supply(day, 100);
    env.orchestrator.run_date(day).unwrap();
    // 次日晋升 B 的 5 只，缺口还剩 5
    env.confirm_supply(next_day, 5);
    env.orchestrator.run_date(next_day).unwrap();
    assert_eq!(env.reload(&order_b).status, OrderStatus::PartiallyAllocated);

    let err = env.order_book.update_order(order_b.id, qty_change(3)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuantity(_)));
    assert_eq!(env.reload(&order_b).order_qty, 50);
}

#[test]
fn test_已有分配的订单不可改期() {
    let env = TestEnv::new();
    let day = delivery_day();
    let standard = env.customer("B001", CustomerTier::Standard);
    let order = env.order(&standard, 50, day);
    env.confirm_supply(day, 20);
    env.orchestrator.run_date(day).unwrap();
    assert_eq!(env.reload(&order).status, OrderStatus::PartiallyAllocated);

    let err = env
        .order_book
        .update_order(
            order.id,
            OrderChanges {
                requested_delivery_date: Some(day + Duration::days(3)),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(env.reload(&order).requested_delivery_date, day);
}

#[test]
fn test_候补订单改期到新日期() {
    let env = TestEnv::new();
    let day = delivery_day();
    let later = day + Duration::days(5);
    let customer = env.customer("A001", CustomerTier::Silver);
    let order = env.order(&customer, 20, day);
    env.confirm_supply(day, 0);
    env.orchestrator.run_date(day).unwrap();
    assert_eq!(env.reload(&order).status, OrderStatus::Waitlisted);
    assert!(env.waitlist_repo.find_waiting(order.id).unwrap().is_some());

    let updated = env
        .order_book
        .update_order(
            order.id,
            OrderChanges {
                requested_delivery_date: Some(later),
                notes: Some("改到下周".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.requested_delivery_date, later);
    assert_eq!(updated.notes.as_deref(), Some("改到下周"));
    // 原日期的候补随改期取消
    assert!(env.waitlist_repo.find_waiting(order.id).unwrap().is_none());
    assert_eq!(
        env.waitlist_repo.list_by_order(order.id).unwrap()[0].status,
        WaitlistStatus::Cancelled
    );

    env.confirm_supply(later, 30);
    env.orchestrator.run_date(later).unwrap();
    assert_eq!(env.reload(&order).status, OrderStatus::Allocated);
    assert_eq!(env.allocation_repo.effective_qty_for_order(order.id).unwrap(), 20);
}

// ==========================================
// 候补晋升
// ==========================================

#[test]
fn test_候补按等级晋升() {
    let env = TestEnv::new();
    let day = delivery_day();
    let next_day = day + Duration::days(1);
    let standard = env.customer("S001", CustomerTier::Standard);
    let gold = env.customer("G001", CustomerTier::Gold);

    // 普通客户先下单
    let order_s = env.order(&standard, 20, day);
    let order_g = env.order(&gold, 20, day);

    env.confirm_supply(day, 0);
    let outcome = env.orchestrator.run_date(day).unwrap();
    assert_eq!(outcome.allocated_total, 0);
    assert_eq!(outcome.waitlisted.len(), 2);
    assert_eq!(env.reload(&order_s).status, OrderStatus::Waitlisted);
    assert_eq!(env.reload(&order_g).status, OrderStatus::Waitlisted);

    let ranked = env.waitlist.list_waitlist(Some(day)).unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].entry.order_id, order_g.id);
    assert_eq!(ranked[0].entry.priority_rank, 1);
    assert_eq!(ranked[1].entry.priority_rank, 2);

    // 次日供给 25，没有当日订单，全部用于候补
    env.confirm_supply(next_day, 25);
    let outcome = env.orchestrator.run_date(next_day).unwrap();
    assert_eq!(outcome.promoted.len(), 2);
    assert_eq!(outcome.promoted[0].order_id, order_g.id);
    assert_eq!(outcome.promoted[0].qty, 20);
    assert_eq!(outcome.promoted[1].qty, 5);

    assert_eq!(env.reload(&order_g).status, OrderStatus::Allocated);
    assert_eq!(env.reload(&order_s).status, OrderStatus::PartiallyAllocated);
    let entry = env.waitlist_repo.find_waiting(order_s.id).unwrap().unwrap();
    assert_eq!(entry.unmet_qty, 15);
    assert_eq!(entry.target_date, day);

    // 晋升分配记在次日
    let alloc_g = allocations_of(&env, order_g.id);
    assert_eq!(alloc_g.len(), 1);
    assert_eq!(alloc_g[0].allocation_date, next_day);

    // 次日重算不会重复晋升
    let again = env.orchestrator.run_date(next_day).unwrap();
    assert_eq!(again.committed_qty, 25);
    assert!(again.promoted.is_empty());
}

#[test]
fn test_手动晋升不超过剩余供给() {
    let env = TestEnv::new();
    let day = delivery_day();
    let next_day = day + Duration::days(1);
    let customer = env.customer("S001", CustomerTier::Standard);
    let order = env.order(&customer, 80, day);
    env.confirm_supply(day, 50);
    env.orchestrator.run_date(day).unwrap();

    env.confirm_supply(next_day, 20);
    let outcome = env.waitlist.promote(next_day, 100).unwrap();
    assert_eq!(outcome.promoted.len(), 1);
    assert_eq!(outcome.promoted[0].qty, 20);

    assert_eq!(env.allocation_repo.effective_qty_for_order(order.id).unwrap(), 70);
    assert_eq!(
        env.waitlist_repo.find_waiting(order.id).unwrap().unwrap().unmet_qty,
        10
    );

    let err = env.waitlist.promote(next_day + Duration::days(1), 10).unwrap_err();
    assert!(matches!(err, EngineError::NoSupplyData { .. }));
}

#[test]
fn test_超出回溯窗口的候补不晋升() {
    let env = TestEnv::with_rules(AllocationRules {
        waiting_period_days: 2,
        ..AllocationRules::default()
    });
    let day = delivery_day();
    let customer = env.customer("S001", CustomerTier::Standard);
    let order = env.order(&customer, 10, day);
    env.confirm_supply(day, 0);
    env.orchestrator.run_date(day).unwrap();

    let late = day + Duration::days(5);
    env.confirm_supply(late, 10);
    let outcome = env.orchestrator.run_date(late).unwrap();
    assert!(outcome.promoted.is_empty());
    assert_eq!(outcome.remaining, 10);
    assert_eq!(env.reload(&order).status, OrderStatus::Waitlisted);
}
