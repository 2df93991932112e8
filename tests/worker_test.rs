// ==========================================
// 后台分配 Worker 集成测试
// ==========================================

mod test_helpers;

use chickflow::api::{ConfirmSupplyRequest, CreateCustomerRequest, CreateOrderRequest, SupplyRequest};
use chickflow::config::ServerConfig;
use chickflow::domain::types::OrderStatus;
use chickflow::AppState;
use std::time::Duration;
use test_helpers::{create_test_db, delivery_day, staff_session};

/// 轮询订单状态直到满足条件（最多约 5 秒）
async fn wait_for_status(state: &AppState, order_id: i64, expected: OrderStatus) -> bool {
    for _ in 0..100 {
        let detail = state
            .order_api
            .get_order(&staff_session(), order_id)
            .unwrap();
        if detail.view.order.status == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_确认供给后由后台worker分配() {
    let (temp_file, conn) = create_test_db().unwrap();
    let config = ServerConfig {
        db_path: temp_file.path().to_string_lossy().to_string(),
        run_inline: false,
        ..ServerConfig::default()
    };
    let state = AppState::with_connection(conn, &config).unwrap();
    let ctx = staff_session();
    let day = delivery_day();

    let customer = state
        .customer_api
        .create_customer(
            &ctx,
            CreateCustomerRequest {
                customer_code: "A001".to_string(),
                farm_name: "A Farm".to_string(),
                phone: "+254700000001".to_string(),
                email: None,
                zone: None,
                address: None,
                tier: Some("GOLD".to_string()),
            },
        )
        .unwrap();
    let (order, _) = state
        .order_api
        .create_order(
            &ctx,
            CreateOrderRequest {
                customer_id: Some(customer.id),
                order_qty: 40,
                requested_delivery_date: day,
                notes: None,
            },
        )
        .unwrap();

    // worker 启动前的事件先排队
    state
        .inventory_api
        .upsert_supply(
            &ctx,
            SupplyRequest {
                date: day,
                expected_supply: 30,
                actual_supply: None,
                notes: None,
            },
        )
        .unwrap();
    state
        .inventory_api
        .confirm_supply(
            &ctx,
            day,
            ConfirmSupplyRequest {
                actual_supply: 50,
                notes: None,
            },
        )
        .unwrap();

    let worker = state.start_worker();
    assert!(worker.is_some());
    assert!(state.start_worker().is_none());

    assert!(wait_for_status(&state, order.order.id, OrderStatus::Allocated).await);
    let detail = state.order_api.get_order(&ctx, order.order.id).unwrap();
    assert_eq!(detail.view.allocated_qty, 40);
    assert!(detail.waitlist.is_empty());
}

#[tokio::test]
async fn test_同步模式不启动worker() {
    let (temp_file, conn) = create_test_db().unwrap();
    let config = ServerConfig {
        db_path: temp_file.path().to_string_lossy().to_string(),
        run_inline: true,
        ..ServerConfig::default()
    };
    let state = AppState::with_connection(conn, &config).unwrap();
    assert!(state.start_worker().is_none());
    assert_eq!(state.get_db_path(), config.db_path);
}
