// ==========================================
// API 层集成测试
// ==========================================
// 职责: 角色权限、客户数据隔离、登录注册、错误码映射
// ==========================================

mod test_helpers;

use chickflow::api::{
    AllocationQuery, ApiError, ChangePasswordRequest, ConfirmSupplyRequest, CreateCustomerRequest,
    CreateOrderRequest, LoginRequest, OrderQuery, OverrideSupplyRequest, ProcessWaitlistRequest,
    RegisterRequest, ReportQuery, RunAllocationRequest, SupplyRequest, UpdateOrderRequest,
    UpdateTierRequest, WaitlistQuery,
};
use chickflow::auth::decode_access_token;
use chickflow::config::ServerConfig;
use chickflow::domain::types::{CustomerTier, OrderStatus, UserRole};
use chickflow::AppState;
use chrono::Duration;
use tempfile::NamedTempFile;
use test_helpers::{
    admin_session, create_test_db, customer_session, delivery_day, driver_session, staff_session,
};

/// 同步分配模式的 AppState（确认供给即分配）
fn app() -> (NamedTempFile, AppState) {
    let (temp_file, conn) = create_test_db().unwrap();
    let config = ServerConfig {
        db_path: temp_file.path().to_string_lossy().to_string(),
        run_inline: true,
        ..ServerConfig::default()
    };
    let state = AppState::with_connection(conn, &config).unwrap();
    (temp_file, state)
}

fn create_customer(state: &AppState, code: &str, tier: &str) -> i64 {
    state
        .customer_api
        .create_customer(
            &staff_session(),
            CreateCustomerRequest {
                customer_code: code.to_string(),
                farm_name: format!("{} Farm", code),
                phone: "+254700000000".to_string(),
                email: None,
                zone: None,
                address: None,
                tier: Some(tier.to_string()),
            },
        )
        .unwrap()
        .id
}

fn order_request(customer_id: Option<i64>, qty: i64) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id,
        order_qty: qty,
        requested_delivery_date: delivery_day(),
        notes: None,
    }
}

// ==========================================
// 错误码
// ==========================================

#[test]
fn test_错误码与状态码() {
    let cases = [
        (ApiError::InvalidQuantity("0".into()), 422),
        (ApiError::UnknownCustomer(7), 422),
        (ApiError::Forbidden("x".into()), 403),
        (ApiError::Unauthorized("x".into()), 401),
        (ApiError::InvalidInput("x".into()), 400),
        (ApiError::InternalError("x".into()), 500),
    ];
    for (err, status) in cases {
        assert_eq!(err.http_status(), status, "{}", err.code());
    }
}

// ==========================================
// 客户与订单
// ==========================================

#[test]
fn test_客户只能为自己下单和查看() {
    let (_tmp, state) = app();
    let own = create_customer(&state, "A001", "GOLD");
    let other = create_customer(&state, "B001", "STANDARD");
    let ctx = customer_session(own);

    // 不传 customer_id 时使用会话关联的客户
    let (view, customer) = state
        .order_api
        .create_order(&ctx, order_request(None, 30))
        .unwrap();
    assert_eq!(view.order.customer_id, own);
    assert_eq!(customer.id, own);

    let err = state
        .order_api
        .create_order(&ctx, order_request(Some(other), 30))
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let (other_view, _) = state
        .order_api
        .create_order(&staff_session(), order_request(Some(other), 20))
        .unwrap();

    // 列表按会话客户过滤，忽略请求中的 customer_id
    let listed = state
        .order_api
        .list_orders(
            &ctx,
            OrderQuery {
                customer_id: Some(other),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].order.customer_id, own);

    let err = state
        .order_api
        .get_order(&ctx, other_view.order.id)
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = state.order_api.cancel_order(&ctx, other_view.order.id).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = state
        .customer_api
        .list_customers(&ctx, Default::default())
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn test_下单校验() {
    let (_tmp, state) = app();
    let id = create_customer(&state, "A001", "SILVER");

    let err = state
        .order_api
        .create_order(&staff_session(), order_request(Some(id), 0))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity(_)));
    assert_eq!(err.http_status(), 422);

    let err = state
        .order_api
        .create_order(&staff_session(), order_request(Some(9999), 10))
        .unwrap_err();
    assert!(matches!(err, ApiError::UnknownCustomer(9999)));

    let err = state
        .order_api
        .create_order(&staff_session(), order_request(None, 10))
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = state
        .order_api
        .list_orders(
            &staff_session(),
            OrderQuery {
                status: Some("SHIPPED".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn test_客户只能修改自己的订单() {
    let (_tmp, state) = app();
    let own = create_customer(&state, "A001", "GOLD");
    let other = create_customer(&state, "B001", "STANDARD");
    let (view, _) = state
        .order_api
        .create_order(&customer_session(own), order_request(None, 30))
        .unwrap();

    let err = state
        .order_api
        .update_order(
            &customer_session(other),
            view.order.id,
            UpdateOrderRequest {
                order_qty: Some(10),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = state
        .order_api
        .update_order(
            &customer_session(own),
            view.order.id,
            UpdateOrderRequest {
                order_qty: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidQuantity(_)));

    let updated = state
        .order_api
        .update_order(
            &customer_session(own),
            view.order.id,
            UpdateOrderRequest {
                order_qty: Some(45),
                notes: Some("加量".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.order.order_qty, 45);
    assert_eq!(updated.order.notes.as_deref(), Some("加量"));
}

#[test]
fn test_等级调整需要管理员() {
    let (_tmp, state) = app();
    let id = create_customer(&state, "A001", "STANDARD");

    let err = state
        .customer_api
        .update_tier(
            &staff_session(),
            id,
            UpdateTierRequest {
                tier: "GOLD".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let updated = state
        .customer_api
        .update_tier(
            &admin_session(),
            id,
            UpdateTierRequest {
                tier: "contract".to_string(),
            },
        )
        .unwrap();
    assert_eq!(updated.tier, CustomerTier::Gold);
}

// ==========================================
// 供给与分配
// ==========================================

#[test]
fn test_确认供给后同步分配并由司机提货() {
    let (_tmp, state) = app();
    let day = delivery_day();
    let gold = create_customer(&state, "A001", "GOLD");
    let standard = create_customer(&state, "B001", "STANDARD");
    state
        .order_api
        .create_order(&staff_session(), order_request(Some(gold), 60))
        .unwrap();
    let (order_b, _) = state
        .order_api
        .create_order(&staff_session(), order_request(Some(standard), 50))
        .unwrap();

    // 客户不能维护供给
    let err = state
        .inventory_api
        .upsert_supply(
            &customer_session(gold),
            SupplyRequest {
                date: day,
                expected_supply: 100,
                actual_supply: None,
                notes: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    state
        .inventory_api
        .upsert_supply(
            &staff_session(),
            SupplyRequest {
                date: day,
                expected_supply: 100,
                actual_supply: None,
                notes: None,
            },
        )
        .unwrap();
    state
        .inventory_api
        .confirm_supply(
            &staff_session(),
            day,
            ConfirmSupplyRequest {
                actual_supply: 100,
                notes: None,
            },
        )
        .unwrap();

    let err = state
        .inventory_api
        .confirm_supply(
            &staff_session(),
            day,
            ConfirmSupplyRequest {
                actual_supply: 90,
                notes: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::AlreadyConfirmed(_)));
    assert_eq!(err.http_status(), 409);

    let detail = state.order_api.get_order(&staff_session(), order_b.order.id).unwrap();
    assert_eq!(detail.view.order.status, OrderStatus::PartiallyAllocated);
    assert_eq!(detail.view.allocated_qty, 40);
    assert_eq!(detail.waitlist.len(), 1);

    // 客户只能看到自己的分配
    let mine = state
        .allocation_api
        .list_allocations(&customer_session(standard), AllocationQuery::default())
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].customer_id, standard);

    let err = state
        .allocation_api
        .confirm_pickup(&customer_session(standard), &mine[0].allocation_id)
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let pickup = state
        .allocation_api
        .confirm_pickup(&driver_session(), &mine[0].allocation_id)
        .unwrap();
    assert!(!pickup.order_fulfilled);

    // 已有提货记录的订单不可取消
    let err = state
        .order_api
        .cancel_order(&customer_session(standard), order_b.order.id)
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));

    let rows = state.allocation_api.dispatch_list(&staff_session(), day).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_覆写供给需要管理员并留审计() {
    let (_tmp, state) = app();
    let day = delivery_day();
    state
        .inventory_api
        .upsert_supply(
            &staff_session(),
            SupplyRequest {
                date: day,
                expected_supply: 100,
                actual_supply: Some(100),
                notes: None,
            },
        )
        .unwrap();

    let req = || OverrideSupplyRequest {
        actual_supply: 80,
        reason: "recount".to_string(),
    };
    let err = state
        .inventory_api
        .override_supply(&staff_session(), day, req())
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let record = state
        .inventory_api
        .override_supply(&admin_session(), day, req())
        .unwrap();
    assert_eq!(record.actual_supply, Some(80));

    let audits = state.inventory_api.list_audits(&staff_session(), day).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].old_actual_supply, Some(100));
    assert_eq!(audits[0].new_actual_supply, 80);
    assert_eq!(audits[0].operator, "admin");
}

#[test]
fn test_无供给手动分配返回冲突() {
    let (_tmp, state) = app();
    let err = state
        .allocation_api
        .run_allocation(&staff_session(), RunAllocationRequest { date: delivery_day() })
        .unwrap_err();
    assert!(matches!(err, ApiError::NoSupplyData(_)));
    assert_eq!(err.http_status(), 409);

    let err = state
        .allocation_api
        .run_allocation(&driver_session(), RunAllocationRequest { date: delivery_day() })
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[test]
fn test_候补处理默认使用剩余供给() {
    let (_tmp, state) = app();
    let day = delivery_day();
    let next_day = day + Duration::days(1);
    let id = create_customer(&state, "S001", "STANDARD");
    state
        .order_api
        .create_order(&staff_session(), order_request(Some(id), 30))
        .unwrap();
    state
        .inventory_api
        .upsert_supply(
            &staff_session(),
            SupplyRequest {
                date: day,
                expected_supply: 10,
                actual_supply: Some(10),
                notes: None,
            },
        )
        .unwrap();

    let waiting = state
        .waitlist_api
        .list_waitlist(&staff_session(), WaitlistQuery::default())
        .unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].entry.unmet_qty, 20);
    assert_eq!(waiting[0].entry.priority_rank, 1);

    // 次日仅登记预计供给: 同步模式下立即晋升
    state
        .inventory_api
        .upsert_supply(
            &staff_session(),
            SupplyRequest {
                date: next_day,
                expected_supply: 15,
                actual_supply: None,
                notes: None,
            },
        )
        .unwrap();
    let waiting = state
        .waitlist_api
        .list_waitlist(&staff_session(), WaitlistQuery::default())
        .unwrap();
    assert_eq!(waiting[0].entry.unmet_qty, 5);

    // 已无剩余，手动处理不再晋升
    let outcome = state
        .waitlist_api
        .process_waitlist(
            &staff_session(),
            ProcessWaitlistRequest {
                date: next_day,
                qty: None,
            },
        )
        .unwrap();
    assert!(outcome.promoted.is_empty());
}

#[test]
fn test_报表需要运营权限() {
    let (_tmp, state) = app();
    let err = state
        .dashboard_api
        .dashboard_stats(&customer_session(1))
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    let summary = state
        .dashboard_api
        .daily_summary(
            &staff_session(),
            ReportQuery {
                date: Some(delivery_day()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(summary.date, delivery_day());

    let err = state
        .dashboard_api
        .monthly_summary(&customer_session(1), ReportQuery::default())
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let monthly = state
        .dashboard_api
        .monthly_summary(
            &staff_session(),
            ReportQuery {
                year: Some(2026),
                month: Some(3),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(monthly.period.month, 3);

    let analytics = state
        .dashboard_api
        .customer_analytics(
            &staff_session(),
            ReportQuery {
                end_date: Some(delivery_day()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(analytics.period.days, 30);

    let err = state
        .dashboard_api
        .waitlist_analysis(
            &staff_session(),
            ReportQuery {
                days: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

// ==========================================
// 认证
// ==========================================

#[test]
fn test_注册登录与令牌() {
    let (_tmp, state) = app();
    let customer_id = create_customer(&state, "A001", "GOLD");

    // 运营为已有客户档案开通账号
    let user = state
        .auth_api
        .register(
            Some(&staff_session()),
            RegisterRequest {
                username: "farm_a".to_string(),
                email: "a@farm.test".to_string(),
                password: "correct horse".to_string(),
                role: None,
                customer_id: Some(customer_id),
            },
        )
        .unwrap();
    assert_eq!(user.role, UserRole::Customer);

    // 匿名注册不能创建运营账号
    let err = state
        .auth_api
        .register(
            None,
            RegisterRequest {
                username: "boss".to_string(),
                email: "boss@farm.test".to_string(),
                password: "correct horse".to_string(),
                role: Some("ADMIN".to_string()),
                customer_id: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let err = state
        .auth_api
        .register(
            None,
            RegisterRequest {
                username: "farm_b".to_string(),
                email: "b@farm.test".to_string(),
                password: "short".to_string(),
                role: None,
                customer_id: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let err = state
        .auth_api
        .login(LoginRequest {
            username: "farm_a".to_string(),
            password: "wrong password".to_string(),
        })
        .unwrap_err();
    assert_eq!(err.http_status(), 401);

    let login = state
        .auth_api
        .login(LoginRequest {
            username: "farm_a".to_string(),
            password: "correct horse".to_string(),
        })
        .unwrap();
    let session = decode_access_token(&login.access_token, state.auth_api.token_config())
        .unwrap()
        .into_session()
        .unwrap();
    assert_eq!(session.role, UserRole::Customer);
    assert_eq!(session.customer_id, Some(customer_id));

    let me = state.auth_api.me(&session).unwrap();
    assert_eq!(me.customer.map(|c| c.id), Some(customer_id));

    state
        .auth_api
        .change_password(
            &session,
            ChangePasswordRequest {
                current_password: "correct horse".to_string(),
                new_password: "battery staple".to_string(),
            },
        )
        .unwrap();
    assert!(state
        .auth_api
        .login(LoginRequest {
            username: "farm_a".to_string(),
            password: "battery staple".to_string(),
        })
        .is_ok());
}

#[test]
fn test_匿名注册不能认领已有客户档案() {
    let (_tmp, state) = app();
    let victim = create_customer(&state, "V001", "GOLD");
    let (order, _) = state
        .order_api
        .create_order(&customer_session(victim), order_request(None, 30))
        .unwrap();

    let claim = |ctx: Option<&chickflow::domain::user::SessionContext>, username: &str| {
        state.auth_api.register(
            ctx,
            RegisterRequest {
                username: username.to_string(),
                email: format!("{}@farm.test", username),
                password: "correct horse".to_string(),
                role: None,
                customer_id: Some(victim),
            },
        )
    };

    let err = claim(None, "mallory").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    // 其他客户账号也不能替别人关联档案
    let other = create_customer(&state, "M001", "STANDARD");
    let err = claim(Some(&customer_session(other)), "mallory").unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert!(state
        .auth_api
        .login(LoginRequest {
            username: "mallory".to_string(),
            password: "correct horse".to_string(),
        })
        .is_err());

    // 不带档案的匿名注册可以成功，但看不到任何客户数据
    let plain = state
        .auth_api
        .register(
            None,
            RegisterRequest {
                username: "mallory".to_string(),
                email: "mallory@farm.test".to_string(),
                password: "correct horse".to_string(),
                role: None,
                customer_id: None,
            },
        )
        .unwrap();
    assert_eq!(plain.customer_id, None);
    let login = state
        .auth_api
        .login(LoginRequest {
            username: "mallory".to_string(),
            password: "correct horse".to_string(),
        })
        .unwrap();
    let session = decode_access_token(&login.access_token, state.auth_api.token_config())
        .unwrap()
        .into_session()
        .unwrap();
    let err = state
        .order_api
        .cancel_order(&session, order.order.id)
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));

    // 一个档案只能关联一个账号
    claim(Some(&staff_session()), "farm_v").unwrap();
    let err = claim(Some(&staff_session()), "farm_v2").unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));
}

#[test]
fn test_初始管理员只创建一次() {
    let (_tmp, state) = app();

    let created = state
        .auth_api
        .ensure_bootstrap_admin("admin", "admin-password")
        .unwrap();
    assert_eq!(created.map(|u| u.role), Some(UserRole::Admin));

    let again = state
        .auth_api
        .ensure_bootstrap_admin("admin2", "admin-password")
        .unwrap();
    assert!(again.is_none());
}
