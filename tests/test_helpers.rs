// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、仓储/引擎组装、测试数据生成
// 用法: 各集成测试以 `mod test_helpers;` 引入
// ==========================================

#![allow(dead_code)]

use chickflow::config::{AllocationRules, AllocationRulesReader, StaticRules};
use chickflow::db::open_shared_connection;
use chickflow::domain::customer::{Customer, NewCustomer};
use chickflow::domain::order::Order;
use chickflow::domain::types::{CustomerTier, UserRole};
use chickflow::domain::user::SessionContext;
use chickflow::engine::{
    AllocationEventPublisher, AllocationOrchestrator, DateLockRegistry, InlineRunPublisher,
    InventoryLedger, NoOpEventPublisher, OrderBook, StatsAggregator, WaitlistManager,
};
use chickflow::repository::{
    AllocationRepository, CustomerRepository, NotificationRepository, OrderRepository,
    SupplyRepository, UserRepository, WaitlistRepository,
};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - Arc<Mutex<Connection>>: 已建表的共享连接
pub fn create_test_db() -> Result<(NamedTempFile, Arc<Mutex<Connection>>), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = open_shared_connection(&db_path)?;
    Ok((temp_file, conn))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 测试统一使用的交付日
pub fn delivery_day() -> NaiveDate {
    date(2026, 3, 10)
}

pub fn staff_session() -> SessionContext {
    SessionContext {
        user_id: 1,
        username: "manager".to_string(),
        role: UserRole::Manager,
        customer_id: None,
    }
}

pub fn admin_session() -> SessionContext {
    SessionContext {
        user_id: 2,
        username: "admin".to_string(),
        role: UserRole::Admin,
        customer_id: None,
    }
}

pub fn customer_session(customer_id: i64) -> SessionContext {
    SessionContext {
        user_id: 100 + customer_id,
        username: format!("farm{}", customer_id),
        role: UserRole::Customer,
        customer_id: Some(customer_id),
    }
}

pub fn driver_session() -> SessionContext {
    SessionContext {
        user_id: 3,
        username: "driver".to_string(),
        role: UserRole::Driver,
        customer_id: None,
    }
}

// ==========================================
// TestEnv - 组装好的仓储与引擎
// ==========================================
pub struct TestEnv {
    _temp_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,

    pub customer_repo: Arc<CustomerRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub supply_repo: Arc<SupplyRepository>,
    pub allocation_repo: Arc<AllocationRepository>,
    pub waitlist_repo: Arc<WaitlistRepository>,
    pub notification_repo: Arc<NotificationRepository>,
    pub user_repo: Arc<UserRepository>,

    pub rules: Arc<dyn AllocationRulesReader>,
    pub locks: Arc<DateLockRegistry>,
    pub orchestrator: Arc<AllocationOrchestrator>,
    pub ledger: InventoryLedger,
    pub order_book: OrderBook,
    pub waitlist: WaitlistManager,
    pub stats: StatsAggregator,
}

impl TestEnv {
    /// 事件不触发分配（测试中显式调用 run_date）
    pub fn new() -> Self {
        Self::build(AllocationRules::default(), false)
    }

    /// 供给确认/订单取消后同步执行分配
    pub fn inline() -> Self {
        Self::build(AllocationRules::default(), true)
    }

    pub fn with_rules(rules: AllocationRules) -> Self {
        Self::build(rules, false)
    }

    fn build(rules: AllocationRules, inline: bool) -> Self {
        let (temp_file, conn) = create_test_db().expect("创建测试数据库失败");

        let customer_repo = Arc::new(CustomerRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let supply_repo = Arc::new(SupplyRepository::new(conn.clone()));
        let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
        let waitlist_repo = Arc::new(WaitlistRepository::new(conn.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(conn.clone()));
        let user_repo = Arc::new(UserRepository::new(conn.clone()));

        let rules: Arc<dyn AllocationRulesReader> = Arc::new(StaticRules(rules));
        let locks = Arc::new(DateLockRegistry::new());
        let orchestrator = Arc::new(AllocationOrchestrator::new(
            allocation_repo.clone(),
            rules.clone(),
            locks.clone(),
        ));

        let events: Arc<dyn AllocationEventPublisher> = if inline {
            Arc::new(InlineRunPublisher::new(orchestrator.clone()))
        } else {
            Arc::new(NoOpEventPublisher)
        };

        let ledger = InventoryLedger::new(supply_repo.clone(), events.clone());
        let order_book = OrderBook::new(
            order_repo.clone(),
            customer_repo.clone(),
            allocation_repo.clone(),
            locks.clone(),
            events,
        );
        let waitlist = WaitlistManager::new(
            waitlist_repo.clone(),
            allocation_repo.clone(),
            rules.clone(),
            locks.clone(),
        );
        let stats = StatsAggregator::new(
            supply_repo.clone(),
            order_repo.clone(),
            allocation_repo.clone(),
            waitlist_repo.clone(),
            customer_repo.clone(),
        );

        Self {
            _temp_file: temp_file,
            conn,
            customer_repo,
            order_repo,
            supply_repo,
            allocation_repo,
            waitlist_repo,
            notification_repo,
            user_repo,
            rules,
            locks,
            orchestrator,
            ledger,
            order_book,
            waitlist,
            stats,
        }
    }

    /// 建档客户
    pub fn customer(&self, code: &str, tier: CustomerTier) -> Customer {
        self.customer_repo
            .insert(&NewCustomer {
                customer_code: code.to_string(),
                farm_name: format!("{} Farm", code),
                phone: format!("+254700{}", code.len()),
                email: Some(format!("{}@farm.test", code.to_ascii_lowercase())),
                zone: Some("North".to_string()),
                address: None,
                tier,
            })
            .expect("客户建档失败")
    }

    /// 下单
    pub fn order(&self, customer: &Customer, qty: i64, day: NaiveDate) -> Order {
        self.order_book
            .create_order(customer.id, qty, day, None)
            .expect("下单失败")
    }

    /// 登记并确认当日供给
    pub fn confirm_supply(&self, day: NaiveDate, qty: i64) {
        self.ledger
            .set_expected_supply(day, qty, None)
            .expect("登记预计供给失败");
        self.ledger
            .confirm_actual_supply(day, qty, None)
            .expect("确认实际供给失败");
    }

    pub fn reload(&self, order: &Order) -> Order {
        self.order_book.get_order(order.id).expect("订单查询失败")
    }
}
