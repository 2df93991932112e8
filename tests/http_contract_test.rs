// ==========================================
// HTTP 接口契约测试
// ==========================================
// 职责: 经 build_router 起真实监听，校验状态码、错误体与关键响应结构
// ==========================================

mod test_helpers;

use chickflow::api::CreateCustomerRequest;
use chickflow::config::ServerConfig;
use chickflow::{build_router, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::NamedTempFile;
use test_helpers::{create_test_db, staff_session};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const ADMIN_PASSWORD: &str = "admin-pass-123";

struct RawResponse {
    status: u16,
    head: String,
    body: String,
}

impl RawResponse {
    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("response json")
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    fn assert_error(&self, status: u16, code: &str) {
        assert_eq!(self.status, status, "body: {}", self.body);
        assert!(self
            .header("content-type")
            .is_some_and(|v| v.starts_with("application/json")));
        let body = self.json();
        assert_eq!(body["error"]["code"], code);
        assert!(body["error"]["message"].is_string());
    }
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<&str>,
) -> RawResponse {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");

    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(token) = token {
        req.push_str(&format!("Authorization: {token}\r\n"));
    }
    let payload = body.unwrap_or("");
    if body.is_some() {
        req.push_str("Content-Type: application/json\r\n");
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload));

    stream.write_all(req.as_bytes()).await.expect("write request");
    let mut response = String::new();
    stream
        .read_to_string(&mut response)
        .await
        .expect("read response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("status");
    RawResponse {
        status,
        head: head.to_string(),
        body: body.to_string(),
    }
}

/// 起服务: 同步分配模式 + 初始管理员
async fn serve() -> (NamedTempFile, Arc<AppState>, SocketAddr) {
    let (temp_file, conn) = create_test_db().expect("create db");
    let config = ServerConfig {
        db_path: temp_file.path().to_string_lossy().to_string(),
        run_inline: true,
        ..ServerConfig::default()
    };
    let state = Arc::new(AppState::with_connection(conn, &config).expect("app state"));
    state
        .auth_api
        .ensure_bootstrap_admin("admin", ADMIN_PASSWORD)
        .expect("bootstrap admin");

    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });

    (temp_file, state, addr)
}

async fn admin_token(addr: SocketAddr) -> String {
    let body = json!({ "username": "admin", "password": ADMIN_PASSWORD }).to_string();
    let resp = send_raw(addr, "POST", "/auth/login", None, Some(&body)).await;
    assert_eq!(resp.status, 200, "body: {}", resp.body);
    let token = resp.json()["access_token"]
        .as_str()
        .expect("access_token")
        .to_string();
    format!("Bearer {token}")
}

#[tokio::test]
async fn test_缺少或非法令牌返回401错误体() {
    let (_tmp, _state, addr) = serve().await;

    let resp = send_raw(addr, "GET", "/dashboard/stats", None, None).await;
    resp.assert_error(401, "UNAUTHORIZED");

    let resp = send_raw(addr, "GET", "/dashboard/stats", Some("Bearer garbage"), None).await;
    resp.assert_error(401, "UNAUTHORIZED");

    let resp = send_raw(addr, "GET", "/orders", Some("Basic YWRtaW46eA=="), None).await;
    resp.assert_error(401, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_请求解析失败返回400错误体() {
    let (_tmp, _state, addr) = serve().await;

    let resp = send_raw(addr, "POST", "/auth/login", None, Some("{not json")).await;
    resp.assert_error(400, "INVALID_INPUT");

    // 缺少必填字段
    let resp = send_raw(addr, "POST", "/auth/login", None, Some(r#"{"username":"admin"}"#)).await;
    resp.assert_error(400, "INVALID_INPUT");

    let token = admin_token(addr).await;
    let resp = send_raw(addr, "GET", "/orders/abc", Some(&token), None).await;
    resp.assert_error(400, "INVALID_INPUT");

    let resp = send_raw(addr, "GET", "/inventory/2026-13-40", Some(&token), None).await;
    resp.assert_error(400, "INVALID_INPUT");

    let resp = send_raw(addr, "GET", "/orders?date_from=yesterday", Some(&token), None).await;
    resp.assert_error(400, "INVALID_INPUT");
}

#[tokio::test]
async fn test_看板统计响应结构() {
    let (_tmp, _state, addr) = serve().await;
    let token = admin_token(addr).await;

    let resp = send_raw(addr, "GET", "/dashboard/stats", Some(&token), None).await;
    assert_eq!(resp.status, 200, "body: {}", resp.body);
    let body = resp.json();
    for key in [
        "date",
        "expected_supply",
        "actual_supply",
        "allocated",
        "remaining",
        "total_orders",
        "allocations",
    ] {
        assert!(body["today"].get(key).is_some(), "today.{key}");
    }
    for key in ["total_customers", "pending_orders", "waitlist_count"] {
        assert!(body["overall"][key].is_i64(), "overall.{key}");
    }

    let resp = send_raw(
        addr,
        "GET",
        "/reports/monthly-summary?year=2026&month=3",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(resp.status, 200, "body: {}", resp.body);
    assert_eq!(resp.json()["period"]["month"], 3);

    let resp = send_raw(
        addr,
        "GET",
        "/reports/waitlist-analysis?days=0",
        Some(&token),
        None,
    )
    .await;
    resp.assert_error(400, "INVALID_INPUT");
}

#[tokio::test]
async fn test_下单与修改订单状态码() {
    let (_tmp, state, addr) = serve().await;
    let token = admin_token(addr).await;

    let customer = state
        .customer_api
        .create_customer(
            &staff_session(),
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
        .expect("create customer");

    let zero = json!({
        "customer_id": customer.id,
        "order_qty": 0,
        "requested_delivery_date": "2026-03-10",
    })
    .to_string();
    let resp = send_raw(addr, "POST", "/orders", Some(&token), Some(&zero)).await;
    resp.assert_error(422, "INVALID_QUANTITY");

    let valid = json!({
        "customer_id": customer.id,
        "order_qty": 30,
        "requested_delivery_date": "2026-03-10",
    })
    .to_string();
    let resp = send_raw(addr, "POST", "/orders", Some(&token), Some(&valid)).await;
    assert_eq!(resp.status, 201, "body: {}", resp.body);
    let order_id = resp.json()["id"].as_i64().expect("order id");
    let path = format!("/orders/{order_id}");

    let resp = send_raw(addr, "PUT", &path, Some(&token), Some(r#"{"order_qty":0}"#)).await;
    resp.assert_error(422, "INVALID_QUANTITY");

    let resp = send_raw(addr, "PUT", &path, Some(&token), Some(r#"{"order_qty":25}"#)).await;
    assert_eq!(resp.status, 200, "body: {}", resp.body);
    assert_eq!(resp.json()["order_qty"], 25);

    let resp = send_raw(addr, "GET", "/orders/999999", Some(&token), None).await;
    resp.assert_error(404, "NOT_FOUND");
}
