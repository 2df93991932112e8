use crate::api::error::ApiError;
use crate::app::state::AppState;
use crate::auth::decode_access_token;
use crate::domain::user::SessionContext;
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

// ==========================================
// 公共工具：错误响应、会话提取、阻塞调用、请求追踪
// ==========================================

pub(crate) type SharedState = Arc<AppState>;

/// 错误响应体 {"error": {...}}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ErrorBody {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,
}

/// HTTP 层错误（包装 ApiError，负责状态码与序列化）
#[derive(Debug)]
pub(crate) struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        HttpError(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = self.0.code(), error = %self.0, "请求处理失败");
        } else {
            tracing::debug!(code = self.0.code(), error = %self.0, "请求被拒绝");
        }

        let body = ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}

pub(crate) type HttpResult<T> = Result<T, HttpError>;

// ==========================================
// 请求解析：框架拒绝统一转为 INVALID_INPUT 错误体
// ==========================================

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError(ApiError::InvalidInput(format!(
            "请求体解析失败: {}",
            rejection.body_text()
        )))
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError(ApiError::InvalidInput(format!(
            "查询参数解析失败: {}",
            rejection.body_text()
        )))
    }
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        HttpError(ApiError::InvalidInput(format!(
            "路径参数解析失败: {}",
            rejection.body_text()
        )))
    }
}

/// JSON 请求体
pub(crate) struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// 查询参数
pub(crate) struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// 路径参数
pub(crate) struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

/// 在阻塞线程池执行同步 API 调用（SQLite 访问不占用异步线程）
pub(crate) async fn blocking<T, F>(f: F) -> HttpResult<T>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(HttpError),
        Err(e) => Err(HttpError(ApiError::InternalError(format!(
            "后台任务异常终止: {}",
            e
        )))),
    }
}

// ==========================================
// 会话提取
// ==========================================

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// 必须登录的会话
pub(crate) struct Session(pub SessionContext);

#[async_trait]
impl FromRequestParts<SharedState> for Session {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("缺少访问令牌".to_string()))?;
        let session = decode_access_token(token, state.auth_api.token_config())
            .and_then(|claims| claims.into_session())
            .map_err(ApiError::from)?;
        Ok(Session(session))
    }
}

/// 可选会话（匿名访问时为 None；携带了非法令牌仍然拒绝）
pub(crate) struct MaybeSession(pub Option<SessionContext>);

#[async_trait]
impl FromRequestParts<SharedState> for MaybeSession {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedState) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Ok(MaybeSession(None));
        }
        let Session(ctx) = Session::from_request_parts(parts, state).await?;
        Ok(MaybeSession(Some(ctx)))
    }
}

// ==========================================
// 请求追踪
// ==========================================

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn request_id(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| format!("req-{:016x}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed)))
}

/// 每个请求一个 span，记录方法、路径、状态码与耗时
pub(crate) async fn request_tracing_middleware(
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = request_id(&request);
    let span = tracing::info_span!(
        "http.request",
        request_id = %request_id,
        method = %request.method(),
        route = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| {
        tracing::info!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "请求完成"
        );
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_解析() {
        let (mut parts, _) = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer_token(&parts), Some("abc.def"));

        parts
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_错误响应状态码() {
        let resp = HttpError(ApiError::Forbidden("x".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = HttpError(ApiError::InvalidQuantity("0".to_string())).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
