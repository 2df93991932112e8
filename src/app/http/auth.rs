use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{ChangePasswordRequest, LoginRequest, LoginResponse, MeResponse, RegisterRequest};
use crate::domain::user::User;

use super::common::{ApiJson, blocking, HttpResult, MaybeSession, Session, SharedState};

// ==========================================
// 认证相关路由
// ==========================================

/// POST /auth/login
pub(crate) async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> HttpResult<Json<LoginResponse>> {
    let result = blocking(move || state.auth_api.login(req)).await?;
    Ok(Json(result))
}

/// POST /auth/register
pub(crate) async fn register(
    State(state): State<SharedState>,
    MaybeSession(ctx): MaybeSession,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> HttpResult<(StatusCode, Json<User>)> {
    let user = blocking(move || state.auth_api.register(ctx.as_ref(), req)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /auth/me
pub(crate) async fn me(
    State(state): State<SharedState>,
    Session(ctx): Session,
) -> HttpResult<Json<MeResponse>> {
    let result = blocking(move || state.auth_api.me(&ctx)).await?;
    Ok(Json(result))
}

/// POST /auth/change-password
pub(crate) async fn change_password(
    State(state): State<SharedState>,
    Session(ctx): Session,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> HttpResult<StatusCode> {
    blocking(move || state.auth_api.change_password(&ctx, req)).await?;
    Ok(StatusCode::NO_CONTENT)
}
