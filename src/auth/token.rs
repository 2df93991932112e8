// ==========================================
// 雏鸡订单分配系统 - 访问令牌
// ==========================================
// 算法: HS256（共享密钥），载荷携带用户ID/用户名/角色/关联客户
// ==========================================

use crate::auth::error::AuthError;
use crate::domain::types::UserRole;
use crate::domain::user::{SessionContext, User};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const ISSUER: &str = "chickflow";

/// 令牌配置
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

/// 访问令牌载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// 用户ID
    pub sub: String,
    pub username: String,
    pub role: UserRole,
    pub customer_id: Option<i64>,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessTokenClaims {
    /// 转为会话上下文
    pub fn into_session(self) -> Result<SessionContext, AuthError> {
        let user_id = self
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::TokenInvalid(format!("sub 非法: {}", self.sub)))?;
        Ok(SessionContext {
            user_id,
            username: self.username,
            role: self.role,
            customer_id: self.customer_id,
        })
    }
}

/// 签发访问令牌
pub fn issue_access_token(user: &User, config: &TokenConfig) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = AccessTokenClaims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role,
        customer_id: user.customer_id,
        iss: ISSUER.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(config.ttl_hours.max(1))).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Crypto(format!("令牌签发失败: {e}")))
}

/// 校验并解析访问令牌
pub fn decode_access_token(token: &str, config: &TokenConfig) -> Result<AccessTokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    jsonwebtoken::decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })
}
