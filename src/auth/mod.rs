// ==========================================
// 雏鸡订单分配系统 - 认证
// ==========================================
// 职责: 口令哈希（Argon2id）与访问令牌（HS256 JWT）
// 说明: 令牌解析得到 SessionContext，由 HTTP 层逐请求传入 API 层
// ==========================================

pub mod error;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password};
pub use token::{decode_access_token, issue_access_token, AccessTokenClaims, TokenConfig};
