// ==========================================
// 雏鸡订单分配系统 - 认证错误类型
// ==========================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("用户名或密码错误")]
    InvalidCredentials,

    #[error("账号已停用")]
    AccountInactive,

    #[error("令牌已过期")]
    TokenExpired,

    #[error("令牌无效: {0}")]
    TokenInvalid(String),

    #[error("加密错误: {0}")]
    Crypto(String),
}
