// ==========================================
// 雏鸡订单分配系统 - API层错误类型
// ==========================================
// 职责: 统一 API 错误，给出稳定错误码与 HTTP 状态码
// 说明: 各层错误在此收敛，HTTP 层只负责序列化
// ==========================================

use crate::auth::AuthError;
use crate::engine::error::EngineError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("数量非法: {0}")]
    InvalidQuantity(String),

    #[error("客户不存在或已停用: customer_id={0}")]
    UnknownCustomer(i64),

    #[error("状态不允许该操作: {0}")]
    InvalidState(String),

    #[error("实际供给已确认: {0}")]
    AlreadyConfirmed(String),

    #[error("无供给数据: {0}")]
    NoSupplyData(String),

    #[error("供给已超额承诺: {0}")]
    OverCommitted(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ==========================================
    // 认证与权限
    // ==========================================
    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("无权限: {0}")]
    Forbidden(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 稳定错误码（响应体 error.code）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidQuantity(_) => "INVALID_QUANTITY",
            ApiError::UnknownCustomer(_) => "UNKNOWN_CUSTOMER",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::AlreadyConfirmed(_) => "ALREADY_CONFIRMED",
            ApiError::NoSupplyData(_) => "NO_SUPPLY_DATA",
            ApiError::OverCommitted(_) => "OVER_COMMITTED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP 状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ApiError::InvalidInput(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::InvalidState(_)
            | ApiError::AlreadyConfirmed(_)
            | ApiError::NoSupplyData(_)
            | ApiError::OverCommitted(_) => 409,
            ApiError::InvalidQuantity(_) | ApiError::UnknownCustomer(_) => 422,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("记录已存在: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("关联记录不存在: {}", msg))
            }
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::InvalidStateTransition { entity, from, to } => {
                ApiError::InvalidState(format!("{}: {} -> {}", entity, from, to))
            }
            RepositoryError::Sqlite(msg) => ApiError::DatabaseError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidQuantity(msg) => ApiError::InvalidQuantity(msg),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::UnknownCustomer(id) => ApiError::UnknownCustomer(id),
            EngineError::InvalidState(msg) => ApiError::InvalidState(msg),
            EngineError::AlreadyConfirmed { date } => {
                ApiError::AlreadyConfirmed(format!("date={}", date))
            }
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::NoSupplyData { date } => ApiError::NoSupplyData(format!("date={}", date)),
            EngineError::OverCommitted {
                date,
                committed,
                supply,
            } => ApiError::OverCommitted(format!(
                "date={}, committed={}, supply={}",
                date, committed, supply
            )),
            EngineError::InvalidTransition { order_id, from, to } => {
                ApiError::InvalidState(format!("order_id={}: {} -> {}", order_id, from, to))
            }
            EngineError::LockError(msg) => ApiError::InternalError(msg),
            EngineError::Config(msg) => ApiError::InternalError(format!("配置读取失败: {}", msg)),
            EngineError::Repository(e) => e.into(),
        }
    }
}

// ==========================================
// 从 AuthError 转换
// ==========================================
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountInactive
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => ApiError::Unauthorized(err.to_string()),
            AuthError::Crypto(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => e.into(),
            other => ApiError::InvalidInput(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_engine_error_codes() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let cases: Vec<(EngineError, &str, u16)> = vec![
            (EngineError::InvalidQuantity("0".into()), "INVALID_QUANTITY", 422),
            (EngineError::UnknownCustomer(9), "UNKNOWN_CUSTOMER", 422),
            (EngineError::AlreadyConfirmed { date }, "ALREADY_CONFIRMED", 409),
            (EngineError::NoSupplyData { date }, "NO_SUPPLY_DATA", 409),
            (EngineError::not_found("Order", 1), "NOT_FOUND", 404),
            (
                EngineError::Repository(RepositoryError::LockError("poisoned".into())),
                "DATABASE_ERROR",
                500,
            ),
        ];

        for (err, code, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.code(), code);
            assert_eq!(api.http_status(), status);
        }
    }

    #[test]
    fn test_auth_errors_are_unauthorized() {
        let api: ApiError = AuthError::TokenExpired.into();
        assert_eq!(api.code(), "UNAUTHORIZED");
        assert_eq!(api.http_status(), 401);
    }
}
