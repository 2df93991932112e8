// ==========================================
// 雏鸡订单分配系统 - 接口访问控制
// ==========================================
// 规则:
// - 运营（ADMIN / MANAGER）: 维护供给、执行分配、管理客户
// - 管理员（ADMIN）: 调整客户等级、覆写实际供给、修改规则配置
// - 客户（CUSTOMER）: 只能访问自己关联客户的订单与分配
// - 司机（DRIVER）: 可确认提货
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::UserRole;
use crate::domain::user::SessionContext;

pub fn require_staff(ctx: &SessionContext) -> ApiResult<()> {
    if ctx.is_staff() {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "需要运营权限: user={}, role={}",
            ctx.username, ctx.role
        )))
    }
}

pub fn require_admin(ctx: &SessionContext) -> ApiResult<()> {
    if ctx.role == UserRole::Admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "需要管理员权限: user={}, role={}",
            ctx.username, ctx.role
        )))
    }
}

pub fn require_pickup_role(ctx: &SessionContext) -> ApiResult<()> {
    if ctx.is_staff() || ctx.role == UserRole::Driver {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "无权确认提货: user={}, role={}",
            ctx.username, ctx.role
        )))
    }
}

/// 客户范围: 运营不限；客户账号只能看自己的客户ID
///
/// # 返回
/// - Ok(None): 不限客户
/// - Ok(Some(id)): 只能访问该客户
pub fn customer_scope(ctx: &SessionContext) -> ApiResult<Option<i64>> {
    match ctx.role {
        UserRole::Admin | UserRole::Manager => Ok(None),
        UserRole::Customer => ctx
            .customer_id
            .map(Some)
            .ok_or_else(|| ApiError::Forbidden("客户账号未关联客户档案".to_string())),
        UserRole::Driver => Err(ApiError::Forbidden(format!(
            "无权访问客户数据: user={}",
            ctx.username
        ))),
    }
}

/// 校验会话可访问指定客户的数据
pub fn ensure_customer_access(ctx: &SessionContext, customer_id: i64) -> ApiResult<()> {
    match customer_scope(ctx)? {
        Some(own) if own != customer_id => Err(ApiError::Forbidden(format!(
            "无权访问客户 {} 的数据",
            customer_id
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole, customer_id: Option<i64>) -> SessionContext {
        SessionContext {
            user_id: 1,
            username: "u".to_string(),
            role,
            customer_id,
        }
    }

    #[test]
    fn test_role_checks() {
        assert!(require_staff(&session(UserRole::Manager, None)).is_ok());
        assert!(require_staff(&session(UserRole::Customer, Some(1))).is_err());
        assert!(require_admin(&session(UserRole::Manager, None)).is_err());
        assert!(require_pickup_role(&session(UserRole::Driver, None)).is_ok());
    }

    #[test]
    fn test_customer_scope() {
        assert_eq!(customer_scope(&session(UserRole::Admin, None)).unwrap(), None);
        assert_eq!(
            customer_scope(&session(UserRole::Customer, Some(7))).unwrap(),
            Some(7)
        );
        assert!(customer_scope(&session(UserRole::Customer, None)).is_err());
        assert!(ensure_customer_access(&session(UserRole::Customer, Some(7)), 8).is_err());
        assert!(ensure_customer_access(&session(UserRole::Customer, Some(7)), 7).is_ok());
    }
}
