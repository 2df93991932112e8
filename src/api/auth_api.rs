// ==========================================
// 雏鸡订单分配系统 - 认证 API
// ==========================================
// 职责: 登录、当前用户、注册、修改密码、初始管理员
// 规则: 公开注册只能创建未关联档案的客户账号；关联档案由运营操作；运营/司机账号由管理员创建
// ==========================================

use crate::api::access::{require_admin, require_staff};
use crate::api::error::{ApiError, ApiResult};
use crate::auth::{hash_password, issue_access_token, verify_password, AuthError, TokenConfig};
use crate::domain::customer::Customer;
use crate::domain::types::UserRole;
use crate::domain::user::{SessionContext, User};
use crate::repository::{CustomerRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// 口令最小长度
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// 缺省 CUSTOMER
    #[serde(default)]
    pub role: Option<String>,
    /// 客户账号关联的客户ID
    #[serde(default)]
    pub customer_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// 当前用户（客户账号附带客户档案）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub customer: Option<Customer>,
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::InvalidInput(format!(
            "密码长度不能少于 {} 位",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// ==========================================
// AuthApi - 认证 API
// ==========================================
pub struct AuthApi {
    user_repo: Arc<UserRepository>,
    customer_repo: Arc<CustomerRepository>,
    token_config: TokenConfig,
}

impl AuthApi {
    pub fn new(
        user_repo: Arc<UserRepository>,
        customer_repo: Arc<CustomerRepository>,
        token_config: TokenConfig,
    ) -> Self {
        Self {
            user_repo,
            customer_repo,
            token_config,
        }
    }

    pub fn token_config(&self) -> &TokenConfig {
        &self.token_config
    }

    /// 登录
    pub fn login(&self, req: LoginRequest) -> ApiResult<LoginResponse> {
        let user = self
            .user_repo
            .find_by_username(req.username.trim())?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&req.password, &user.password_hash)? {
            warn!(username = %user.username, "登录失败: 密码错误");
            return Err(AuthError::InvalidCredentials.into());
        }
        if !user.is_active {
            return Err(AuthError::AccountInactive.into());
        }

        let access_token = issue_access_token(&user, &self.token_config)?;
        info!(user_id = user.id, username = %user.username, role = %user.role, "用户登录");
        Ok(LoginResponse { access_token, user })
    }

    /// 当前用户
    pub fn me(&self, ctx: &SessionContext) -> ApiResult<MeResponse> {
        let user = self
            .user_repo
            .find_by_id(ctx.user_id)?
            .ok_or_else(|| ApiError::Unauthorized(format!("用户不存在: {}", ctx.user_id)))?;
        let customer = match (user.role, user.customer_id) {
            (UserRole::Customer, Some(id)) => self.customer_repo.find_by_id(id)?,
            _ => None,
        };
        Ok(MeResponse { user, customer })
    }

    /// 注册
    ///
    /// # 参数
    /// - ctx: 调用者会话（匿名注册为 None）
    pub fn register(&self, ctx: Option<&SessionContext>, req: RegisterRequest) -> ApiResult<User> {
        let role = match req.role.as_deref().filter(|r| !r.trim().is_empty()) {
            None => UserRole::Customer,
            Some(raw) => UserRole::parse(raw)
                .ok_or_else(|| ApiError::InvalidInput(format!("未知角色: {}", raw)))?,
        };
        if role != UserRole::Customer {
            let ctx = ctx.ok_or_else(|| ApiError::Unauthorized("创建运营账号需要登录".to_string()))?;
            require_admin(ctx)?;
        }

        let username = req.username.trim();
        let email = req.email.trim();
        if username.is_empty() || email.is_empty() {
            return Err(ApiError::InvalidInput("用户名和邮箱不能为空".to_string()));
        }
        validate_password(&req.password)?;

        if self.user_repo.find_by_username(username)?.is_some() {
            return Err(ApiError::InvalidInput(format!("用户名已存在: {}", username)));
        }

        let customer_id = match (role, req.customer_id) {
            (UserRole::Customer, Some(id)) => {
                // 关联已有客户档案只能由运营操作，匿名注册不能认领他人档案
                let ctx = ctx.ok_or_else(|| {
                    ApiError::Forbidden("关联客户档案需要运营账号操作".to_string())
                })?;
                require_staff(ctx)?;
                let customer = self
                    .customer_repo
                    .find_by_id(id)?
                    .ok_or(ApiError::UnknownCustomer(id))?;
                if self.user_repo.find_by_customer_id(customer.id)?.is_some() {
                    return Err(ApiError::InvalidInput(format!(
                        "客户 {} 已关联账号",
                        customer.customer_code
                    )));
                }
                Some(customer.id)
            }
            (UserRole::Customer, None) => None,
            (_, Some(_)) => {
                return Err(ApiError::InvalidInput(
                    "只有客户账号可以关联客户".to_string(),
                ))
            }
            (_, None) => None,
        };

        let hash = hash_password(&req.password)?;
        let user = self
            .user_repo
            .insert(username, email, &hash, role, customer_id)?;
        info!(user_id = user.id, username = %user.username, role = %role, "用户已注册");
        Ok(user)
    }

    /// 修改密码
    pub fn change_password(&self, ctx: &SessionContext, req: ChangePasswordRequest) -> ApiResult<()> {
        let user = self
            .user_repo
            .find_by_id(ctx.user_id)?
            .ok_or_else(|| ApiError::Unauthorized(format!("用户不存在: {}", ctx.user_id)))?;

        if !verify_password(&req.current_password, &user.password_hash)? {
            return Err(ApiError::InvalidInput("当前密码不正确".to_string()));
        }
        validate_password(&req.new_password)?;

        let hash = hash_password(&req.new_password)?;
        self.user_repo.update_password(user.id, &hash)?;
        info!(user_id = user.id, "密码已修改");
        Ok(())
    }

    /// 空库时创建初始管理员
    ///
    /// # 返回
    /// - Ok(Some(User)): 已创建
    /// - Ok(None): 已存在用户，未做任何操作
    pub fn ensure_bootstrap_admin(&self, username: &str, password: &str) -> ApiResult<Option<User>> {
        if self.user_repo.count()? > 0 {
            return Ok(None);
        }
        validate_password(password)?;
        let hash = hash_password(password)?;
        let email = format!("{}@localhost", username);
        let user = self
            .user_repo
            .insert(username, &email, &hash, UserRole::Admin, None)?;
        info!(username, "初始管理员已创建");
        Ok(Some(user))
    }
}
