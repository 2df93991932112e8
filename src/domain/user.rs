// ==========================================
// 雏鸡订单分配系统 - 用户领域模型
// ==========================================

use crate::domain::types::UserRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// User - 系统用户
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // Argon2id PHC 串，不对外输出
    pub role: UserRole,
    pub customer_id: Option<i64>, // 客户账号关联的客户
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 会话上下文
///
/// 每个请求由访问令牌解析得到，显式传入 API 层；
/// 生命周期由调用方（HTTP 层）管理，不存在全局认证状态。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: i64,
    pub username: String,
    pub role: UserRole,
    pub customer_id: Option<i64>,
}

impl SessionContext {
    /// 系统内部会话（后台任务/命令行导入）
    pub fn system() -> Self {
        Self {
            user_id: 0,
            username: "system".to_string(),
            role: UserRole::Admin,
            customer_id: None,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}
