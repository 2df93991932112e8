// ==========================================
// 雏鸡订单分配系统 - 规则配置 API
// ==========================================
// 职责: 分配规则查询与更新
// 权限: 查询需运营；更新需管理员
// ==========================================

use crate::api::access::{require_admin, require_staff};
use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigItem, ConfigManager};
use crate::domain::user::SessionContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 更新配置请求（PUT /config/:key）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
    pub value: String,
}

// ==========================================
// ConfigApi - 配置 API
// ==========================================
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    pub fn list_configs(&self, ctx: &SessionContext) -> ApiResult<Vec<ConfigItem>> {
        require_staff(ctx)?;
        self.config_manager
            .list_configs()
            .map_err(|e| ApiError::InternalError(e.to_string()))
    }

    pub fn update_config(
        &self,
        ctx: &SessionContext,
        key: &str,
        req: UpdateConfigRequest,
    ) -> ApiResult<ConfigItem> {
        require_admin(ctx)?;
        let item = self
            .config_manager
            .update_config(key, &req.value)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        info!(config_key = key, value = %item.value, operator = %ctx.username, "规则配置已更新");
        Ok(item)
    }
}
