// ==========================================
// 雏鸡订单分配系统 - 供给 API
// ==========================================
// 职责: 预计供给登记、实际供给确认/覆写、供给查询
// 权限: 查询需登录；登记/确认需运营；覆写需管理员
// ==========================================

use crate::api::access::{require_admin, require_staff};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::supply::{SupplyAudit, SupplyRecord};
use crate::domain::user::SessionContext;
use crate::engine::InventoryLedger;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 登记供给请求（POST /inventory）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyRequest {
    pub date: NaiveDate,
    pub expected_supply: i64,
    /// 同时确认实际供给（可选）
    #[serde(default)]
    pub actual_supply: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 确认实际供给请求（POST /inventory/:date/confirm）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmSupplyRequest {
    pub actual_supply: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// 覆写实际供给请求（POST /inventory/:date/override）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSupplyRequest {
    pub actual_supply: i64,
    pub reason: String,
}

/// 供给查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplyQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

// ==========================================
// InventoryApi - 供给 API
// ==========================================
pub struct InventoryApi {
    ledger: Arc<InventoryLedger>,
}

impl InventoryApi {
    pub fn new(ledger: Arc<InventoryLedger>) -> Self {
        Self { ledger }
    }

    /// 登记（或更新）预计供给，可选同时确认实际供给
    pub fn upsert_supply(&self, ctx: &SessionContext, req: SupplyRequest) -> ApiResult<SupplyRecord> {
        require_staff(ctx)?;
        if let Some(actual) = req.actual_supply {
            if actual < 0 {
                return Err(ApiError::InvalidQuantity(format!("实际供给不能为负: {}", actual)));
            }
        }

        let record = self
            .ledger
            .set_expected_supply(req.date, req.expected_supply, req.notes.as_deref())?;
        match req.actual_supply {
            Some(actual) => Ok(self.ledger.confirm_actual_supply(req.date, actual, None)?),
            None => Ok(record),
        }
    }

    /// 确认实际供给
    pub fn confirm_supply(
        &self,
        ctx: &SessionContext,
        date: NaiveDate,
        req: ConfirmSupplyRequest,
    ) -> ApiResult<SupplyRecord> {
        require_staff(ctx)?;
        Ok(self
            .ledger
            .confirm_actual_supply(date, req.actual_supply, req.notes.as_deref())?)
    }

    /// 覆写实际供给（审计）
    pub fn override_supply(
        &self,
        ctx: &SessionContext,
        date: NaiveDate,
        req: OverrideSupplyRequest,
    ) -> ApiResult<SupplyRecord> {
        require_admin(ctx)?;
        Ok(self
            .ledger
            .override_actual_supply(date, req.actual_supply, &req.reason, &ctx.username)?)
    }

    pub fn get_supply(&self, _ctx: &SessionContext, date: NaiveDate) -> ApiResult<SupplyRecord> {
        Ok(self.ledger.get_supply(date)?)
    }

    pub fn list_supply(&self, _ctx: &SessionContext, query: SupplyQuery) -> ApiResult<Vec<SupplyRecord>> {
        Ok(self.ledger.list_supply(query.date_from, query.date_to)?)
    }

    pub fn list_audits(&self, ctx: &SessionContext, date: NaiveDate) -> ApiResult<Vec<SupplyAudit>> {
        require_staff(ctx)?;
        Ok(self.ledger.list_audits(date)?)
    }
}
