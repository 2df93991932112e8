// ==========================================
// 雏鸡订单分配系统 - 候补 API
// ==========================================
// 职责: 候补排名查询、手动晋升（处理候补）
// 权限: 运营
// ==========================================

use crate::api::access::require_staff;
use crate::api::error::ApiResult;
use crate::domain::allocation::WaitlistView;
use crate::domain::user::SessionContext;
use crate::engine::{RunOutcome, WaitlistManager};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 候补查询参数（GET /waitlist）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaitlistQuery {
    /// 仅返回可被该日供给晋升的候补（target_date <= date）
    pub date: Option<NaiveDate>,
}

/// 处理候补请求（POST /waitlist/process）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessWaitlistRequest {
    pub date: NaiveDate,
    /// 可用于晋升的数量；缺省为当日全部剩余供给
    #[serde(default)]
    pub qty: Option<i64>,
}

// ==========================================
// WaitlistApi - 候补 API
// ==========================================
pub struct WaitlistApi {
    manager: Arc<WaitlistManager>,
}

impl WaitlistApi {
    pub fn new(manager: Arc<WaitlistManager>) -> Self {
        Self { manager }
    }

    pub fn list_waitlist(&self, ctx: &SessionContext, query: WaitlistQuery) -> ApiResult<Vec<WaitlistView>> {
        require_staff(ctx)?;
        Ok(self.manager.list_waitlist(query.date)?)
    }

    pub fn process_waitlist(&self, ctx: &SessionContext, req: ProcessWaitlistRequest) -> ApiResult<RunOutcome> {
        require_staff(ctx)?;
        let qty = req.qty.unwrap_or(i64::MAX);
        Ok(self.manager.promote(req.date, qty)?)
    }
}
