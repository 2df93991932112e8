// ==========================================
// 雏鸡订单分配系统 - 供给台账
// ==========================================
// 职责: 预计/实际供给维护，供给变化时请求重算
// 红线: 实际供给确认后不可修改（仅管理员可带审计覆写）
// ==========================================

use crate::domain::supply::{SupplyAudit, SupplyRecord};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{AllocationEvent, AllocationEventPublisher, AllocationEventType};
use crate::repository::{ConfirmOutcome, SupplyRepository};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct InventoryLedger {
    supply_repo: Arc<SupplyRepository>,
    events: Arc<dyn AllocationEventPublisher>,
}

impl InventoryLedger {
    pub fn new(supply_repo: Arc<SupplyRepository>, events: Arc<dyn AllocationEventPublisher>) -> Self {
        Self {
            supply_repo,
            events,
        }
    }

    fn validate_qty(qty: i64) -> EngineResult<()> {
        if qty < 0 {
            return Err(EngineError::InvalidQuantity(format!(
                "供给数量不能为负: {}",
                qty
            )));
        }
        Ok(())
    }

    fn request_run(&self, date: NaiveDate, event_type: AllocationEventType, source: &str) {
        let event = AllocationEvent::new(date, event_type, source);
        if let Err(e) = self.events.publish(event) {
            warn!(date = %date, event_type = event_type.as_str(), error = %e, "重算请求未完成");
        }
    }

    /// 设置预计供给（可在确认后继续修改，仅作预测）
    ///
    /// 尚未确认实际供给时，预计值是分配上限，因此会请求重算。
    #[instrument(skip(self, notes))]
    pub fn set_expected_supply(
        &self,
        date: NaiveDate,
        qty: i64,
        notes: Option<&str>,
    ) -> EngineResult<SupplyRecord> {
        Self::validate_qty(qty)?;
        let record = self.supply_repo.upsert_expected(date, qty, notes)?;

        info!(date = %date, expected_supply = qty, "预计供给已更新");
        if !record.is_confirmed() {
            self.request_run(date, AllocationEventType::ExpectedSupplyChanged, "expected_supply");
        }
        Ok(record)
    }

    /// 确认实际供给
    ///
    /// # 返回
    /// - Ok(SupplyRecord): 已确认（记录不存在时新建）
    /// - Err(AlreadyConfirmed): 已确认过，未做修改
    #[instrument(skip(self, notes))]
    pub fn confirm_actual_supply(
        &self,
        date: NaiveDate,
        qty: i64,
        notes: Option<&str>,
    ) -> EngineResult<SupplyRecord> {
        Self::validate_qty(qty)?;

        match self.supply_repo.confirm_actual(date, qty, notes)? {
            ConfirmOutcome::Confirmed(record) => {
                info!(date = %date, actual_supply = qty, "实际供给已确认");
                self.request_run(date, AllocationEventType::SupplyConfirmed, "confirm_actual");
                Ok(record)
            }
            ConfirmOutcome::AlreadyConfirmed(_) => Err(EngineError::AlreadyConfirmed { date }),
        }
    }

    /// 覆写已确认的实际供给（带审计）
    #[instrument(skip(self))]
    pub fn override_actual_supply(
        &self,
        date: NaiveDate,
        qty: i64,
        reason: &str,
        operator: &str,
    ) -> EngineResult<SupplyRecord> {
        Self::validate_qty(qty)?;
        if reason.trim().is_empty() {
            return Err(EngineError::InvalidInput("覆写原因不能为空".to_string()));
        }

        let record = self
            .supply_repo
            .override_actual(date, qty, reason.trim(), operator)
            .map_err(|e| match e {
                crate::repository::RepositoryError::NotFound { .. } => {
                    EngineError::not_found("SupplyRecord", date)
                }
                other => other.into(),
            })?;

        warn!(date = %date, actual_supply = qty, operator, reason, "实际供给已覆写");
        self.request_run(date, AllocationEventType::SupplyOverridden, "override_actual");
        Ok(record)
    }

    /// 查询单日供给
    pub fn get_supply(&self, date: NaiveDate) -> EngineResult<SupplyRecord> {
        self.supply_repo
            .find_by_date(date)?
            .ok_or_else(|| EngineError::not_found("SupplyRecord", date))
    }

    /// 查询供给列表（日期降序）
    pub fn list_supply(
        &self,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
    ) -> EngineResult<Vec<SupplyRecord>> {
        Ok(self.supply_repo.list_range(date_from, date_to)?)
    }

    /// 查询覆写审计
    pub fn list_audits(&self, date: NaiveDate) -> EngineResult<Vec<SupplyAudit>> {
        Ok(self.supply_repo.list_audits(date)?)
    }
}
