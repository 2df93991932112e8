// ==========================================
// 雏鸡订单分配系统 - 分配编排器
// ==========================================
// 用途: 日期锁 + 读取规则 + 单事务执行单日分配
// 红线: 同一日期同一时刻最多一个运行中的分配
// ==========================================

use crate::config::AllocationRulesReader;
use crate::engine::allocation::{AllocationEngine, RunOutcome};
use crate::engine::date_lock::DateLockRegistry;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::AllocationRepository;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

// ==========================================
// AllocationOrchestrator - 分配编排器
// ==========================================
pub struct AllocationOrchestrator {
    allocation_repo: Arc<AllocationRepository>,
    rules: Arc<dyn AllocationRulesReader>,
    locks: Arc<DateLockRegistry>,
    engine: AllocationEngine,
}

impl AllocationOrchestrator {
    pub fn new(
        allocation_repo: Arc<AllocationRepository>,
        rules: Arc<dyn AllocationRulesReader>,
        locks: Arc<DateLockRegistry>,
    ) -> Self {
        Self {
            allocation_repo,
            rules,
            locks,
            engine: AllocationEngine::new(),
        }
    }

    /// 执行单日分配
    ///
    /// # 参数
    /// - date: 交付日期
    ///
    /// # 返回
    /// - Ok(RunOutcome): 已提交的运行结果
    /// - Err(NoSupplyData / OverCommitted): 未写入任何数据
    #[instrument(skip(self))]
    pub fn run_date(&self, date: NaiveDate) -> EngineResult<RunOutcome> {
        let started = Instant::now();
        let rules = self
            .rules
            .load_rules()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let engine = self.engine;

        let result = self.locks.with_date(date, || {
            self.allocation_repo
                .with_date_plan(date, |snapshot| engine.plan_date(snapshot, &rules))
        })?;

        match result {
            Ok((snapshot, plan)) => {
                let outcome = RunOutcome::from_plan(&snapshot, &plan);
                info!(
                    date = %date,
                    candidates = snapshot.candidates.len(),
                    supply = outcome.supply_available,
                    committed = outcome.committed_qty,
                    allocated_total = outcome.allocated_total,
                    waitlisted = outcome.waitlisted.len(),
                    promoted = outcome.promoted.len(),
                    remaining = outcome.remaining,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "单日分配完成"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(date = %date, error = %e, "单日分配未执行");
                Err(e)
            }
        }
    }
}
