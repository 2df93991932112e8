// ==========================================
// 雏鸡订单分配系统 - 后台分配 Worker
// ==========================================
// 职责: 接收分配事件，按日期合并后在阻塞线程池执行单日分配，完成后发送通知
// 说明: 实现 Engine 层定义的 AllocationEventPublisher（依赖倒置）
// 合并规则: 同一日期在队列中只保留一个待执行任务；
//           任务开始执行前移出待执行集合，执行期间到达的事件会再排一次
// ==========================================

use crate::config::{AllocationRules, AllocationRulesReader};
use crate::engine::{
    AllocationEvent, AllocationEventPublisher, AllocationOrchestrator, EngineError, RunOutcome,
};
use crate::notification::NotificationService;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

type PendingDates = Arc<Mutex<HashSet<NaiveDate>>>;

/// 创建 worker 的发送端与接收端
///
/// 发送端可在 worker 启动前交给 OrderBook / InventoryLedger，
/// 事件会在 worker 启动后依次处理。
pub fn allocation_worker() -> (AllocationWorkerHandle, AllocationWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending: PendingDates = Arc::new(Mutex::new(HashSet::new()));
    (
        AllocationWorkerHandle {
            tx,
            pending: pending.clone(),
        },
        AllocationWorker { rx, pending },
    )
}

// ==========================================
// AllocationWorkerHandle - 事件发送端
// ==========================================
#[derive(Clone)]
pub struct AllocationWorkerHandle {
    tx: mpsc::UnboundedSender<NaiveDate>,
    pending: PendingDates,
}

impl AllocationWorkerHandle {
    /// 当前排队中的日期数
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl AllocationEventPublisher for AllocationWorkerHandle {
    fn publish(&self, event: AllocationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        {
            let mut pending = self
                .pending
                .lock()
                .map_err(|e| format!("待执行集合锁获取失败: {}", e))?;
            if !pending.insert(event.date) {
                debug!(
                    date = %event.date,
                    event_type = event.event_type.as_str(),
                    "分配事件已合并"
                );
                return Ok(());
            }
        }

        if let Err(e) = self.tx.send(event.date) {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&event.date);
            }
            return Err(format!("分配 worker 已停止: date={}", e.0).into());
        }

        debug!(
            date = %event.date,
            event_type = event.event_type.as_str(),
            source = event.source.as_deref().unwrap_or(""),
            "分配事件已入队"
        );
        Ok(())
    }
}

// ==========================================
// AllocationWorker - 事件接收端
// ==========================================
pub struct AllocationWorker {
    rx: mpsc::UnboundedReceiver<NaiveDate>,
    pending: PendingDates,
}

impl AllocationWorker {
    /// 在当前 tokio 运行时中启动 worker
    ///
    /// # 参数
    /// - orchestrator: 单日分配编排器
    /// - rules: 分配规则（取提货截止小时用于通知）
    /// - notifier: 通知服务（None 时不发送通知）
    pub fn spawn(
        self,
        orchestrator: Arc<AllocationOrchestrator>,
        rules: Arc<dyn AllocationRulesReader>,
        notifier: Option<Arc<NotificationService>>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(orchestrator, rules, notifier))
    }

    async fn run(
        mut self,
        orchestrator: Arc<AllocationOrchestrator>,
        rules: Arc<dyn AllocationRulesReader>,
        notifier: Option<Arc<NotificationService>>,
    ) {
        info!("分配 worker 已启动");

        while let Some(date) = self.rx.recv().await {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&date);
            }

            let Some(outcome) = run_blocking(orchestrator.clone(), date).await else {
                continue;
            };

            if let Some(notifier) = &notifier {
                let deadline_hour = deadline_hour(rules.as_ref());
                let report = notifier.notify_run(&outcome, deadline_hour).await;
                debug!(date = %date, sent = report.sent, failed = report.failed, "分配通知已发送");
            }
        }

        info!("分配 worker 已退出（发送端全部关闭）");
    }
}

/// 在阻塞线程池执行单日分配
///
/// # 返回
/// - Some(RunOutcome): 已提交
/// - None: 无供给/超额承诺/失败（已记录日志）
pub async fn run_blocking(
    orchestrator: Arc<AllocationOrchestrator>,
    date: NaiveDate,
) -> Option<RunOutcome> {
    match tokio::task::spawn_blocking(move || orchestrator.run_date(date)).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(EngineError::NoSupplyData { .. })) => {
            debug!(date = %date, "无供给数据，跳过分配");
            None
        }
        Ok(Err(e)) => {
            warn!(date = %date, error = %e, "后台分配失败");
            None
        }
        Err(e) => {
            error!(date = %date, error = %e, "后台分配任务异常终止");
            None
        }
    }
}

/// 读取提货截止小时（读取失败时使用默认规则）
pub fn deadline_hour(rules: &dyn AllocationRulesReader) -> u32 {
    match rules.load_rules() {
        Ok(r) => r.pickup_deadline_hour,
        Err(e) => {
            warn!(error = %e, "分配规则读取失败，通知使用默认提货截止时间");
            AllocationRules::default().pickup_deadline_hour
        }
    }
}
