// ==========================================
// 雏鸡订单分配系统 - 通知服务
// ==========================================
// 职责: 组装客户通知并通过渠道投递，记录投递结果
// 消息: 下单确认（短信+邮件）/ 分配（短信+邮件+推送）/ 候补（短信+邮件）
// ==========================================

use crate::domain::customer::Customer;
use crate::domain::notification::OutgoingMessage;
use crate::domain::order::Order;
use crate::domain::types::NotificationKind;
use crate::engine::allocation::{pickup_deadline, RunLine, RunOutcome};
use crate::notification::channel::NotificationChannel;
use crate::repository::{CustomerRepository, NotificationRepository};
use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const SIGNATURE: &str = "- ChickFlow";
const RECIPIENT_CUSTOMER: &str = "customer";

/// 一批通知的投递汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn merge(&mut self, other: DispatchReport) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

fn message(
    customer: &Customer,
    kind: NotificationKind,
    contact: String,
    subject: Option<String>,
    text: &str,
) -> OutgoingMessage {
    OutgoingMessage {
        recipient_type: RECIPIENT_CUSTOMER.to_string(),
        recipient_id: Some(customer.id),
        recipient_contact: contact,
        kind,
        subject,
        message: text.to_string(),
    }
}

/// 短信 + 邮件（有邮箱时）
fn sms_and_email(customer: &Customer, subject: String, text: &str) -> Vec<OutgoingMessage> {
    let mut out = vec![message(
        customer,
        NotificationKind::Sms,
        customer.phone.clone(),
        None,
        text,
    )];
    if let Some(email) = customer.email.as_ref().filter(|e| !e.trim().is_empty()) {
        out.push(message(
            customer,
            NotificationKind::Email,
            email.clone(),
            Some(subject),
            text,
        ));
    }
    out
}

/// 下单确认消息
pub fn order_confirmation_messages(customer: &Customer, order: &Order) -> Vec<OutgoingMessage> {
    let text = format!(
        "Hi {}, your order {} for {} chicks has been received. Requested delivery: {}. \
         We'll notify you once allocated. {}",
        customer.farm_name,
        order.order_number,
        order.order_qty,
        order.requested_delivery_date,
        SIGNATURE
    );
    sms_and_email(
        customer,
        format!("Order Confirmation - {}", order.order_number),
        &text,
    )
}

/// 分配消息
pub fn allocation_messages(
    customer: &Customer,
    line: &RunLine,
    date: NaiveDate,
    deadline_hour: u32,
) -> Vec<OutgoingMessage> {
    let deadline = pickup_deadline(date, deadline_hour)
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| date.to_string());
    let text = format!(
        "Great news {}! {} chicks allocated for pickup on {}. Deadline: {}. Order: {}. {}",
        customer.farm_name, line.qty, date, deadline, line.order_number, SIGNATURE
    );

    let mut out = sms_and_email(customer, "Chicks Allocated - Ready for Pickup".to_string(), &text);
    out.push(message(
        customer,
        NotificationKind::Push,
        format!("user_{}", customer.id),
        Some("Chicks Allocated!".to_string()),
        &text,
    ));
    out
}

/// 候补消息
pub fn waitlist_messages(customer: &Customer, line: &RunLine) -> Vec<OutgoingMessage> {
    let text = format!(
        "Hi {}, today's allocation is full. You're prioritized for the next batch. \
         Order: {}. Thank you for your patience! {}",
        customer.farm_name, line.order_number, SIGNATURE
    );
    sms_and_email(
        customer,
        "Order Waitlisted - Priority for Next Batch".to_string(),
        &text,
    )
}

// ==========================================
// NotificationService - 通知服务
// ==========================================
pub struct NotificationService {
    channel: Arc<dyn NotificationChannel>,
    notification_repo: Arc<NotificationRepository>,
    customer_repo: Arc<CustomerRepository>,
}

impl NotificationService {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        notification_repo: Arc<NotificationRepository>,
        customer_repo: Arc<CustomerRepository>,
    ) -> Self {
        Self {
            channel,
            notification_repo,
            customer_repo,
        }
    }

    /// 投递并记录一批消息（同批消息并发投递，日志在阻塞线程池批量写入）
    pub async fn dispatch(&self, messages: Vec<OutgoingMessage>) -> DispatchReport {
        let deliveries = messages.iter().map(|msg| self.channel.deliver(msg));
        let results = join_all(deliveries).await;

        let mut report = DispatchReport::default();
        let mut records = Vec::with_capacity(messages.len());
        for (msg, result) in messages.into_iter().zip(results) {
            let error = result.err().map(|e| e.to_string());
            match &error {
                None => report.sent += 1,
                Some(e) => {
                    report.failed += 1;
                    warn!(
                        channel = self.channel.name(),
                        kind = msg.kind.as_str(),
                        to = %msg.recipient_contact,
                        error = %e,
                        "通知投递失败"
                    );
                }
            }
            records.push((msg, error));
        }

        let repo = Arc::clone(&self.notification_repo);
        let written = tokio::task::spawn_blocking(move || {
            for (msg, error) in &records {
                if let Err(e) = repo.record(msg, error.as_deref()) {
                    warn!(error = %e, "通知日志写入失败");
                }
            }
        })
        .await;
        if let Err(e) = written {
            warn!(error = %e, "通知日志任务异常终止");
        }
        report
    }

    /// 下单确认
    pub async fn notify_order_created(&self, customer: &Customer, order: &Order) -> DispatchReport {
        self.dispatch(order_confirmation_messages(customer, order)).await
    }

    /// 单日分配结果通知（主分配 + 晋升 + 候补）
    pub async fn notify_run(&self, outcome: &RunOutcome, deadline_hour: u32) -> DispatchReport {
        let mut report = DispatchReport::default();

        let granted = outcome.allocated.iter().chain(outcome.promoted.iter());
        for line in granted.filter(|l| l.qty > 0) {
            if let Some(customer) = self.lookup(line.customer_id).await {
                let msgs = allocation_messages(&customer, line, outcome.date, deadline_hour);
                report.merge(self.dispatch(msgs).await);
            }
        }

        // 候补状态与缺口都没变的不再重复通知
        for line in outcome.waitlisted.iter().filter(|l| l.changed) {
            if let Some(customer) = self.lookup(line.customer_id).await {
                report.merge(self.dispatch(waitlist_messages(&customer, line)).await);
            }
        }

        debug!(date = %outcome.date, sent = report.sent, failed = report.failed, "分配通知完成");
        report
    }

    async fn lookup(&self, customer_id: i64) -> Option<Customer> {
        let repo = Arc::clone(&self.customer_repo);
        match tokio::task::spawn_blocking(move || repo.find_by_id(customer_id)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(customer_id, error = %e, "通知收件人查询失败");
                None
            }
            Err(e) => {
                warn!(customer_id, error = %e, "通知收件人查询任务异常终止");
                None
            }
        }
    }
}
