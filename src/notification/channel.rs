// ==========================================
// 雏鸡订单分配系统 - 通知渠道 Trait
// ==========================================
// 用途: 抽象短信/邮件/推送网关
// 实现者: LogChannel（仅记录日志）
// ==========================================

use crate::domain::notification::OutgoingMessage;
use async_trait::async_trait;
use std::error::Error;
use tracing::info;

pub type DeliveryError = Box<dyn Error + Send + Sync>;

// ==========================================
// NotificationChannel Trait
// ==========================================
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// 渠道名称（用于日志）
    fn name(&self) -> &'static str;

    /// 投递一条消息
    ///
    /// # 返回
    /// - Ok(()): 网关已受理
    /// - Err: 投递失败，错误信息会写入通知日志
    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError>;
}

/// 日志渠道（不接真实网关）
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, message: &OutgoingMessage) -> Result<(), DeliveryError> {
        info!(
            kind = message.kind.as_str(),
            to = %message.recipient_contact,
            subject = message.subject.as_deref().unwrap_or(""),
            "{}",
            message.message
        );
        Ok(())
    }
}
