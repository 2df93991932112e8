// ==========================================
// 雏鸡订单分配系统 - 通知日志模型
// ==========================================

use crate::domain::types::{NotificationKind, NotificationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 通知日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub recipient_type: String, // customer / admin
    pub recipient_id: Option<i64>,
    pub recipient_contact: String,
    pub kind: NotificationKind,
    pub subject: Option<String>,
    pub message: String,
    pub status: NotificationStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 待发送的通知消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub recipient_type: String,
    pub recipient_id: Option<i64>,
    pub recipient_contact: String,
    pub kind: NotificationKind,
    pub subject: Option<String>,
    pub message: String,
}
