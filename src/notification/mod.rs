// ==========================================
// 雏鸡订单分配系统 - 通知层
// ==========================================
// 职责: 下单确认 / 分配 / 候补通知的组装与投递
// 红线: 每次投递尝试都写入 notification 表（成功或失败）
// 红线: 通知失败不影响业务结果
// ==========================================

pub mod channel;
pub mod service;

pub use channel::{DeliveryError, LogChannel, NotificationChannel};
pub use service::{DispatchReport, NotificationService};
