// ==========================================
// 雏鸡订单分配系统 - 领域类型定义
// ==========================================
// 职责: 客户等级、订单状态机、分配/候补状态、用户角色
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 客户等级 (Customer Tier)
// ==========================================
// 顺序: Standard < Silver < Gold（分配时按降序服务）
// 兼容原系统等级名: Contract=Gold, Loyal=Silver, New=Standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerTier {
    Standard, // 普通客户
    Silver,   // 长期客户
    Gold,     // 合同客户
}

impl CustomerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerTier::Standard => "STANDARD",
            CustomerTier::Silver => "SILVER",
            CustomerTier::Gold => "GOLD",
        }
    }

    /// 解析等级字符串（大小写不敏感，接受原系统别名）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOLD" | "CONTRACT" => Some(CustomerTier::Gold),
            "SILVER" | "LOYAL" => Some(CustomerTier::Silver),
            "STANDARD" | "NEW" => Some(CustomerTier::Standard),
            _ => None,
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 状态机:
//   PENDING             -> ALLOCATED | PARTIALLY_ALLOCATED | WAITLISTED | CANCELLED
//   PARTIALLY_ALLOCATED -> ALLOCATED | WAITLISTED | CANCELLED
//   WAITLISTED          -> PARTIALLY_ALLOCATED | ALLOCATED | CANCELLED
//   ALLOCATED           -> FULFILLED | CANCELLED (提货前)
//   FULFILLED / CANCELLED 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Allocated,
    PartiallyAllocated,
    Waitlisted,
    Cancelled,
    Fulfilled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Allocated => "ALLOCATED",
            OrderStatus::PartiallyAllocated => "PARTIALLY_ALLOCATED",
            OrderStatus::Waitlisted => "WAITLISTED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Fulfilled => "FULFILLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "ALLOCATED" => Some(OrderStatus::Allocated),
            "PARTIALLY_ALLOCATED" => Some(OrderStatus::PartiallyAllocated),
            "WAITLISTED" => Some(OrderStatus::Waitlisted),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "FULFILLED" => Some(OrderStatus::Fulfilled),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Fulfilled)
    }

    /// 是否参与分配（分配引擎候选集）
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::PartiallyAllocated | OrderStatus::Waitlisted
        )
    }

    /// 状态转换是否合法
    ///
    /// 保持当前状态（重算时常见）视为合法的空操作。
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;

        if *self == to {
            return !self.is_terminal();
        }

        match (self, to) {
            (Pending, Allocated | PartiallyAllocated | Waitlisted | Cancelled) => true,
            (PartiallyAllocated, Allocated | Waitlisted | Cancelled) => true,
            (Waitlisted, PartiallyAllocated | Allocated | Cancelled) => true,
            (Allocated, Fulfilled | Cancelled) => true,
            _ => false,
        }
    }

    /// 所有“未结”状态（统计口径：待处理订单）
    pub fn open_statuses() -> [OrderStatus; 3] {
        [
            OrderStatus::Pending,
            OrderStatus::PartiallyAllocated,
            OrderStatus::Waitlisted,
        ]
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 分配记录状态 (Allocation Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Pending,   // 待提货
    PickedUp,  // 已提货
    Cancelled, // 已取消
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Pending => "PENDING",
            AllocationStatus::PickedUp => "PICKED_UP",
            AllocationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(AllocationStatus::Pending),
            "PICKED_UP" => Some(AllocationStatus::PickedUp),
            "CANCELLED" => Some(AllocationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 候补状态 (Waitlist Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaitlistStatus {
    Waiting,
    Fulfilled,
    Cancelled,
}

impl WaitlistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitlistStatus::Waiting => "WAITING",
            WaitlistStatus::Fulfilled => "FULFILLED",
            WaitlistStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WAITING" => Some(WaitlistStatus::Waiting),
            "FULFILLED" => Some(WaitlistStatus::Fulfilled),
            "CANCELLED" => Some(WaitlistStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 用户角色 (User Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Manager,
    Customer,
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Manager => "MANAGER",
            UserRole::Customer => "CUSTOMER",
            UserRole::Driver => "DRIVER",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "MANAGER" => Some(UserRole::Manager),
            "CUSTOMER" => Some(UserRole::Customer),
            "DRIVER" => Some(UserRole::Driver),
            _ => None,
        }
    }

    /// 是否为后台运营角色（可维护供给、执行分配）
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Manager)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 通知渠道与状态
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Sms,
    Email,
    Push,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Sms => "SMS",
            NotificationKind::Email => "EMAIL",
            NotificationKind::Push => "PUSH",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "PENDING",
            NotificationStatus::Sent => "SENT",
            NotificationStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(NotificationStatus::Pending),
            "SENT" => Some(NotificationStatus::Sent),
            "FAILED" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(CustomerTier::Gold > CustomerTier::Silver);
        assert!(CustomerTier::Silver > CustomerTier::Standard);
    }

    #[test]
    fn test_tier_alias() {
        assert_eq!(CustomerTier::parse("Contract"), Some(CustomerTier::Gold));
        assert_eq!(CustomerTier::parse("loyal"), Some(CustomerTier::Silver));
        assert_eq!(CustomerTier::parse("New"), Some(CustomerTier::Standard));
        assert_eq!(CustomerTier::parse("platinum"), None);
    }

    #[test]
    fn test_order_state_machine() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Allocated));
        assert!(Pending.can_transition_to(Waitlisted));
        assert!(PartiallyAllocated.can_transition_to(Waitlisted));
        assert!(Waitlisted.can_transition_to(PartiallyAllocated));
        assert!(Allocated.can_transition_to(Fulfilled));
        assert!(Allocated.can_transition_to(Cancelled));

        // 重算保持原状态
        assert!(Waitlisted.can_transition_to(Waitlisted));

        // 非法转换
        assert!(!Allocated.can_transition_to(Waitlisted));
        assert!(!Pending.can_transition_to(Fulfilled));
        assert!(!Fulfilled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_roundtrip_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Allocated,
            OrderStatus::PartiallyAllocated,
            OrderStatus::Waitlisted,
            OrderStatus::Cancelled,
            OrderStatus::Fulfilled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
    }
}
