// ==========================================
// 雏鸡订单分配系统 - 引擎层错误类型
// ==========================================

use crate::domain::types::OrderStatus;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 输入校验 =====
    #[error("数量非法: {0}")]
    InvalidQuantity(String),

    #[error("参数非法: {0}")]
    InvalidInput(String),

    #[error("客户不存在或已停用: customer_id={0}")]
    UnknownCustomer(i64),

    // ===== 状态错误 =====
    #[error("状态不允许该操作: {0}")]
    InvalidState(String),

    #[error("实际供给已确认: date={date}")]
    AlreadyConfirmed { date: NaiveDate },

    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    // ===== 分配运行 =====
    /// 当日没有供给记录（不写入任何数据）
    #[error("无供给数据: date={date}")]
    NoSupplyData { date: NaiveDate },

    /// 不可重算的已承诺量已超过当日供给（通常由实际供给下调导致）
    #[error("供给已超额承诺: date={date}, committed={committed}, supply={supply}")]
    OverCommitted {
        date: NaiveDate,
        committed: i64,
        supply: i64,
    },

    #[error("非法的订单状态转换: order_id={order_id}, {from} -> {to}")]
    InvalidTransition {
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    },

    // ===== 基础设施 =====
    #[error("日期锁获取失败: {0}")]
    LockError(String),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
