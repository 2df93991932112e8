// ==========================================
// 雏鸡订单分配系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 文件级错误中止导入；行级错误记入报告后继续
// ==========================================

use crate::repository::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv）")]
    UnsupportedFormat(String),

    #[error("缺少必需列: {0}")]
    MissingColumn(String),

    #[error("CSV 解析失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("文件读取失败: {0}")]
    Io(#[from] std::io::Error),

    // ===== 数据库错误 =====
    #[error("数据库错误: {0}")]
    Repository(#[from] RepositoryError),
}

pub type ImportResult<T> = Result<T, ImportError>;
