// ==========================================
// 雏鸡订单分配系统 - 导入/导出层
// ==========================================
// 职责: 客户 CSV 导入（按客户编码插入或更新）、提货清单 CSV 导出
// ==========================================

pub mod customer_csv;
pub mod dispatch_csv;
pub mod error;

pub use customer_csv::{CustomerCsvImporter, CustomerImportReport, RowError};
pub use dispatch_csv::{write_dispatch_list, DispatchRow};
pub use error::{ImportError, ImportResult};
