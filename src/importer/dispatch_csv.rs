// ==========================================
// 雏鸡订单分配系统 - 提货清单 CSV 导出
// ==========================================
// 用途: 仓库按日打印提货清单（待提货分配）
// ==========================================

use crate::domain::types::CustomerTier;
use crate::importer::error::ImportResult;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// 提货清单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRow {
    pub customer_code: String,
    pub farm_name: String,
    pub phone: String,
    pub zone: Option<String>,
    pub tier: CustomerTier,
    pub order_number: String,
    pub allocated_qty: i64,
    pub pickup_deadline: Option<DateTime<Utc>>,
}

/// 写出提货清单（含表头）
pub fn write_dispatch_list<W: Write>(output: W, rows: &[DispatchRow]) -> ImportResult<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(output);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
