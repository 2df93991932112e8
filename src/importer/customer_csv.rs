// ==========================================
// 雏鸡订单分配系统 - 客户 CSV 导入
// ==========================================
// 列: customer_code, farm_name, phone, email, zone, tier[, address]
// 规则: 按 customer_code 插入或更新；等级兼容 Contract/Loyal/New
// 红线: 单行失败只记入报告，不影响其他行
// ==========================================

use crate::domain::customer::NewCustomer;
use crate::domain::types::CustomerTier;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::CustomerRepository;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

const REQUIRED_COLUMNS: [&str; 3] = ["customer_code", "farm_name", "phone"];

/// CSV 行（表头匹配）
#[derive(Debug, Deserialize)]
struct CustomerRow {
    customer_code: String,
    farm_name: String,
    phone: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    zone: Option<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// 行级错误（行号从 1 开始，含表头）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// 导入汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerImportReport {
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<RowError>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CustomerRow {
    fn into_new_customer(self) -> Result<NewCustomer, String> {
        for (field, value) in [
            ("customer_code", &self.customer_code),
            ("farm_name", &self.farm_name),
            ("phone", &self.phone),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{} 为空", field));
            }
        }

        let tier = match non_empty(self.tier) {
            None => CustomerTier::Standard,
            Some(raw) => {
                CustomerTier::parse(&raw).ok_or_else(|| format!("无法识别的客户等级: {}", raw))?
            }
        };

        Ok(NewCustomer {
            customer_code: self.customer_code,
            farm_name: self.farm_name,
            phone: self.phone,
            email: non_empty(self.email),
            zone: non_empty(self.zone),
            address: non_empty(self.address),
            tier,
        })
    }
}

// ==========================================
// CustomerCsvImporter - 客户导入器
// ==========================================
pub struct CustomerCsvImporter {
    customer_repo: Arc<CustomerRepository>,
}

impl CustomerCsvImporter {
    pub fn new(customer_repo: Arc<CustomerRepository>) -> Self {
        Self { customer_repo }
    }

    /// 从文件导入
    pub fn import_file(&self, path: &Path) -> ImportResult<CustomerImportReport> {
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if let Some(ext) = path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }
        let file = File::open(path)?;
        self.import_reader(file)
    }

    /// 从任意输入流导入（HTTP 上传体、测试数据）
    pub fn import_reader<R: Read>(&self, input: R) -> ImportResult<CustomerImportReport> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(ImportError::MissingColumn(column.to_string()));
            }
        }

        let mut report = CustomerImportReport::default();
        for (idx, result) in reader.deserialize::<CustomerRow>().enumerate() {
            let row = idx + 2;
            report.total_rows += 1;

            let parsed = result
                .map_err(|e| e.to_string())
                .and_then(CustomerRow::into_new_customer);
            let new_customer = match parsed {
                Ok(c) => c,
                Err(message) => {
                    report.errors.push(RowError { row, message });
                    continue;
                }
            };

            match self.customer_repo.upsert_by_code(&new_customer) {
                Ok((_, true)) => report.created += 1,
                Ok((_, false)) => report.updated += 1,
                Err(e) => report.errors.push(RowError {
                    row,
                    message: e.to_string(),
                }),
            }
        }

        if report.errors.is_empty() {
            info!(
                total = report.total_rows,
                created = report.created,
                updated = report.updated,
                "客户导入完成"
            );
        } else {
            warn!(
                total = report.total_rows,
                created = report.created,
                updated = report.updated,
                failed = report.errors.len(),
                "客户导入完成（部分行失败）"
            );
        }
        Ok(report)
    }
}
