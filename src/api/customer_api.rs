// ==========================================
// 雏鸡订单分配系统 - 客户 API
// ==========================================
// 职责: 客户查询、建档、等级调整、CSV 批量导入
// 权限: 查询/建档/导入需运营；等级调整需管理员；客户账号可看自己的档案
// ==========================================

use crate::api::access::{ensure_customer_access, require_admin, require_staff};
use crate::api::error::{ApiError, ApiResult};
use crate::domain::customer::{Customer, NewCustomer};
use crate::domain::types::CustomerTier;
use crate::domain::user::SessionContext;
use crate::importer::{CustomerCsvImporter, CustomerImportReport};
use crate::repository::CustomerRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// 客户查询参数（GET /customers）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerQuery {
    pub tier: Option<String>,
    pub zone: Option<String>,
    /// 查看已停用客户
    #[serde(default)]
    pub inactive: bool,
}

/// 建档请求（POST /customers）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub customer_code: String,
    pub farm_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// 默认 STANDARD；接受 Contract/Loyal/New
    #[serde(default)]
    pub tier: Option<String>,
}

/// 等级调整请求（PUT /customers/:id/tier）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTierRequest {
    pub tier: String,
}

fn parse_tier(raw: &str) -> ApiResult<CustomerTier> {
    CustomerTier::parse(raw).ok_or_else(|| ApiError::InvalidInput(format!("未知客户等级: {}", raw)))
}

// ==========================================
// CustomerApi - 客户 API
// ==========================================
pub struct CustomerApi {
    customer_repo: Arc<CustomerRepository>,
    importer: CustomerCsvImporter,
}

impl CustomerApi {
    pub fn new(customer_repo: Arc<CustomerRepository>) -> Self {
        Self {
            importer: CustomerCsvImporter::new(customer_repo.clone()),
            customer_repo,
        }
    }

    pub fn list_customers(&self, ctx: &SessionContext, query: CustomerQuery) -> ApiResult<Vec<Customer>> {
        require_staff(ctx)?;
        let tier = query
            .tier
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(parse_tier)
            .transpose()?;
        let zone = query.zone.as_deref().filter(|z| !z.trim().is_empty());

        Ok(self.customer_repo.list(tier, zone, !query.inactive)?)
    }

    pub fn get_customer(&self, ctx: &SessionContext, id: i64) -> ApiResult<Customer> {
        ensure_customer_access(ctx, id)?;
        self.customer_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Customer(id={})不存在", id)))
    }

    pub fn create_customer(&self, ctx: &SessionContext, req: CreateCustomerRequest) -> ApiResult<Customer> {
        require_staff(ctx)?;
        for (field, value) in [
            ("customer_code", &req.customer_code),
            ("farm_name", &req.farm_name),
            ("phone", &req.phone),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
            }
        }
        let tier = match req.tier.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(raw) => parse_tier(raw)?,
            None => CustomerTier::Standard,
        };

        let customer = self.customer_repo.insert(&NewCustomer {
            customer_code: req.customer_code.trim().to_string(),
            farm_name: req.farm_name.trim().to_string(),
            phone: req.phone.trim().to_string(),
            email: req.email.filter(|e| !e.trim().is_empty()),
            zone: req.zone.filter(|z| !z.trim().is_empty()),
            address: req.address.filter(|a| !a.trim().is_empty()),
            tier,
        })?;
        info!(customer_id = customer.id, code = %customer.customer_code, operator = %ctx.username, "客户已建档");
        Ok(customer)
    }

    pub fn update_tier(&self, ctx: &SessionContext, id: i64, req: UpdateTierRequest) -> ApiResult<Customer> {
        require_admin(ctx)?;
        let tier = parse_tier(&req.tier)?;
        let customer = self.customer_repo.update_tier(id, tier)?;
        info!(customer_id = id, tier = %tier, operator = %ctx.username, "客户等级已调整");
        Ok(customer)
    }

    /// 从 CSV 文本批量导入
    pub fn import_csv(&self, ctx: &SessionContext, body: &[u8]) -> ApiResult<CustomerImportReport> {
        require_staff(ctx)?;
        Ok(self.importer.import_reader(body)?)
    }
}
