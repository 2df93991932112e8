// ==========================================
// 雏鸡订单分配系统 - 看板与报表 API
// ==========================================
// 职责: 看板统计、日报、周报、月报、客户分析、候补分析
// 权限: 运营
// ==========================================

use crate::api::access::require_staff;
use crate::api::error::ApiResult;
use crate::domain::user::SessionContext;
use crate::engine::{
    CustomerAnalytics, DailySummary, DashboardStats, MonthlySummary, StatsAggregator,
    WaitlistAnalysis, WeeklySummary, DEFAULT_ANALYSIS_DAYS,
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 报表日期参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportQuery {
    /// 日报日期（缺省今日）
    pub date: Option<NaiveDate>,
    /// 周报/分析截止日期（缺省今日）
    pub end_date: Option<NaiveDate>,
    /// 月报年份与月份（缺省当月）
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// 分析窗口天数（缺省 30）
    pub days: Option<i64>,
}

// ==========================================
// DashboardApi - 看板 API
// ==========================================
pub struct DashboardApi {
    stats: Arc<StatsAggregator>,
}

impl DashboardApi {
    pub fn new(stats: Arc<StatsAggregator>) -> Self {
        Self { stats }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// 看板统计（今日按 UTC 计）
    pub fn dashboard_stats(&self, ctx: &SessionContext) -> ApiResult<DashboardStats> {
        require_staff(ctx)?;
        Ok(self.stats.dashboard_stats(Self::today())?)
    }

    pub fn daily_summary(&self, ctx: &SessionContext, query: ReportQuery) -> ApiResult<DailySummary> {
        require_staff(ctx)?;
        Ok(self.stats.daily_summary(query.date.unwrap_or_else(Self::today))?)
    }

    pub fn weekly_summary(&self, ctx: &SessionContext, query: ReportQuery) -> ApiResult<WeeklySummary> {
        require_staff(ctx)?;
        Ok(self
            .stats
            .weekly_summary(query.end_date.unwrap_or_else(Self::today))?)
    }

    pub fn monthly_summary(&self, ctx: &SessionContext, query: ReportQuery) -> ApiResult<MonthlySummary> {
        require_staff(ctx)?;
        let today = Self::today();
        Ok(self.stats.monthly_summary(
            query.year.unwrap_or_else(|| today.year()),
            query.month.unwrap_or_else(|| today.month()),
        )?)
    }

    pub fn customer_analytics(
        &self,
        ctx: &SessionContext,
        query: ReportQuery,
    ) -> ApiResult<CustomerAnalytics> {
        require_staff(ctx)?;
        Ok(self.stats.customer_analytics(
            query.end_date.unwrap_or_else(Self::today),
            query.days.unwrap_or(DEFAULT_ANALYSIS_DAYS),
        )?)
    }

    pub fn waitlist_analysis(
        &self,
        ctx: &SessionContext,
        query: ReportQuery,
    ) -> ApiResult<WaitlistAnalysis> {
        require_staff(ctx)?;
        Ok(self.stats.waitlist_analysis(
            query.end_date.unwrap_or_else(Self::today),
            query.days.unwrap_or(DEFAULT_ANALYSIS_DAYS),
        )?)
    }
}
