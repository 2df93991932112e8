// ==========================================
// 雏鸡订单分配系统 - 统计聚合
// ==========================================
// 职责: 看板统计 / 日报 / 周报 / 月报 / 客户分析 / 候补分析（只读）
// 口径: 剩余 = 可用供给 - 有效分配，下限为 0；当日无供给记录时供给相关字段为 0
// 口径: 分析类报表按业务日期取窗口 [end - days, end]（分配日 / 交付日 / 缺口日）
// ==========================================

use crate::domain::types::{CustomerTier, OrderStatus, WaitlistStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    AllocationRepository, CustomerRepository, CustomerVolume, OrderRepository, SupplyRepository,
    TierAllocationSummary, WaitlistCounts, WaitlistRepository,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// 周报覆盖天数
pub const WEEK_DAYS: i64 = 7;

/// 客户分析返回的头部客户数
pub const TOP_CUSTOMER_LIMIT: usize = 20;

/// 分析类报表缺省回溯天数
pub const DEFAULT_ANALYSIS_DAYS: i64 = 30;

// ==========================================
// 看板统计
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayStats {
    pub date: NaiveDate,
    pub expected_supply: i64,
    pub actual_supply: i64,
    pub allocated: i64,
    pub remaining: i64,
    /// 期望交付日为当日的订单数
    pub total_orders: i64,
    /// 当日有效分配条数
    pub allocations: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub total_customers: i64,
    /// PENDING + PARTIALLY_ALLOCATED + WAITLISTED
    pub pending_orders: i64,
    pub waitlist_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today: TodayStats,
    pub overall: OverallStats,
}

// ==========================================
// 日报
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySummary {
    pub expected_supply: i64,
    pub actual_supply: Option<i64>,
    pub allocated: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSummary {
    pub total_count: i64,
    pub total_qty: i64,
    pub by_tier: Vec<TierAllocationSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusSummary {
    pub total: i64,
    pub pending: i64,
    pub allocated: i64,
    pub partially_allocated: i64,
    pub waitlisted: i64,
    pub fulfilled: i64,
    pub cancelled: i64,
}

impl OrderStatusSummary {
    fn from_counts(counts: &HashMap<OrderStatus, i64>) -> Self {
        let get = |s: OrderStatus| counts.get(&s).copied().unwrap_or(0);
        Self {
            total: counts.values().sum(),
            pending: get(OrderStatus::Pending),
            allocated: get(OrderStatus::Allocated),
            partially_allocated: get(OrderStatus::PartiallyAllocated),
            waitlisted: get(OrderStatus::Waitlisted),
            fulfilled: get(OrderStatus::Fulfilled),
            cancelled: get(OrderStatus::Cancelled),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub inventory: InventorySummary,
    pub allocations: AllocationSummary,
    pub orders: OrderStatusSummary,
    /// 按 target_date 统计的候补
    pub waitlist: WaitlistCounts,
}

// ==========================================
// 周报
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    pub supply: i64,
    pub allocated: i64,
    pub allocation_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTotals {
    pub supply: i64,
    pub allocated: i64,
    pub allocation_count: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub period: ReportPeriod,
    pub totals: WeeklyTotals,
    pub daily_breakdown: Vec<DailyBreakdown>,
}

// ==========================================
// 月报
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotals {
    pub supply: i64,
    pub allocated: i64,
    pub allocation_count: i64,
    pub remaining: i64,
    /// 有供给记录的天数
    pub working_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAverage {
    pub supply: f64,
    pub allocated: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub period: MonthPeriod,
    pub totals: MonthlyTotals,
    pub tier_breakdown: Vec<TierAllocationSummary>,
    pub daily_average: DailyAverage,
}

// ==========================================
// 客户分析 / 候补分析
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
}

impl AnalysisPeriod {
    fn ending(end_date: NaiveDate, days: i64) -> EngineResult<Self> {
        if days <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "统计天数必须大于0: {}",
                days
            )));
        }
        Ok(Self {
            start_date: end_date - Duration::days(days),
            end_date,
            days,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCount {
    pub tier: CustomerTier,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierFulfillment {
    pub tier: CustomerTier,
    pub total_orders: i64,
    pub fulfilled_orders: i64,
    /// 百分比，保留一位小数
    pub fulfillment_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAnalytics {
    pub period: AnalysisPeriod,
    pub top_customers: Vec<CustomerVolume>,
    pub tier_distribution: Vec<TierCount>,
    pub fulfillment_by_tier: Vec<TierFulfillment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitlistOverall {
    pub total_waitlist_entries: i64,
    pub fulfilled: i64,
    pub still_waiting: i64,
    pub fulfillment_rate: f64,
    /// 兑现日 - 缺口日 的平均天数
    pub avg_wait_time_days: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierWaitlist {
    pub tier: CustomerTier,
    pub total: i64,
    pub fulfilled: i64,
    pub fulfillment_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitlistAnalysis {
    pub period: AnalysisPeriod,
    pub overall: WaitlistOverall,
    pub by_tier: Vec<TierWaitlist>,
}

/// 百分比（保留一位小数，分母为 0 时为 0）
fn percent(part: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / total as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// 月份首末日
fn month_bounds(year: i32, month: u32) -> EngineResult<(NaiveDate, NaiveDate)> {
    let invalid = || EngineError::InvalidInput(format!("非法月份: {}-{}", year, month));
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    Ok((first, next - Duration::days(1)))
}

/// 剩余量（下限为 0）
fn remaining_of(available: i64, allocated: i64) -> i64 {
    (available - allocated).max(0)
}

// ==========================================
// StatsAggregator - 统计聚合器
// ==========================================
pub struct StatsAggregator {
    supply_repo: Arc<SupplyRepository>,
    order_repo: Arc<OrderRepository>,
    allocation_repo: Arc<AllocationRepository>,
    waitlist_repo: Arc<WaitlistRepository>,
    customer_repo: Arc<CustomerRepository>,
}

impl StatsAggregator {
    pub fn new(
        supply_repo: Arc<SupplyRepository>,
        order_repo: Arc<OrderRepository>,
        allocation_repo: Arc<AllocationRepository>,
        waitlist_repo: Arc<WaitlistRepository>,
        customer_repo: Arc<CustomerRepository>,
    ) -> Self {
        Self {
            supply_repo,
            order_repo,
            allocation_repo,
            waitlist_repo,
            customer_repo,
        }
    }

    /// 看板统计
    ///
    /// # 参数
    /// - today: 统计日期（由调用方给出，便于测试）
    #[instrument(skip(self))]
    pub fn dashboard_stats(&self, today: NaiveDate) -> EngineResult<DashboardStats> {
        let supply = self.supply_repo.find_by_date(today)?;
        let day_total = self
            .allocation_repo
            .daily_totals(today, today)?
            .into_iter()
            .next();
        let (allocated, allocation_count) = day_total
            .map(|t| (t.allocated, t.allocation_count))
            .unwrap_or((0, 0));

        let (expected_supply, actual_supply, remaining) = match &supply {
            Some(record) => (
                record.expected_supply,
                record.actual_supply.unwrap_or(0),
                remaining_of(record.available(), allocated),
            ),
            None => (0, 0, 0),
        };

        let total_orders = self
            .order_repo
            .status_counts_for_date(today)?
            .values()
            .sum();

        Ok(DashboardStats {
            today: TodayStats {
                date: today,
                expected_supply,
                actual_supply,
                allocated,
                remaining,
                total_orders,
                allocations: allocation_count,
            },
            overall: OverallStats {
                total_customers: self.customer_repo.count_active()?,
                pending_orders: self.order_repo.count_open()?,
                waitlist_count: self.waitlist_repo.count_waiting()?,
            },
        })
    }

    /// 日报
    #[instrument(skip(self))]
    pub fn daily_summary(&self, date: NaiveDate) -> EngineResult<DailySummary> {
        let supply = self.supply_repo.find_by_date(date)?;
        let by_tier = self.allocation_repo.tier_breakdown(date)?;
        let total_count: i64 = by_tier.iter().map(|t| t.count).sum();
        let total_qty: i64 = by_tier.iter().map(|t| t.total_qty).sum();

        let inventory = match &supply {
            Some(record) => InventorySummary {
                expected_supply: record.expected_supply,
                actual_supply: record.actual_supply,
                allocated: total_qty,
                remaining: remaining_of(record.available(), total_qty),
            },
            None => InventorySummary {
                expected_supply: 0,
                actual_supply: None,
                allocated: total_qty,
                remaining: 0,
            },
        };

        let status_counts = self.order_repo.status_counts_for_date(date)?;

        Ok(DailySummary {
            date,
            inventory,
            allocations: AllocationSummary {
                total_count,
                total_qty,
                by_tier,
            },
            orders: OrderStatusSummary::from_counts(&status_counts),
            waitlist: self.waitlist_repo.counts_for_date(date)?,
        })
    }

    /// 周报（end_date 往前共 7 天，含两端）
    #[instrument(skip(self))]
    pub fn weekly_summary(&self, end_date: NaiveDate) -> EngineResult<WeeklySummary> {
        let start_date = end_date - Duration::days(WEEK_DAYS - 1);

        let supplies: HashMap<NaiveDate, i64> = self
            .supply_repo
            .list_range(Some(start_date), Some(end_date))?
            .into_iter()
            .map(|s| (s.date, s.available()))
            .collect();
        let totals: HashMap<NaiveDate, (i64, i64)> = self
            .allocation_repo
            .daily_totals(start_date, end_date)?
            .into_iter()
            .map(|t| (t.date, (t.allocated, t.allocation_count)))
            .collect();

        let daily_breakdown: Vec<DailyBreakdown> = start_date
            .iter_days()
            .take(WEEK_DAYS as usize)
            .map(|date| {
                let (allocated, allocation_count) = totals.get(&date).copied().unwrap_or((0, 0));
                DailyBreakdown {
                    date,
                    supply: supplies.get(&date).copied().unwrap_or(0),
                    allocated,
                    allocation_count,
                }
            })
            .collect();

        let supply: i64 = daily_breakdown.iter().map(|d| d.supply).sum();
        let allocated: i64 = daily_breakdown.iter().map(|d| d.allocated).sum();
        let allocation_count: i64 = daily_breakdown.iter().map(|d| d.allocation_count).sum();

        Ok(WeeklySummary {
            period: ReportPeriod {
                start_date,
                end_date,
            },
            totals: WeeklyTotals {
                supply,
                allocated,
                allocation_count,
                remaining: remaining_of(supply, allocated),
            },
            daily_breakdown,
        })
    }

    /// 月报
    #[instrument(skip(self))]
    pub fn monthly_summary(&self, year: i32, month: u32) -> EngineResult<MonthlySummary> {
        let (first, last) = month_bounds(year, month)?;

        let supplies = self.supply_repo.list_range(Some(first), Some(last))?;
        let working_days = supplies.len() as i64;
        let supply: i64 = supplies.iter().map(|s| s.available()).sum();

        let daily = self.allocation_repo.daily_totals(first, last)?;
        let allocated: i64 = daily.iter().map(|t| t.allocated).sum();
        let allocation_count: i64 = daily.iter().map(|t| t.allocation_count).sum();

        let daily_average = if working_days > 0 {
            DailyAverage {
                supply: round1(supply as f64 / working_days as f64),
                allocated: round1(allocated as f64 / working_days as f64),
            }
        } else {
            DailyAverage {
                supply: 0.0,
                allocated: 0.0,
            }
        };

        Ok(MonthlySummary {
            period: MonthPeriod { year, month },
            totals: MonthlyTotals {
                supply,
                allocated,
                allocation_count,
                remaining: remaining_of(supply, allocated),
                working_days,
            },
            tier_breakdown: self.allocation_repo.tier_breakdown_between(first, last)?,
            daily_average,
        })
    }

    /// 客户分析: 头部客户、在用客户等级分布、各等级订单满足率
    #[instrument(skip(self))]
    pub fn customer_analytics(&self, end_date: NaiveDate, days: i64) -> EngineResult<CustomerAnalytics> {
        let period = AnalysisPeriod::ending(end_date, days)?;

        let top_customers =
            self.allocation_repo
                .top_customers(period.start_date, period.end_date, TOP_CUSTOMER_LIMIT)?;

        let mut tier_distribution: Vec<TierCount> = self
            .customer_repo
            .count_active_by_tier()?
            .into_iter()
            .map(|(tier, count)| TierCount { tier, count })
            .collect();
        tier_distribution.sort_by(|a, b| b.tier.cmp(&a.tier));

        let fulfillment_by_tier = self
            .order_repo
            .tier_outcomes_between(period.start_date, period.end_date)?
            .into_iter()
            .map(|o| TierFulfillment {
                tier: o.tier,
                total_orders: o.total_orders,
                fulfilled_orders: o.fulfilled_orders,
                fulfillment_rate: percent(o.fulfilled_orders, o.total_orders),
            })
            .collect();

        Ok(CustomerAnalytics {
            period,
            top_customers,
            tier_distribution,
            fulfillment_by_tier,
        })
    }

    /// 候补分析: 兑现率、平均等待天数、分等级兑现率
    #[instrument(skip(self))]
    pub fn waitlist_analysis(&self, end_date: NaiveDate, days: i64) -> EngineResult<WaitlistAnalysis> {
        let period = AnalysisPeriod::ending(end_date, days)?;
        let entries = self
            .waitlist_repo
            .list_between(period.start_date, period.end_date)?;

        let total = entries.len() as i64;
        let mut fulfilled = 0;
        let mut waiting = 0;
        let mut wait_days: Vec<i64> = Vec::new();
        let mut tiers: HashMap<CustomerTier, (i64, i64)> = HashMap::new();

        for (entry, tier) in &entries {
            let slot = tiers.entry(*tier).or_insert((0, 0));
            slot.0 += 1;
            match entry.status {
                WaitlistStatus::Fulfilled => {
                    fulfilled += 1;
                    slot.1 += 1;
                    if let Some(done) = entry.fulfilled_date {
                        wait_days.push((done - entry.target_date).num_days().max(0));
                    }
                }
                WaitlistStatus::Waiting => waiting += 1,
                WaitlistStatus::Cancelled => {}
            }
        }

        let avg_wait_time_days = if wait_days.is_empty() {
            0.0
        } else {
            round1(wait_days.iter().sum::<i64>() as f64 / wait_days.len() as f64)
        };

        let mut by_tier: Vec<TierWaitlist> = tiers
            .into_iter()
            .map(|(tier, (total, fulfilled))| TierWaitlist {
                tier,
                total,
                fulfilled,
                fulfillment_rate: percent(fulfilled, total),
            })
            .collect();
        by_tier.sort_by(|a, b| b.tier.cmp(&a.tier));

        Ok(WaitlistAnalysis {
            period,
            overall: WaitlistOverall {
                total_waitlist_entries: total,
                fulfilled,
                still_waiting: waiting,
                fulfillment_rate: percent(fulfilled, total),
                avg_wait_time_days,
            },
            by_tier,
        })
    }
}
