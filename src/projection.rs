use crate::annual::AnnualSummary;
use crate::schema::{Hours, Money};
use crate::utils::{diff_percent, rate, round_money, safe_div};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MONTHS_PER_YEAR: usize = 12;

/// Full-year landing estimate for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetricProjection {
    pub actual_total: Money,
    pub covered_months: usize,
    pub remaining_months: usize,
    pub avg_per_month: f64,
    /// Extrapolated amount for the remaining months.
    pub predicted: Money,
    pub projected_total: Money,
    /// Plan baseline scaled to a full year.
    pub planned_annual: Money,
    pub diff: Money,
    pub diff_percent: f64,
}

impl MetricProjection {
    /// Extrapolates `actual_total` linearly over the months not yet covered.
    ///
    /// With full coverage the projection is the actual total exactly, and with
    /// no coverage every figure except `planned_annual` is zero.
    pub fn extrapolate(actual_total: Money, covered_months: usize, planned_annual: Money) -> Self {
        let covered_months = covered_months.min(MONTHS_PER_YEAR);
        let remaining_months = MONTHS_PER_YEAR - covered_months;

        let (avg_per_month, predicted, projected_total) = if covered_months == 0 {
            (0.0, 0, 0)
        } else if remaining_months == 0 {
            (safe_div(actual_total as f64, covered_months as f64), 0, actual_total)
        } else {
            let avg = safe_div(actual_total as f64, covered_months as f64);
            let predicted = round_money(avg * remaining_months as f64);
            (avg, predicted, actual_total.saturating_add(predicted))
        };

        Self {
            actual_total,
            covered_months,
            remaining_months,
            avg_per_month,
            predicted,
            projected_total,
            planned_annual,
            diff: projected_total.saturating_sub(planned_annual),
            diff_percent: diff_percent(projected_total as f64, planned_annual as f64),
        }
    }

    pub fn is_extrapolated(&self) -> bool {
        self.covered_months > 0 && self.remaining_months > 0
    }
}

/// Hours counterpart of [`MetricProjection`], kept at one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HoursProjection {
    pub actual_total: Hours,
    pub predicted: Hours,
    pub projected_total: Hours,
    pub planned_annual: Hours,
    pub diff: Hours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnnualProjection {
    pub year: i32,
    pub cost: MetricProjection,
    pub sales: MetricProjection,
    pub profit: MetricProjection,
    pub hours: HoursProjection,
    pub planned_labor_rate: f64,
    pub projected_labor_rate: f64,
    pub labor_rate_diff: f64,
}

impl AnnualProjection {
    /// Each metric is extrapolated over its own coverage. Sales use the months
    /// with sales actuals, so `sales.remaining_months` can differ from
    /// `cost.remaining_months` when the two imports are out of step. Cost and
    /// hours use the months with work-hour or payroll actuals. Profit is
    /// projected sales less projected cost.
    pub fn from_summary(summary: &AnnualSummary) -> Self {
        let labor_months = summary.months_count();
        let sales_months = summary.sales_months_count();

        let planned_cost_annual = scale_to_year(summary.planned_cost as f64, labor_months);
        let cost =
            MetricProjection::extrapolate(summary.actual_cost, labor_months, planned_cost_annual);

        // The forecast already spans the whole year.
        let sales = MetricProjection::extrapolate(
            summary.actual_sales_total,
            sales_months,
            summary.forecast_sales,
        );

        let planned_profit_annual = summary.forecast_sales.saturating_sub(planned_cost_annual);
        let projected_profit = sales.projected_total.saturating_sub(cost.projected_total);
        let profit = MetricProjection {
            actual_total: summary.actual_profit,
            covered_months: labor_months.min(MONTHS_PER_YEAR),
            remaining_months: MONTHS_PER_YEAR - labor_months.min(MONTHS_PER_YEAR),
            avg_per_month: safe_div(summary.actual_profit as f64, labor_months as f64),
            predicted: projected_profit.saturating_sub(summary.actual_profit),
            projected_total: projected_profit,
            planned_annual: planned_profit_annual,
            diff: projected_profit.saturating_sub(planned_profit_annual),
            diff_percent: diff_percent(projected_profit as f64, planned_profit_annual as f64),
        };

        let hours = project_hours(summary.actual_hours, summary.planned_hours, labor_months);

        let planned_labor_rate = rate(planned_cost_annual as f64, summary.forecast_sales as f64);
        let projected_labor_rate = rate(cost.projected_total as f64, sales.projected_total as f64);

        debug!(
            "Projection {}: cost {} -> {} over {} remaining month(s)",
            summary.year, cost.actual_total, cost.projected_total, cost.remaining_months
        );

        Self {
            year: summary.year,
            cost,
            sales,
            profit,
            hours,
            planned_labor_rate,
            projected_labor_rate,
            labor_rate_diff: projected_labor_rate - planned_labor_rate,
        }
    }

    /// True when any metric was extended past its actual coverage.
    pub fn is_extrapolated(&self) -> bool {
        self.cost.is_extrapolated() || self.sales.is_extrapolated()
    }
}

fn scale_to_year(covered_total: f64, covered_months: usize) -> Money {
    if covered_months == 0 {
        return 0;
    }
    round_money(covered_total / covered_months as f64 * MONTHS_PER_YEAR as f64)
}

fn project_hours(actual: Hours, planned_covered: Hours, covered_months: usize) -> HoursProjection {
    let covered = covered_months.min(MONTHS_PER_YEAR);
    if covered == 0 {
        return HoursProjection {
            actual_total: actual,
            predicted: Hours::ZERO,
            projected_total: Hours::ZERO,
            planned_annual: Hours::ZERO,
            diff: Hours::ZERO,
        };
    }

    let remaining = MONTHS_PER_YEAR - covered;
    let predicted = Hours::from_f64(actual.as_f64() / covered as f64 * remaining as f64);
    let projected_total = actual + predicted;
    let planned_annual =
        Hours::from_f64(planned_covered.as_f64() / covered as f64 * MONTHS_PER_YEAR as f64);

    HoursProjection {
        actual_total: actual,
        predicted,
        projected_total,
        planned_annual,
        diff: projected_total - planned_annual,
    }
}
