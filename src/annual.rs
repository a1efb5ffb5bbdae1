use crate::schema::{Hours, Money, Periodic, RecordSet, YearMonth};
use crate::utils::{diff_percent, in_year, round_money, sum_money};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Year-to-date plan/actual totals with separate coverage for labor and sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnnualSummary {
    pub year: i32,

    pub planned_shifts: usize,
    pub actual_shifts: usize,
    pub shift_count_diff: i64,

    /// Planned figures are limited to the months that have labor actuals.
    pub planned_hours: Hours,
    pub actual_hours: Hours,
    pub hours_diff: Hours,

    pub planned_cost: Money,
    pub planned_cost_full_year: Money,
    pub actual_cost: Money,
    pub cost_diff: Money,
    pub cost_diff_percent: f64,

    /// Full twelve-month forecast.
    pub forecast_sales: Money,
    pub actual_sales_total: Money,
    /// Forecast scaled to the months that have sales actuals.
    pub forecast_for_actual_months: Money,
    pub sales_diff: Money,
    pub sales_diff_percent: f64,

    pub planned_profit: Money,
    pub actual_profit: Money,
    pub profit_diff: Money,
    pub profit_diff_percent: f64,

    /// Months with at least one work-hour or payroll actual.
    pub months_with_data: BTreeSet<YearMonth>,
    /// Months with a sales actual. Imported independently of labor data.
    pub months_with_sales_data: BTreeSet<YearMonth>,
}

impl AnnualSummary {
    pub fn aggregate(year: i32, records: &RecordSet) -> Self {
        let months_with_data: BTreeSet<YearMonth> = in_year(&records.work_hours, year)
            .map(Periodic::period)
            .chain(in_year(&records.payroll, year).map(Periodic::period))
            .collect();
        let months_with_sales_data: BTreeSet<YearMonth> = in_year(&records.sales_actual, year)
            .map(Periodic::period)
            .collect();

        let planned_year: Vec<_> = in_year(&records.planned_shifts, year).collect();
        let planned_covered: Vec<_> = planned_year
            .iter()
            .filter(|s| months_with_data.contains(&s.period()))
            .collect();

        let planned_shifts = planned_covered.len();
        let actual_shifts = in_year(&records.work_hours, year).count();

        let planned_hours: Hours = planned_covered.iter().map(|s| s.planned_hours).sum();
        let actual_hours: Hours = in_year(&records.work_hours, year)
            .map(|w| w.actual_hours)
            .sum();

        let planned_cost = sum_money(planned_covered.iter().map(|s| s.daily_wage));
        let planned_cost_full_year = sum_money(planned_year.iter().map(|s| s.daily_wage));
        let actual_cost = sum_money(in_year(&records.payroll, year).map(|p| p.gross_salary));

        let forecast_sales =
            sum_money(in_year(&records.sales_forecast, year).map(|f| f.forecasted_sales));
        let actual_sales_total =
            sum_money(in_year(&records.sales_actual, year).map(|s| s.actual_sales));

        let labor_months = months_with_data.len();
        let sales_months = months_with_sales_data.len();
        let forecast_per_month = forecast_sales as f64 / 12.0;

        let (forecast_for_actual_months, sales_diff, sales_diff_percent) = if sales_months > 0 {
            let pro_rated = forecast_per_month * sales_months as f64;
            let diff = actual_sales_total as f64 - pro_rated;
            (
                round_money(pro_rated),
                round_money(diff),
                diff_percent(actual_sales_total as f64, pro_rated),
            )
        } else {
            (0, 0, 0.0)
        };

        // Both profits are expressed over the labor-covered months: the forecast
        // is pro-rated and actual sales are scaled from their own coverage.
        let (planned_profit, actual_profit) = if sales_months > 0 && labor_months > 0 {
            let planned = forecast_per_month * labor_months as f64 - planned_cost as f64;
            let actual = actual_sales_total as f64 / sales_months as f64 * labor_months as f64
                - actual_cost as f64;
            (round_money(planned), round_money(actual))
        } else {
            (0, 0)
        };

        debug!(
            "Annual summary {}: {} labor month(s), {} sales month(s)",
            year, labor_months, sales_months
        );

        Self {
            year,
            planned_shifts,
            actual_shifts,
            shift_count_diff: actual_shifts as i64 - planned_shifts as i64,
            planned_hours,
            actual_hours,
            hours_diff: actual_hours - planned_hours,
            planned_cost,
            planned_cost_full_year,
            actual_cost,
            cost_diff: actual_cost.saturating_sub(planned_cost),
            cost_diff_percent: diff_percent(actual_cost as f64, planned_cost as f64),
            forecast_sales,
            actual_sales_total,
            forecast_for_actual_months,
            sales_diff,
            sales_diff_percent,
            planned_profit,
            actual_profit,
            profit_diff: actual_profit.saturating_sub(planned_profit),
            profit_diff_percent: diff_percent(actual_profit as f64, planned_profit as f64),
            months_with_data,
            months_with_sales_data,
        }
    }

    pub fn months_count(&self) -> usize {
        self.months_with_data.len()
    }

    pub fn sales_months_count(&self) -> usize {
        self.months_with_sales_data.len()
    }
}
