use crate::config::EngineConfig;
use crate::schema::{
    Money, PayrollRecord, SalesActualRecord, SalesForecastRecord, WorkHoursActualRecord, YearMonth,
};
use crate::utils::{diff_percent, in_period, months_of_year, rate, sum_money};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueBasis {
    Actual,
    /// Presented as an estimate: no actual figure exists yet.
    Forecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisplayValue<V> {
    pub value: V,
    pub basis: ValueBasis,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmountComparison {
    pub forecast: Money,
    pub actual: Money,
    pub diff: Money,
    pub diff_percent: f64,
    pub has_actual: bool,
}

impl AmountComparison {
    pub fn new(forecast: Money, actual: Money, has_actual: bool) -> Self {
        Self {
            forecast,
            actual,
            diff: actual.saturating_sub(forecast),
            diff_percent: diff_percent(actual as f64, forecast as f64),
            has_actual,
        }
    }

    pub fn display(&self) -> DisplayValue<Money> {
        if self.has_actual {
            DisplayValue {
                value: self.actual,
                basis: ValueBasis::Actual,
            }
        } else {
            DisplayValue {
                value: self.forecast,
                basis: ValueBasis::Forecast,
            }
        }
    }

    /// Variance details only make sense once an actual figure exists.
    pub fn shows_variance(&self) -> bool {
        self.has_actual
    }
}

/// Percentages of sales; `diff` is in percentage points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RateComparison {
    pub forecast: f64,
    pub actual: f64,
    pub diff: f64,
    pub has_actual: bool,
}

impl RateComparison {
    pub fn new(forecast: f64, actual: f64, has_actual: bool) -> Self {
        Self {
            forecast,
            actual,
            diff: actual - forecast,
            has_actual,
        }
    }

    pub fn display(&self) -> DisplayValue<f64> {
        if self.has_actual {
            DisplayValue {
                value: self.actual,
                basis: ValueBasis::Actual,
            }
        } else {
            DisplayValue {
                value: self.forecast,
                basis: ValueBasis::Forecast,
            }
        }
    }

    pub fn shows_variance(&self) -> bool {
        self.has_actual
    }
}

/// One month of the profit-and-loss view. Derived on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyPlRow {
    pub period: YearMonth,
    pub sales: AmountComparison,
    pub labor_cost: AmountComparison,
    pub commute: AmountComparison,
    pub profit: AmountComparison,
    pub labor_rate: RateComparison,
    pub commute_rate: RateComparison,
    pub profit_rate: RateComparison,
    pub has_data: bool,
}

pub struct MonthlyPlBuilder {
    commute_allowance_per_head: Money,
}

impl MonthlyPlBuilder {
    pub fn new(commute_allowance_per_head: Money) -> Self {
        Self {
            commute_allowance_per_head,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.commute_allowance_per_head)
    }

    /// Twelve rows, January to December, whether or not any data exists.
    pub fn build_year(
        &self,
        year: i32,
        payroll: &[PayrollRecord],
        sales: &[SalesActualRecord],
        forecasts: &[SalesForecastRecord],
    ) -> Vec<MonthlyPlRow> {
        let rows: Vec<MonthlyPlRow> = months_of_year(year)
            .map(|period| self.build_month(period, payroll, sales, forecasts))
            .collect();

        debug!(
            "Built monthly P&L for {}: {} month(s) with data",
            year,
            rows.iter().filter(|r| r.has_data).count()
        );
        rows
    }

    pub fn build_month(
        &self,
        period: YearMonth,
        payroll: &[PayrollRecord],
        sales: &[SalesActualRecord],
        forecasts: &[SalesForecastRecord],
    ) -> MonthlyPlRow {
        let month_payroll: Vec<&PayrollRecord> = in_period(payroll, period).collect();
        let month_sales: Vec<&SalesActualRecord> = in_period(sales, period).collect();
        let month_forecasts: Vec<&SalesForecastRecord> = in_period(forecasts, period).collect();

        let sales_forecast = sum_money(month_forecasts.iter().map(|f| f.forecasted_sales));
        let sales_actual = sum_money(month_sales.iter().map(|s| s.actual_sales));
        let labor_cost_forecast = sum_money(month_forecasts.iter().map(|f| f.required_labor_cost));
        let labor_cost_actual = sum_money(month_payroll.iter().map(|p| p.gross_salary));
        let commute_actual = sum_money(month_payroll.iter().map(|p| p.commute_allowance));
        let commute_forecast = self.estimate_commute(month_forecasts.len(), month_payroll.len());

        let profit_forecast = sales_forecast
            .saturating_sub(labor_cost_forecast)
            .saturating_sub(commute_forecast);
        let profit_actual = sales_actual
            .saturating_sub(labor_cost_actual)
            .saturating_sub(commute_actual);

        let sales_f = sales_forecast as f64;
        let sales_a = sales_actual as f64;
        let has_sales_actual = sales_actual > 0;

        MonthlyPlRow {
            period,
            sales: AmountComparison::new(sales_forecast, sales_actual, sales_actual != 0),
            labor_cost: AmountComparison::new(
                labor_cost_forecast,
                labor_cost_actual,
                labor_cost_actual != 0,
            ),
            commute: AmountComparison::new(commute_forecast, commute_actual, commute_actual != 0),
            profit: AmountComparison::new(profit_forecast, profit_actual, has_sales_actual),
            labor_rate: RateComparison::new(
                rate(labor_cost_forecast as f64, sales_f),
                rate(labor_cost_actual as f64, sales_a),
                has_sales_actual,
            ),
            commute_rate: RateComparison::new(
                rate(commute_forecast as f64, sales_f),
                rate(commute_actual as f64, sales_a),
                has_sales_actual,
            ),
            profit_rate: RateComparison::new(
                rate(profit_forecast as f64, sales_f),
                rate(profit_actual as f64, sales_a),
                has_sales_actual,
            ),
            has_data: !month_forecasts.is_empty()
                || !month_sales.is_empty()
                || !month_payroll.is_empty(),
        }
    }

    // Heuristic placeholder: no commute forecast source exists, so the current
    // payroll head count is priced at a flat per-head allowance.
    fn estimate_commute(&self, forecast_rows: usize, payroll_rows: usize) -> Money {
        if forecast_rows == 0 {
            return 0;
        }
        (payroll_rows as Money).saturating_mul(self.commute_allowance_per_head)
    }
}

/// Annual totals of the monthly view using each month's displayed value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BlendedTotals {
    pub sales: Money,
    pub labor_cost: Money,
    pub commute: Money,
    pub profit: Money,
    pub labor_rate: f64,
    pub commute_rate: f64,
    pub profit_rate: f64,
    pub actual_months: usize,
}

pub fn blended_totals(rows: &[MonthlyPlRow]) -> BlendedTotals {
    let sales = sum_money(rows.iter().map(|r| r.sales.display().value));
    let labor_cost = sum_money(rows.iter().map(|r| r.labor_cost.display().value));
    let commute = sum_money(rows.iter().map(|r| r.commute.display().value));
    let profit = sum_money(rows.iter().map(|r| r.profit.display().value));

    BlendedTotals {
        sales,
        labor_cost,
        commute,
        profit,
        labor_rate: rate(labor_cost as f64, sales as f64),
        commute_rate: rate(commute as f64, sales as f64),
        profit_rate: rate(profit as f64, sales as f64),
        actual_months: rows.iter().filter(|r| r.sales.has_actual).count(),
    }
}

/// Which sources have been imported for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyCoverage {
    pub period: YearMonth,
    pub work_hours_count: usize,
    pub payroll_count: usize,
    pub sales_actual_count: usize,
    pub forecast_count: usize,
}

impl MonthlyCoverage {
    pub fn has_work_hours(&self) -> bool {
        self.work_hours_count > 0
    }

    pub fn has_payroll(&self) -> bool {
        self.payroll_count > 0
    }

    pub fn has_sales_actual(&self) -> bool {
        self.sales_actual_count > 0
    }

    pub fn has_forecast(&self) -> bool {
        self.forecast_count > 0
    }

    /// A plan/actual drill-down needs all four sources for the month.
    pub fn is_reconcilable(&self) -> bool {
        self.has_work_hours()
            && self.has_payroll()
            && self.has_sales_actual()
            && self.has_forecast()
    }
}

pub fn coverage_for_year(
    year: i32,
    work_hours: &[WorkHoursActualRecord],
    payroll: &[PayrollRecord],
    sales: &[SalesActualRecord],
    forecasts: &[SalesForecastRecord],
) -> Vec<MonthlyCoverage> {
    months_of_year(year)
        .map(|period| MonthlyCoverage {
            period,
            work_hours_count: in_period(work_hours, period).count(),
            payroll_count: in_period(payroll, period).count(),
            sales_actual_count: in_period(sales, period).count(),
            forecast_count: in_period(forecasts, period).count(),
        })
        .collect()
}
