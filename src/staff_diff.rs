use crate::schema::{Hours, Money, RecordSet, StaffId, YearMonth};
use crate::utils::{diff_percent, in_period, sum_money};
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Hour changes at or below this many tenths are treated as on plan.
const CHANGE_THRESHOLD_TENTHS: i64 = 1;

/// Plan/actual labor for one staff member in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StaffDiffRecord {
    pub staff_id: StaffId,
    pub planned_days: u32,
    pub actual_days: u32,
    pub planned_hours: Hours,
    pub actual_hours: Hours,
    pub hours_diff: Hours,
    pub planned_cost: Money,
    pub actual_cost: Money,
    pub cost_diff: Money,
    /// Per-date deviations from the plan, ordered by date.
    pub differences: Vec<ShiftDifference>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShiftChange {
    /// Planned and worked, with different hours.
    Changed,
    /// Worked without a planned shift.
    Added,
    /// Planned but not worked.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShiftDifference {
    pub date: NaiveDate,
    pub change: ShiftChange,
    pub planned_hours: Hours,
    pub actual_hours: Hours,
    pub diff: Hours,
}

#[derive(Debug, Clone, Copy, Default)]
struct LaborTally {
    days: u32,
    hours: Hours,
    cost: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthDiffSummary {
    pub period: YearMonth,
    pub planned_shifts: usize,
    pub actual_shifts: usize,
    pub planned_hours: Hours,
    pub actual_hours: Hours,
    pub hours_diff: Hours,
    pub planned_cost: Money,
    pub actual_cost: Money,
    pub cost_diff: Money,
    pub cost_diff_percent: f64,
    pub forecast_sales: Money,
    pub actual_sales: Money,
    pub sales_diff: Money,
    pub sales_diff_percent: f64,
    /// Forecast sales less planned labor cost.
    pub planned_profit: Money,
    /// Actual sales less payroll cost.
    pub actual_profit: Money,
    pub profit_diff: Money,
    pub profit_diff_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthDiffAnalysis {
    pub summary: MonthDiffSummary,
    /// Ordered by staff id.
    pub staff: Vec<StaffDiffRecord>,
}

/// Reconciles planned shifts against work-hour and payroll actuals for a month.
///
/// Every staff member found in either source gets a row; the side with no
/// records reads as zero.
pub fn staff_diffs(period: YearMonth, records: &RecordSet) -> Vec<StaffDiffRecord> {
    let mut planned: BTreeMap<StaffId, LaborTally> = BTreeMap::new();
    for shift in in_period(&records.planned_shifts, period) {
        let tally = planned.entry(shift.staff_id).or_default();
        tally.days += 1;
        tally.hours += shift.planned_hours;
        tally.cost = tally.cost.saturating_add(shift.daily_wage);
    }

    let mut actual: BTreeMap<StaffId, LaborTally> = BTreeMap::new();
    for worked in in_period(&records.work_hours, period) {
        let tally = actual.entry(worked.staff_id).or_default();
        tally.days += 1;
        tally.hours += worked.actual_hours;
    }
    for pay in in_period(&records.payroll, period) {
        let tally = actual.entry(pay.staff_id).or_default();
        tally.cost = tally.cost.saturating_add(pay.gross_salary);
    }

    let mut differences = shift_differences(period, records);

    let mut staff_ids: Vec<StaffId> = planned.keys().chain(actual.keys()).copied().collect();
    staff_ids.sort_unstable();
    staff_ids.dedup();

    staff_ids
        .into_iter()
        .map(|staff_id| {
            let p = planned.get(&staff_id).copied().unwrap_or_default();
            let a = actual.get(&staff_id).copied().unwrap_or_default();
            StaffDiffRecord {
                staff_id,
                planned_days: p.days,
                actual_days: a.days,
                planned_hours: p.hours,
                actual_hours: a.hours,
                hours_diff: a.hours - p.hours,
                planned_cost: p.cost,
                actual_cost: a.cost,
                cost_diff: a.cost.saturating_sub(p.cost),
                differences: differences.remove(&staff_id).unwrap_or_default(),
            }
        })
        .collect()
}

/// Matches planned against worked hours on `(staff, date)`.
///
/// Several shifts for the same staff member on one day are summed before
/// comparing.
pub fn shift_differences(
    period: YearMonth,
    records: &RecordSet,
) -> BTreeMap<StaffId, Vec<ShiftDifference>> {
    let mut planned: BTreeMap<(StaffId, NaiveDate), Hours> = BTreeMap::new();
    for shift in in_period(&records.planned_shifts, period) {
        *planned.entry((shift.staff_id, shift.date)).or_default() += shift.planned_hours;
    }

    let mut worked: BTreeMap<(StaffId, NaiveDate), Hours> = BTreeMap::new();
    for record in in_period(&records.work_hours, period) {
        *worked.entry((record.staff_id, record.shift_date)).or_default() += record.actual_hours;
    }

    let keys: BTreeSet<(StaffId, NaiveDate)> =
        planned.keys().chain(worked.keys()).copied().collect();

    let mut by_staff: BTreeMap<StaffId, Vec<ShiftDifference>> = BTreeMap::new();
    for (staff_id, date) in keys {
        let plan = planned.get(&(staff_id, date)).copied();
        let actual = worked.get(&(staff_id, date)).copied();

        let difference = match (plan, actual) {
            (Some(plan), Some(actual)) => {
                let diff = actual - plan;
                if diff.tenths().abs() <= CHANGE_THRESHOLD_TENTHS {
                    continue;
                }
                ShiftDifference {
                    date,
                    change: ShiftChange::Changed,
                    planned_hours: plan,
                    actual_hours: actual,
                    diff,
                }
            }
            (None, Some(actual)) => ShiftDifference {
                date,
                change: ShiftChange::Added,
                planned_hours: Hours::ZERO,
                actual_hours: actual,
                diff: actual,
            },
            (Some(plan), None) => ShiftDifference {
                date,
                change: ShiftChange::Removed,
                planned_hours: plan,
                actual_hours: Hours::ZERO,
                diff: Hours::ZERO - plan,
            },
            (None, None) => continue,
        };
        by_staff.entry(staff_id).or_default().push(difference);
    }

    by_staff
}

pub fn month_summary(period: YearMonth, records: &RecordSet) -> MonthDiffSummary {
    let planned_shifts = in_period(&records.planned_shifts, period).count();
    let actual_shifts = in_period(&records.work_hours, period).count();

    let planned_hours: Hours = in_period(&records.planned_shifts, period)
        .map(|s| s.planned_hours)
        .sum();
    let actual_hours: Hours = in_period(&records.work_hours, period)
        .map(|w| w.actual_hours)
        .sum();

    let planned_cost = sum_money(in_period(&records.planned_shifts, period).map(|s| s.daily_wage));
    let actual_cost = sum_money(in_period(&records.payroll, period).map(|p| p.gross_salary));

    let forecast_sales =
        sum_money(in_period(&records.sales_forecast, period).map(|f| f.forecasted_sales));
    let actual_sales = sum_money(in_period(&records.sales_actual, period).map(|s| s.actual_sales));

    let planned_profit = forecast_sales.saturating_sub(planned_cost);
    let actual_profit = actual_sales.saturating_sub(actual_cost);

    MonthDiffSummary {
        period,
        planned_shifts,
        actual_shifts,
        planned_hours,
        actual_hours,
        hours_diff: actual_hours - planned_hours,
        planned_cost,
        actual_cost,
        cost_diff: actual_cost.saturating_sub(planned_cost),
        cost_diff_percent: diff_percent(actual_cost as f64, planned_cost as f64),
        forecast_sales,
        actual_sales,
        sales_diff: actual_sales.saturating_sub(forecast_sales),
        sales_diff_percent: diff_percent(actual_sales as f64, forecast_sales as f64),
        planned_profit,
        actual_profit,
        profit_diff: actual_profit.saturating_sub(planned_profit),
        profit_diff_percent: diff_percent(actual_profit as f64, planned_profit as f64),
    }
}

pub fn analyze_month(period: YearMonth, records: &RecordSet) -> MonthDiffAnalysis {
    let summary = month_summary(period, records);
    let staff = staff_diffs(period, records);

    debug!(
        "Month diff {}: {} staff, hours diff {}, cost diff {}",
        period,
        staff.len(),
        summary.hours_diff,
        summary.cost_diff
    );

    MonthDiffAnalysis { summary, staff }
}
