use crate::schema::{Money, Periodic, YearMonth};

/// Cost (or profit) as a percentage of sales. Zero when there are no sales.
pub fn rate(amount: f64, sales: f64) -> f64 {
    if sales > 0.0 {
        finite_or_zero(amount / sales * 100.0)
    } else {
        0.0
    }
}

/// Relative variance of `actual` against `forecast`, in percent.
///
/// The denominator is the magnitude of the forecast so a negative baseline
/// (a forecast loss) keeps the sign of the improvement.
pub fn diff_percent(actual: f64, forecast: f64) -> f64 {
    if forecast != 0.0 && forecast.is_finite() {
        finite_or_zero((actual - forecast) / forecast.abs() * 100.0)
    } else {
        0.0
    }
}

/// Zero-guarded division used for per-month averages.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator != 0.0 {
        finite_or_zero(numerator / denominator)
    } else {
        0.0
    }
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Totals saturate at the `Money` bounds instead of overflowing.
pub fn sum_money<I: IntoIterator<Item = Money>>(amounts: I) -> Money {
    amounts.into_iter().fold(0, Money::saturating_add)
}

/// Rounds half away from zero to whole currency units.
pub fn round_money(value: f64) -> Money {
    finite_or_zero(value).round() as Money
}

pub fn months_of_year(year: i32) -> impl Iterator<Item = YearMonth> {
    (1..=12).map(move |month| YearMonth { year, month })
}

pub fn in_period<'a, T: Periodic>(
    records: &'a [T],
    period: YearMonth,
) -> impl Iterator<Item = &'a T> + 'a {
    records.iter().filter(move |r| r.period() == period)
}

pub fn in_year<'a, T: Periodic>(records: &'a [T], year: i32) -> impl Iterator<Item = &'a T> + 'a {
    records.iter().filter(move |r| r.period().year == year)
}
