use chrono::{Datelike, NaiveDate, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

pub type StoreId = i64;
pub type StaffId = i64;

/// Whole currency units. Fractional amounts never reach the aggregation layer.
///
/// Aggregations saturate at the `i64` bounds rather than overflow.
pub type Money = i64;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct YearMonth {
    pub year: i32,
    #[schemars(description = "Calendar month, 1 = January")]
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn is_after(&self, other: &YearMonth) -> bool {
        self > other
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Hours held as integer tenths so sums stay exact at one decimal place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hours(i64);

impl Hours {
    pub const ZERO: Hours = Hours(0);

    pub fn from_tenths(tenths: i64) -> Self {
        Self(tenths)
    }

    /// Rounds half away from zero to the nearest tenth. Non-finite input reads
    /// as zero and out-of-range input saturates; use [`Hours::try_from_f64`]
    /// for untrusted values.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self((value * 10.0).round() as i64)
    }

    /// Like [`Hours::from_f64`], but `None` for values that do not fit.
    pub fn try_from_f64(value: f64) -> Option<Self> {
        fits_i64((value * 10.0).round()).map(Self)
    }

    pub fn tenths(&self) -> i64 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 10.0
    }
}

/// Whole-number `f64` to `i64`, or `None` when it is not finite or out of range.
pub fn fits_i64(rounded: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if rounded.is_finite() && (-LIMIT..LIMIT).contains(&rounded) {
        Some(rounded as i64)
    } else {
        None
    }
}

impl Add for Hours {
    type Output = Hours;

    fn add(self, rhs: Hours) -> Hours {
        Hours(self.0 + rhs.0)
    }
}

impl AddAssign for Hours {
    fn add_assign(&mut self, rhs: Hours) {
        self.0 += rhs.0;
    }
}

impl Sub for Hours {
    type Output = Hours;

    fn sub(self, rhs: Hours) -> Hours {
        Hours(self.0 - rhs.0)
    }
}

impl Sum for Hours {
    fn sum<I: Iterator<Item = Hours>>(iter: I) -> Hours {
        iter.fold(Hours::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Hours> for Hours {
    fn sum<I: Iterator<Item = &'a Hours>>(iter: I) -> Hours {
        iter.copied().sum()
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f64())
    }
}

impl Serialize for Hours {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Hours {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Hours::try_from_f64(value).ok_or_else(|| {
            serde::de::Error::custom(format!("{} is out of range for hours", value))
        })
    }
}

impl JsonSchema for Hours {
    fn schema_name() -> String {
        "Hours".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        f64::json_schema(gen)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Paid,
    Failed,
    Other(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "" | "PENDING" => Self::Pending,
            "PROCESSING" => Self::Processing,
            "PAID" | "COMPLETED" => Self::Paid,
            "FAILED" => Self::Failed,
            _ => Self::Other(trimmed.to_string()),
        }
    }
}

/// Records that belong to a single calendar month.
pub trait Periodic {
    fn period(&self) -> YearMonth;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PayrollRecord {
    pub store_id: StoreId,
    pub staff_id: StaffId,
    pub year: i32,
    pub month: u32,
    pub work_days: u32,
    pub work_hours: Hours,
    pub gross_salary: Money,
    pub commute_allowance: Money,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesActualRecord {
    pub store_id: StoreId,
    pub year: i32,
    pub month: u32,
    pub actual_sales: Money,
    pub daily_average: Money,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesForecastRecord {
    pub store_id: StoreId,
    pub year: i32,
    pub month: u32,
    pub forecasted_sales: Money,
    pub required_labor_cost: Money,
    pub required_hours: Hours,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkHoursActualRecord {
    pub store_id: StoreId,
    pub staff_id: StaffId,
    pub shift_date: NaiveDate,
    pub scheduled_start: Option<NaiveTime>,
    pub scheduled_end: Option<NaiveTime>,
    pub actual_start: Option<NaiveTime>,
    pub actual_end: Option<NaiveTime>,
    pub actual_hours: Hours,
    pub break_minutes: u32,
    pub overtime_minutes: u32,
    pub is_late: bool,
    pub is_early_leave: bool,
    pub notes: Option<String>,
}

/// Produced by the shift-plan subsystem; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PlannedShiftRecord {
    pub staff_id: StaffId,
    pub date: NaiveDate,
    pub planned_hours: Hours,
    pub daily_wage: Money,
}

impl Periodic for PayrollRecord {
    fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

impl Periodic for SalesActualRecord {
    fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

impl Periodic for SalesForecastRecord {
    fn period(&self) -> YearMonth {
        YearMonth {
            year: self.year,
            month: self.month,
        }
    }
}

impl Periodic for WorkHoursActualRecord {
    fn period(&self) -> YearMonth {
        YearMonth::from_date(self.shift_date)
    }
}

impl Periodic for PlannedShiftRecord {
    fn period(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }
}

/// Every record the engine reconciles, as fetched for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecordSet {
    #[serde(default)]
    pub payroll: Vec<PayrollRecord>,
    #[serde(default)]
    pub sales_actual: Vec<SalesActualRecord>,
    #[serde(default)]
    pub sales_forecast: Vec<SalesForecastRecord>,
    #[serde(default)]
    pub work_hours: Vec<WorkHoursActualRecord>,
    #[serde(default)]
    pub planned_shifts: Vec<PlannedShiftRecord>,
}

impl RecordSet {
    /// Restricts store-scoped records to one store. Planned shifts carry no
    /// store and are kept as given.
    pub fn for_store(&self, store_id: StoreId) -> RecordSet {
        RecordSet {
            payroll: self
                .payroll
                .iter()
                .filter(|r| r.store_id == store_id)
                .cloned()
                .collect(),
            sales_actual: self
                .sales_actual
                .iter()
                .filter(|r| r.store_id == store_id)
                .cloned()
                .collect(),
            sales_forecast: self
                .sales_forecast
                .iter()
                .filter(|r| r.store_id == store_id)
                .cloned()
                .collect(),
            work_hours: self
                .work_hours
                .iter()
                .filter(|r| r.store_id == store_id)
                .cloned()
                .collect(),
            planned_shifts: self.planned_shifts.clone(),
        }
    }
}
