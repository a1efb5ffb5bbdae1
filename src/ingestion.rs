use crate::config::{CoercionPolicy, EngineConfig};
use crate::error::{ReconciliationError, Result};
use crate::schema::{
    fits_i64, Hours, Money, PaymentStatus, PayrollRecord, SalesActualRecord, SalesForecastRecord,
    StaffId, StoreId, WorkHoursActualRecord, YearMonth,
};
use chrono::{Local, NaiveDate, NaiveTime};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// One imported row: column name to raw cell text.
pub type RawRow = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub details: String,
}

impl FieldError {
    fn new(field: &str, details: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            details: details.into(),
        }
    }
}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

/// The reference month imports are checked against: the system clock, not the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPeriod {
    current: YearMonth,
}

impl ImportPeriod {
    pub fn new(current: YearMonth) -> Self {
        Self { current }
    }

    pub fn from_clock() -> Self {
        Self::new(YearMonth::from_date(Local::now().date_naive()))
    }

    pub fn current(&self) -> YearMonth {
        self.current
    }

    pub fn is_future(&self, period: YearMonth) -> bool {
        period.is_after(&self.current)
    }
}

/// External codes a row was imported with, before identifier resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalCodes {
    pub store: String,
    pub staff: Option<String>,
}

impl ExternalCodes {
    pub fn identifier(&self) -> String {
        match &self.staff {
            Some(staff) => format!("store {} / staff {}", self.store, staff),
            None => format!("store {}", self.store),
        }
    }
}

/// A coerced record still waiting for its internal identifiers.
#[derive(Debug, Clone)]
pub struct Staged<T> {
    row: usize,
    codes: ExternalCodes,
    pub(crate) record: T,
}

impl<T> Staged<T> {
    pub(crate) fn new(row: usize, codes: ExternalCodes, record: T) -> Self {
        Self { row, codes, record }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn codes(&self) -> &ExternalCodes {
        &self.codes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: usize,
    pub identifier: String,
    pub field: String,
    pub details: String,
}

#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub staged: Vec<Staged<T>>,
    pub skipped: Vec<SkippedRow>,
}

pub trait FromRawRow: Sized {
    const KIND: &'static str;
    const REQUIRES_STAFF: bool;
    /// Forecasts describe the future by nature and are exempt from the guard.
    const TEMPORALLY_GUARDED: bool = true;

    fn period_of(row: &RawRow) -> FieldResult<YearMonth>;

    /// Parses every non-identifier field. Identifiers are filled in by `assign_ids`.
    fn from_raw(row: &RawRow) -> FieldResult<Self>;

    fn assign_ids(&mut self, store_id: StoreId, staff_id: Option<StaffId>);
}

/// Coerces raw rows into staged records after the temporal guard has passed.
pub fn ingest<T: FromRawRow>(
    rows: &[RawRow],
    period: ImportPeriod,
    config: &EngineConfig,
) -> Result<Ingested<T>> {
    info!(
        "Ingesting {} {} row(s) against reference month {}",
        rows.len(),
        T::KIND,
        period.current()
    );

    if T::TEMPORALLY_GUARDED {
        check_temporal_guard::<T>(rows, period, config.max_reported_offenders)?;
    }

    let mut staged = Vec::with_capacity(rows.len());
    let mut skipped = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let coerced = extract_codes(row, T::REQUIRES_STAFF, config.default_store_code.as_deref())
            .and_then(|codes| T::from_raw(row).map(|record| (codes, record)));

        match coerced {
            Ok((codes, record)) => staged.push(Staged::new(idx, codes, record)),
            Err(err) => {
                let identifier = row_identifier(row);
                match config.coercion_policy {
                    CoercionPolicy::AbortOnFirstError => {
                        warn!(
                            "Aborting {} import at row {} ({}): {} {}",
                            T::KIND,
                            idx,
                            identifier,
                            err.field,
                            err.details
                        );
                        return Err(ReconciliationError::Validation {
                            row: idx,
                            identifier,
                            field: err.field,
                            details: err.details,
                        });
                    }
                    CoercionPolicy::SkipInvalidRows => {
                        warn!(
                            "Skipping {} row {} ({}): {} {}",
                            T::KIND,
                            idx,
                            identifier,
                            err.field,
                            err.details
                        );
                        skipped.push(SkippedRow {
                            row: idx,
                            identifier,
                            field: err.field,
                            details: err.details,
                        });
                    }
                }
            }
        }
    }

    debug!(
        "Coerced {} {} row(s), skipped {}",
        staged.len(),
        T::KIND,
        skipped.len()
    );

    Ok(Ingested { staged, skipped })
}

/// Rejects the whole batch if any row is dated after the reference month.
pub fn check_temporal_guard<T: FromRawRow>(
    rows: &[RawRow],
    period: ImportPeriod,
    max_reported: usize,
) -> Result<()> {
    let future: Vec<(usize, YearMonth)> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| T::period_of(row).ok().map(|ym| (idx, ym)))
        .filter(|(_, ym)| period.is_future(*ym))
        .collect();

    if future.is_empty() {
        return Ok(());
    }

    warn!(
        "Rejecting {} import: {} row(s) dated after {}",
        T::KIND,
        future.len(),
        period.current()
    );

    let count = future.len();
    Err(ReconciliationError::TemporalConstraint {
        current: period.current(),
        count,
        offending: future.into_iter().take(max_reported).collect(),
    })
}

pub fn raw_row_from_json(object: &serde_json::Map<String, serde_json::Value>) -> RawRow {
    object
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

fn extract_codes(
    row: &RawRow,
    requires_staff: bool,
    default_store: Option<&str>,
) -> FieldResult<ExternalCodes> {
    let store = cell(row, &["store_code", "store_id"])
        .or(default_store)
        .ok_or_else(|| FieldError::new("store_code", "missing store code"))?
        .to_string();

    let staff = if requires_staff {
        Some(
            cell(row, &["staff_code", "staff_id"])
                .ok_or_else(|| FieldError::new("staff_code", "missing staff code"))?
                .to_string(),
        )
    } else {
        None
    };

    Ok(ExternalCodes { store, staff })
}

fn row_identifier(row: &RawRow) -> String {
    cell(row, &["staff_code", "staff_id"])
        .or_else(|| cell(row, &["store_code", "store_id"]))
        .unwrap_or("-")
        .to_string()
}

/// First non-blank value among the candidate column names.
fn cell<'a>(row: &'a RawRow, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| row.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

fn required<'a>(row: &'a RawRow, name: &str) -> FieldResult<&'a str> {
    cell(row, &[name]).ok_or_else(|| FieldError::new(name, "missing value"))
}

fn parse_number<T: FromStr>(row: &RawRow, name: &str) -> FieldResult<T> {
    let raw = required(row, name)?;
    raw.parse::<T>()
        .map_err(|_| FieldError::new(name, format!("'{}' is not a valid number", raw)))
}

fn parse_year_month(row: &RawRow) -> FieldResult<YearMonth> {
    let year: i32 = parse_number(row, "year")?;
    let month: u32 = parse_number(row, "month")?;
    YearMonth::new(year, month)
        .ok_or_else(|| FieldError::new("month", format!("{} is not a calendar month", month)))
}

fn parse_money_text(name: &str, raw: &str) -> FieldResult<Money> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    if let Ok(value) = cleaned.parse::<Money>() {
        return Ok(value);
    }
    let value = cleaned
        .parse::<f64>()
        .map_err(|_| FieldError::new(name, format!("'{}' is not a valid amount", raw)))?;
    fits_i64(value.round())
        .ok_or_else(|| FieldError::new(name, format!("'{}' is out of range", raw)))
}

fn required_money(row: &RawRow, name: &str) -> FieldResult<Money> {
    parse_money_text(name, required(row, name)?)
}

fn optional_money(row: &RawRow, name: &str) -> FieldResult<Money> {
    match cell(row, &[name]) {
        Some(raw) => parse_money_text(name, raw),
        None => Ok(0),
    }
}

fn parse_hours_text(name: &str, raw: &str) -> FieldResult<Hours> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| FieldError::new(name, format!("'{}' is not a valid number of hours", raw)))?;
    Hours::try_from_f64(value)
        .ok_or_else(|| FieldError::new(name, format!("'{}' is out of range", raw)))
}

fn optional_hours(row: &RawRow, name: &str) -> FieldResult<Hours> {
    match cell(row, &[name]) {
        Some(raw) => parse_hours_text(name, raw),
        None => Ok(Hours::ZERO),
    }
}

fn optional_count(row: &RawRow, name: &str) -> FieldResult<u32> {
    match cell(row, &[name]) {
        Some(_) => parse_number(row, name),
        None => Ok(0),
    }
}

fn parse_bool(row: &RawRow, name: &str) -> FieldResult<bool> {
    match cell(row, &[name]) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => Ok(true),
            "false" | "0" | "no" | "n" => Ok(false),
            _ => Err(FieldError::new(name, format!("'{}' is not a boolean", raw))),
        },
    }
}

fn optional_time(row: &RawRow, name: &str) -> FieldResult<Option<NaiveTime>> {
    let Some(raw) = cell(row, &[name]) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(Some)
        .map_err(|_| FieldError::new(name, format!("'{}' is not a time of day", raw)))
}

fn optional_text(row: &RawRow, name: &str) -> Option<String> {
    cell(row, &[name]).map(str::to_string)
}

fn parse_shift_date(row: &RawRow) -> FieldResult<NaiveDate> {
    if let Some(raw) = cell(row, &["shift_date", "work_date"]) {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y/%m/%d"))
            .map_err(|_| FieldError::new("shift_date", format!("'{}' is not a date", raw)));
    }

    let ym = parse_year_month(row)?;
    let day: u32 = parse_number(row, "date")?;
    NaiveDate::from_ymd_opt(ym.year, ym.month, day).ok_or_else(|| {
        FieldError::new("date", format!("{}-{:02} has no day {}", ym.year, ym.month, day))
    })
}

/// Month of a work-hour row, even when the day itself is invalid.
///
/// Falls back to the `year`/`month` columns, then to the year and month
/// segments of a malformed `shift_date`, so no dated row escapes the guard.
fn shift_period(row: &RawRow) -> FieldResult<YearMonth> {
    match parse_shift_date(row) {
        Ok(date) => Ok(YearMonth::from_date(date)),
        Err(err) => parse_year_month(row)
            .or_else(|_| shift_date_month(row))
            .map_err(|_| err),
    }
}

fn shift_date_month(row: &RawRow) -> FieldResult<YearMonth> {
    let raw = cell(row, &["shift_date", "work_date"])
        .ok_or_else(|| FieldError::new("shift_date", "missing value"))?;
    let mut parts = raw.split(['-', '/']);
    let year = parts.next().and_then(|p| p.trim().parse::<i32>().ok());
    let month = parts.next().and_then(|p| p.trim().parse::<u32>().ok());
    year.zip(month)
        .and_then(|(year, month)| YearMonth::new(year, month))
        .ok_or_else(|| FieldError::new("shift_date", format!("'{}' has no year and month", raw)))
}

impl FromRawRow for PayrollRecord {
    const KIND: &'static str = "payroll";
    const REQUIRES_STAFF: bool = true;

    fn period_of(row: &RawRow) -> FieldResult<YearMonth> {
        parse_year_month(row)
    }

    fn from_raw(row: &RawRow) -> FieldResult<Self> {
        let ym = parse_year_month(row)?;
        Ok(Self {
            store_id: 0,
            staff_id: 0,
            year: ym.year,
            month: ym.month,
            work_days: optional_count(row, "work_days")?,
            work_hours: optional_hours(row, "work_hours")?,
            gross_salary: required_money(row, "gross_salary")?,
            commute_allowance: optional_money(row, "commute_allowance")?,
            payment_status: cell(row, &["payment_status"])
                .map(PaymentStatus::parse)
                .unwrap_or_default(),
        })
    }

    fn assign_ids(&mut self, store_id: StoreId, staff_id: Option<StaffId>) {
        self.store_id = store_id;
        if let Some(staff_id) = staff_id {
            self.staff_id = staff_id;
        }
    }
}

impl FromRawRow for SalesActualRecord {
    const KIND: &'static str = "sales actual";
    const REQUIRES_STAFF: bool = false;

    fn period_of(row: &RawRow) -> FieldResult<YearMonth> {
        parse_year_month(row)
    }

    fn from_raw(row: &RawRow) -> FieldResult<Self> {
        let ym = parse_year_month(row)?;
        Ok(Self {
            store_id: 0,
            year: ym.year,
            month: ym.month,
            actual_sales: required_money(row, "actual_sales")?,
            daily_average: optional_money(row, "daily_average")?,
            notes: optional_text(row, "notes"),
        })
    }

    fn assign_ids(&mut self, store_id: StoreId, _staff_id: Option<StaffId>) {
        self.store_id = store_id;
    }
}

impl FromRawRow for SalesForecastRecord {
    const KIND: &'static str = "sales forecast";
    const REQUIRES_STAFF: bool = false;
    const TEMPORALLY_GUARDED: bool = false;

    fn period_of(row: &RawRow) -> FieldResult<YearMonth> {
        parse_year_month(row)
    }

    fn from_raw(row: &RawRow) -> FieldResult<Self> {
        let ym = parse_year_month(row)?;
        Ok(Self {
            store_id: 0,
            year: ym.year,
            month: ym.month,
            forecasted_sales: required_money(row, "forecasted_sales")?,
            required_labor_cost: optional_money(row, "required_labor_cost")?,
            required_hours: optional_hours(row, "required_hours")?,
        })
    }

    fn assign_ids(&mut self, store_id: StoreId, _staff_id: Option<StaffId>) {
        self.store_id = store_id;
    }
}

impl FromRawRow for WorkHoursActualRecord {
    const KIND: &'static str = "work hours";
    const REQUIRES_STAFF: bool = true;

    fn period_of(row: &RawRow) -> FieldResult<YearMonth> {
        shift_period(row)
    }

    fn from_raw(row: &RawRow) -> FieldResult<Self> {
        let actual_hours = match cell(row, &["actual_hours"]) {
            Some(raw) => parse_hours_text("actual_hours", raw)?,
            None => return Err(FieldError::new("actual_hours", "missing value")),
        };

        Ok(Self {
            store_id: 0,
            staff_id: 0,
            shift_date: parse_shift_date(row)?,
            scheduled_start: optional_time(row, "scheduled_start")?,
            scheduled_end: optional_time(row, "scheduled_end")?,
            actual_start: optional_time(row, "actual_start")?,
            actual_end: optional_time(row, "actual_end")?,
            actual_hours,
            break_minutes: optional_count(row, "break_minutes")?,
            overtime_minutes: optional_count(row, "overtime_minutes")?,
            is_late: parse_bool(row, "is_late")?,
            is_early_leave: parse_bool(row, "is_early_leave")?,
            notes: optional_text(row, "notes"),
        })
    }

    fn assign_ids(&mut self, store_id: StoreId, staff_id: Option<StaffId>) {
        self.store_id = store_id;
        if let Some(staff_id) = staff_id {
            self.staff_id = staff_id;
        }
    }
}
