//! # Shift Budget Engine
//!
//! Reconciles a store's labor plan against what actually happened, and turns
//! partial-year actuals into a full-year landing estimate.
//!
//! ## Core Concepts
//!
//! - **Import pipeline**: raw rows are guarded against future periods, coerced into
//!   typed records, resolved from external codes to internal ids, deduplicated
//!   (last row wins) and written in sequential batches
//! - **Monthly P&L**: twelve rows per year comparing forecast and actual sales,
//!   labor cost, commute allowance and profit, with zero-guarded rates
//! - **Annual summary**: year-to-date totals where labor and sales coverage are
//!   tracked independently, so partial imports compare like with like
//! - **Landing projection**: linear extrapolation of the covered months to
//!   twelve, degenerating to the actual total when the year is complete
//! - **Staff diff**: per-staff planned vs actual days, hours and cost for a month
//!
//! All derived views are pure functions of the records; nothing is stored.
//!
//! ## Example
//!
//! ```rust,ignore
//! use shift_budget_engine::*;
//!
//! let config = EngineConfig::default();
//! let ids = IdentifierMap::new().with_store("S001", 1).with_staff("E042", 42);
//! let importer = Importer::new(&config, &ids, ImportPeriod::from_clock());
//! let summary = importer.run::<WorkHoursActualRecord, _>(&rows, &mut sink).await?;
//!
//! let report = ReconciliationProcessor::new(config)?.build_year_report(2025, &records);
//! println!("Projected labor cost: {}", report.projection.cost.projected_total);
//! ```

pub mod annual;
pub mod batching;
pub mod config;
pub mod dedup;
pub mod error;
pub mod import;
pub mod ingestion;
pub mod monthly;
pub mod projection;
pub mod resolution;
pub mod schema;
pub mod staff_diff;
pub mod utils;

pub use annual::AnnualSummary;
pub use batching::{write_batches, BatchResult, ImportReport, RecordSink, SinkError};
pub use config::{CoercionPolicy, EngineConfig};
pub use dedup::{deduplicate, DedupKey, Deduplicated};
pub use error::{CodeKind, ReconciliationError, Result};
pub use import::{ImportSummary, Importer, PreparedImport};
pub use ingestion::*;
pub use monthly::{
    blended_totals, coverage_for_year, AmountComparison, BlendedTotals, DisplayValue,
    MonthlyCoverage, MonthlyPlBuilder, MonthlyPlRow, RateComparison, ValueBasis,
};
pub use projection::{AnnualProjection, HoursProjection, MetricProjection};
pub use resolution::IdentifierMap;
pub use schema::*;
pub use staff_diff::{
    shift_differences, MonthDiffAnalysis, MonthDiffSummary, ShiftChange, ShiftDifference,
    StaffDiffRecord,
};
pub use utils::*;

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Every derived view of one year, built from a single snapshot of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct YearReport {
    pub year: i32,
    /// January to December.
    pub monthly: Vec<MonthlyPlRow>,
    pub blended: BlendedTotals,
    pub coverage: Vec<MonthlyCoverage>,
    pub summary: AnnualSummary,
    pub projection: AnnualProjection,
}

impl YearReport {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(YearReport)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Months that have every source needed for a plan/actual drill-down.
    pub fn reconcilable_months(&self) -> Vec<YearMonth> {
        self.coverage
            .iter()
            .filter(|c| c.is_reconcilable())
            .map(|c| c.period)
            .collect()
    }
}

pub struct ReconciliationProcessor {
    config: EngineConfig,
}

impl ReconciliationProcessor {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn build_year_report(&self, year: i32, records: &RecordSet) -> YearReport {
        info!("Building year report for {}", year);
        debug!(
            "Record snapshot: {} payroll, {} sales, {} forecast, {} work-hour, {} planned shift row(s)",
            records.payroll.len(),
            records.sales_actual.len(),
            records.sales_forecast.len(),
            records.work_hours.len(),
            records.planned_shifts.len()
        );

        let monthly = MonthlyPlBuilder::from_config(&self.config).build_year(
            year,
            &records.payroll,
            &records.sales_actual,
            &records.sales_forecast,
        );
        let blended = blended_totals(&monthly);
        let coverage = coverage_for_year(
            year,
            &records.work_hours,
            &records.payroll,
            &records.sales_actual,
            &records.sales_forecast,
        );
        let summary = AnnualSummary::aggregate(year, records);
        let projection = AnnualProjection::from_summary(&summary);

        info!(
            "Year report {} ready: {} labor month(s), {} sales month(s), projected cost {}",
            year,
            summary.months_count(),
            summary.sales_months_count(),
            projection.cost.projected_total
        );

        YearReport {
            year,
            monthly,
            blended,
            coverage,
            summary,
            projection,
        }
    }

    pub fn analyze_month(&self, period: YearMonth, records: &RecordSet) -> MonthDiffAnalysis {
        staff_diff::analyze_month(period, records)
    }
}

pub fn build_year_report(
    year: i32,
    records: &RecordSet,
    config: &EngineConfig,
) -> Result<YearReport> {
    let processor = ReconciliationProcessor::new(config.clone())?;
    Ok(processor.build_year_report(year, records))
}

pub fn analyze_month(period: YearMonth, records: &RecordSet) -> MonthDiffAnalysis {
    staff_diff::analyze_month(period, records)
}
