use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use shift_budget_engine::*;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

const WORK_HOURS_CSV: &str = "\
store_code,staff_code,shift_date,scheduled_start,scheduled_end,actual_start,actual_end,actual_hours,break_minutes,is_late,is_early_leave
S001,E10,2025-01-05,09:00,18:00,09:05,18:00,8,30,TRUE,false
S001,E11,2025-01-05,10:00,19:00,10:00,19:00,8,60,false,false
S001,E10,2025-01-05,09:00,18:00,09:00,18:00,8,60,false,false
S001,E10,2025/01/06,09:00,15:00,09:00,15:30,6.5,0,0,1
S001,E11,2025-02-03,10:00,19:00,10:00,19:00,8,60,false,false
";

const PAYROLL_CSV: &str = "\
store_code,staff_code,year,month,work_days,work_hours,gross_salary,commute_allowance,payment_status
S001,E10,2025,1,2,14.5,\"250,000\",10000,PAID
S001,E11,2025,1,1,8,\"200,000\",,PAID
S001,E11,2025,2,1,8,\"210,000\",12000,PENDING
";

const SALES_CSV: &str = "\
store_code,year,month,actual_sales,daily_average,notes
S001,2025,1,\"1,000,000\",\"32,258\",new year sale
S001,2025,2,0,0,
";

const FORECAST_CSV: &str = "\
store_code,year,month,forecasted_sales,required_labor_cost,required_hours
S001,2025,1,\"900,000\",\"400,000\",300
S001,2025,2,\"900,000\",\"400,000\",300
S001,2025,3,\"900,000\",\"400,000\",300
S001,2025,12,\"1,500,000\",\"500,000\",320
";

fn parse_csv(text: &str) -> anyhow::Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.deserialize::<BTreeMap<String, String>>() {
        rows.push(record?);
    }
    Ok(rows)
}

fn identifiers() -> IdentifierMap {
    IdentifierMap::new()
        .with_store("S001", 1)
        .with_staff("E10", 10)
        .with_staff("E11", 11)
}

fn june_2025() -> ImportPeriod {
    ImportPeriod::new(YearMonth::new(2025, 6).unwrap())
}

/// In-memory stand-in for the remote store, optionally failing on one call.
struct MemorySink<T> {
    stored: Vec<T>,
    calls: usize,
    fail_on_call: Option<usize>,
}

impl<T> MemorySink<T> {
    fn new() -> Self {
        Self {
            stored: Vec::new(),
            calls: 0,
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> RecordSink<T> for MemorySink<T> {
    async fn insert(&mut self, batch: &[T]) -> std::result::Result<usize, SinkError> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err(SinkError("connection reset by peer".to_string()));
        }
        self.stored.extend_from_slice(batch);
        Ok(batch.len())
    }
}

async fn import_all(config: &EngineConfig) -> anyhow::Result<RecordSet> {
    let ids = identifiers();
    let importer = Importer::new(config, &ids, june_2025());

    let mut work_hours = MemorySink::new();
    importer
        .run::<WorkHoursActualRecord, _>(&parse_csv(WORK_HOURS_CSV)?, &mut work_hours)
        .await?;
    let mut payroll = MemorySink::new();
    importer
        .run::<PayrollRecord, _>(&parse_csv(PAYROLL_CSV)?, &mut payroll)
        .await?;
    let mut sales = MemorySink::new();
    importer
        .run::<SalesActualRecord, _>(&parse_csv(SALES_CSV)?, &mut sales)
        .await?;
    let mut forecasts = MemorySink::new();
    importer
        .run::<SalesForecastRecord, _>(&parse_csv(FORECAST_CSV)?, &mut forecasts)
        .await?;

    Ok(RecordSet {
        payroll: payroll.stored,
        sales_actual: sales.stored,
        sales_forecast: forecasts.stored,
        work_hours: work_hours.stored,
        planned_shifts: planned_shifts(),
    })
}

fn planned_shifts() -> Vec<PlannedShiftRecord> {
    let shift = |staff_id, day, hours, wage| PlannedShiftRecord {
        staff_id,
        date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
        planned_hours: Hours::from_f64(hours),
        daily_wage: wage,
    };
    vec![
        shift(10, 5, 8.0, 120_000),
        shift(10, 6, 8.0, 120_000),
        shift(12, 7, 5.0, 60_000),
    ]
}

#[tokio::test]
async fn test_work_hours_csv_import_dedups_last_wins() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::new();

    let summary = importer
        .run::<WorkHoursActualRecord, _>(&parse_csv(WORK_HOURS_CSV)?, &mut sink)
        .await?;

    assert_eq!(summary.kind, "work hours");
    assert_eq!(summary.rows_received, 5);
    assert_eq!(summary.duplicates_removed, 1);
    assert_eq!(summary.report.committed_records, 4);
    assert!(summary.report.is_complete());

    let first = sink
        .stored
        .iter()
        .find(|r| r.staff_id == 10 && r.shift_date == NaiveDate::from_ymd_opt(2025, 1, 5).unwrap())
        .expect("deduplicated record kept");
    assert_eq!(first.break_minutes, 60);
    assert!(!first.is_late, "the later row replaces every field");

    let slash_date = sink
        .stored
        .iter()
        .find(|r| r.shift_date == NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())
        .expect("slash-formatted date accepted");
    assert!(slash_date.is_early_leave);
    assert_eq!(slash_date.actual_hours, Hours::from_f64(6.5));
    Ok(())
}

#[tokio::test]
async fn test_future_dated_import_leaves_store_untouched() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());

    let mut sink = MemorySink::new();
    importer
        .run::<PayrollRecord, _>(&parse_csv(PAYROLL_CSV)?, &mut sink)
        .await?;
    let persisted_before = sink.stored.len();

    let future = parse_csv(
        "store_code,staff_code,year,month,gross_salary\n\
         S001,E10,2025,6,100000\n\
         S001,E10,2025,7,100000\n",
    )?;
    let err = importer
        .run::<PayrollRecord, _>(&future, &mut sink)
        .await
        .unwrap_err();

    match err {
        ReconciliationError::TemporalConstraint {
            current,
            count,
            offending,
        } => {
            assert_eq!(current, YearMonth::new(2025, 6).unwrap());
            assert_eq!(count, 1);
            assert_eq!(offending, vec![(1, YearMonth::new(2025, 7).unwrap())]);
        }
        other => panic!("expected temporal rejection, got {:?}", other),
    }
    assert_eq!(sink.stored.len(), persisted_before);
    assert_eq!(sink.calls, 1, "no batch is attempted for a rejected import");
    Ok(())
}

#[tokio::test]
async fn test_forecast_import_accepts_future_months() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::new();

    let summary = importer
        .run::<SalesForecastRecord, _>(&parse_csv(FORECAST_CSV)?, &mut sink)
        .await?;

    assert_eq!(summary.report.committed_records, 4);
    assert!(sink.stored.iter().any(|f| f.month == 12 && f.forecasted_sales == 1_500_000));
    Ok(())
}

#[tokio::test]
async fn test_partial_batch_failure_is_distinct() -> anyhow::Result<()> {
    let config = EngineConfig {
        batch_size: 2,
        ..EngineConfig::default()
    };
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::failing_on(2);

    let err = importer
        .run::<WorkHoursActualRecord, _>(&parse_csv(WORK_HOURS_CSV)?, &mut sink)
        .await
        .unwrap_err();

    assert!(err.requires_cleanup());
    match &err {
        ReconciliationError::PartialBatchFailure { report } => {
            assert_eq!(report.total_batches, 2);
            assert_eq!(report.committed_records, 2);
            assert_eq!(report.committed_batches(), 1);
            assert_eq!(
                report.failed_batch(),
                Some((2, "connection reset by peer"))
            );
        }
        other => panic!("expected partial failure, got {:?}", other),
    }
    assert_eq!(sink.stored.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invalid_day_in_future_month_blocks_import() -> anyhow::Result<()> {
    let config = EngineConfig {
        coercion_policy: CoercionPolicy::SkipInvalidRows,
        ..EngineConfig::default()
    };
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::new();
    let rows = parse_csv(
        "store_code,staff_code,year,month,date,actual_hours\n\
         S001,E10,2025,1,5,8\n\
         S001,E10,2025,7,32,8\n",
    )?;

    let err = importer
        .run::<WorkHoursActualRecord, _>(&rows, &mut sink)
        .await
        .unwrap_err();

    match err {
        ReconciliationError::TemporalConstraint { offending, .. } => {
            assert_eq!(offending, vec![(1, YearMonth::new(2025, 7).unwrap())]);
        }
        other => panic!("expected temporal rejection, got {:?}", other),
    }
    assert_eq!(sink.calls, 0);
    assert!(sink.stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_first_batch_failure_commits_nothing() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = identifiers();
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::failing_on(1);

    let err = importer
        .run::<SalesActualRecord, _>(&parse_csv(SALES_CSV)?, &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconciliationError::BatchFailed { .. }));
    assert!(!err.requires_cleanup());
    assert!(sink.stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cancelled_import_reports_progress() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = identifiers();
    let cancel = CancellationToken::new();
    let importer = Importer::new(&config, &ids, june_2025()).with_cancellation(cancel.clone());
    let mut sink = MemorySink::new();

    cancel.cancel();
    let err = importer
        .run::<PayrollRecord, _>(&parse_csv(PAYROLL_CSV)?, &mut sink)
        .await
        .unwrap_err();

    let report = err.import_report().expect("cancellation carries a report");
    assert_eq!(report.committed_records, 0);
    assert!(matches!(err, ReconciliationError::Cancelled { .. }));
    assert!(sink.stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unknown_staff_code_aborts_with_row() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let ids = IdentifierMap::new().with_store("S001", 1).with_staff("E10", 10);
    let importer = Importer::new(&config, &ids, june_2025());
    let mut sink = MemorySink::new();

    let err = importer
        .run::<PayrollRecord, _>(&parse_csv(PAYROLL_CSV)?, &mut sink)
        .await
        .unwrap_err();

    match err {
        ReconciliationError::Resolution { row, kind, code } => {
            assert_eq!(row, 1);
            assert_eq!(kind, CodeKind::Staff);
            assert_eq!(code, "E11");
        }
        other => panic!("expected resolution error, got {:?}", other),
    }
    assert!(sink.stored.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_amount_aborts_or_skips_by_policy() -> anyhow::Result<()> {
    let rows = parse_csv(
        "store_code,year,month,actual_sales\n\
         S001,2025,3,500000\n\
         S001,2025,4,n/a\n",
    )?;
    let ids = identifiers();

    let strict = EngineConfig::default();
    let err = Importer::new(&strict, &ids, june_2025())
        .run::<SalesActualRecord, _>(&rows, &mut MemorySink::new())
        .await
        .unwrap_err();
    match err {
        ReconciliationError::Validation {
            row,
            identifier,
            field,
            ..
        } => {
            assert_eq!(row, 1);
            assert!(identifier.contains("S001"));
            assert_eq!(field, "actual_sales");
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let lenient = EngineConfig {
        coercion_policy: CoercionPolicy::SkipInvalidRows,
        ..EngineConfig::default()
    };
    let mut sink = MemorySink::new();
    let summary = Importer::new(&lenient, &ids, june_2025())
        .run::<SalesActualRecord, _>(&rows, &mut sink)
        .await?;
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.report.committed_records, 1);
    assert_eq!(sink.stored[0].actual_sales, 500_000);
    Ok(())
}

#[tokio::test]
async fn test_imported_records_build_year_report() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let records = import_all(&config).await?;

    let report = build_year_report(2025, &records, &config)?;

    let january = &report.monthly[0];
    assert_eq!(january.sales.actual, 1_000_000);
    assert_eq!(january.sales.diff, 100_000);
    assert_eq!(january.labor_cost.actual, 450_000);
    assert_eq!(january.commute.actual, 10_000);
    // two payroll rows priced at the default per-head allowance
    assert_eq!(january.commute.forecast, 16_000);
    assert!((january.labor_rate.actual - 45.0).abs() < 1e-9);
    assert_eq!(january.profit.actual, 540_000);

    let february = &report.monthly[1];
    assert!(february.has_data);
    assert!(!february.sales.has_actual, "zero sales reads as no actual");
    assert_eq!(february.labor_rate.actual, 0.0);
    assert_eq!(february.profit_rate.actual, 0.0);
    assert_eq!(february.sales.display().basis, ValueBasis::Forecast);

    let march = &report.monthly[2];
    assert!(march.has_data);
    assert_eq!(march.commute.forecast, 0);
    assert!(!report.monthly[5].has_data);

    assert_eq!(
        report.reconcilable_months(),
        vec![YearMonth::new(2025, 1).unwrap(), YearMonth::new(2025, 2).unwrap()]
    );

    let summary = &report.summary;
    assert_eq!(summary.months_count(), 2);
    assert_eq!(summary.sales_months_count(), 2);
    assert_eq!(summary.actual_cost, 660_000);
    assert_eq!(summary.planned_cost, 300_000);
    assert_eq!(summary.forecast_sales, 4_200_000);
    assert_eq!(summary.forecast_for_actual_months, 700_000);
    assert_eq!(summary.sales_diff, 300_000);

    let projection = &report.projection;
    assert_eq!(projection.cost.remaining_months, 10);
    assert_eq!(projection.cost.projected_total, 3_960_000);
    assert_eq!(projection.cost.planned_annual, 1_800_000);
    assert_eq!(projection.sales.projected_total, 6_000_000);
    assert!(projection.is_extrapolated());
    Ok(())
}

#[tokio::test]
async fn test_month_analysis_covers_both_sides() -> anyhow::Result<()> {
    let config = EngineConfig::default();
    let records = import_all(&config).await?;

    let processor = ReconciliationProcessor::new(config)?;
    let analysis = processor.analyze_month(YearMonth::new(2025, 1).unwrap(), &records);

    let ids: Vec<StaffId> = analysis.staff.iter().map(|s| s.staff_id).collect();
    assert_eq!(ids, vec![10, 11, 12]);

    let planned_only = &analysis.staff[2];
    assert_eq!(planned_only.actual_hours, Hours::ZERO);
    assert_eq!(planned_only.hours_diff, Hours::from_f64(-5.0));

    let actual_only = &analysis.staff[1];
    assert_eq!(actual_only.planned_days, 0);
    assert_eq!(actual_only.actual_days, 1);
    assert_eq!(actual_only.cost_diff, 200_000);

    let both = &analysis.staff[0];
    assert_eq!(both.planned_hours, Hours::from_f64(16.0));
    assert_eq!(both.actual_hours, Hours::from_f64(14.5));
    assert_eq!(both.cost_diff, 10_000);

    let changes = |row: &StaffDiffRecord| -> Vec<(u32, ShiftChange, Hours)> {
        row.differences
            .iter()
            .map(|d| (d.date.day(), d.change, d.diff))
            .collect()
    };
    assert_eq!(
        changes(both),
        vec![(6, ShiftChange::Changed, Hours::from_f64(-1.5))]
    );
    assert_eq!(
        changes(actual_only),
        vec![(5, ShiftChange::Added, Hours::from_f64(8.0))]
    );
    assert_eq!(
        changes(planned_only),
        vec![(7, ShiftChange::Removed, Hours::from_f64(-5.0))]
    );

    assert_eq!(analysis.summary.planned_shifts, 3);
    assert_eq!(analysis.summary.actual_shifts, 3);
    assert_eq!(analysis.summary.planned_profit, 900_000 - 300_000);
    assert_eq!(analysis.summary.actual_profit, 1_000_000 - 450_000);
    Ok(())
}

#[test]
fn test_config_loaded_from_file() -> anyhow::Result<()> {
    let path = std::env::temp_dir().join("shift_budget_engine_config_test.json");
    std::fs::write(
        &path,
        r#"{ "batch_size": 250, "coercion_policy": "skip_invalid_rows", "default_store_code": "S001" }"#,
    )?;

    let config = EngineConfig::from_path(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(config.batch_size, 250);
    assert_eq!(config.coercion_policy, CoercionPolicy::SkipInvalidRows);
    assert_eq!(config.commute_allowance_per_head, 8000);
    Ok(())
}

#[tokio::test]
async fn test_default_store_code_fills_missing_column() -> anyhow::Result<()> {
    let config = EngineConfig {
        default_store_code: Some("S001".to_string()),
        ..EngineConfig::default()
    };
    let ids = identifiers();
    let rows = parse_csv("year,month,actual_sales\n2025,4,750000\n")?;
    let mut sink = MemorySink::new();

    Importer::new(&config, &ids, june_2025())
        .run::<SalesActualRecord, _>(&rows, &mut sink)
        .await?;

    assert_eq!(sink.stored[0].store_id, 1);
    Ok(())
}

#[test]
fn test_full_year_projection_is_exact() {
    let records = RecordSet {
        payroll: (1..=12)
            .map(|month| PayrollRecord {
                store_id: 1,
                staff_id: 10,
                year: 2024,
                month,
                work_days: 20,
                work_hours: Hours::from_f64(160.0),
                gross_salary: 333_333,
                commute_allowance: 0,
                payment_status: PaymentStatus::Paid,
            })
            .collect(),
        ..RecordSet::default()
    };

    let summary = AnnualSummary::aggregate(2024, &records);
    let projection = AnnualProjection::from_summary(&summary);

    assert_eq!(projection.cost.remaining_months, 0);
    assert_eq!(projection.cost.projected_total, summary.actual_cost);
    assert_eq!(projection.cost.projected_total, 3_999_996);
    assert!(!projection.cost.is_extrapolated());
}
