use crate::batching::{write_batches, ImportReport, RecordSink};
use crate::config::EngineConfig;
use crate::dedup::{deduplicate, DedupKey};
use crate::error::Result;
use crate::ingestion::{ingest, FromRawRow, ImportPeriod, RawRow, SkippedRow};
use crate::resolution::IdentifierMap;
use log::info;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Records that passed validation, resolution and deduplication, ready to write.
#[derive(Debug, Clone)]
pub struct PreparedImport<T> {
    pub rows_received: usize,
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRow>,
    pub duplicates_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub kind: &'static str,
    pub rows_received: usize,
    pub skipped: Vec<SkippedRow>,
    pub duplicates_removed: usize,
    pub report: ImportReport,
}

/// One import run. Collaborators are passed in and live only as long as the run.
///
/// Callers must not run two imports against the same tenant/store/month scope
/// at once; no locking happens here.
pub struct Importer<'a> {
    config: &'a EngineConfig,
    identifiers: &'a IdentifierMap,
    period: ImportPeriod,
    cancel: CancellationToken,
}

impl<'a> Importer<'a> {
    pub fn new(
        config: &'a EngineConfig,
        identifiers: &'a IdentifierMap,
        period: ImportPeriod,
    ) -> Self {
        Self {
            config,
            identifiers,
            period,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every stage up to, but not including, the write.
    pub fn prepare<T>(&self, rows: &[RawRow]) -> Result<PreparedImport<T>>
    where
        T: FromRawRow + DedupKey,
    {
        let ingested = ingest::<T>(rows, self.period, self.config)?;
        let resolved = self.identifiers.resolve(ingested.staged)?;
        let deduped = deduplicate(resolved);

        Ok(PreparedImport {
            rows_received: rows.len(),
            records: deduped.records,
            skipped: ingested.skipped,
            duplicates_removed: deduped.duplicates_removed,
        })
    }

    pub async fn run<T, S>(&self, rows: &[RawRow], sink: &mut S) -> Result<ImportSummary>
    where
        T: FromRawRow + DedupKey + Sync,
        S: RecordSink<T> + ?Sized,
    {
        self.config.validate()?;
        let prepared = self.prepare::<T>(rows)?;

        let report =
            write_batches(sink, &prepared.records, self.config.batch_size, &self.cancel).await?;

        info!(
            "{} import finished: {} row(s) received, {} skipped, {} duplicate(s) removed, {}",
            T::KIND,
            prepared.rows_received,
            prepared.skipped.len(),
            prepared.duplicates_removed,
            report.describe()
        );

        Ok(ImportSummary {
            kind: T::KIND,
            rows_received: prepared.rows_received,
            skipped: prepared.skipped,
            duplicates_removed: prepared.duplicates_removed,
            report,
        })
    }
}
