use crate::error::{ReconciliationError, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Remote, per-batch fallible persistence.
#[async_trait]
pub trait RecordSink<T: Sync>: Send {
    /// Writes one batch and returns how many records the store accepted.
    async fn insert(&mut self, batch: &[T]) -> std::result::Result<usize, SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchResult {
    Committed {
        number: usize,
        records: usize,
        inserted: usize,
    },
    /// `inserted` is non-zero when the sink accepted only part of the batch.
    Failed {
        number: usize,
        records: usize,
        inserted: usize,
        reason: String,
    },
}

impl BatchResult {
    pub fn number(&self) -> usize {
        match self {
            Self::Committed { number, .. } | Self::Failed { number, .. } => *number,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// Records the sink reported as stored for this batch.
    pub fn inserted(&self) -> usize {
        match self {
            Self::Committed { inserted, .. } | Self::Failed { inserted, .. } => *inserted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total_records: usize,
    pub total_batches: usize,
    /// Sum of the per-batch counts returned by the sink.
    pub committed_records: usize,
    /// Batches that were attempted, in dispatch order. Unattempted batches are absent.
    pub batches: Vec<BatchResult>,
}

impl ImportReport {
    fn from_batches(total_records: usize, total_batches: usize, batches: Vec<BatchResult>) -> Self {
        let committed_records = batches.iter().map(BatchResult::inserted).sum();

        Self {
            total_records,
            total_batches,
            committed_records,
            batches,
        }
    }

    pub fn committed_batches(&self) -> usize {
        self.batches.iter().filter(|b| b.is_committed()).count()
    }

    pub fn failed_batch(&self) -> Option<(usize, &str)> {
        self.batches.iter().find_map(|b| match b {
            BatchResult::Failed { number, reason, .. } => Some((*number, reason.as_str())),
            BatchResult::Committed { .. } => None,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.committed_records == self.total_records
    }

    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} of {} records committed in {} of {} batch(es)",
            self.committed_records,
            self.total_records,
            self.committed_batches(),
            self.total_batches
        );
        if let Some((number, reason)) = self.failed_batch() {
            text.push_str(&format!("; batch {} failed: {}", number, reason));
        }
        text
    }
}

/// Sends records to the sink in fixed-size chunks, one at a time.
///
/// A failed batch stops the loop: earlier batches stay committed and later ones
/// are never attempted. A batch the sink accepts only partly counts as failed.
/// The cancellation token is checked before each dispatch.
pub async fn write_batches<T, S>(
    sink: &mut S,
    records: &[T],
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<ImportReport>
where
    T: Sync,
    S: RecordSink<T> + ?Sized,
{
    let batch_size = batch_size.max(1);
    let total_batches = records.len().div_ceil(batch_size);
    let mut batches = Vec::with_capacity(total_batches);

    info!(
        "Writing {} record(s) in {} batch(es) of up to {}",
        records.len(),
        total_batches,
        batch_size
    );

    for (idx, chunk) in records.chunks(batch_size).enumerate() {
        let number = idx + 1;

        if cancel.is_cancelled() {
            let report = ImportReport::from_batches(records.len(), total_batches, batches);
            warn!("Import cancelled before batch {}: {}", number, report.describe());
            return Err(ReconciliationError::Cancelled { report });
        }

        let failure = match sink.insert(chunk).await {
            Ok(inserted) if inserted >= chunk.len() => {
                debug!("Batch {}/{} committed ({} record(s))", number, total_batches, chunk.len());
                batches.push(BatchResult::Committed {
                    number,
                    records: chunk.len(),
                    inserted: chunk.len(),
                });
                continue;
            }
            Ok(inserted) => BatchResult::Failed {
                number,
                records: chunk.len(),
                inserted,
                reason: format!("sink accepted {} of {} record(s)", inserted, chunk.len()),
            },
            Err(err) => BatchResult::Failed {
                number,
                records: chunk.len(),
                inserted: 0,
                reason: err.0,
            },
        };

        batches.push(failure);
        let report = ImportReport::from_batches(records.len(), total_batches, batches);
        warn!("Batch {}/{} failed: {}", number, total_batches, report.describe());
        return Err(if report.committed_records == 0 {
            ReconciliationError::BatchFailed { report }
        } else {
            ReconciliationError::PartialBatchFailure { report }
        });
    }

    Ok(ImportReport::from_batches(records.len(), total_batches, batches))
}
