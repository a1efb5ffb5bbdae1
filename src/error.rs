use crate::batching::ImportReport;
use crate::schema::YearMonth;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconciliationError {
    #[error("Row {row} ({identifier}): invalid value for '{field}': {details}")]
    Validation {
        row: usize,
        identifier: String,
        field: String,
        details: String,
    },

    #[error(
        "Import rejected: {count} row(s) dated after {current}; first offending rows: {}",
        format_offenders(.offending)
    )]
    TemporalConstraint {
        current: YearMonth,
        count: usize,
        offending: Vec<(usize, YearMonth)>,
    },

    #[error("Row {row}: unknown {kind} code '{code}'")]
    Resolution {
        row: usize,
        kind: CodeKind,
        code: String,
    },

    #[error("Import failed before any record was committed: {}", .report.describe())]
    BatchFailed { report: ImportReport },

    #[error("Partial import, reconciliation required: {}", .report.describe())]
    PartialBatchFailure { report: ImportReport },

    #[error("Import cancelled: {}", .report.describe())]
    Cancelled { report: ImportReport },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ReconciliationError {
    /// True when some batches were committed before the import stopped.
    pub fn requires_cleanup(&self) -> bool {
        match self {
            Self::PartialBatchFailure { .. } => true,
            Self::Cancelled { report } => report.committed_records > 0,
            _ => false,
        }
    }

    pub fn import_report(&self) -> Option<&ImportReport> {
        match self {
            Self::BatchFailed { report }
            | Self::PartialBatchFailure { report }
            | Self::Cancelled { report } => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Store,
    Staff,
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeKind::Store => write!(f, "store"),
            CodeKind::Staff => write!(f, "staff"),
        }
    }
}

fn format_offenders(offending: &[(usize, YearMonth)]) -> String {
    offending
        .iter()
        .map(|(row, ym)| format!("row {} ({})", row, ym))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReconciliationError>;
