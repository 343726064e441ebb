// Error taxonomy for the ingestion core
//
// Fatal errors abort a whole upload. Per-row problems are not errors at all:
// they are `RowRejection`s tallied in the report (see reconciliation.rs).

use thiserror::Error;

/// Errors that abort an ingestion batch.
#[derive(Debug, Error)]
pub enum IngestError {
    /// CSV framing or a required field could not be decoded.
    #[error("invalid CSV at line {line}: {message}")]
    StructuralParse { line: u64, message: String },

    /// A meter value is not a non-negative integer.
    #[error("invalid meter value {value:?} for account {account_id} at line {line}")]
    ValueFormat {
        account_id: i64,
        value: String,
        line: u64,
    },

    /// The reading store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// True for errors caused by the uploaded content rather than the backend.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = match err.kind() {
            csv::ErrorKind::Deserialize { err, .. } => err.to_string(),
            _ => err.to_string(),
        };
        IngestError::StructuralParse { line, message }
    }
}

/// Reading store backend failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored reading for account {account_id} is corrupt: {message}")]
    Corrupt { account_id: i64, message: String },
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}
