// ⚖️ Reconciliation Engine - last-writer-wins by reading timestamp
//
// Rows are applied strictly in file order. For each row:
//   1. resolve the account (unknown → failed, next row)
//   2. normalize the meter value (policy decides what a bad value does)
//   3. no stored reading → insert; stored reading → replace only if the
//      incoming timestamp is strictly later, else failed
//   4. the upsert is committed before the next row is read
//
// Step 3 runs under a per-account lock so two uploads touching the same
// account cannot interleave their read and write.

use crate::entities::AccountDirectory;
use crate::error::IngestError;
use crate::parser::decode_readings;
use crate::reading::RawReading;
use crate::store::ReadingStore;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

// ============================================================================
// POLICY
// ============================================================================

/// What a meter value that is not a non-negative integer does to a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValueErrorPolicy {
    /// Abort the whole upload with `IngestError::ValueFormat`
    #[default]
    AbortBatch,
    /// Count the row as failed and continue
    SkipRow,
}

// ============================================================================
// ROW OUTCOME
// ============================================================================

/// Why a row did not change the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowRejection {
    UnknownAccount,
    StaleOrUnparsableTimestamp,
    /// Only produced under `ValueErrorPolicy::SkipRow`
    InvalidValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// First reading for the account
    Inserted,
    /// Strictly later reading replaced the stored one
    Replaced,
    Rejected(RowRejection),
}

impl RowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RowOutcome::Inserted | RowOutcome::Replaced)
    }
}

// ============================================================================
// INGESTION REPORT
// ============================================================================

/// Aggregate counters for one upload.
///
/// Serializes as `{"Success": n, "Fails": n}`; the breakdown is for logs only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    #[serde(rename = "Success")]
    pub success: usize,

    #[serde(rename = "Fails")]
    pub failed: usize,

    #[serde(skip)]
    pub inserted: usize,
    #[serde(skip)]
    pub replaced: usize,
    #[serde(skip)]
    pub unknown_account: usize,
    #[serde(skip)]
    pub stale: usize,
    #[serde(skip)]
    pub invalid_value: usize,
}

impl IngestionReport {
    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Replaced => self.replaced += 1,
            RowOutcome::Rejected(RowRejection::UnknownAccount) => self.unknown_account += 1,
            RowOutcome::Rejected(RowRejection::StaleOrUnparsableTimestamp) => self.stale += 1,
            RowOutcome::Rejected(RowRejection::InvalidValue) => self.invalid_value += 1,
        }

        if outcome.is_success() {
            self.success += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn rows(&self) -> usize {
        self.success + self.failed
    }

    pub fn summary(&self) -> String {
        format!(
            "{} rows: {} succeeded ({} new, {} replaced), {} failed ({} unknown account, {} stale timestamp, {} invalid value)",
            self.rows(),
            self.success,
            self.inserted,
            self.replaced,
            self.failed,
            self.unknown_account,
            self.stale,
            self.invalid_value
        )
    }
}

// ============================================================================
// ACCOUNT LOCKS
// ============================================================================

/// One mutex per account id, created on first use.
///
/// Only ids that resolved in the directory get here, so the map is bounded
/// by the number of known accounts.
#[derive(Default)]
pub struct AccountLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, account_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(account_id).or_default().clone()
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Applies uploaded readings to a `ReadingStore`.
///
/// Cheap to clone; clones share the store, directory and account locks.
#[derive(Clone)]
pub struct ReconciliationEngine {
    directory: Arc<dyn AccountDirectory>,
    store: Arc<dyn ReadingStore>,
    locks: Arc<AccountLocks>,
    value_errors: ValueErrorPolicy,
}

impl ReconciliationEngine {
    pub fn new(directory: Arc<dyn AccountDirectory>, store: Arc<dyn ReadingStore>) -> Self {
        ReconciliationEngine {
            directory,
            store,
            locks: Arc::new(AccountLocks::new()),
            value_errors: ValueErrorPolicy::default(),
        }
    }

    pub fn with_value_errors(mut self, policy: ValueErrorPolicy) -> Self {
        self.value_errors = policy;
        self
    }

    pub fn value_errors(&self) -> ValueErrorPolicy {
        self.value_errors
    }

    pub fn directory(&self) -> &dyn AccountDirectory {
        self.directory.as_ref()
    }

    pub fn store(&self) -> &dyn ReadingStore {
        self.store.as_ref()
    }

    /// Decode a CSV upload and apply every row.
    pub fn ingest_csv<R: Read>(&self, source: R) -> Result<IngestionReport, IngestError> {
        self.ingest(decode_readings(source)?)
    }

    /// Apply decoded rows in order.
    ///
    /// Stops at the first fatal error. Rows applied before it stay applied.
    pub fn ingest<I>(&self, rows: I) -> Result<IngestionReport, IngestError>
    where
        I: IntoIterator<Item = Result<RawReading, IngestError>>,
    {
        let mut report = IngestionReport::default();

        for row in rows {
            let outcome = row.and_then(|raw| self.apply(&raw));
            match outcome {
                Ok(outcome) => report.record(outcome),
                Err(err) => {
                    warn!(
                        error = %err,
                        applied = report.success,
                        "Aborting meter reading batch"
                    );
                    return Err(err);
                }
            }
        }

        info!(
            success = report.success,
            failed = report.failed,
            "{}",
            report.summary()
        );
        Ok(report)
    }

    /// Apply one row and report what happened to it.
    pub fn apply(&self, raw: &RawReading) -> Result<RowOutcome, IngestError> {
        if self.directory.lookup(raw.account_id).is_none() {
            debug!(account_id = raw.account_id, line = raw.line, "Unknown account");
            return Ok(RowOutcome::Rejected(RowRejection::UnknownAccount));
        }

        let incoming = match raw.normalize() {
            Some(reading) => reading,
            None => match self.value_errors {
                ValueErrorPolicy::AbortBatch => {
                    return Err(IngestError::ValueFormat {
                        account_id: raw.account_id,
                        value: raw.meter_read_value.clone(),
                        line: raw.line,
                    });
                }
                ValueErrorPolicy::SkipRow => {
                    debug!(account_id = raw.account_id, line = raw.line, "Invalid meter value");
                    return Ok(RowOutcome::Rejected(RowRejection::InvalidValue));
                }
            },
        };

        let lock = self.locks.handle(raw.account_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = match self.store.get(raw.account_id)? {
            None => {
                self.store.upsert(raw.account_id, incoming)?;
                RowOutcome::Inserted
            }
            Some(current) if incoming.supersedes(&current) => {
                self.store
                    .upsert(raw.account_id, incoming.replacing(&current))?;
                RowOutcome::Replaced
            }
            Some(_) => RowOutcome::Rejected(RowRejection::StaleOrUnparsableTimestamp),
        };

        debug!(account_id = raw.account_id, line = raw.line, outcome = ?outcome, "Applied reading");
        Ok(outcome)
    }
}

// ============================================================================
// TESTS
// ============================================================================
