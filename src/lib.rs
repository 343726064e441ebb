// Meter Readings - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod observability;
pub mod parser;
pub mod reading;
pub mod reconciliation;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_database, SqliteReadingStore};
pub use entities::{Account, AccountDirectory, AccountRegistry};
pub use error::{ConfigError, IngestError, StoreError};
pub use observability::{init_logging, LogFormat};
pub use parser::{decode_readings, ReadingDecoder};
pub use reading::{
    normalize_read_value, parse_reading_time, NormalizedReading, RawReading, READING_TIME_FORMAT,
};
pub use reconciliation::{
    AccountLocks, IngestionReport, ReconciliationEngine, RowOutcome, RowRejection,
    ValueErrorPolicy,
};
pub use store::{InMemoryReadingStore, ReadingStore};

use anyhow::Result;
use std::sync::Arc;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build an engine from configuration: seed accounts, pick the store backing.
pub fn build_engine(config: &Config) -> Result<ReconciliationEngine> {
    let directory = match &config.accounts_path {
        Some(path) => AccountRegistry::from_path(path)?,
        None => AccountRegistry::bundled()?,
    };
    tracing::info!(accounts = directory.count(), "Account directory seeded");

    let store: Arc<dyn ReadingStore> = match &config.database_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using SQLite reading store");
            Arc::new(SqliteReadingStore::open(path)?)
        }
        None => {
            tracing::warn!("METER_DATABASE_PATH not set; readings are kept in memory only");
            Arc::new(InMemoryReadingStore::new())
        }
    };

    Ok(ReconciliationEngine::new(Arc::new(directory), store).with_value_errors(config.value_errors))
}
