// 🗄️ Reading store - current reading per account
//
// A mapping, not a log: at most one reading per account id. Backings only
// need point lookup, upsert and a listing; the reconciliation engine decides
// what gets written.

use crate::error::StoreError;
use crate::reading::NormalizedReading;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Keyed store of the current reading per account.
pub trait ReadingStore: Send + Sync {
    fn get(&self, account_id: i64) -> Result<Option<NormalizedReading>, StoreError>;

    /// Insert or replace the reading stored for `account_id`.
    fn upsert(&self, account_id: i64, reading: NormalizedReading) -> Result<(), StoreError>;

    /// All stored readings, ordered by account id
    fn list(&self) -> Result<Vec<NormalizedReading>, StoreError>;
}

/// Non-durable store: state is lost when the process exits.
#[derive(Clone, Default)]
pub struct InMemoryReadingStore {
    readings: Arc<RwLock<BTreeMap<i64, NormalizedReading>>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReadingStore for InMemoryReadingStore {
    fn get(&self, account_id: i64) -> Result<Option<NormalizedReading>, StoreError> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(readings.get(&account_id).cloned())
    }

    fn upsert(&self, account_id: i64, reading: NormalizedReading) -> Result<(), StoreError> {
        let mut readings = self.readings.write().unwrap_or_else(PoisonError::into_inner);
        readings.insert(account_id, reading);
        Ok(())
    }

    fn list(&self) -> Result<Vec<NormalizedReading>, StoreError> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(readings.values().cloned().collect())
    }
}
