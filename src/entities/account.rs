// 💳 Account Entity - billing subjects known to the system
//
// Accounts are reference data: seeded once from CSV at startup, then only
// looked up. The ingestion path never creates or edits them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

/// Reference dataset compiled into the binaries
pub const BUNDLED_ACCOUNTS: &str = include_str!("../../data/Test_Accounts.csv");

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

/// Account: stable integer identity plus the holder's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(alias = "AccountId")]
    pub account_id: i64,

    #[serde(alias = "FirstName")]
    pub first_name: String,

    #[serde(alias = "LastName")]
    pub last_name: String,
}

impl Account {
    pub fn new(account_id: i64, first_name: &str, last_name: &str) -> Self {
        Account {
            account_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

// ============================================================================
// ACCOUNT DIRECTORY
// ============================================================================

/// Read-only lookup from account id to account.
pub trait AccountDirectory: Send + Sync {
    fn lookup(&self, account_id: i64) -> Option<Account>;

    /// All accounts, ordered by id
    fn all(&self) -> Vec<Account>;
}

/// In-memory account directory
///
/// Seeded once; shared between request handlers behind an `Arc`.
#[derive(Clone, Default)]
pub struct AccountRegistry {
    accounts: Arc<RwLock<BTreeMap<i64, Account>>>,
}

impl AccountRegistry {
    /// Create new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from CSV with columns `AccountId, FirstName, LastName`
    pub fn from_csv_reader<R: Read>(source: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let mut registry = AccountRegistry::new();
        for result in rdr.deserialize() {
            let account: Account = result.context("Failed to deserialize account")?;
            registry.register(account)?;
        }

        Ok(registry)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open accounts file: {}", path.display()))?;
        Self::from_csv_reader(file)
            .with_context(|| format!("Failed to load accounts from {}", path.display()))
    }

    /// The dataset shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_csv_reader(BUNDLED_ACCOUNTS.as_bytes()).context("Bundled account data is invalid")
    }

    /// Add an account. Ids must be unique.
    pub fn register(&mut self, account: Account) -> Result<()> {
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        if accounts.contains_key(&account.account_id) {
            bail!("Duplicate account id: {}", account.account_id);
        }
        accounts.insert(account.account_id, account);
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl AccountDirectory for AccountRegistry {
    fn lookup(&self, account_id: i64) -> Option<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&account_id)
            .cloned()
    }

    fn all(&self) -> Vec<Account> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
