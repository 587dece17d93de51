use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use coffer_accounting::Account;
use coffer_core::{AccountName, Entity, ExpectedVersion};

/// A single record write inside a [`AccountStore::commit`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWrite {
    pub account: Account,
    pub expected: ExpectedVersion,
}

impl AccountWrite {
    /// Write `account`, requiring the stored record to still be at `account.version()`.
    pub fn conditional(account: Account) -> Self {
        let expected = ExpectedVersion::Exact(account.version());
        Self { account, expected }
    }

    /// Full replace (or insert) regardless of the stored version.
    pub fn unconditional(account: Account) -> Self {
        Self {
            account,
            expected: ExpectedVersion::Any,
        }
    }
}

/// Account store operation error.
///
/// These are **infrastructure errors** (storage, concurrency) as opposed to
/// domain errors (validation, business rules).
#[derive(Debug, Error)]
pub enum AccountStoreError {
    #[error("version mismatch for '{name}': expected {expected:?}, found {actual}")]
    VersionMismatch {
        name: AccountName,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("account '{0}' does not exist")]
    MissingAccount(AccountName),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The backend cancelled the operation at its time bound and rolled it back.
    #[error("store timed out: {0}")]
    Timeout(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Name-addressed account persistence.
///
/// ## Write Semantics
///
/// `commit()`:
/// - Checks every write's `ExpectedVersion` against the stored record
/// - Applies all writes or none of them (a reader never sees half a batch)
/// - Assigns each written record a fresh version, strictly greater than any
///   version the store has handed out before (including before a `seed`)
///
/// `seed()`:
/// - Clears every record and inserts the given ones in a single step
///
/// ## Implementation Requirements
///
/// Implementations must:
/// - Reject an `Exact` write whose record is missing or at another version
/// - Never expose a state in which only part of a batch is applied
/// - Keep versions monotonic across `seed()` so stale readers are detected
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError>;

    /// All accounts, ordered by name.
    async fn list(&self) -> Result<Vec<Account>, AccountStoreError>;

    /// Atomically apply a batch of conditional writes.
    ///
    /// Returns the written accounts, stamped with their new versions, in the
    /// order they were given.
    async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError>;

    /// Replace the entire contents of the store.
    async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError>;

    /// Single-record full replace.
    async fn save(&self, write: AccountWrite) -> Result<Account, AccountStoreError> {
        let name = write.account.name().clone();
        self.commit(vec![write])
            .await?
            .into_iter()
            .next()
            .ok_or(AccountStoreError::MissingAccount(name))
    }
}

#[async_trait]
impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError> {
        (**self).find(name).await
    }

    async fn list(&self) -> Result<Vec<Account>, AccountStoreError> {
        (**self).list().await
    }

    async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError> {
        (**self).commit(writes).await
    }

    async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError> {
        (**self).seed(accounts).await
    }

    async fn save(&self, write: AccountWrite) -> Result<Account, AccountStoreError> {
        (**self).save(write).await
    }
}
