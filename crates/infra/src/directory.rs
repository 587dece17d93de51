//! Read and bulk-replace access to accounts (listing, lookup, seeding).

use coffer_accounting::{validate_seed, Account};
use coffer_core::AccountName;

use crate::account_store::AccountStore;
use crate::error::LedgerError;

/// Thin pass-through over an [`AccountStore`] for everything except transfers.
///
/// Reads go straight to the store, whose batches are atomic, so a listing
/// taken during a transfer shows either both writes or neither.
#[derive(Debug, Clone)]
pub struct AccountDirectory<S> {
    store: S,
}

impl<S> AccountDirectory<S>
where
    S: AccountStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts = self.store.list().await?;
        accounts.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(accounts)
    }

    pub async fn find(&self, name: &AccountName) -> Result<Account, LedgerError> {
        self.store
            .find(name)
            .await?
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }

    /// Clear the store and install `accounts`.
    pub async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, LedgerError> {
        validate_seed(&accounts)?;
        let seeded = self.store.seed(accounts).await?;
        tracing::info!(accounts = seeded.len(), "ledger seeded");
        Ok(seeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use coffer_accounting::sample_accounts;
    use rust_decimal_macros::dec;

    use crate::account_store::InMemoryAccountStore;

    fn directory() -> AccountDirectory<Arc<InMemoryAccountStore>> {
        AccountDirectory::new(Arc::new(InMemoryAccountStore::new()))
    }

    #[tokio::test]
    async fn seed_then_list_is_sorted_by_name() {
        let dir = directory();
        let mut reversed = sample_accounts();
        reversed.reverse();
        dir.seed(reversed).await.unwrap();

        let names: Vec<String> = dir
            .list()
            .await
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec!["Alice".to_string(), "Bob".to_string()]);
    }

    #[tokio::test]
    async fn find_reports_not_found() {
        let dir = directory();
        dir.seed(sample_accounts()).await.unwrap();

        let alice = dir.find(&AccountName::parse("Alice").unwrap()).await.unwrap();
        assert_eq!(alice.balance(), dec!(1000));

        let err = dir.find(&AccountName::parse("Nobody").unwrap()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn duplicate_seed_is_invalid_input() {
        let dir = directory();
        let mut accounts = sample_accounts();
        accounts.extend(sample_accounts());
        let err = dir.seed(accounts).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        assert!(dir.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        assert!(directory().list().await.unwrap().is_empty());
    }
}
