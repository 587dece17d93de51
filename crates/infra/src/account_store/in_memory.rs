use std::collections::{BTreeMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use coffer_accounting::Account;
use coffer_core::{AccountName, Entity, ExpectedVersion};

use super::r#trait::{AccountStore, AccountStoreError, AccountWrite};

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountName, Account>,
    last_version: u64,
}

impl State {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

/// In-memory account store.
///
/// Intended for tests/dev. A single `RwLock` guards every record and the
/// version counter, so batches are applied inside one write-critical section
/// and readers only ever see whole batches.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    state: RwLock<State>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, AccountStoreError> {
        self.state
            .read()
            .map_err(|_| AccountStoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, AccountStoreError> {
        self.state
            .write()
            .map_err(|_| AccountStoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError> {
        Ok(self.read()?.accounts.get(name).cloned())
    }

    async fn list(&self) -> Result<Vec<Account>, AccountStoreError> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError> {
        let mut state = self.write()?;

        // Validate the whole batch before touching anything.
        {
            let mut names = HashSet::with_capacity(writes.len());
            for write in &writes {
                let name = write.account.name();
                if !names.insert(name) {
                    return Err(AccountStoreError::InvalidRecord(format!(
                        "batch writes '{name}' more than once"
                    )));
                }
                match state.accounts.get(name) {
                    Some(stored) if !write.expected.matches(stored.version()) => {
                        return Err(AccountStoreError::VersionMismatch {
                            name: name.clone(),
                            expected: write.expected,
                            actual: stored.version(),
                        });
                    }
                    None if write.expected != ExpectedVersion::Any => {
                        return Err(AccountStoreError::MissingAccount(name.clone()));
                    }
                    _ => {}
                }
            }
        }

        let mut committed = Vec::with_capacity(writes.len());
        for write in writes {
            let version = state.next_version();
            let stored = write.account.with_version(version);
            state.accounts.insert(stored.name().clone(), stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError> {
        let mut state = self.write()?;

        let mut fresh = BTreeMap::new();
        let mut committed = Vec::with_capacity(accounts.len());
        for account in accounts {
            let stored = account.with_version(state.next_version());
            if fresh.insert(stored.name().clone(), stored.clone()).is_some() {
                return Err(AccountStoreError::InvalidRecord(format!(
                    "seed contains '{}' more than once",
                    stored.name()
                )));
            }
            committed.push(stored);
        }

        state.accounts = fresh;
        Ok(committed)
    }
}
