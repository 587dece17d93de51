//! Per-account mutual exclusion for transfers.
//!
//! Locks are always taken in ascending `AccountName` order, so two transfers
//! touching the same pair (in either direction) can never wait on each other
//! in a cycle. Acquisition is bounded by a single deadline covering all names.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

use coffer_core::AccountName;

#[derive(Debug, Error)]
#[error("timed out after {waited:?} waiting for the lock on '{name}'")]
pub struct LockTimeout {
    pub name: AccountName,
    pub waited: Duration,
}

type Registry = HashMap<AccountName, Arc<AsyncMutex<()>>>;

/// Registry of per-account async mutexes.
///
/// Entries are created on demand and dropped again once nobody holds or waits
/// for them, so unknown names in rejected transfers do not accumulate.
#[derive(Debug, Default)]
pub struct AccountLocks {
    registry: Mutex<Registry>,
}

impl AccountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every name in `names` (duplicates allowed) within `timeout`.
    pub async fn acquire(
        &self,
        names: &[&AccountName],
        timeout: Duration,
    ) -> Result<LockSet<'_>, LockTimeout> {
        let mut ordered: Vec<AccountName> = names.iter().map(|n| (*n).clone()).collect();
        ordered.sort();
        ordered.dedup();

        let deadline = Instant::now() + timeout;
        let mut set = LockSet {
            locks: self,
            names: ordered.clone(),
            guards: Vec::with_capacity(ordered.len()),
        };

        for name in ordered {
            let mutex = self.entry(&name);
            match tokio::time::timeout_at(deadline, mutex.lock_owned()).await {
                Ok(guard) => set.guards.push(guard),
                Err(_) => return Err(LockTimeout { name, waited: timeout }),
            }
        }

        Ok(set)
    }

    /// Number of names currently tracked (held or waited on).
    pub fn tracked(&self) -> usize {
        self.registry().len()
    }

    fn entry(&self, name: &AccountName) -> Arc<AsyncMutex<()>> {
        self.registry()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn prune(&self, names: &[AccountName]) {
        let mut registry = self.registry();
        for name in names {
            // Only the registry itself still references an idle entry.
            if registry.get(name).is_some_and(|m| Arc::strong_count(m) == 1) {
                registry.remove(name);
            }
        }
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Guards for a set of account locks; releases (and prunes) on drop.
#[derive(Debug)]
pub struct LockSet<'a> {
    locks: &'a AccountLocks,
    names: Vec<AccountName>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet<'_> {
    pub fn names(&self) -> &[AccountName] {
        &self.names
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        // Release in reverse acquisition order, then forget idle entries.
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
        self.locks.prune(&self.names);
    }
}
