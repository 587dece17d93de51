//! Transfer execution pipeline.
//!
//! ```text
//! Transfer (validated names + positive amount)
//!   ↓
//! 1. Lock both accounts (ascending name order, bounded wait)
//!   ↓
//! 2. Load sender + receiver
//!   ↓
//! 3. Plan (pure: sufficiency check, debit, credit)
//!   ↓
//! 4. Commit both records in one conditional batch
//!   ↓
//! 5. Unlock; report post-transfer balances
//! ```
//!
//! The locks stop two transfers in this process from interleaving on an
//! account. The conditional commit catches everything the locks cannot see
//! (reseeding, other processes on a shared store): a stale read turns into a
//! version mismatch, and steps 2-4 are retried a bounded number of times.
//! Because both records are written in a single batch, there is no point at
//! which the debit is persisted without the credit.
//!
//! Steps 2-3 run under `operation_timeout`. Step 4 is never abandoned
//! half-way: the store enforces its own bound and rolls back on expiry, so
//! a `Timeout` always means nothing was written.

use rust_decimal::Decimal;
use tracing::Instrument;
use uuid::Uuid;

use coffer_accounting::{plan_transfer, Account, Transfer, TransferPlan};
use coffer_core::{AccountName, Amount};

use crate::account_store::{AccountStore, AccountWrite};
use crate::config::CoordinatorConfig;
use crate::error::LedgerError;
use crate::locks::AccountLocks;

/// Outcome of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Amount,
    pub sender_balance: Decimal,
    pub receiver_balance: Decimal,
}

/// Serialises transfers per account and commits each one atomically.
#[derive(Debug)]
pub struct TransferCoordinator<S> {
    store: S,
    locks: AccountLocks,
    config: CoordinatorConfig,
}

impl<S> TransferCoordinator<S> {
    pub fn new(store: S, config: CoordinatorConfig) -> Self {
        Self {
            store,
            locks: AccountLocks::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &AccountLocks {
        &self.locks
    }

}

impl<S> TransferCoordinator<S>
where
    S: AccountStore,
{
    /// Move `transfer.amount` from `transfer.from` to `transfer.to`.
    ///
    /// Fails with `NotFound` / `InsufficientFunds` without mutating anything,
    /// `Timeout` (also without mutating anything) if the locks, the reads or the
    /// store's own commit bound expire, and
    /// `Conflict` if the records keep changing underneath it.
    pub async fn transfer(&self, transfer: &Transfer) -> Result<TransferReceipt, LedgerError> {
        let transfer_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "transfer",
            %transfer_id,
            from = %transfer.from,
            to = %transfer.to,
            amount = %transfer.amount
        );

        let outcome = self.run(transfer_id, transfer).instrument(span.clone()).await;
        span.in_scope(|| log_outcome(&outcome));
        outcome
    }

    async fn run(&self, transfer_id: Uuid, transfer: &Transfer) -> Result<TransferReceipt, LedgerError> {
        let mut retries = 0u32;
        loop {
            let _held = self
                .locks
                .acquire(&[&transfer.from, &transfer.to], self.config.lock_timeout)
                .await?;

            match self.attempt(transfer_id, transfer).await {
                Err(LedgerError::Conflict(reason)) if retries < self.config.max_retries => {
                    retries += 1;
                    tracing::warn!(retries, %reason, "stale account state; retrying transfer");
                }
                other => return other,
            }
        }
    }

    async fn attempt(&self, transfer_id: Uuid, transfer: &Transfer) -> Result<TransferReceipt, LedgerError> {
        // Only the read side is cut off client-side. Once the commit is in
        // flight its outcome is awaited, so `Timeout` never hides an applied
        // transfer; the store bounds the commit itself.
        let plan = tokio::time::timeout(self.config.operation_timeout, self.prepare(transfer))
            .await
            .map_err(|_| {
                LedgerError::Timeout(format!(
                    "accounts could not be read within {:?}",
                    self.config.operation_timeout
                ))
            })??;

        let receipt = TransferReceipt {
            transfer_id,
            from: transfer.from.clone(),
            to: transfer.to.clone(),
            amount: transfer.amount,
            sender_balance: plan.sender_balance(),
            receiver_balance: plan.receiver_balance(),
        };

        self.store
            .commit(vec![
                AccountWrite::conditional(plan.sender),
                AccountWrite::conditional(plan.receiver),
            ])
            .await?;

        Ok(receipt)
    }

    async fn prepare(&self, transfer: &Transfer) -> Result<TransferPlan, LedgerError> {
        let sender = self.load(&transfer.from).await?;
        let receiver = self.load(&transfer.to).await?;
        Ok(plan_transfer(transfer, &sender, &receiver)?)
    }

    async fn load(&self, name: &AccountName) -> Result<Account, LedgerError> {
        self.store
            .find(name)
            .await?
            .ok_or_else(|| LedgerError::NotFound(name.to_string()))
    }
}

fn log_outcome(outcome: &Result<TransferReceipt, LedgerError>) {
    match outcome {
        Ok(receipt) => tracing::info!(
            sender_balance = %receipt.sender_balance,
            receiver_balance = %receipt.receiver_balance,
            "transfer committed"
        ),
        Err(LedgerError::Store(e)) => tracing::error!(error = %e, "transfer failed in store"),
        Err(LedgerError::InvariantViolation(msg)) => {
            tracing::error!(%msg, "transfer broke a ledger invariant")
        }
        Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "transfer rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use coffer_accounting::sample_accounts;
    use coffer_core::Entity;
    use rust_decimal_macros::dec;

    use crate::account_store::{AccountStoreError, InMemoryAccountStore};

    fn name(s: &str) -> AccountName {
        AccountName::parse(s).unwrap()
    }

    fn transfer(from: &str, to: &str, amount: Decimal) -> Transfer {
        Transfer::new(name(from), name(to), Amount::new(amount).unwrap()).unwrap()
    }

    async fn seeded(config: CoordinatorConfig) -> TransferCoordinator<Arc<InMemoryAccountStore>> {
        coffer_observability::tracing::init_for_tests();
        let store = Arc::new(InMemoryAccountStore::new());
        store.seed(sample_accounts()).await.unwrap();
        TransferCoordinator::new(store, config)
    }

    async fn balance(coordinator: &TransferCoordinator<Arc<InMemoryAccountStore>>, who: &str) -> Decimal {
        coordinator.store().find(&name(who)).await.unwrap().unwrap().balance()
    }

    #[tokio::test]
    async fn sample_scenario() {
        let coordinator = seeded(CoordinatorConfig::default()).await;

        let receipt = coordinator.transfer(&transfer("Alice", "Bob", dec!(200))).await.unwrap();
        assert_eq!(receipt.sender_balance, dec!(800));
        assert_eq!(receipt.receiver_balance, dec!(700));

        let err = coordinator
            .transfer(&transfer("Alice", "Bob", dec!(2000)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(balance(&coordinator, "Alice").await, dec!(800));
        assert_eq!(balance(&coordinator, "Bob").await, dec!(700));
        assert_eq!(coordinator.locks().tracked(), 0);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found_and_nothing_changes() {
        let coordinator = seeded(CoordinatorConfig::default()).await;
        let before = coordinator.store().list().await.unwrap();

        let err = coordinator
            .transfer(&transfer("Nobody", "Bob", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(n) if n == "Nobody"));

        let err = coordinator
            .transfer(&transfer("Alice", "Nobody", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        assert_eq!(coordinator.store().list().await.unwrap(), before);
        assert_eq!(coordinator.locks().tracked(), 0);
    }

    #[tokio::test]
    async fn concurrent_transfers_never_overdraw() {
        // Alice holds 1000; 25 transfers of 70 => at most 14 can succeed.
        let coordinator = Arc::new(seeded(CoordinatorConfig::default()).await);

        let mut tasks = Vec::new();
        for _ in 0..25 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                coordinator.transfer(&transfer("Alice", "Bob", dec!(70))).await
            }));
        }

        let mut succeeded = 0u32;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientFunds { .. }) => {}
                Err(other) => panic!("unexpected failure: {other:?}"),
            }
        }

        assert_eq!(succeeded, 14);
        let alice = balance(&coordinator, "Alice").await;
        let bob = balance(&coordinator, "Bob").await;
        assert_eq!(alice, dec!(1000) - dec!(70) * Decimal::from(succeeded));
        assert!(alice >= Decimal::ZERO);
        assert_eq!(alice + bob, dec!(1500));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn crossing_transfers_conserve_the_total() {
        let coordinator = Arc::new(seeded(CoordinatorConfig::default()).await);

        let mut tasks = Vec::new();
        for i in 0..100 {
            let coordinator = coordinator.clone();
            tasks.push(tokio::spawn(async move {
                let t = if i % 2 == 0 {
                    transfer("Alice", "Bob", dec!(7))
                } else {
                    transfer("Bob", "Alice", dec!(3))
                };
                coordinator.transfer(&t).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let alice = balance(&coordinator, "Alice").await;
        let bob = balance(&coordinator, "Bob").await;
        assert_eq!(alice, dec!(1000) - dec!(7) * dec!(50) + dec!(3) * dec!(50));
        assert_eq!(alice + bob, dec!(1500));
    }

    #[tokio::test]
    async fn held_lock_times_out() {
        let config = CoordinatorConfig {
            lock_timeout: Duration::from_millis(20),
            ..CoordinatorConfig::default()
        };
        let coordinator = seeded(config).await;

        let bob = name("Bob");
        let _held = coordinator
            .locks()
            .acquire(&[&bob], Duration::from_millis(20))
            .await
            .unwrap();

        let err = coordinator
            .transfer(&transfer("Alice", "Bob", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert_eq!(balance(&coordinator, "Alice").await, dec!(1000));
    }

    /// Bumps every record's version right before the first `times` commits,
    /// as a reseed or a foreign writer would.
    struct Interfering {
        inner: InMemoryAccountStore,
        remaining: std::sync::atomic::AtomicU32,
        interfered: AtomicBool,
    }

    impl Interfering {
        async fn new(times: u32) -> Self {
            let inner = InMemoryAccountStore::new();
            inner.seed(sample_accounts()).await.unwrap();
            Self {
                inner,
                remaining: std::sync::atomic::AtomicU32::new(times),
                interfered: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl AccountStore for Interfering {
        async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError> {
            self.inner.find(name).await
        }

        async fn list(&self) -> Result<Vec<Account>, AccountStoreError> {
            self.inner.list().await
        }

        async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError> {
            let pending = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if pending {
                self.interfered.store(true, Ordering::SeqCst);
                for account in self.inner.list().await? {
                    self.inner.save(AccountWrite::unconditional(account)).await?;
                }
            }
            self.inner.commit(writes).await
        }

        async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError> {
            self.inner.seed(accounts).await
        }
    }

    #[tokio::test]
    async fn stale_reads_are_retried() {
        let coordinator = TransferCoordinator::new(Interfering::new(2).await, CoordinatorConfig::default());

        let receipt = coordinator.transfer(&transfer("Alice", "Bob", dec!(100))).await.unwrap();
        assert!(coordinator.store().interfered.load(Ordering::SeqCst));
        assert_eq!(receipt.sender_balance, dec!(900));

        let alice = coordinator.store().find(&name("Alice")).await.unwrap().unwrap();
        assert_eq!(alice.balance(), dec!(900));
        assert!(alice.version() > 2);
    }

    #[tokio::test]
    async fn persistent_conflicts_give_up() {
        let config = CoordinatorConfig {
            max_retries: 1,
            ..CoordinatorConfig::default()
        };
        let coordinator = TransferCoordinator::new(Interfering::new(5).await, config);

        let err = coordinator
            .transfer(&transfer("Alice", "Bob", dec!(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        let alice = coordinator.store().find(&name("Alice")).await.unwrap().unwrap();
        let bob = coordinator.store().find(&name("Bob")).await.unwrap().unwrap();
        assert_eq!(alice.balance(), dec!(1000));
        assert_eq!(bob.balance(), dec!(500));
    }

    /// Delays reads and/or commits, as a slow or stalled backend would.
    struct Slow {
        inner: InMemoryAccountStore,
        find_delay: Duration,
        commit_delay: Duration,
    }

    impl Slow {
        async fn new(find_delay: Duration, commit_delay: Duration) -> Self {
            let inner = InMemoryAccountStore::new();
            inner.seed(sample_accounts()).await.unwrap();
            Self {
                inner,
                find_delay,
                commit_delay,
            }
        }

        async fn balances(&self) -> (Decimal, Decimal) {
            let alice = self.inner.find(&name("Alice")).await.unwrap().unwrap();
            let bob = self.inner.find(&name("Bob")).await.unwrap().unwrap();
            (alice.balance(), bob.balance())
        }
    }

    #[async_trait]
    impl AccountStore for Slow {
        async fn find(&self, name: &AccountName) -> Result<Option<Account>, AccountStoreError> {
            tokio::time::sleep(self.find_delay).await;
            self.inner.find(name).await
        }

        async fn list(&self) -> Result<Vec<Account>, AccountStoreError> {
            self.inner.list().await
        }

        async fn commit(&self, writes: Vec<AccountWrite>) -> Result<Vec<Account>, AccountStoreError> {
            tokio::time::sleep(self.commit_delay).await;
            self.inner.commit(writes).await
        }

        async fn seed(&self, accounts: Vec<Account>) -> Result<Vec<Account>, AccountStoreError> {
            self.inner.seed(accounts).await
        }
    }

    fn short_operation_timeout() -> CoordinatorConfig {
        CoordinatorConfig {
            operation_timeout: Duration::from_millis(50),
            ..CoordinatorConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_reads_time_out_without_writing() {
        let store = Slow::new(Duration::from_secs(10), Duration::ZERO).await;
        let coordinator = TransferCoordinator::new(store, short_operation_timeout());

        let err = coordinator
            .transfer(&transfer("Alice", "Bob", dec!(100)))
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Timeout(_)));
        assert_eq!(coordinator.store().balances().await, (dec!(1000), dec!(500)));
        assert_eq!(coordinator.locks().tracked(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_commit_is_awaited_and_reported() {
        // A commit outliving the read budget must not be reported as a timeout:
        // it lands, and the caller is told so.
        let store = Slow::new(Duration::ZERO, Duration::from_secs(10)).await;
        let coordinator = TransferCoordinator::new(store, short_operation_timeout());

        let receipt = coordinator
            .transfer(&transfer("Alice", "Bob", dec!(100)))
            .await
            .unwrap();

        assert_eq!(receipt.sender_balance, dec!(900));
        assert_eq!(coordinator.store().balances().await, (dec!(900), dec!(600)));
        assert_eq!(coordinator.locks().tracked(), 0);
    }
}
