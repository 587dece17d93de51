//! Infrastructure layer: account storage, locking, transfer orchestration, config.

pub mod account_store;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod error;
pub mod locks;

pub use account_store::{AccountStore, AccountStoreError, AccountWrite, InMemoryAccountStore};
#[cfg(feature = "postgres")]
pub use account_store::PostgresAccountStore;
pub use config::CoordinatorConfig;
pub use coordinator::{TransferCoordinator, TransferReceipt};
pub use directory::AccountDirectory;
pub use error::LedgerError;
pub use locks::{AccountLocks, LockSet, LockTimeout};
