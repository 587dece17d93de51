//! Account persistence boundary.
//!
//! The coordinator never performs an unguarded read-then-write against a
//! store: every write goes through [`AccountStore::commit`], which applies a
//! batch atomically and only if each record is still at the version it was
//! read at.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryAccountStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresAccountStore;
pub use r#trait::{AccountStore, AccountStoreError, AccountWrite};
