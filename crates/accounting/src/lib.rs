//! Accounting module (named accounts, two-party transfers, sample data).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod seed;
pub mod transfer;

pub use account::Account;
pub use seed::{sample_accounts, validate_seed};
pub use transfer::{plan_transfer, Transfer, TransferPlan};
