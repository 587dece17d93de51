//! Errors surfaced by ledger operations (transfer, list, find, seed).

use rust_decimal::Decimal;
use thiserror::Error;

use coffer_core::DomainError;

use crate::account_store::AccountStoreError;
use crate::locks::LockTimeout;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing or malformed input (deterministic).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A named account does not exist.
    #[error("account not found: {0}")]
    NotFound(String),
    /// The sender cannot cover the amount.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds { available: Decimal, requested: Decimal },
    /// Version conflicts persisted through every retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A lock wait, account read or store commit exceeded its time bound.
    ///
    /// Nothing was written: timeouts are only raised before the commit is
    /// issued or by a store that rolled the commit back.
    #[error("timed out: {0}")]
    Timeout(String),
    /// A domain invariant broke; indicates a bug rather than bad input.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(AccountStoreError),
}

impl LedgerError {
    /// Whether retrying the whole request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Conflict(_) | LedgerError::Timeout(_))
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::InvalidInput(msg),
            DomainError::InsufficientFunds {
                available,
                requested,
            } => LedgerError::InsufficientFunds {
                available,
                requested,
            },
            DomainError::InvariantViolation(msg) => LedgerError::InvariantViolation(msg),
        }
    }
}

impl From<AccountStoreError> for LedgerError {
    fn from(value: AccountStoreError) -> Self {
        match &value {
            // Both mean "someone wrote between our read and our commit".
            AccountStoreError::VersionMismatch { .. } | AccountStoreError::MissingAccount(_) => {
                LedgerError::Conflict(value.to_string())
            }
            AccountStoreError::Timeout(msg) => LedgerError::Timeout(msg.clone()),
            _ => LedgerError::Store(value),
        }
    }
}

impl From<LockTimeout> for LedgerError {
    fn from(value: LockTimeout) -> Self {
        LedgerError::Timeout(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::{AccountName, ExpectedVersion};
    use std::time::Duration;

    #[test]
    fn version_mismatch_becomes_conflict() {
        let err: LedgerError = AccountStoreError::VersionMismatch {
            name: AccountName::parse("Alice").unwrap(),
            expected: ExpectedVersion::Exact(1),
            actual: 2,
        }
        .into();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn backend_failure_stays_a_store_error() {
        let err: LedgerError = AccountStoreError::Backend("down".to_string()).into();
        assert!(matches!(err, LedgerError::Store(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_timeout_becomes_timeout() {
        let err: LedgerError = AccountStoreError::Timeout("canceling statement".to_string()).into();
        assert!(matches!(err, LedgerError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn lock_timeout_becomes_timeout() {
        let err: LedgerError = LockTimeout {
            name: AccountName::parse("Bob").unwrap(),
            waited: Duration::from_millis(5),
        }
        .into();
        assert!(matches!(err, LedgerError::Timeout(msg) if msg.contains("Bob")));
    }

    #[test]
    fn validation_becomes_invalid_input() {
        let err: LedgerError = DomainError::validation("amount must be positive").into();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }
}
