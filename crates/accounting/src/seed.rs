use std::collections::HashSet;

use rust_decimal::Decimal;

use coffer_core::{AccountName, DomainError, DomainResult};

use crate::account::Account;

/// The demo ledger installed by `GET /create-sample`.
pub fn sample_accounts() -> Vec<Account> {
    [("Alice", 1000), ("Bob", 500)]
        .into_iter()
        .filter_map(|(name, balance)| {
            let name = AccountName::parse(name).ok()?;
            Account::new(name, Decimal::from(balance)).ok()
        })
        .collect()
}

/// Reject seed sets that would break the unique-name invariant.
pub fn validate_seed(accounts: &[Account]) -> DomainResult<()> {
    let mut seen = HashSet::with_capacity(accounts.len());
    for account in accounts {
        if !seen.insert(account.name()) {
            return Err(DomainError::validation(format!(
                "duplicate account name in seed: '{}'",
                account.name()
            )));
        }
    }
    Ok(())
}
