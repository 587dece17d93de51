use rust_decimal::Decimal;

use coffer_core::{AccountName, Amount, DomainError, DomainResult, Entity};

/// A named balance holder.
///
/// `balance` is never negative: the only constructors and mutators below
/// refuse to produce such a value. `version` is assigned by the store on
/// every write and is carried through unchanged by `debit`/`credit` so the
/// store can detect stale writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    name: AccountName,
    balance: Decimal,
    version: u64,
}

impl Account {
    /// A fresh, never-persisted account.
    pub fn new(name: AccountName, balance: Decimal) -> DomainResult<Self> {
        if balance < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "balance of '{name}' must not be negative"
            )));
        }
        Ok(Self {
            name,
            balance,
            version: 0,
        })
    }

    /// Rebuild an account from persisted state.
    pub fn restore(name: AccountName, balance: Decimal, version: u64) -> DomainResult<Self> {
        let mut account = Self::new(name, balance)?;
        account.version = version;
        Ok(account)
    }

    pub fn name(&self) -> &AccountName {
        &self.name
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Copy of this account stamped with a store-assigned version.
    pub fn with_version(&self, version: u64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    pub fn debit(&self, amount: Amount) -> DomainResult<Self> {
        if self.balance < amount.value() {
            return Err(DomainError::InsufficientFunds {
                available: self.balance,
                requested: amount.value(),
            });
        }
        Ok(Self {
            balance: self.balance - amount.value(),
            ..self.clone()
        })
    }

    pub fn credit(&self, amount: Amount) -> DomainResult<Self> {
        let balance = self
            .balance
            .checked_add(amount.value())
            .ok_or_else(|| DomainError::invariant(format!("balance of '{}' overflows", self.name)))?;
        Ok(Self {
            balance,
            ..self.clone()
        })
    }
}

impl Entity for Account {
    type Id = AccountName;

    fn id(&self) -> &Self::Id {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }
}
