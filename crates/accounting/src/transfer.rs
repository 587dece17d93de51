use rust_decimal::Decimal;

use coffer_core::{AccountName, Amount, DomainError, DomainResult};

use crate::account::Account;

/// A validated request to move `amount` from `from` to `to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Amount,
}

impl Transfer {
    /// Self-transfers are rejected rather than treated as a no-op.
    pub fn new(from: AccountName, to: AccountName, amount: Amount) -> DomainResult<Self> {
        if from == to {
            return Err(DomainError::validation(
                "fromAccount and toAccount must name different accounts",
            ));
        }
        Ok(Self { from, to, amount })
    }
}

/// Post-transfer state of both participants, ready to be persisted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub sender: Account,
    pub receiver: Account,
}

impl TransferPlan {
    pub fn sender_balance(&self) -> Decimal {
        self.sender.balance()
    }

    pub fn receiver_balance(&self) -> Decimal {
        self.receiver.balance()
    }
}

/// Decide the outcome of `transfer` against the current `sender`/`receiver` state.
///
/// Pure: nothing is persisted here. The returned accounts carry the versions
/// they were read at, so the caller can make the write conditional on them.
pub fn plan_transfer(
    transfer: &Transfer,
    sender: &Account,
    receiver: &Account,
) -> DomainResult<TransferPlan> {
    if sender.name() != &transfer.from || receiver.name() != &transfer.to {
        return Err(DomainError::invariant("accounts do not match the transfer"));
    }

    let debited = sender.debit(transfer.amount)?;
    let credited = receiver.credit(transfer.amount)?;

    let before = sender.balance().checked_add(receiver.balance());
    let after = debited.balance().checked_add(credited.balance());
    match (before, after) {
        (Some(before), Some(after)) if before == after => {}
        (Some(_), Some(_)) => {
            return Err(DomainError::invariant("transfer must conserve the combined balance"));
        }
        _ => {
            return Err(DomainError::invariant(format!(
                "combined balance of '{}' and '{}' overflows",
                sender.name(),
                receiver.name()
            )));
        }
    }

    Ok(TransferPlan {
        sender: debited,
        receiver: credited,
    })
}
