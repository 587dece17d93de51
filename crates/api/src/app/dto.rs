use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};

use coffer_accounting::{Account, Transfer};
use coffer_core::{AccountName, Amount, DomainError};
use coffer_infra::TransferReceipt;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /transfer`.
///
/// Every field is optional at the serde level so that a missing field is
/// reported as `invalid_input` by [`TransferRequest::into_transfer`] rather
/// than as an extractor rejection. `amount` is kept as the raw JSON text so
/// strings and booleans can be told apart from numbers, and so numbers are
/// read from the digits the client sent rather than from an `f64`.
#[derive(Debug, Default, Deserialize)]
pub struct TransferRequest {
    #[serde(rename = "fromAccount")]
    pub from_account: Option<String>,
    #[serde(rename = "toAccount")]
    pub to_account: Option<String>,
    pub amount: Option<Box<RawValue>>,
}

impl TransferRequest {
    /// Validate shape and build the domain command. Errors are user-facing messages.
    pub fn into_transfer(self) -> Result<Transfer, String> {
        let from = required_name(self.from_account, "fromAccount")?;
        let to = required_name(self.to_account, "toAccount")?;
        let amount = match self.amount {
            None => return Err("amount is required".to_string()),
            Some(raw) => parse_amount(raw.get())?,
        };
        Transfer::new(from, to, amount).map_err(|e| match e {
            DomainError::Validation(msg) => msg,
            other => other.to_string(),
        })
    }
}

fn required_name(value: Option<String>, field: &str) -> Result<AccountName, String> {
    let value = value.ok_or_else(|| format!("{field} is required"))?;
    AccountName::parse(value).map_err(|_| format!("{field} must be a non-empty string"))
}

/// Accept JSON numbers only, converted exactly from their literal digits.
///
/// Anything `Decimal` cannot hold without rounding is rejected.
fn parse_amount(raw: &str) -> Result<Amount, String> {
    let text = raw.trim();
    if text.is_empty() || text == "null" {
        return Err("amount is required".to_string());
    }
    if !text.starts_with(|c: char| c == '-' || c.is_ascii_digit()) {
        return Err("amount must be a number".to_string());
    }
    let value = exact_decimal(text)
        .ok_or_else(|| format!("amount {text} cannot be represented exactly"))?;
    Amount::new(value).map_err(|_| "amount must be greater than zero".to_string())
}

/// `Decimal` holds at most 28 significant digits, so a larger power of ten can never fit.
const MAX_EXPONENT: i32 = 28;

/// Parse a JSON number literal into a `Decimal` without losing digits.
fn exact_decimal(text: &str) -> Option<Decimal> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => (&text[..at], text[at + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let mut value = Decimal::from_str_exact(mantissa).ok()?;
    if exponent < 0 {
        let scale = value.scale().checked_add(exponent.unsigned_abs())?;
        value.set_scale(scale).ok()?;
    } else if exponent > 0 {
        if exponent > MAX_EXPONENT {
            return None;
        }
        for _ in 0..exponent {
            value = value.checked_mul(Decimal::TEN)?;
        }
    }
    Some(value)
}

// -------------------------
// Response mapping
// -------------------------

/// Balances go out as JSON numbers: integers when whole, floats otherwise.
pub fn decimal_to_json(value: Decimal) -> Value {
    let value = value.normalize();
    if value.scale() == 0 {
        if let Some(i) = value.to_i64() {
            return json!(i);
        }
    }
    value.to_f64().map_or_else(|| json!(value.to_string()), |f| json!(f))
}

pub fn account_to_json(account: &Account) -> Value {
    json!({
        "name": account.name().as_str(),
        "balance": decimal_to_json(account.balance()),
    })
}

pub fn receipt_to_json(receipt: &TransferReceipt) -> Value {
    json!({
        "message": format!(
            "Transfer successful! ₹{} transferred from {} to {}.",
            receipt.amount, receipt.from, receipt.to
        ),
        "senderBalance": decimal_to_json(receipt.sender_balance),
        "receiverBalance": decimal_to_json(receipt.receiver_balance),
    })
}
