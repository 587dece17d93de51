use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use coffer_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
        LedgerError::NotFound(name) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Account not found: {name}"),
        ),
        e @ LedgerError::InsufficientFunds { .. } => {
            json_error(StatusCode::BAD_REQUEST, "insufficient_funds", e.to_string())
        }
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::Timeout(msg) => json_error(StatusCode::SERVICE_UNAVAILABLE, "timeout", msg),
        // Internal detail stays in the logs.
        LedgerError::InvariantViolation(msg) => {
            tracing::error!(%msg, "ledger invariant violated");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "invariant_violation",
                "internal ledger error",
            )
        }
        LedgerError::Store(e) => {
            tracing::error!(error = %e, "account store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                "account store unavailable",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Request bodies that are not JSON objects are treated as invalid input (400).
pub fn json_rejection_to_response(
    rejection: axum::extract::rejection::JsonRejection,
) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_input", rejection.body_text())
}
