use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use coffer_accounting::sample_accounts;
use coffer_core::AccountName;

use crate::app::{dto, errors, services::AppServices};

/// Replace every account with the sample set.
pub async fn create_sample(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.accounts.seed(sample_accounts()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Sample accounts created successfully!" })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.accounts.list().await {
        Ok(accounts) => {
            let body: Vec<_> = accounts.iter().map(dto::account_to_json).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
) -> axum::response::Response {
    let name = match AccountName::parse(name) {
        Ok(name) => name,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.to_string()),
    };

    match services.accounts.find(&name).await {
        Ok(account) => (StatusCode::OK, Json(dto::account_to_json(&account))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
