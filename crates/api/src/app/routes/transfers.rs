use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::app::{dto, errors, services::AppServices};

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let transfer = match request.into_transfer() {
        Ok(t) => t,
        Err(msg) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", msg),
    };

    match services.transfers.transfer(&transfer).await {
        Ok(receipt) => (StatusCode::OK, Json(dto::receipt_to_json(&receipt))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
