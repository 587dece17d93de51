use axum::{
    routing::{get, post},
    Router,
};

pub mod accounts;
pub mod system;
pub mod transfers;

/// Router for the ledger endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/create-sample", get(accounts::create_sample))
        .route("/accounts", get(accounts::list))
        .route("/accounts/:name", get(accounts::get))
        .route("/transfer", post(transfers::transfer))
}
