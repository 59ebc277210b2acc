mod payments;
mod redeem;

pub use payments::*;
pub use redeem::*;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/redeem", post(redeem_key))
        .route("/payments", post(create_payment))
        .route("/payments/{id}/complete", post(complete_payment))
        .route("/payments/{id}/fail", post(fail_payment))
}
