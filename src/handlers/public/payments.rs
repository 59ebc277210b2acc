use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::models::{CreateOnlinePayment, OnlinePayment, PaymentStatus};
use crate::payments::{self, CompletedPayment};

/// POST /payments
pub async fn create_payment(
    State(state): State<AppState>,
    Json(input): Json<CreateOnlinePayment>,
) -> Result<(StatusCode, Json<OnlinePayment>)> {
    let conn = state.db.get()?;
    let payment = payments::create_online_payment(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

/// POST /payments/{id}/complete
///
/// Safe to repeat: a payment that is already paid returns its existing key.
pub async fn complete_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompletedPayment>> {
    let mut conn = state.db.get()?;
    Ok(Json(payments::complete_online_payment(&mut conn, &id)?))
}

#[derive(Debug, Deserialize)]
pub struct FailPaymentRequest {
    #[serde(default = "default_fail_status")]
    pub status: PaymentStatus,
}

fn default_fail_status() -> PaymentStatus {
    PaymentStatus::Failed
}

/// POST /payments/{id}/fail
pub async fn fail_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FailPaymentRequest>,
) -> Result<Json<OnlinePayment>> {
    let conn = state.db.get()?;
    Ok(Json(payments::fail_online_payment(&conn, &id, request.status)?))
}
