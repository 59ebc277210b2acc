use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::Redemption;
use crate::redemption;

#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Code as typed by the user; surrounding whitespace and case are ignored.
    pub code: String,
    pub account_id: String,
}

/// POST /redeem
pub async fn redeem_key(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<Redemption>> {
    let mut conn = state.db.get()?;
    let redemption =
        redemption::redeem_activation_key(&mut conn, &request.code, &request.account_id)?;
    Ok(Json(redemption))
}
