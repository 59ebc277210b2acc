use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::export;
use crate::extractors::{Json, Path, Query};
use crate::id::is_valid_prefixed_id;
use crate::issuance;
use crate::models::{ActivationKey, ActivationKeyFilters, BatchParams, IssuedBatch, KeyStatus};
use crate::pagination::{Paginated, PaginationQuery};
use crate::redemption;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(flatten)]
    pub params: BatchParams,
    /// Free-form operator label recorded on every key.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// POST /keys/batch
pub async fn create_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<(StatusCode, Json<IssuedBatch>)> {
    let mut conn = state.db.get()?;
    let batch =
        issuance::generate_batch_codes(&mut conn, &request.params, request.created_by.as_deref())?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Listing query. Kept flat because URL-encoded queries cannot carry
/// flattened numeric fields.
#[derive(Debug, Default, Deserialize)]
pub struct ListKeysQuery {
    pub year: Option<i32>,
    pub faculty: Option<String>,
    pub sales_point_id: Option<String>,
    pub status: Option<KeyStatus>,
    pub batch_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListKeysQuery {
    fn filters(&self) -> ActivationKeyFilters {
        ActivationKeyFilters {
            year: self.year,
            faculty: self.faculty.clone(),
            sales_point_id: self.sales_point_id.clone(),
            status: self.status,
            batch_id: self.batch_id.clone(),
            search: self.search.clone(),
        }
    }

    fn pagination(&self) -> PaginationQuery {
        PaginationQuery {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// GET /keys
pub async fn list_keys(
    State(state): State<AppState>,
    Query(query): Query<ListKeysQuery>,
) -> Result<Json<Paginated<ActivationKey>>> {
    let conn = state.db.get()?;
    let page = query.pagination();
    let (limit, offset) = (page.limit(), page.offset());
    let (keys, total) =
        queries::list_activation_keys_paginated(&conn, &query.filters(), limit, offset)?;
    Ok(Json(Paginated::new(keys, total, limit, offset)))
}

/// GET /keys/export.csv
pub async fn export_keys(
    State(state): State<AppState>,
    Query(query): Query<ListKeysQuery>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let keys = queries::list_activation_keys(&conn, &query.filters())?;
    Ok(csv_response("activation-keys.csv", export::keys_to_csv(&keys)))
}

/// GET /keys/{id}
pub async fn get_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivationKey>> {
    if !is_valid_prefixed_id(&id) {
        return Err(AppError::NotFound(msg::KEY_NOT_FOUND.into()));
    }
    let conn = state.db.get()?;
    let key = queries::get_activation_key_by_id(&conn, &id)?.or_not_found(msg::KEY_NOT_FOUND)?;
    Ok(Json(key))
}

/// POST /keys/{id}/revoke
pub async fn revoke_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ActivationKey>> {
    if !is_valid_prefixed_id(&id) {
        return Err(AppError::NotFound(msg::KEY_NOT_FOUND.into()));
    }
    let conn = state.db.get()?;
    Ok(Json(redemption::revoke_activation_key(&conn, &id)?))
}

pub(super) fn csv_response(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}
