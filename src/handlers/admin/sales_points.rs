use axum::extract::State;
use axum::http::StatusCode;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{CreateSalesPoint, SalesPoint, UpdateSalesPoint};

pub async fn create_sales_point(
    State(state): State<AppState>,
    Json(input): Json<CreateSalesPoint>,
) -> Result<(StatusCode, Json<SalesPoint>)> {
    let conn = state.db.get()?;
    let sales_point = queries::create_sales_point(&conn, &input, None)?;
    tracing::info!(sales_point_id = %sales_point.id, code = %sales_point.code, "Sales point created");
    Ok((StatusCode::CREATED, Json(sales_point)))
}

pub async fn list_sales_points(State(state): State<AppState>) -> Result<Json<Vec<SalesPoint>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_sales_points(&conn)?))
}

pub async fn get_sales_point(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SalesPoint>> {
    let conn = state.db.get()?;
    let sales_point =
        queries::get_sales_point_by_id(&conn, &id)?.or_not_found(msg::SALES_POINT_NOT_FOUND)?;
    Ok(Json(sales_point))
}

pub async fn update_sales_point(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateSalesPoint>,
) -> Result<Json<SalesPoint>> {
    let conn = state.db.get()?;
    let sales_point =
        queries::update_sales_point(&conn, &id, &input)?.or_not_found(msg::SALES_POINT_NOT_FOUND)?;
    Ok(Json(sales_point))
}

pub async fn delete_sales_point(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_sales_point(&conn, &id)? {
        return Err(crate::error::AppError::NotFound(msg::SALES_POINT_NOT_FOUND.into()));
    }
    tracing::info!(sales_point_id = %id, "Sales point deleted");
    Ok(StatusCode::NO_CONTENT)
}
