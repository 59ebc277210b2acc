use axum::extract::State;
use serde::Deserialize;

use crate::config::{AnalyticsMode, AnalyticsScope, parse_id_list};
use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::extractors::{Json, Query};
use crate::models::{DashboardStats, RevenueSummary, SalesPointStats};
use crate::pricing::PricingPolicy;
use crate::revenue;

/// Per-request overrides of the server's analytics scope and pricing policy.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub mode: Option<AnalyticsMode>,
    /// Comma-separated sales point ids for production mode.
    pub production_sales_points: Option<String>,
    /// `actual` or `estimated`.
    pub pricing: Option<String>,
    /// Unix seconds; revenue before this is ignored.
    pub since: Option<i64>,
}

/// The server's default scope with any request overrides applied.
pub(super) fn scope_with_overrides(
    state: &AppState,
    mode: Option<AnalyticsMode>,
    production_sales_points: Option<&str>,
) -> AnalyticsScope {
    let mut scope = state.analytics.clone();
    if let Some(mode) = mode {
        scope.mode = mode;
    }
    if let Some(ids) = production_sales_points {
        scope.production_sales_points = parse_id_list(ids);
    }
    scope
}

impl AnalyticsQuery {
    pub fn scope(&self, state: &AppState) -> AnalyticsScope {
        scope_with_overrides(state, self.mode, self.production_sales_points.as_deref())
    }

    pub fn pricing(&self, state: &AppState) -> Result<PricingPolicy> {
        match self.pricing {
            Some(ref raw) => raw.parse().map_err(AppError::Validation),
            None => Ok(state.pricing.clone()),
        }
    }
}

/// GET /stats/dashboard
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<DashboardStats>> {
    let pricing = query.pricing(&state)?;
    let conn = state.db.get()?;
    Ok(Json(revenue::fetch_dashboard_stats(
        &conn,
        &query.scope(&state),
        &pricing,
    )?))
}

/// GET /stats/sales-points
pub async fn sales_point_stats(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Vec<SalesPointStats>>> {
    let pricing = query.pricing(&state)?;
    let conn = state.db.get()?;
    Ok(Json(revenue::fetch_sales_point_stats(
        &conn,
        &query.scope(&state),
        &pricing,
    )?))
}

/// GET /stats/revenue
pub async fn revenue_summary(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<RevenueSummary>> {
    let pricing = query.pricing(&state)?;
    let conn = state.db.get()?;
    Ok(Json(revenue::fetch_revenue_summary(
        &conn,
        &query.scope(&state),
        &pricing,
        query.since,
    )?))
}
