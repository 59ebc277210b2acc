use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::config::{AnalyticsMode, AnalyticsScope};
use crate::db::AppState;
use crate::error::Result;
use crate::export;
use crate::extractors::{Json, Query};
use crate::models::{ChannelSource, RealUser, RealUserFilters, RealUserStats, SubscriptionState};
use crate::revenue;

use super::keys::csv_response;
use super::stats::scope_with_overrides;

#[derive(Debug, Default, Deserialize)]
pub struct RealUsersQuery {
    pub sales_point_id: Option<String>,
    pub status: Option<SubscriptionState>,
    pub source: Option<ChannelSource>,
    pub search: Option<String>,
    pub mode: Option<AnalyticsMode>,
    pub production_sales_points: Option<String>,
}

impl RealUsersQuery {
    fn filters(&self) -> RealUserFilters {
        RealUserFilters {
            sales_point_id: self.sales_point_id.clone(),
            status: self.status,
            source: self.source,
            search: self.search.clone(),
        }
    }

    fn scope(&self, state: &AppState) -> AnalyticsScope {
        scope_with_overrides(state, self.mode, self.production_sales_points.as_deref())
    }
}

/// GET /users/real
pub async fn list_real_users(
    State(state): State<AppState>,
    Query(query): Query<RealUsersQuery>,
) -> Result<Json<Vec<RealUser>>> {
    let conn = state.db.get()?;
    Ok(Json(revenue::fetch_real_users(
        &conn,
        &query.scope(&state),
        &query.filters(),
    )?))
}

/// GET /users/real/stats
pub async fn real_user_stats(
    State(state): State<AppState>,
    Query(query): Query<RealUsersQuery>,
) -> Result<Json<RealUserStats>> {
    let conn = state.db.get()?;
    Ok(Json(revenue::fetch_real_user_stats(&conn, &query.scope(&state))?))
}

/// GET /users/real/export.csv
pub async fn export_real_users(
    State(state): State<AppState>,
    Query(query): Query<RealUsersQuery>,
) -> Result<impl IntoResponse> {
    let conn = state.db.get()?;
    let users = revenue::fetch_real_users(&conn, &query.scope(&state), &query.filters())?;
    Ok(csv_response("real-users.csv", export::real_users_to_csv(&users)))
}
