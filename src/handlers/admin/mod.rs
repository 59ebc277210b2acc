mod keys;
mod sales_points;
mod stats;
mod users;

pub use keys::*;
pub use sales_points::*;
pub use stats::*;
pub use users::*;

use axum::{
    Router,
    routing::{get, post},
};

use crate::db::AppState;

/// Back-office routes. Callers are trusted; access control sits in front
/// of this service.
pub fn router() -> Router<AppState> {
    Router::new()
        // Sales points
        .route("/sales-points", post(create_sales_point).get(list_sales_points))
        .route(
            "/sales-points/{id}",
            get(get_sales_point)
                .put(update_sales_point)
                .delete(delete_sales_point),
        )
        // Ledger
        .route("/keys", get(list_keys))
        .route("/keys/batch", post(create_batch))
        .route("/keys/export.csv", get(export_keys))
        .route("/keys/{id}", get(get_key))
        .route("/keys/{id}/revoke", post(revoke_key))
        // Reporting
        .route("/stats/dashboard", get(dashboard_stats))
        .route("/stats/sales-points", get(sales_point_stats))
        .route("/stats/revenue", get(revenue_summary))
        .route("/users/real", get(list_real_users))
        .route("/users/real/stats", get(real_user_stats))
        .route("/users/real/export.csv", get(export_real_users))
}
