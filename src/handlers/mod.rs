pub mod admin;
pub mod public;

use axum::Router;

use crate::db::AppState;

/// Every route the service exposes, without state or layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(public::router())
        .merge(admin::router())
}
