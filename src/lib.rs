//! Keysmith - activation keys for subscriptions sold through resale channels
//!
//! This library covers key generation and batch issuance for sales points,
//! single-use redemption against subscriber accounts, online payments that
//! mint their own keys, and revenue attribution across both channels.

pub mod codes;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod export;
pub mod extractors;
pub mod handlers;
pub mod id;
pub mod issuance;
pub mod models;
pub mod pagination;
pub mod payments;
pub mod pricing;
pub mod redemption;
pub mod revenue;

use axum::Router;
use tower_http::trace::TraceLayer;

/// The full HTTP application with request tracing applied.
pub fn app(state: db::AppState) -> Router {
    handlers::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
