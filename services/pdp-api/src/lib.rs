//! PCDS data portal service library.
//!
//! Routes filtered station selections to the aggregate zip download and the
//! selection count endpoints.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod responders;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Build the service router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Aggregate download
        .route("/agg", get(handlers::agg::agg_handler))
        .route("/agg/", get(handlers::agg::agg_handler))
        // Selection estimates
        .route(
            "/count_stations",
            get(handlers::counts::count_stations_handler),
        )
        .route(
            "/record_length",
            get(handlers::counts::record_length_handler),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/ready", get(handlers::health::ready_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
