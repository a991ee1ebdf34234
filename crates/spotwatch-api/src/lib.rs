//! spotwatch-api — REST API for spotwatch.
//!
//! Provides axum route handlers over the query boundary ([`SpotService`]).
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/spot-pricing` | Enriched observations (`?steals_only=true` to filter) |
//! | POST | `/api/regenerate` | Run one ingestion cycle now |
//! | GET | `/api/catalog/:instance_type` | Capability record for an instance type |
//! | GET | `/healthz` | Liveness |
//! | GET | `/metrics` | Prometheus exposition |
//!
//! A store outage is `503` with `success: false`; an empty store is `200`
//! with an empty list.

pub mod handlers;
pub mod prometheus;
pub mod service;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

pub use service::{QueryError, RegenerationReport, SpotService};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<SpotService>,
}

/// Build the complete API router.
pub fn build_router(service: Arc<SpotService>) -> Router {
    let api_state = ApiState { service };

    let api_routes = Router::new()
        .route("/spot-pricing", get(handlers::spot_pricing))
        .route("/regenerate", post(handlers::regenerate))
        .route("/catalog/{instance_type}", get(handlers::catalog_lookup))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api", api_routes)
        .route("/healthz", get(handlers::healthz).with_state(api_state.clone()))
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
}
