//! REST API handlers.
//!
//! Each handler calls into `SpotService` and returns JSON responses.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

use spotwatch_analytics::EnrichmentSummary;

use crate::ApiState;
use crate::prometheus::render_prometheus;
use crate::service::QueryError;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn query_error_response(e: &QueryError) -> axum::response::Response {
    error!(error = %e, "query failed");
    match e {
        QueryError::StoreUnavailable(_) => {
            error_response(&e.to_string(), StatusCode::SERVICE_UNAVAILABLE).into_response()
        }
        QueryError::CorruptData(_) => {
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

// ── Spot pricing ───────────────────────────────────────────────

#[derive(Debug, Default, serde::Deserialize)]
pub struct SpotPricingQuery {
    /// Only return observations flagged as steals.
    #[serde(default)]
    pub steals_only: bool,
}

/// GET /api/spot-pricing
pub async fn spot_pricing(
    State(state): State<ApiState>,
    Query(query): Query<SpotPricingQuery>,
) -> impl IntoResponse {
    match state.service.enriched_prices() {
        Ok(mut enriched) => {
            if query.steals_only {
                enriched.retain(|e| e.is_steal);
            }
            ApiResponse::ok(enriched).into_response()
        }
        Err(e) => query_error_response(&e),
    }
}

/// POST /api/regenerate
pub async fn regenerate(State(state): State<ApiState>) -> impl IntoResponse {
    match state.service.trigger_regeneration().await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => query_error_response(&e),
    }
}

// ── Catalog ────────────────────────────────────────────────────

/// GET /api/catalog/:instance_type
pub async fn catalog_lookup(
    State(state): State<ApiState>,
    Path(instance_type): Path<String>,
) -> impl IntoResponse {
    match state.service.catalog_lookup(&instance_type) {
        Some(record) => ApiResponse::ok(record).into_response(),
        None => error_response("instance type not in catalog", StatusCode::NOT_FOUND)
            .into_response(),
    }
}

// ── Health / Prometheus ────────────────────────────────────────

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(serde_json::json!({
        "status": "ok",
        "catalog_records": state.service.catalog_size(),
    }))
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.service.enriched_prices() {
        Ok(enriched) => {
            let summary = EnrichmentSummary::from_enriched(&enriched);
            let body = render_prometheus(&summary, state.service.grouping_label());
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
                .into_response()
        }
        Err(e) => query_error_response(&e),
    }
}
