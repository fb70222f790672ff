//! # duett-observability
//!
//! Observability-Crate fuer Duett:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check-Endpunkt (`/health`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthState, HealthStatus};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, SignalingMetrics};
pub use middleware::{request_timing_layer, timing_middleware};

use axum::Router;

/// Router mit `GET /metrics` und `GET /health`
///
/// Wird vom Server in den Haupt-Router gemerged, damit Metriken und
/// Health-Check ohne Authentifizierung erreichbar sind.
pub fn observability_router(metriken: SignalingMetrics, metriken_aktiv: bool) -> Router {
    let health = health_router(HealthState::neu(metriken.clone()));
    if metriken_aktiv {
        health.merge(metrics_router(metriken))
    } else {
        health
    }
}
