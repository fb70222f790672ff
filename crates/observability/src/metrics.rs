//! Prometheus-kompatible Metriken fuer Duett
//!
//! Registrierte Metriken:
//! - `duett_connected_sessions` – Gauge: Aktuell aufgenommene Sessions
//! - `duett_active_rooms` – Gauge: Raeume mit mindestens einem Mitglied
//! - `duett_rejected_admissions_total` – Counter: Abgelehnte Aufnahmen (Raum voll)
//! - `duett_relayed_messages_total` – Counter: Weitergeleitete Nachrichten (type)
//! - `duett_dropped_messages_total` – Counter: Verworfene Nachrichten (reason)
//! - `duett_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `duett_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Duett-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Metrik-Handles.
#[derive(Clone)]
pub struct SignalingMetrics {
    pub registry: Arc<Registry>,

    // Signaling-Metriken
    pub connected_sessions: IntGauge,
    pub active_rooms: IntGauge,
    pub rejected_admissions_total: IntCounter,
    pub relayed_messages_total: IntCounterVec,
    pub dropped_messages_total: IntCounterVec,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl SignalingMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Signaling-Metriken ---
        let connected_sessions = IntGauge::with_opts(Opts::new(
            "duett_connected_sessions",
            "Anzahl aktuell aufgenommener Sessions",
        ))?;
        registry.register(Box::new(connected_sessions.clone()))?;

        let active_rooms = IntGauge::with_opts(Opts::new(
            "duett_active_rooms",
            "Anzahl Raeume mit mindestens einem Mitglied",
        ))?;
        registry.register(Box::new(active_rooms.clone()))?;

        let rejected_admissions_total = IntCounter::with_opts(Opts::new(
            "duett_rejected_admissions_total",
            "Abgelehnte Verbindungen wegen vollem Raum",
        ))?;
        registry.register(Box::new(rejected_admissions_total.clone()))?;

        let relayed_messages_total = IntCounterVec::new(
            Opts::new(
                "duett_relayed_messages_total",
                "An das andere Raum-Mitglied weitergeleitete Nachrichten",
            ),
            &["type"],
        )?;
        registry.register(Box::new(relayed_messages_total.clone()))?;

        let dropped_messages_total = IntCounterVec::new(
            Opts::new(
                "duett_dropped_messages_total",
                "Verworfene Nachrichten nach Grund",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(dropped_messages_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("duett_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "duett_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_sessions,
            active_rooms,
            rejected_admissions_total,
            relayed_messages_total,
            dropped_messages_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt eine weitergeleitete Nachricht (`offer`, `answer`, `ice`)
    pub fn weitergeleitet(&self, typ: &str) {
        self.relayed_messages_total.with_label_values(&[typ]).inc();
    }

    /// Zaehlt eine verworfene Nachricht (`sequence`, `no_peer`, `queue_full`)
    pub fn verworfen(&self, grund: &str) {
        self.dropped_messages_total.with_label_values(&[grund]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: SignalingMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<SignalingMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = SignalingMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn zwei_instanzen_kollidieren_nicht() {
        // Jede Instanz hat ihre eigene Registry
        let a = SignalingMetrics::neu().unwrap();
        let b = SignalingMetrics::neu().unwrap();
        a.connected_sessions.inc();
        assert_eq!(b.connected_sessions.get(), 0);
    }

    #[test]
    fn weitergeleitet_mit_labels() {
        let metriken = SignalingMetrics::neu().unwrap();
        metriken.weitergeleitet("offer");
        metriken.weitergeleitet("ice");
        metriken.weitergeleitet("ice");
        let ice = metriken
            .relayed_messages_total
            .with_label_values(&["ice"])
            .get();
        assert_eq!(ice, 2);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = SignalingMetrics::neu().unwrap();
        metriken.connected_sessions.set(2);
        metriken.rejected_admissions_total.inc();
        metriken.verworfen("sequence");

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("duett_connected_sessions 2"));
        assert!(output.contains("duett_rejected_admissions_total 1"));
        assert!(output.contains("reason=\"sequence\""));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }
}
