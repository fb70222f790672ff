//! Request-Timing Middleware fuer Axum
//!
//! Misst die Antwortzeit jeder HTTP-Anfrage und protokolliert sie als
//! strukturiertes Log-Event sowie als Prometheus-Histogramm.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Method, Request, Response},
    middleware::Next,
};
use std::time::Instant;

use crate::metrics::SignalingMetrics;

/// Label fuer Anfragen ohne passende Route
const UNBEKANNTER_PFAD: &str = "unmatched";

/// Erstellt den tower-http Trace-Layer fuer HTTP-Anfragen.
pub fn request_timing_layer() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
> {
    use tower_http::trace::TraceLayer;
    TraceLayer::new_for_http()
}

/// Axum-Middleware-Funktion: misst Antwortzeit, loggt strukturiert und
/// zaehlt die Anfrage in den HTTP-Metriken.
///
/// Als Metrik-Label dient das Routen-Muster (`MatchedPath`), nie der rohe
/// Pfad; Anfragen ohne Route landen alle unter `unmatched`.
///
/// Verwendung:
/// ```ignore
/// Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(metriken, timing_middleware))
/// ```
pub async fn timing_middleware(
    State(metriken): State<SignalingMetrics>,
    req: Request<Body>,
    next: Next,
) -> Response<Body> {
    let methode = methoden_label(req.method());
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNBEKANNTER_PFAD.to_string());
    let pfad = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let dauer = start.elapsed();
    let status = response.status().as_u16();

    metriken
        .http_requests_total
        .with_label_values(&[methode, &route, &status.to_string()])
        .inc();
    metriken
        .http_request_duration_seconds
        .with_label_values(&[methode, &route])
        .observe(dauer.as_secs_f64());

    tracing::info!(
        method = %methode,
        path = %pfad,
        route = %route,
        status = status,
        duration_ms = dauer.as_millis(),
        "HTTP-Anfrage abgeschlossen"
    );

    response
}

/// Begrenzt das Methoden-Label auf die Standard-Methoden
fn methoden_label(methode: &Method) -> &'static str {
    match methode.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "PATCH" => "PATCH",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn anfrage_wird_gezaehlt() {
        let metriken = SignalingMetrics::neu().unwrap();
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(
                metriken.clone(),
                timing_middleware,
            ));

        let antwort = app
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), 200);

        let gezaehlt = metriken
            .http_requests_total
            .with_label_values(&["GET", "/ping", "200"])
            .get();
        assert_eq!(gezaehlt, 1);
    }

    #[tokio::test]
    async fn unbekannte_pfade_erzeugen_keine_neuen_serien() {
        let metriken = SignalingMetrics::neu().unwrap();
        let app = Router::new()
            .route("/raum/:id", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                metriken.clone(),
                timing_middleware,
            ));

        for i in 0..200 {
            let antwort = app
                .clone()
                .oneshot(Request::get(format!("/zufall/{i}")).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(antwort.status(), 404);
            app.clone()
                .oneshot(Request::get(format!("/raum/{i}")).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }
        let exotisch = Method::from_bytes(b"ZUFALL").unwrap();
        app.clone()
            .oneshot(Request::builder().method(exotisch).uri("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let serien = |name: &str| {
            metriken
                .registry
                .gather()
                .into_iter()
                .find(|f| f.get_name() == name)
                .map(|f| f.get_metric().len())
                .unwrap_or(0)
        };
        // GET /raum/:id 200, GET unmatched 404, OTHER unmatched 404
        assert_eq!(serien("duett_http_requests_total"), 3);
        assert_eq!(serien("duett_http_request_duration_seconds"), 3);
        assert_eq!(
            metriken
                .http_requests_total
                .with_label_values(&["GET", "unmatched", "404"])
                .get(),
            200
        );
        assert_eq!(
            metriken
                .http_requests_total
                .with_label_values(&["GET", "/raum/:id", "200"])
                .get(),
            200
        );
    }
}
