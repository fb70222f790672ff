//! WebSocket-Endpunkt und HTTP-Server
//!
//! Der `SignalingServer` bindet einen TCP-Socket und liefert per axum den
//! Signaling-Endpunkt sowie `/health` und `/metrics` aus. Jede
//! WebSocket-Verbindung laeuft als eigene `ClientConnection`.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::Response,
    routing::get,
    Router,
};
use duett_core::RoomId;
use duett_observability::{observability_router, request_timing_layer, timing_middleware};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::auth::{auth_middleware, fehler_antwort, rollen_middleware, RollenRichtlinie};
use crate::connection::ClientConnection;
use crate::error::SignalingResult;
use crate::server_state::SignalingState;

/// Query-Parameter des Signaling-Endpunkts
#[derive(Debug, Deserialize)]
pub struct VerbindungsParameter {
    #[serde(rename = "liveId")]
    pub live_id: Option<String>,
}

/// Router fuer den Signaling-Endpunkt inklusive Auth und Rollen-Richtlinie
pub fn signaling_router(state: SignalingState) -> Router {
    let richtlinie = RollenRichtlinie::neu(state.config.erlaubte_rollen.iter().cloned());
    Router::new()
        .route(&state.config.pfad, get(ws_handler))
        .route_layer(middleware::from_fn_with_state(richtlinie, rollen_middleware))
        .layer(middleware::from_fn(auth_middleware))
        .with_state(state)
}

/// Vollstaendiger App-Router: Signaling, Health, Metriken und Request-Timing
pub fn app_router(state: SignalingState, metriken_aktiv: bool) -> Router {
    let metriken = state.metriken.clone();
    signaling_router(state)
        .merge(observability_router(metriken.clone(), metriken_aktiv))
        .layer(middleware::from_fn_with_state(metriken, timing_middleware))
        .layer(request_timing_layer())
}

/// GET <pfad>?liveId=<raum> – WebSocket-Upgrade
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SignalingState>,
    Query(params): Query<VerbindungsParameter>,
    headers: HeaderMap,
) -> Response {
    let Some(live_id) = params.live_id.filter(|id| !id.trim().is_empty()) else {
        return fehler_antwort(StatusCode::BAD_REQUEST, "Parameter 'liveId' fehlt");
    };

    let host_header = state.config.host_header.to_ascii_lowercase();
    let ist_host = headers
        .get(host_header.as_str())
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "1");

    tracing::debug!(raum = %live_id, ist_host, "WebSocket-Upgrade angefragt");

    ws.on_upgrade(move |socket| async move {
        let verbindung = ClientConnection::neu(state, RoomId::new(live_id), ist_host);
        tracing::debug!(session_id = %verbindung.session_id(), "WebSocket-Verbindung angenommen");
        verbindung.verarbeiten(socket).await;
    })
}

/// HTTP/WebSocket-Signaling-Server
pub struct SignalingServer {
    state: SignalingState,
    bind_addr: SocketAddr,
    metriken_aktiv: bool,
}

impl SignalingServer {
    pub fn neu(state: SignalingState, bind_addr: SocketAddr, metriken_aktiv: bool) -> Self {
        Self {
            state,
            bind_addr,
            metriken_aktiv,
        }
    }

    /// Bindet den Socket und bedient Anfragen bis `shutdown_rx` `true` meldet
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.mit_listener(listener, shutdown_rx).await
    }

    /// Wie `starten`, aber mit bereits gebundenem Listener
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = listener.local_addr()?;
        let app = app_router(self.state, self.metriken_aktiv);

        tracing::info!(adresse = %lokale_addr, "Signaling-Server gestartet");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                // Ein geschlossener Sender gilt ebenfalls als Shutdown
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
            })
            .await?;

        tracing::info!("Signaling-Server gestoppt");
        Ok(())
    }

    /// Konfigurierte Adresse, an die `starten` bindet
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}
