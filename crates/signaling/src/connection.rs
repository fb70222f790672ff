//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task.
//!
//! ## Ablauf
//! ```text
//! SessionId erzeugen -> Aufnahme in den Raum
//!     |  abgelehnt: Close-Frame, Ende
//!     v
//! Lese-Schleife (Text -> Dispatcher)   Schreib-Task (Queue -> Socket, Ping)
//!     |
//!     v
//! Aufraeumen: Session entfernen, Schreib-Task endet mit der Queue
//! ```
//!
//! ## Keepalive
//! - Der Schreib-Task sendet alle `keepalive_sek` einen Ping
//! - Pong-Frames werden ignoriert; tote Verbindungen fallen beim Schreiben auf

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use duett_core::{LiveStatusEvent, RoomId, SessionId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::broadcast::ClientSender;
use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: SignalingState,
    session_id: SessionId,
    raum_id: RoomId,
    /// Verbindung wurde mit dem Gastgeber-Header aufgebaut
    ist_host: bool,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection mit frischer SessionId
    pub fn neu(state: SignalingState, raum_id: RoomId, ist_host: bool) -> Self {
        Self {
            state,
            session_id: SessionId::new(),
            raum_id,
            ist_host,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Startet die Verbindungs-Verarbeitung
    ///
    /// Laeuft bis der Client trennt oder ein Lesefehler auftritt. Das
    /// Aufraeumen in der Registry findet in jedem Fall statt.
    pub async fn verarbeiten(self, mut socket: WebSocket) {
        let session_id = self.session_id;
        let (sender, queue) = ClientSender::neu(session_id, self.state.config.send_queue_groesse);

        if !self.state.registry.aufnehmen(session_id, self.raum_id.clone(), sender) {
            if let Err(e) = socket.send(Message::Close(None)).await {
                tracing::debug!(
                    session_id = %session_id,
                    fehler = %e,
                    "Close-Frame nicht zustellbar"
                );
            }
            return;
        }

        if self.ist_host {
            self.state
                .live_status
                .veroeffentlichen(LiveStatusEvent::on_air(self.raum_id.as_str()));
        }

        let (ws_tx, mut ws_rx) = socket.split();
        let keepalive = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let schreiber = tokio::spawn(schreib_schleife(session_id, ws_tx, queue, keepalive));

        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    self.state.dispatcher.verarbeiten(session_id, &text, &self.raum_id);
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(session_id = %session_id, "Close-Frame empfangen");
                    break;
                }
                // Binary, Ping und Pong
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(session_id = %session_id, fehler = %e, "WebSocket-Lesefehler");
                    break;
                }
            }
        }

        self.aufraeumen();

        // Mit dem Eintrag in der Registry faellt der letzte Sender weg,
        // der Schreib-Task leert die Queue und endet
        match schreiber.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(
                session_id = %session_id,
                fehler = %e,
                "Schreib-Task mit Fehler beendet"
            ),
            Err(e) => {
                tracing::warn!(session_id = %session_id, fehler = %e, "Schreib-Task abgebrochen")
            }
        }

        tracing::info!(session_id = %session_id, raum = %self.raum_id, "Verbindungs-Task beendet");
    }

    fn aufraeumen(&self) {
        self.state.registry.entfernen(self.session_id, &self.raum_id);
        if self.ist_host {
            self.state
                .live_status
                .veroeffentlichen(LiveStatusEvent::off_air(self.raum_id.as_str()));
        }
    }
}

/// Leert die Send-Queue einer Session in den Socket und sendet Pings
///
/// Ein Schreibfehler beendet nur diesen Task; der Raum-Zustand bleibt
/// unberuehrt, das Aufraeumen uebernimmt die Lese-Schleife.
async fn schreib_schleife(
    session_id: SessionId,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<String>,
    keepalive: Duration,
) -> SignalingResult<()> {
    let mut ping = interval_at(Instant::now() + keepalive, keepalive);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            nachricht = queue.recv() => {
                let Some(text) = nachricht else { break };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    tracing::warn!(session_id = %session_id, fehler = %e, "Senden fehlgeschlagen");
                    return Err(SignalingError::transport(e));
                }
            }
            _ = ping.tick() => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                    tracing::warn!(
                        session_id = %session_id,
                        fehler = %e,
                        "Ping-Senden fehlgeschlagen"
                    );
                    return Err(SignalingError::transport(e));
                }
            }
        }
    }

    // Verbindung kann bereits geschlossen sein
    if let Err(e) = ws_tx.close().await {
        tracing::trace!(session_id = %session_id, fehler = %e, "Socket bereits geschlossen");
    }
    Ok(())
}
