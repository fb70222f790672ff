//! Live-Status-Benachrichtigungen (On-Air / Off-Air)
//!
//! Wenn der Gastgeber eines Raums beitritt oder die Verbindung trennt,
//! wird ein `LiveStatusEvent` an eine optionale Senke gemeldet. Der
//! Signaling-Kern kennt nur das Trait; welche Senke dahinter steht
//! (nichts, In-Process-Broadcast, spaeter ein externer Event-Bus)
//! entscheidet der Server beim Start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// On-Air/Off-Air-Meldung fuer einen Raum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStatusEvent {
    /// Raum-Kennung (entspricht dem `liveId`-Parameter)
    pub live_id: String,
    /// `true` beim Beitritt des Gastgebers, `false` beim Verlassen
    pub on_air: bool,
    pub zeitpunkt: DateTime<Utc>,
}

impl LiveStatusEvent {
    pub fn on_air(live_id: impl Into<String>) -> Self {
        Self {
            live_id: live_id.into(),
            on_air: true,
            zeitpunkt: Utc::now(),
        }
    }

    pub fn off_air(live_id: impl Into<String>) -> Self {
        Self {
            live_id: live_id.into(),
            on_air: false,
            zeitpunkt: Utc::now(),
        }
    }
}

/// Senke fuer Live-Status-Meldungen
///
/// Muss nicht-blockierend sein: wird aus Verbindungs-Tasks aufgerufen.
pub trait LiveStatusSink: Send + Sync + 'static {
    fn veroeffentlichen(&self, event: LiveStatusEvent);
}

/// Senke die alle Meldungen verwirft
#[derive(Debug, Clone, Copy, Default)]
pub struct KeinLiveStatus;

impl LiveStatusSink for KeinLiveStatus {
    fn veroeffentlichen(&self, _event: LiveStatusEvent) {}
}

/// Groesse des Broadcast-Kanals fuer Live-Status-Meldungen
const LIVE_STATUS_KANAL_GROESSE: usize = 128;

/// In-Process-Senke auf Basis von `tokio::sync::broadcast`
///
/// Clone teilt den inneren Kanal.
#[derive(Debug, Clone)]
pub struct BroadcastLiveStatus {
    tx: broadcast::Sender<LiveStatusEvent>,
}

impl BroadcastLiveStatus {
    pub fn neu() -> Self {
        let (tx, _) = broadcast::channel(LIVE_STATUS_KANAL_GROESSE);
        Self { tx }
    }

    /// Abonniert alle zukuenftigen Meldungen
    pub fn abonnieren(&self) -> broadcast::Receiver<LiveStatusEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastLiveStatus {
    fn default() -> Self {
        Self::neu()
    }
}

impl LiveStatusSink for BroadcastLiveStatus {
    fn veroeffentlichen(&self, event: LiveStatusEvent) {
        tracing::info!(live_id = %event.live_id, on_air = event.on_air, "Live-Status");
        // Ohne Abonnenten schlaegt send fehl, das ist kein Fehlerfall
        let _ = self.tx.send(event);
    }
}
