//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt alle geteilten Services als Arc-Referenzen bzw. Clone-Handles,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use duett_core::{KeinLiveStatus, LiveStatusSink};
use duett_observability::SignalingMetrics;
use std::sync::Arc;

use crate::broadcast::SEND_QUEUE_GROESSE;
use crate::dispatcher::MessageDispatcher;
use crate::registry::SessionRegistry;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Pfad des WebSocket-Endpunkts
    pub pfad: String,
    /// Kapazitaet der Send-Queue pro Session
    pub send_queue_groesse: usize,
    /// Intervall fuer WebSocket-Pings in Sekunden
    pub keepalive_sek: u64,
    /// Rollen, die den Endpunkt benutzen duerfen
    pub erlaubte_rollen: Vec<String>,
    /// Handshake-Header, der den Gastgeber eines Raums markiert
    pub host_header: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            pfad: "/signaling/rtc".to_string(),
            send_queue_groesse: SEND_QUEUE_GROESSE,
            keepalive_sek: 30,
            erlaubte_rollen: vec!["USER".to_string(), "TEACHER".to_string()],
            host_header: "isMyClass".to_string(),
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Clone teilt den Zustand)
#[derive(Clone)]
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    pub registry: SessionRegistry,
    pub dispatcher: MessageDispatcher,
    /// Senke fuer On-Air/Off-Air-Meldungen
    pub live_status: Arc<dyn LiveStatusSink>,
    pub metriken: SignalingMetrics,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(
        config: SignalingConfig,
        metriken: SignalingMetrics,
        live_status: Arc<dyn LiveStatusSink>,
    ) -> Self {
        let registry = SessionRegistry::mit_metriken(metriken.clone());
        Self {
            config: Arc::new(config),
            dispatcher: MessageDispatcher::neu(registry.clone()),
            registry,
            live_status,
            metriken,
        }
    }

    /// Zustand ohne Live-Status-Senke
    pub fn ohne_live_status(config: SignalingConfig, metriken: SignalingMetrics) -> Self {
        Self::neu(config, metriken, Arc::new(KeinLiveStatus))
    }
}
