//! duett-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use duett_core::BroadcastLiveStatus;
use duett_observability::SignalingMetrics;
use duett_signaling::{SignalingServer, SignalingState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    live_status: BroadcastLiveStatus,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self {
            config,
            live_status: BroadcastLiveStatus::neu(),
        }
    }

    /// Baut den geteilten Signaling-Zustand aus der Konfiguration
    pub fn state_erstellen(&self) -> Result<SignalingState> {
        let metriken = SignalingMetrics::neu()?;
        Ok(SignalingState::neu(
            self.config.signaling_config(),
            metriken,
            Arc::new(self.live_status.clone()),
        ))
    }

    /// Startet den Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Signaling-Zustand und Metriken aufbauen
    /// 2. HTTP/WebSocket-Listener binden
    /// 3. Auf Ctrl-C warten, dann laufende Anfragen sauber beenden
    pub async fn starten(self) -> Result<()> {
        let state = self.state_erstellen()?;
        let metriken_aktiviert = self.config.observability.metriken_aktiviert;
        let server = SignalingServer::neu(state, self.config.bind_adresse()?, metriken_aktiviert);

        tracing::info!(
            adresse = %server.bind_addr(),
            pfad = %self.config.signaling.pfad,
            metriken = metriken_aktiviert,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
            }
            let _ = shutdown_tx.send(true);
        });

        server.starten(shutdown_rx).await?;
        Ok(())
    }

    /// Wie `starten`, aber mit bereits gebundenem Listener und externem
    /// Shutdown-Signal
    pub async fn mit_listener(
        self,
        listener: TcpListener,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        let state = self.state_erstellen()?;
        let adresse = listener.local_addr()?;

        tracing::info!(
            adresse = %adresse,
            pfad = %self.config.signaling.pfad,
            metriken = self.config.observability.metriken_aktiviert,
            "Server startet"
        );

        SignalingServer::neu(state, adresse, self.config.observability.metriken_aktiviert)
            .mit_listener(listener, shutdown_rx)
            .await?;
        Ok(())
    }
}
