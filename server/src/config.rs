//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::{bail, Context};
use duett_observability::logging::{log_format_gueltig, log_level_gueltig};
use duett_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Signaling-Endpunkt und Send-Queues
    pub signaling: SignalingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer HTTP und WebSocket
    pub port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Signaling-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingEinstellungen {
    /// Pfad des WebSocket-Endpunkts
    pub pfad: String,
    /// Kapazitaet der Send-Queue pro Session
    pub send_queue_groesse: usize,
    /// Ping-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Rollen (Header `X-ROLE`), die den Endpunkt benutzen duerfen
    pub erlaubte_rollen: Vec<String>,
    /// Handshake-Header, der den Gastgeber markiert
    pub host_header: String,
}

impl Default for SignalingEinstellungen {
    fn default() -> Self {
        let standard = SignalingConfig::default();
        Self {
            pfad: standard.pfad,
            send_queue_groesse: standard.send_queue_groesse,
            keepalive_sek: standard.keepalive_sek,
            erlaubte_rollen: standard.erlaubte_rollen,
            host_header: standard.host_header,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Stellt `/metrics` bereit; `/health` ist immer aktiv
    pub metriken_aktiviert: bool,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            metriken_aktiviert: true,
        }
    }
}

/// Herkunft einer geladenen Konfiguration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KonfigQuelle {
    Datei,
    /// Datei fehlte, es gelten die Standardwerte
    Standardwerte,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Laeuft vor der Logging-Initialisierung und loggt deshalb nicht selbst;
    /// die Herkunft meldet der Aufrufer.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, KonfigQuelle)> {
        let (config, quelle) = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config = toml::from_str::<Self>(&inhalt)
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                (config, KonfigQuelle::Datei)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), KonfigQuelle::Standardwerte)
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Konfigurationsdatei '{pfad}' nicht lesbar"))
            }
        };
        config.validieren()?;
        Ok((config, quelle))
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            bail!("Ungueltiges Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Ungueltiges Log-Format '{}'", self.logging.format);
        }
        if !self.signaling.pfad.starts_with('/') {
            bail!("Signaling-Pfad muss mit '/' beginnen: '{}'", self.signaling.pfad);
        }
        if self.signaling.send_queue_groesse == 0 {
            bail!("send_queue_groesse muss groesser als 0 sein");
        }
        if self.signaling.keepalive_sek == 0 {
            bail!("keepalive_sek muss groesser als 0 sein");
        }
        if self.signaling.erlaubte_rollen.is_empty() {
            bail!("Mindestens eine erlaubte Rolle ist noetig");
        }
        self.bind_adresse()?;
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer HTTP und WebSocket zurueck
    pub fn bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{adresse}'"))
    }

    /// Signaling-Teil der Konfiguration fuer den Signaling-Crate
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            pfad: self.signaling.pfad.clone(),
            send_queue_groesse: self.signaling.send_queue_groesse,
            keepalive_sek: self.signaling.keepalive_sek,
            erlaubte_rollen: self.signaling.erlaubte_rollen.clone(),
            host_header: self.signaling.host_header.clone(),
        }
    }
}
