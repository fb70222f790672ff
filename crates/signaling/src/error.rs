//! Fehlertypen fuer den Signaling-Service
//!
//! Voller Raum, falsche Nachrichten-Reihenfolge und unbekannte Sessions
//! tauchen hier nicht auf: das sind bewachte No-Ops im Kern. Gemeldet
//! werden nur Transport- und Infrastrukturfehler.

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Socket binden, Listener)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket-Transportfehler (Lesen/Schreiben)
    #[error("Transportfehler: {0}")]
    Transport(String),
}

impl SignalingError {
    /// Erstellt einen Transportfehler
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transportfehler_anzeige() {
        let e = SignalingError::transport("Verbindung zurueckgesetzt");
        assert_eq!(e.to_string(), "Transportfehler: Verbindung zurueckgesetzt");
    }

    #[test]
    fn io_fehler_wird_konvertiert() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "belegt");
        let e: SignalingError = io.into();
        assert!(matches!(e, SignalingError::Io(_)));
    }
}
