//! Fehlertypen fuer Duett
//!
//! Protokoll-Bedingungen (voller Raum, falsche Reihenfolge, unbekannte
//! Session) sind keine Fehler, sondern bewachte No-Ops im Signaling-Kern.
//! Dieser Enum deckt nur echte Fehlerzustaende ab.

use thiserror::Error;

/// Globaler Result-Alias fuer Duett
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Fehler die crate-uebergreifend auftreten koennen
#[derive(Debug, Error)]
pub enum CoreError {
    // --- Authentifizierung & Autorisierung ---
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    Authentifizierung(String),

    #[error("Zugriff verweigert: {0}")]
    ZugriffVerweigert(String),
}
