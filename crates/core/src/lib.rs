//! duett-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Signaling-Kern, Transport
//! und Server gemeinsam nutzen: ID-Newtypes, den Fehler-Enum und die
//! Schnittstelle fuer Live-Status-Benachrichtigungen.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{CoreError, CoreResult};
pub use event::{BroadcastLiveStatus, KeinLiveStatus, LiveStatusEvent, LiveStatusSink};
pub use types::{RoomId, SessionId};
