//! duett-signaling – WebSocket-Signaling fuer WebRTC-Paare
//!
//! Dieser Crate vermittelt SDP-Offer/Answer und ICE-Kandidaten zwischen
//! genau zwei Teilnehmern eines Raums. Die Nutzdaten werden nie
//! interpretiert, nur zugestellt.
//!
//! ## Architektur
//!
//! ```text
//! axum Router (SignalingServer)
//!     |  auth_middleware -> rollen_middleware -> ws_handler
//!     v
//! ClientConnection (pro Verbindung ein Task + Schreib-Task)
//!     |
//!     v
//! MessageDispatcher  – STATE / OFFER / ANSWER / ICE
//!     |
//!     v
//! SessionRegistry    – Raeume (je eine Sperre) und Send-Queues
//!     |
//!     v
//! Raum               – Zustandsmaschine Impossible -> Ready -> Creating -> Active
//! ```

pub mod auth;
pub mod broadcast;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod registry;
pub mod room;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use auth::{Principal, RollenRichtlinie};
pub use broadcast::{ClientSender, ZustellErgebnis, Zustellung};
pub use connection::ClientConnection;
pub use dispatcher::{DispatchErgebnis, MessageDispatcher};
pub use error::{SignalingError, SignalingResult};
pub use message::{NachrichtenArt, SignalingNachricht};
pub use registry::SessionRegistry;
pub use room::{ClientZustand, Raum, RaumZustand};
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::{app_router, signaling_router, SignalingServer};
