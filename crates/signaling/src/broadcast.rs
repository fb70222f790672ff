//! Send-Queues – Nicht-blockierende Zustellung an einzelne Sessions
//!
//! Jede Session besitzt eine begrenzte Queue, die von ihrem eigenen
//! Schreib-Task geleert wird. Zustellen heisst hier nur Einreihen: der
//! eigentliche Socket-Write passiert nie unter einer Raum-Sperre.

use duett_core::SessionId;
use tokio::sync::mpsc;

/// Standardgroesse der Send-Queue pro Session
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Ergebnis eines Einreihe-Versuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZustellErgebnis {
    Eingereiht,
    /// Queue voll, Nachricht verworfen
    QueueVoll,
    /// Schreib-Task beendet (Client getrennt)
    Geschlossen,
}

/// Handle auf die Send-Queue einer Session
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub session_id: SessionId,
    tx: mpsc::Sender<String>,
}

impl ClientSender {
    /// Erstellt Sender und zugehoerige Empfangs-Queue
    ///
    /// Der Empfaenger gehoert dem Schreib-Task der Verbindung.
    pub fn neu(session_id: SessionId, kapazitaet: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(kapazitaet.max(1));
        (Self { session_id, tx }, rx)
    }

    /// Reiht einen Text nicht-blockierend ein
    pub fn senden(&self, text: String) -> ZustellErgebnis {
        match self.tx.try_send(text) {
            Ok(()) => ZustellErgebnis::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    "Send-Queue voll, Nachricht verworfen"
                );
                ZustellErgebnis::QueueVoll
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    "Send-Queue geschlossen (Client getrennt)"
                );
                ZustellErgebnis::Geschlossen
            }
        }
    }
}

/// Geplante Zustellung: welcher Text geht an welche Session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zustellung {
    pub an: SessionId,
    pub text: String,
}

impl Zustellung {
    pub fn neu(an: SessionId, text: impl Into<String>) -> Self {
        Self {
            an,
            text: text.into(),
        }
    }
}

/// Plant denselben Text fuer alle angegebenen Sessions
pub fn rundruf<I>(empfaenger: I, text: &str) -> Vec<Zustellung>
where
    I: IntoIterator<Item = SessionId>,
{
    empfaenger
        .into_iter()
        .map(|an| Zustellung::neu(an, text))
        .collect()
}
