//! Message-Dispatcher – Routet eingehende Signaling-Nachrichten
//!
//! Der Dispatcher parst einen Text-Frame genau einmal und leitet ihn an
//! den passenden bewachten Uebergang der Raum-Zustandsmaschine weiter.
//!
//! ## Zustandspruefung
//! - `STATE` ist immer erlaubt und aendert nichts
//! - `OFFER` nur im Zustand `Ready`
//! - `ANSWER` nur im Zustand `Creating`
//! - `ICE` in jedem Zustand, sofern ein zweites Mitglied da ist
//!
//! Alles andere wird still verworfen: keine Antwort, keine Fehlermeldung.

use duett_core::{RoomId, SessionId};

use crate::broadcast::Zustellung;
use crate::message::{NachrichtenArt, SignalingNachricht};
use crate::registry::SessionRegistry;
use crate::room::Raum;

/// Was mit einer eingehenden Nachricht passiert ist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchErgebnis {
    /// Unbekannter Typ
    Ignoriert,
    /// STATE-Abfrage beantwortet
    Beantwortet,
    /// An das andere Mitglied weitergeleitet
    Weitergeleitet(NachrichtenArt),
    /// Zustand passte nicht zum Nachrichtentyp
    FalscheReihenfolge(NachrichtenArt),
    /// Kein zweites Mitglied oder Raum unbekannt
    KeinPartner(NachrichtenArt),
}

/// Zentraler Message-Dispatcher
#[derive(Clone)]
pub struct MessageDispatcher {
    registry: SessionRegistry,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(registry: SessionRegistry) -> Self {
        Self { registry }
    }

    /// Verarbeitet einen eingehenden Text-Frame von `session_id` in `raum_id`
    pub fn verarbeiten(
        &self,
        session_id: SessionId,
        text: &str,
        raum_id: &RoomId,
    ) -> DispatchErgebnis {
        let Some(nachricht) = SignalingNachricht::parsen(text) else {
            tracing::trace!(session_id = %session_id, "Unbekannter Nachrichtentyp ignoriert");
            return DispatchErgebnis::Ignoriert;
        };

        tracing::debug!(
            session_id = %session_id,
            raum = %raum_id,
            typ = %nachricht.art,
            bytes = nachricht.nutzdaten().len(),
            "Nachricht empfangen"
        );

        let ergebnis = match nachricht.art {
            NachrichtenArt::State => self.zustand_abfragen(session_id, raum_id),
            NachrichtenArt::Offer => {
                self.gesteuert(nachricht, raum_id, session_id, |raum, von, text| {
                    raum.offer(von, text)
                })
            }
            NachrichtenArt::Answer => {
                self.gesteuert(nachricht, raum_id, session_id, |raum, von, text| {
                    raum.answer(von, text)
                })
            }
            NachrichtenArt::Ice => self.ice(nachricht, raum_id, session_id),
        };

        self.zaehlen(session_id, ergebnis);
        ergebnis
    }

    // -----------------------------------------------------------------------
    // Handler
    // -----------------------------------------------------------------------

    /// STATE: Antwort nur an den Absender
    ///
    /// Laeuft unter der Raum-Sperre, damit die Antwort nicht zwischen einen
    /// Uebergang und dessen Rundruf faellt.
    fn zustand_abfragen(&self, session_id: SessionId, raum_id: &RoomId) -> DispatchErgebnis {
        let beantwortet = self.registry.im_raum(raum_id, |raum| {
            let antwort = Zustellung::neu(session_id, raum.zustand().meldung());
            ((), vec![antwort])
        });
        if beantwortet.is_none() {
            // Unbekannter Raum verhaelt sich wie ein frischer, leerer Raum
            self.registry
                .zustellen(session_id, self.registry.raum_zustand(raum_id).meldung());
        }
        DispatchErgebnis::Beantwortet
    }

    /// OFFER/ANSWER: bewachter Uebergang mit Weiterleitung
    fn gesteuert<F>(
        &self,
        nachricht: SignalingNachricht<'_>,
        raum_id: &RoomId,
        session_id: SessionId,
        uebergang: F,
    ) -> DispatchErgebnis
    where
        F: FnOnce(&mut Raum, SessionId, &str) -> Option<Vec<Zustellung>>,
    {
        let art = nachricht.art;
        let angenommen = self.registry.im_raum(raum_id, |raum| {
            let vorher = raum.zustand();
            match uebergang(raum, session_id, nachricht.text) {
                Some(plan) => {
                    tracing::info!(
                        session_id = %session_id,
                        raum = %raum_id,
                        von = %vorher,
                        nach = %raum.zustand(),
                        "{art} angenommen"
                    );
                    (true, plan)
                }
                None => (false, Vec::new()),
            }
        });

        match angenommen {
            Some(true) => DispatchErgebnis::Weitergeleitet(art),
            Some(false) => DispatchErgebnis::FalscheReihenfolge(art),
            None => DispatchErgebnis::KeinPartner(art),
        }
    }

    /// ICE: zustandsunabhaengige Weiterleitung
    fn ice(
        &self,
        nachricht: SignalingNachricht<'_>,
        raum_id: &RoomId,
        session_id: SessionId,
    ) -> DispatchErgebnis {
        let weitergeleitet = self.registry.im_raum(raum_id, |raum| {
            match raum.ice(session_id, nachricht.text) {
                Some(zustellung) => (true, vec![zustellung]),
                None => (false, Vec::new()),
            }
        });

        if weitergeleitet == Some(true) {
            DispatchErgebnis::Weitergeleitet(NachrichtenArt::Ice)
        } else {
            DispatchErgebnis::KeinPartner(NachrichtenArt::Ice)
        }
    }

    fn zaehlen(&self, session_id: SessionId, ergebnis: DispatchErgebnis) {
        match ergebnis {
            DispatchErgebnis::FalscheReihenfolge(art) => {
                tracing::debug!(
                    session_id = %session_id,
                    typ = %art,
                    "Nachricht ausserhalb der Reihenfolge verworfen"
                );
                if let Some(m) = self.registry.metriken() {
                    m.verworfen("sequence");
                }
            }
            DispatchErgebnis::KeinPartner(art) => {
                tracing::debug!(
                    session_id = %session_id,
                    typ = %art,
                    "Kein Partner, Nachricht verworfen"
                );
                if let Some(m) = self.registry.metriken() {
                    m.verworfen("no_peer");
                }
            }
            DispatchErgebnis::Weitergeleitet(art) => {
                if let Some(m) = self.registry.metriken() {
                    m.weitergeleitet(art.label());
                }
            }
            DispatchErgebnis::Ignoriert | DispatchErgebnis::Beantwortet => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
