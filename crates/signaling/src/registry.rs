//! Session-Registry – Raeume, Sessions und ihre Send-Queues
//!
//! Einzige Quelle der Wahrheit fuer Raum-Mitgliedschaft, Raum-Zustand und
//! Session-Handles. Jeder Raum steckt hinter einer eigenen Sperre; ein
//! Uebergang (Zustand lesen, entscheiden, aendern, Zustellungen einreihen)
//! laeuft komplett unter dieser Sperre. Raeume teilen sich keine Sperren.
//!
//! ## Sperr-Reihenfolge
//! Raum-Sperre vor DashMap-Shard. Ein DashMap-Eintrag wird nie gehalten,
//! waehrend auf eine Raum-Sperre gewartet wird.

use dashmap::DashMap;
use duett_core::{RoomId, SessionId};
use duett_observability::SignalingMetrics;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::broadcast::{ClientSender, ZustellErgebnis, Zustellung};
use crate::room::{ClientZustand, Raum, RaumZustand};

/// Zentrale Registry fuer Raeume und Sessions
///
/// Thread-safe via Arc + DashMap + Raum-Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    raeume: DashMap<RoomId, Arc<Mutex<Raum>>>,
    sessions: DashMap<SessionId, ClientSender>,
    metriken: Option<SignalingMetrics>,
}

impl SessionRegistry {
    /// Erstellt eine leere Registry ohne Metriken
    pub fn neu() -> Self {
        Self::erstellen(None)
    }

    /// Erstellt eine leere Registry, die in `metriken` mitzaehlt
    pub fn mit_metriken(metriken: SignalingMetrics) -> Self {
        Self::erstellen(Some(metriken))
    }

    fn erstellen(metriken: Option<SignalingMetrics>) -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                raeume: DashMap::new(),
                sessions: DashMap::new(),
                metriken,
            }),
        }
    }

    /// Nimmt eine Session in einen Raum auf
    ///
    /// Gibt `false` zurueck wenn der Raum bereits zwei Mitglieder hat; der
    /// Aufrufer muss die Verbindung dann ohne weitere Nachricht schliessen.
    /// Bei Erfolg wird der Raum neu berechnet und STATE an alle gemeldet.
    pub fn aufnehmen(
        &self,
        session_id: SessionId,
        raum_id: RoomId,
        sender: ClientSender,
    ) -> bool {
        loop {
            let raum = self.raum_oder_neu(&raum_id);
            let mut guard = raum.lock();
            // Raum wurde zwischen Nachschlagen und Sperren geleert und entfernt
            if guard.ist_geschlossen() {
                continue;
            }

            let Some(plan) = guard.beitreten(session_id) else {
                drop(guard);
                tracing::info!(
                    session_id = %session_id,
                    raum = %raum_id,
                    "Raum voll – Aufnahme abgelehnt"
                );
                if let Some(m) = &self.inner.metriken {
                    m.rejected_admissions_total.inc();
                }
                return false;
            };

            self.inner.sessions.insert(session_id, sender);
            if let Some(m) = &self.inner.metriken {
                m.connected_sessions.inc();
            }
            tracing::info!(
                session_id = %session_id,
                raum = %raum_id,
                mitglieder = guard.anzahl(),
                "Session aufgenommen"
            );
            self.ausliefern(plan);
            return true;
        }
    }

    /// Entfernt eine Session aus Registry und Raum
    ///
    /// Ein leerer Raum wird samt Zustand geloescht, sonst zurueckgesetzt.
    /// Laeuft immer vollstaendig durch, auch fuer unbekannte Sessions.
    pub fn entfernen(&self, session_id: SessionId, raum_id: &RoomId) {
        let Some(raum) = self.raum(raum_id) else {
            self.session_austragen(session_id);
            return;
        };

        let mut guard = raum.lock();
        self.session_austragen(session_id);
        let plan = guard.verlassen(session_id);

        if guard.ist_leer() && !guard.ist_geschlossen() {
            guard.schliessen();
            let entfernt = self
                .inner
                .raeume
                .remove_if(raum_id, |_, eintrag| Arc::ptr_eq(eintrag, &raum))
                .is_some();
            if entfernt {
                if let Some(m) = &self.inner.metriken {
                    m.active_rooms.dec();
                }
                tracing::info!(raum = %raum_id, "Raum geloescht");
            }
        } else {
            self.ausliefern(plan);
        }
        tracing::info!(session_id = %session_id, raum = %raum_id, "Session entfernt");
    }

    /// Reiht einen Text fuer eine Session ein
    ///
    /// Eine unbekannte Session ist kein Fehler: der Peer kann sich zwischen
    /// Nachschlagen und Zustellen getrennt haben.
    pub fn zustellen(&self, session_id: SessionId, text: String) -> Option<ZustellErgebnis> {
        let ergebnis = self
            .inner
            .sessions
            .get(&session_id)
            .map(|sender| sender.senden(text));
        match ergebnis {
            Some(ZustellErgebnis::QueueVoll) => {
                if let Some(m) = &self.inner.metriken {
                    m.verworfen("queue_full");
                }
            }
            None => {
                tracing::debug!(session_id = %session_id, "Zustellung an unbekannte Session");
            }
            _ => {}
        }
        ergebnis
    }

    /// Aktueller Zustand eines Raums; ein unbekannter Raum ist `Impossible`
    pub fn raum_zustand(&self, raum_id: &RoomId) -> RaumZustand {
        self.raum(raum_id)
            .map(|raum| raum.lock().zustand())
            .unwrap_or(RaumZustand::Impossible)
    }

    /// Zustand und Mitglieder eines Raums als konsistente Momentaufnahme
    pub fn raum_momentaufnahme(&self, raum_id: &RoomId) -> Option<(RaumZustand, Vec<SessionId>)> {
        let raum = self.raum(raum_id)?;
        let guard = raum.lock();
        Some((guard.zustand(), guard.mitglieder().collect()))
    }

    /// Handshake-Teilzustand einer Session
    pub fn client_zustand(&self, session_id: SessionId, raum_id: &RoomId) -> Option<ClientZustand> {
        self.raum(raum_id)?.lock().client_zustand(session_id)
    }

    pub fn mitglieder_anzahl(&self, raum_id: &RoomId) -> usize {
        self.raum(raum_id).map(|raum| raum.lock().anzahl()).unwrap_or(0)
    }

    pub fn raum_existiert(&self, raum_id: &RoomId) -> bool {
        self.inner.raeume.contains_key(raum_id)
    }

    pub fn ist_registriert(&self, session_id: SessionId) -> bool {
        self.inner.sessions.contains_key(&session_id)
    }

    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    pub fn session_anzahl(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Fuehrt `uebergang` unter der Raum-Sperre aus und reiht den
    /// zurueckgegebenen Plan ein, bevor die Sperre freigegeben wird.
    ///
    /// `None` wenn der Raum nicht existiert.
    pub(crate) fn im_raum<R>(
        &self,
        raum_id: &RoomId,
        uebergang: impl FnOnce(&mut Raum) -> (R, Vec<Zustellung>),
    ) -> Option<R> {
        let raum = self.raum(raum_id)?;
        let mut guard = raum.lock();
        if guard.ist_geschlossen() {
            return None;
        }
        let (ergebnis, plan) = uebergang(&mut guard);
        self.ausliefern(plan);
        Some(ergebnis)
    }

    pub(crate) fn metriken(&self) -> Option<&SignalingMetrics> {
        self.inner.metriken.as_ref()
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn raum(&self, raum_id: &RoomId) -> Option<Arc<Mutex<Raum>>> {
        self.inner.raeume.get(raum_id).map(|eintrag| eintrag.value().clone())
    }

    fn raum_oder_neu(&self, raum_id: &RoomId) -> Arc<Mutex<Raum>> {
        let mut neu_angelegt = false;
        let raum = self
            .inner
            .raeume
            .entry(raum_id.clone())
            .or_insert_with(|| {
                neu_angelegt = true;
                Arc::new(Mutex::new(Raum::neu()))
            })
            .value()
            .clone();
        if neu_angelegt {
            if let Some(m) = &self.inner.metriken {
                m.active_rooms.inc();
            }
            tracing::debug!(raum = %raum_id, "Raum angelegt");
        }
        raum
    }

    fn session_austragen(&self, session_id: SessionId) {
        if self.inner.sessions.remove(&session_id).is_some() {
            if let Some(m) = &self.inner.metriken {
                m.connected_sessions.dec();
            }
        }
    }

    fn ausliefern(&self, plan: Vec<Zustellung>) {
        for zustellung in plan {
            self.zustellen(zustellung.an, zustellung.text);
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn session() -> (SessionId, ClientSender, mpsc::Receiver<String>) {
        let id = SessionId::new();
        let (sender, rx) = ClientSender::neu(id, 16);
        (id, sender, rx)
    }

    fn alle_nachrichten(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut nachrichten = Vec::new();
        while let Ok(n) = rx.try_recv() {
            nachrichten.push(n);
        }
        nachrichten
    }

    #[test]
    fn aufnehmen_und_entfernen() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("101");
        let (a, sender_a, mut rx_a) = session();

        assert!(registry.aufnehmen(a, raum.clone(), sender_a));
        assert!(registry.ist_registriert(a));
        assert_eq!(registry.mitglieder_anzahl(&raum), 1);
        assert_eq!(registry.raum_zustand(&raum), RaumZustand::Impossible);
        assert_eq!(alle_nachrichten(&mut rx_a), vec!["STATE Impossible"]);

        registry.entfernen(a, &raum);
        assert!(!registry.ist_registriert(a));
        assert!(!registry.raum_existiert(&raum));
        assert_eq!(registry.raum_anzahl(), 0);
        assert_eq!(registry.session_anzahl(), 0);
    }

    #[test]
    fn voller_raum_lehnt_ab() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("101");
        let (a, sa, _ra) = session();
        let (b, sb, _rb) = session();
        let (c, sc, mut rc) = session();

        assert!(registry.aufnehmen(a, raum.clone(), sa));
        assert!(registry.aufnehmen(b, raum.clone(), sb));
        assert!(!registry.aufnehmen(c, raum.clone(), sc));

        assert!(!registry.ist_registriert(c));
        assert_eq!(registry.mitglieder_anzahl(&raum), 2);
        assert!(rc.try_recv().is_err(), "Abgelehnte Session bekommt nichts");
    }

    #[test]
    fn zweites_mitglied_meldet_ready_an_beide() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("101");
        let (a, sa, mut ra) = session();
        let (b, sb, mut rb) = session();

        registry.aufnehmen(a, raum.clone(), sa);
        alle_nachrichten(&mut ra);
        registry.aufnehmen(b, raum.clone(), sb);

        assert_eq!(alle_nachrichten(&mut ra), vec!["STATE Ready"]);
        assert_eq!(alle_nachrichten(&mut rb), vec!["STATE Ready"]);
        assert_eq!(
            registry.raum_momentaufnahme(&raum),
            Some((RaumZustand::Ready, vec![a, b]))
        );
    }

    #[test]
    fn zustellen_an_unbekannte_session_ist_noop() {
        let registry = SessionRegistry::neu();
        assert_eq!(registry.zustellen(SessionId::new(), "ICE x".into()), None);
    }

    #[test]
    fn entfernen_unbekannter_session_ist_noop() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("101");
        let (a, sa, _ra) = session();
        registry.aufnehmen(a, raum.clone(), sa);

        registry.entfernen(SessionId::new(), &raum);
        registry.entfernen(SessionId::new(), &RoomId::from("gibt-es-nicht"));
        assert_eq!(registry.mitglieder_anzahl(&raum), 1);
    }

    #[test]
    fn getrennte_raeume_sind_unabhaengig() {
        let registry = SessionRegistry::neu();
        let (a, sa, _ra) = session();
        let (b, sb, _rb) = session();
        registry.aufnehmen(a, RoomId::from("1"), sa);
        registry.aufnehmen(b, RoomId::from("2"), sb);

        assert_eq!(registry.raum_anzahl(), 2);
        assert_eq!(registry.mitglieder_anzahl(&RoomId::from("1")), 1);
        assert_eq!(registry.raum_zustand(&RoomId::from("2")), RaumZustand::Impossible);
    }

    #[test]
    fn metriken_werden_gefuehrt() {
        let metriken = SignalingMetrics::neu().unwrap();
        let registry = SessionRegistry::mit_metriken(metriken.clone());
        let raum = RoomId::from("m");
        let (a, sa, _ra) = session();
        let (b, sb, _rb) = session();
        let (c, sc, _rc) = session();

        registry.aufnehmen(a, raum.clone(), sa);
        registry.aufnehmen(b, raum.clone(), sb);
        registry.aufnehmen(c, raum.clone(), sc);
        assert_eq!(metriken.connected_sessions.get(), 2);
        assert_eq!(metriken.active_rooms.get(), 1);
        assert_eq!(metriken.rejected_admissions_total.get(), 1);

        registry.entfernen(a, &raum);
        registry.entfernen(b, &raum);
        assert_eq!(metriken.connected_sessions.get(), 0);
        assert_eq!(metriken.active_rooms.get(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn gleichzeitige_aufnahmen_ueberschreiten_nie_zwei() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("ansturm");

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let registry = registry.clone();
            let raum = raum.clone();
            tasks.push(tokio::spawn(async move {
                let (id, sender, rx) = session();
                let aufgenommen = registry.aufnehmen(id, raum, sender);
                (aufgenommen, rx)
            }));
        }

        let mut aufgenommen = 0;
        let mut empfaenger = Vec::new();
        for task in tasks {
            let (ok, rx) = task.await.unwrap();
            if ok {
                aufgenommen += 1;
            }
            empfaenger.push(rx);
        }

        assert_eq!(aufgenommen, 2);
        assert_eq!(registry.mitglieder_anzahl(&raum), 2);
        assert_eq!(registry.raum_zustand(&raum), RaumZustand::Ready);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn kommen_und_gehen_haelt_invariante() {
        let registry = SessionRegistry::neu();
        let raum = RoomId::from("wechsel");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            let raum = raum.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let (id, sender, _rx) = session();
                    if registry.aufnehmen(id, raum.clone(), sender) {
                        if let Some((zustand, mitglieder)) = registry.raum_momentaufnahme(&raum) {
                            assert!(mitglieder.len() <= 2);
                            assert_eq!(
                                mitglieder.len() == 2,
                                zustand != RaumZustand::Impossible,
                                "Zustand {zustand} passt nicht zu {} Mitgliedern",
                                mitglieder.len()
                            );
                        }
                        tokio::task::yield_now().await;
                        registry.entfernen(id, &raum);
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(!registry.raum_existiert(&raum));
        assert_eq!(registry.session_anzahl(), 0);
    }
}
