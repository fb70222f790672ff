//! Raum-Zustandsmaschine
//!
//! Ein Raum haelt hoechstens zwei Sessions und einen Verbindungszustand.
//! Alle Uebergaenge sind reine Funktionen auf `Raum` und liefern einen
//! Zustellplan zurueck; die `SessionRegistry` fuehrt sie unter der
//! Raum-Sperre aus und reiht den Plan ein, bevor die Sperre faellt.
//!
//! ## Zustaende
//! ```text
//!              2 Mitglieder           OFFER              ANSWER
//! Impossible ───────────────> Ready ───────> Creating ───────> Active
//!     ^                         |               |                 |
//!     +───────── Mitglied verlaesst den Raum ───+─────────────────+
//! ```
//!
//! ## Reihenfolge der Zustellungen
//! - OFFER: erst STATE an alle, dann das Offer an das andere Mitglied
//! - ANSWER: erst das Answer an das andere Mitglied, dann STATE an alle

use duett_core::SessionId;

use crate::broadcast::{rundruf, Zustellung};
use crate::message::NachrichtenArt;

/// Maximale Mitgliederzahl eines Raums
pub const MAX_MITGLIEDER: usize = 2;

/// Verbindungszustand eines Raums
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RaumZustand {
    /// Weniger als zwei Mitglieder
    Impossible,
    /// Zwei Mitglieder, kein Offer ausstehend
    Ready,
    /// Offer weitergeleitet, Answer ausstehend
    Creating,
    /// Answer weitergeleitet, Verbindung gilt als aufgebaut
    Active,
}

impl RaumZustand {
    pub fn name(self) -> &'static str {
        match self {
            Self::Impossible => "Impossible",
            Self::Ready => "Ready",
            Self::Creating => "Creating",
            Self::Active => "Active",
        }
    }

    /// Ausgehende STATE-Meldung, z.B. `STATE Ready`
    pub fn meldung(self) -> String {
        format!("{} {}", NachrichtenArt::State.token(), self.name())
    }
}

impl std::fmt::Display for RaumZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Handshake-Teilzustand einer Session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientZustand {
    Connected,
    OfferSent,
}

impl std::fmt::Display for ClientZustand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connected => "CONNECTED",
            Self::OfferSent => "OFFER_SENT",
        })
    }
}

#[derive(Debug, Clone)]
struct Mitglied {
    session_id: SessionId,
    zustand: ClientZustand,
}

/// Ein Raum mit Mitgliederliste und Verbindungszustand
#[derive(Debug)]
pub struct Raum {
    /// In Beitrittsreihenfolge
    mitglieder: Vec<Mitglied>,
    zustand: RaumZustand,
    /// Gesetzt sobald der Raum aus der Registry entfernt wird
    geschlossen: bool,
}

impl Raum {
    pub fn neu() -> Self {
        Self {
            mitglieder: Vec::with_capacity(MAX_MITGLIEDER),
            zustand: RaumZustand::Impossible,
            geschlossen: false,
        }
    }

    pub fn zustand(&self) -> RaumZustand {
        self.zustand
    }

    pub fn anzahl(&self) -> usize {
        self.mitglieder.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.mitglieder.is_empty()
    }

    pub fn ist_voll(&self) -> bool {
        self.mitglieder.len() >= MAX_MITGLIEDER
    }

    pub fn ist_mitglied(&self, session_id: SessionId) -> bool {
        self.mitglieder.iter().any(|m| m.session_id == session_id)
    }

    pub fn ist_geschlossen(&self) -> bool {
        self.geschlossen
    }

    pub(crate) fn schliessen(&mut self) {
        self.geschlossen = true;
    }

    /// Session-IDs in Beitrittsreihenfolge
    pub fn mitglieder(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.mitglieder.iter().map(|m| m.session_id)
    }

    /// Das andere Mitglied des Raums (nicht `session_id`)
    pub fn anderes_mitglied(&self, session_id: SessionId) -> Option<SessionId> {
        self.mitglieder().find(|&id| id != session_id)
    }

    pub fn client_zustand(&self, session_id: SessionId) -> Option<ClientZustand> {
        self.mitglieder
            .iter()
            .find(|m| m.session_id == session_id)
            .map(|m| m.zustand)
    }

    /// Nimmt eine Session auf. `None` wenn der Raum voll ist.
    pub fn beitreten(&mut self, session_id: SessionId) -> Option<Vec<Zustellung>> {
        if self.ist_voll() {
            return None;
        }
        self.mitglieder.push(Mitglied {
            session_id,
            zustand: ClientZustand::Connected,
        });
        Some(self.neu_berechnen())
    }

    /// Entfernt eine Session.
    ///
    /// Bleibt ein Mitglied uebrig, werden alle Teilzustaende zurueckgesetzt
    /// und der Raum neu berechnet. Ein leerer Raum erzeugt keine Zustellung.
    pub fn verlassen(&mut self, session_id: SessionId) -> Vec<Zustellung> {
        let vorher = self.mitglieder.len();
        self.mitglieder.retain(|m| m.session_id != session_id);
        if self.mitglieder.len() == vorher {
            return Vec::new();
        }
        if self.mitglieder.is_empty() {
            self.zustand = RaumZustand::Impossible;
            return Vec::new();
        }

        self.zustand = RaumZustand::Impossible;
        for mitglied in &mut self.mitglieder {
            mitglied.zustand = ClientZustand::Connected;
        }
        self.neu_berechnen()
    }

    /// Setzt den Zustand aus der Mitgliederzahl und meldet ihn an alle
    pub fn neu_berechnen(&mut self) -> Vec<Zustellung> {
        self.zustand = if self.mitglieder.len() == MAX_MITGLIEDER {
            RaumZustand::Ready
        } else {
            RaumZustand::Impossible
        };
        self.zustand_rundruf()
    }

    /// OFFER von `von`. `None` wenn der Raum nicht `Ready` ist.
    pub fn offer(&mut self, von: SessionId, text: &str) -> Option<Vec<Zustellung>> {
        if self.zustand != RaumZustand::Ready || !self.ist_mitglied(von) {
            return None;
        }
        self.zustand = RaumZustand::Creating;

        let mut plan = self.zustand_rundruf();
        if let Some(anderes) = self.anderes_mitglied(von) {
            plan.push(Zustellung::neu(anderes, text));
        }
        self.teilzustand_setzen(von, ClientZustand::OfferSent);
        Some(plan)
    }

    /// ANSWER von `von`. `None` wenn der Raum nicht `Creating` ist.
    pub fn answer(&mut self, von: SessionId, text: &str) -> Option<Vec<Zustellung>> {
        if self.zustand != RaumZustand::Creating || !self.ist_mitglied(von) {
            return None;
        }

        let mut plan = Vec::with_capacity(1 + MAX_MITGLIEDER);
        if let Some(anderes) = self.anderes_mitglied(von) {
            plan.push(Zustellung::neu(anderes, text));
        }
        self.zustand = RaumZustand::Active;
        self.teilzustand_setzen(von, ClientZustand::Connected);
        plan.extend(self.zustand_rundruf());
        Some(plan)
    }

    /// ICE von `von`, zustandsunabhaengig. `None` ohne zweites Mitglied.
    pub fn ice(&self, von: SessionId, text: &str) -> Option<Zustellung> {
        if !self.ist_mitglied(von) {
            return None;
        }
        self.anderes_mitglied(von)
            .map(|anderes| Zustellung::neu(anderes, text))
    }

    fn zustand_rundruf(&self) -> Vec<Zustellung> {
        rundruf(self.mitglieder(), &self.zustand.meldung())
    }

    fn teilzustand_setzen(&mut self, session_id: SessionId, zustand: ClientZustand) {
        if let Some(m) = self
            .mitglieder
            .iter_mut()
            .find(|m| m.session_id == session_id)
        {
            m.zustand = zustand;
        }
    }
}

impl Default for Raum {
    fn default() -> Self {
        Self::neu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raum_mit_zwei() -> (Raum, SessionId, SessionId) {
        let mut raum = Raum::neu();
        let a = SessionId::new();
        let b = SessionId::new();
        raum.beitreten(a).unwrap();
        raum.beitreten(b).unwrap();
        (raum, a, b)
    }

    /// Mitgliederzahl und Zustand muessen zusammenpassen
    fn invariante_pruefen(raum: &Raum) {
        assert!(raum.anzahl() <= MAX_MITGLIEDER);
        if raum.anzahl() == MAX_MITGLIEDER {
            assert_ne!(raum.zustand(), RaumZustand::Impossible);
        } else {
            assert_eq!(raum.zustand(), RaumZustand::Impossible);
        }
    }

    #[test]
    fn zustand_meldung_format() {
        assert_eq!(RaumZustand::Ready.meldung(), "STATE Ready");
        assert_eq!(RaumZustand::Impossible.meldung(), "STATE Impossible");
        assert_eq!(ClientZustand::OfferSent.to_string(), "OFFER_SENT");
    }

    #[test]
    fn erstes_mitglied_bekommt_impossible() {
        let mut raum = Raum::neu();
        let a = SessionId::new();
        let plan = raum.beitreten(a).unwrap();
        assert_eq!(plan, vec![Zustellung::neu(a, "STATE Impossible")]);
        invariante_pruefen(&raum);
    }

    #[test]
    fn zweites_mitglied_macht_raum_ready() {
        let mut raum = Raum::neu();
        let a = SessionId::new();
        let b = SessionId::new();
        raum.beitreten(a).unwrap();
        let plan = raum.beitreten(b).unwrap();

        assert_eq!(raum.zustand(), RaumZustand::Ready);
        assert_eq!(
            plan,
            vec![Zustellung::neu(a, "STATE Ready"), Zustellung::neu(b, "STATE Ready")]
        );
        invariante_pruefen(&raum);
    }

    #[test]
    fn dritter_wird_abgelehnt() {
        let (mut raum, a, b) = raum_mit_zwei();
        assert!(raum.beitreten(SessionId::new()).is_none());
        assert_eq!(raum.mitglieder().collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(raum.zustand(), RaumZustand::Ready);
    }

    #[test]
    fn offer_rundruf_vor_weiterleitung() {
        let (mut raum, a, b) = raum_mit_zwei();
        let plan = raum.offer(a, "OFFER sdp=abc").unwrap();

        assert_eq!(
            plan,
            vec![
                Zustellung::neu(a, "STATE Creating"),
                Zustellung::neu(b, "STATE Creating"),
                Zustellung::neu(b, "OFFER sdp=abc"),
            ]
        );
        assert_eq!(raum.zustand(), RaumZustand::Creating);
        assert_eq!(raum.client_zustand(a), Some(ClientZustand::OfferSent));
        assert_eq!(raum.client_zustand(b), Some(ClientZustand::Connected));
    }

    #[test]
    fn offer_ausserhalb_ready_wird_verworfen() {
        let mut raum = Raum::neu();
        let a = SessionId::new();
        raum.beitreten(a).unwrap();
        assert!(raum.offer(a, "OFFER x").is_none());
        assert_eq!(raum.zustand(), RaumZustand::Impossible);

        let (mut raum, a, b) = raum_mit_zwei();
        raum.offer(a, "OFFER 1").unwrap();
        assert!(raum.offer(b, "OFFER 2").is_none(), "doppeltes Offer");
        assert_eq!(raum.zustand(), RaumZustand::Creating);
        assert_eq!(raum.client_zustand(b), Some(ClientZustand::Connected));
    }

    #[test]
    fn answer_weiterleitung_vor_rundruf() {
        let (mut raum, a, b) = raum_mit_zwei();
        raum.offer(a, "OFFER sdp=abc").unwrap();
        let plan = raum.answer(b, "ANSWER sdp=xyz").unwrap();

        assert_eq!(
            plan,
            vec![
                Zustellung::neu(a, "ANSWER sdp=xyz"),
                Zustellung::neu(a, "STATE Active"),
                Zustellung::neu(b, "STATE Active"),
            ]
        );
        assert_eq!(raum.zustand(), RaumZustand::Active);
        assert_eq!(raum.client_zustand(b), Some(ClientZustand::Connected));
    }

    #[test]
    fn answer_ausserhalb_creating_wird_verworfen() {
        let (mut raum, _a, b) = raum_mit_zwei();
        assert!(raum.answer(b, "ANSWER x").is_none());
        assert_eq!(raum.zustand(), RaumZustand::Ready);
    }

    #[test]
    fn ice_nur_mit_zweitem_mitglied() {
        let mut raum = Raum::neu();
        let a = SessionId::new();
        raum.beitreten(a).unwrap();
        assert!(raum.ice(a, "ICE cand=1").is_none());

        let b = SessionId::new();
        raum.beitreten(b).unwrap();
        assert_eq!(raum.ice(a, "ICE cand=1"), Some(Zustellung::neu(b, "ICE cand=1")));
        assert_eq!(raum.zustand(), RaumZustand::Ready, "ICE aendert den Zustand nicht");
    }

    #[test]
    fn fremde_session_wird_ignoriert() {
        let (mut raum, _a, _b) = raum_mit_zwei();
        let fremd = SessionId::new();
        assert!(raum.offer(fremd, "OFFER x").is_none());
        assert!(raum.ice(fremd, "ICE x").is_none());
        assert!(raum.verlassen(fremd).is_empty());
        assert_eq!(raum.anzahl(), 2);
    }

    #[test]
    fn verlassen_setzt_zurueck() {
        let (mut raum, a, b) = raum_mit_zwei();
        raum.offer(a, "OFFER sdp=abc").unwrap();

        let plan = raum.verlassen(b);
        assert_eq!(plan, vec![Zustellung::neu(a, "STATE Impossible")]);
        assert_eq!(raum.client_zustand(a), Some(ClientZustand::Connected));
        invariante_pruefen(&raum);

        assert!(raum.verlassen(a).is_empty());
        assert!(raum.ist_leer());
    }

    #[test]
    fn wiederbeitritt_nach_verlassen() {
        let (mut raum, a, b) = raum_mit_zwei();
        raum.offer(a, "OFFER 1").unwrap();
        raum.answer(b, "ANSWER 1").unwrap();
        raum.verlassen(a);

        let c = SessionId::new();
        raum.beitreten(c).unwrap();
        assert_eq!(raum.zustand(), RaumZustand::Ready);
        assert_eq!(raum.anderes_mitglied(c), Some(b));
        invariante_pruefen(&raum);
    }
}
