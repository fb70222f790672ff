//! Signaling-Nachrichten – Einmaliges Parsen eingehender Text-Frames
//!
//! Ein Frame hat die Form `<TYP><optionaler Trenner><Nutzdaten>`. Der Typ
//! wird per exaktem, gross-/kleinschreibungssensitivem Praefix erkannt.
//! Die Nutzdaten werden nie interpretiert; weitergeleitet wird immer der
//! komplette Originaltext.

/// Typ einer Signaling-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NachrichtenArt {
    /// Abfrage des aktuellen Raum-Zustands
    State,
    /// SDP-Offer
    Offer,
    /// SDP-Answer
    Answer,
    /// ICE-Kandidat
    Ice,
}

impl NachrichtenArt {
    /// Alle Typen in Pruefreihenfolge
    pub const ALLE: [NachrichtenArt; 4] = [Self::State, Self::Offer, Self::Answer, Self::Ice];

    /// Typ-Token auf dem Draht
    pub fn token(self) -> &'static str {
        match self {
            Self::State => "STATE",
            Self::Offer => "OFFER",
            Self::Answer => "ANSWER",
            Self::Ice => "ICE",
        }
    }

    /// Label fuer Metriken
    pub fn label(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Ice => "ice",
        }
    }
}

impl std::fmt::Display for NachrichtenArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

/// Geparste eingehende Nachricht
///
/// Haelt den Originaltext, damit Relays byte-genau weiterleiten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingNachricht<'a> {
    pub art: NachrichtenArt,
    pub text: &'a str,
}

impl<'a> SignalingNachricht<'a> {
    /// Klassifiziert einen Text-Frame. `None` bei unbekanntem Typ.
    pub fn parsen(text: &'a str) -> Option<Self> {
        NachrichtenArt::ALLE
            .into_iter()
            .find(|art| text.starts_with(art.token()))
            .map(|art| Self { art, text })
    }

    /// Alles nach dem Typ-Token (inklusive eines eventuellen Trenners)
    pub fn nutzdaten(&self) -> &'a str {
        &self.text[self.art.token().len()..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alle_typen_werden_erkannt() {
        let faelle = [
            ("STATE", NachrichtenArt::State),
            ("OFFER sdp=abc", NachrichtenArt::Offer),
            ("ANSWER sdp=xyz", NachrichtenArt::Answer),
            ("ICE cand=1", NachrichtenArt::Ice),
        ];
        for (text, erwartet) in faelle {
            let nachricht = SignalingNachricht::parsen(text).expect("Typ muss erkannt werden");
            assert_eq!(nachricht.art, erwartet);
            assert_eq!(nachricht.text, text, "Originaltext bleibt unveraendert");
        }
    }

    #[test]
    fn unbekannter_typ_wird_ignoriert() {
        assert!(SignalingNachricht::parsen("HELLO").is_none());
        assert!(SignalingNachricht::parsen("").is_none());
        assert!(SignalingNachricht::parsen(" OFFER").is_none());
    }

    #[test]
    fn praefix_ist_case_sensitiv() {
        assert!(SignalingNachricht::parsen("offer sdp=abc").is_none());
        assert!(SignalingNachricht::parsen("Ice cand=1").is_none());
    }

    #[test]
    fn trenner_ist_optional() {
        let ohne = SignalingNachricht::parsen("OFFER{\"sdp\":1}").unwrap();
        assert_eq!(ohne.art, NachrichtenArt::Offer);
        assert_eq!(ohne.nutzdaten(), "{\"sdp\":1}");

        let mit = SignalingNachricht::parsen("ICE cand=1").unwrap();
        assert_eq!(mit.nutzdaten(), " cand=1");
    }
}
