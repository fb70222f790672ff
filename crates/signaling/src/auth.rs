//! Header-Authentifizierung und Rollen-Richtlinie
//!
//! Ein vorgelagertes Gateway setzt `X-Member-Id` und `X-ROLE`. Die
//! `auth_middleware` macht daraus einen `Principal`, die
//! `rollen_middleware` laesst nur erlaubte Rollen zum Signaling-Endpunkt.
//! Der Signaling-Kern selbst sieht weder Identitaet noch Rolle.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use duett_core::{CoreError, CoreResult};
use serde_json::json;
use std::sync::Arc;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const ROLLE_HEADER: &str = "x-role";

/// Authentifizierter Aufrufer (als Request-Extension gespeichert)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub member_id: String,
    pub rolle: String,
}

impl Principal {
    /// Liest den Principal aus den Headern; beide muessen gesetzt sein
    pub fn aus_headern(headers: &HeaderMap) -> Option<Self> {
        let member_id = header_wert(headers, MEMBER_ID_HEADER)?;
        let rolle = header_wert(headers, ROLLE_HEADER)?;
        Some(Self {
            member_id: member_id.to_string(),
            rolle: rolle.to_string(),
        })
    }
}

fn header_wert<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Fehlerantwort im Format `{"error": {"code", "message"}}`
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": nachricht
            }
        })),
    )
        .into_response()
}

/// Axum-Middleware: haengt einen `Principal` an, falls die Header da sind
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Response {
    if let Some(principal) = Principal::aus_headern(req.headers()) {
        tracing::trace!(
            member_id = %principal.member_id,
            rolle = %principal.rolle,
            "Principal erkannt"
        );
        req.extensions_mut().insert(principal);
    }
    next.run(req).await
}

/// Erlaubte Rollen fuer den Signaling-Endpunkt
#[derive(Debug, Clone)]
pub struct RollenRichtlinie {
    erlaubt: Arc<Vec<String>>,
}

impl RollenRichtlinie {
    pub fn neu(rollen: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            erlaubt: Arc::new(rollen.into_iter().map(Into::into).collect()),
        }
    }

    /// Prueft einen (optionalen) Principal gegen die Richtlinie
    pub fn pruefen(&self, principal: Option<&Principal>) -> CoreResult<()> {
        let principal = principal
            .ok_or_else(|| CoreError::Authentifizierung("Nicht authentifiziert".into()))?;
        if self.erlaubt.iter().any(|r| *r == principal.rolle) {
            Ok(())
        } else {
            Err(CoreError::ZugriffVerweigert(format!(
                "Rolle '{}' nicht erlaubt",
                principal.rolle
            )))
        }
    }
}

/// Axum-Middleware: 401 ohne Principal, 403 bei nicht erlaubter Rolle
pub async fn rollen_middleware(
    State(richtlinie): State<RollenRichtlinie>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match richtlinie.pruefen(req.extensions().get::<Principal>()) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            let status = match e {
                CoreError::Authentifizierung(_) => StatusCode::UNAUTHORIZED,
                _ => StatusCode::FORBIDDEN,
            };
            tracing::debug!(pfad = %req.uri().path(), fehler = %e, "Zugriff abgelehnt");
            fehler_antwort(status, &e.to_string())
        }
    }
}
