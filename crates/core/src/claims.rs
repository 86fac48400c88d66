//! Advisory decoding of bearer token payloads.
//!
//! The signature is NOT verified here. The decoded role and name only pick
//! which pages to offer; the API re-checks every request.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{Role, UserId};

/// Why a token payload could not be read.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("token payload is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// What the client reads out of a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: Option<UserId>,
    pub role: Role,
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Claims {
    /// Decode the payload segment of a JWT.
    ///
    /// Accepts both the URL-safe and the standard base64 alphabet, with or
    /// without padding.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError`] when the token does not have three segments or
    /// its payload is not base64-encoded JSON.
    pub fn decode(token: &str) -> Result<Self, ClaimsError> {
        let mut segments = token.trim().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ClaimsError::Malformed);
        };

        let payload = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))?;
        let raw: RawClaims = serde_json::from_slice(&bytes)?;

        Ok(Self {
            user_id: raw.id.or(raw.sub).map(UserId::new),
            role: raw.role.as_deref().map_or(Role::User, Role::from_claim),
            name: raw.nome.filter(|n| !n.trim().is_empty()),
            expires_at: raw.exp.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        })
    }

    /// Whether `exp` lies at or before `now`. Tokens without `exp` never
    /// expire client-side.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}
