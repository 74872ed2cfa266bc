//! Identity of the signed-in user, passed explicitly to whatever needs it.
//!
//! The bearer token is decoded only to learn the `sub` claim. The signature
//! is not verified: the result is a display hint for action availability and
//! the backend remains the enforcement point.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("token is empty")]
    Empty,
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("token payload could not be decoded: {0}")]
    Decode(String),
    #[error("token payload has no usable `sub` claim")]
    MissingSubject,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct Session {
    token: SecretString,
    user_id: UserId,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_token(token: SecretString) -> Result<Self, SessionError> {
        let claims = decode_claims(token.expose_secret())?;

        let user_id = match claims.sub {
            Some(Value::String(sub)) if !sub.trim().is_empty() => UserId(sub),
            Some(Value::Number(sub)) => UserId(sub.to_string()),
            _ => return Err(SessionError::MissingSubject),
        };
        let expires_at = claims.exp.and_then(|exp| Utc.timestamp_opt(exp, 0).single());

        Ok(Self { token, user_id, expires_at })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

fn decode_claims(token: &str) -> Result<Claims, SessionError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SessionError::Empty);
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionError::Malformed);
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|error| SessionError::Decode(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| SessionError::Decode(error.to_string()))
}

#[cfg(test)]
pub(crate) fn unsigned_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}
