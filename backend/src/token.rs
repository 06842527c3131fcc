//! Session credentials: compact HS256 tokens binding a participant to a poll.
//!
//! A token is `base64url(header).base64url(claims).base64url(hmac)` where the
//! HMAC-SHA256 covers the first two segments verbatim. Verification checks the
//! signature before looking at anything inside the token.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use serde::{Deserialize, Serialize};
use shared::models::SessionIdentity;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::{AppConfig, ConfigurationError, JWT_SECRET, POLL_DURATION};

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TokenError {
    #[error("claim {0} must not be empty")]
    EmptyClaim(&'static str),
    #[error("token lifetime must be positive")]
    InvalidTtl,
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("unsupported token header")]
    UnsupportedHeader,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
    typ: &'a str,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(rename = "pollID")]
    pub poll_id: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl From<SessionClaims> for SessionIdentity {
    fn from(claims: SessionClaims) -> Self {
        SessionIdentity {
            subject_id: claims.sub,
            poll_id: claims.poll_id,
            display_name: claims.name,
        }
    }
}

/// An issued credential. `token` is what travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub token: String,
    pub claims: SessionClaims,
}

impl SessionCredential {
    pub fn issued_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.claims.iat).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.claims.exp).unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

pub struct CredentialIssuer {
    key: hmac::Key,
    ttl_secs: u64,
}

impl fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl CredentialIssuer {
    pub fn new(secret: &str, ttl_secs: u64) -> Result<Self, ConfigurationError> {
        if secret.trim().is_empty() {
            return Err(ConfigurationError::Missing(JWT_SECRET));
        }
        if ttl_secs == 0 || i64::try_from(ttl_secs).is_err() {
            return Err(ConfigurationError::invalid(POLL_DURATION, "duration must be a positive number of seconds"));
        }

        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            ttl_secs,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigurationError> {
        Self::new(&config.jwt_secret, config.poll_duration)
    }

    /// The configured poll duration, which is also the default credential lifetime.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(
        &self,
        subject_id: &str,
        poll_id: &str,
        display_name: &str,
        ttl_secs: u64,
    ) -> Result<SessionCredential, TokenError> {
        self.issue_at(subject_id, poll_id, display_name, ttl_secs, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        subject_id: &str,
        poll_id: &str,
        display_name: &str,
        ttl_secs: u64,
        now: OffsetDateTime,
    ) -> Result<SessionCredential, TokenError> {
        for (claim, value) in [("sub", subject_id), ("pollID", poll_id), ("name", display_name)] {
            if value.trim().is_empty() {
                return Err(TokenError::EmptyClaim(claim));
            }
        }
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .filter(|ttl| *ttl > 0)
            .ok_or(TokenError::InvalidTtl)?;

        let iat = now.unix_timestamp();
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            poll_id: poll_id.to_string(),
            name: display_name.to_string(),
            iat,
            exp: iat.saturating_add(ttl),
        };

        let header = serde_json::to_vec(&Header { alg: ALGORITHM, typ: TOKEN_TYPE })
            .map_err(|_| TokenError::Malformed)?;
        let payload = serde_json::to_vec(&claims).map_err(|_| TokenError::Malformed)?;

        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(payload));
        let signature = hmac::sign(&self.key, signing_input.as_bytes());
        let token = format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.as_ref()));

        Ok(SessionCredential { token, claims })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Valid up to and including the `exp` second; rejected strictly after it.
    pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<SessionClaims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(TokenError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Malformed)?;
        let signing_input_len = header.len() + 1 + payload.len();
        hmac::verify(&self.key, token[..signing_input_len].as_bytes(), &signature)
            .map_err(|_| TokenError::BadSignature)?;

        let header_bytes = URL_SAFE_NO_PAD.decode(header).map_err(|_| TokenError::Malformed)?;
        let header: Header<'_> = serde_json::from_slice(&header_bytes).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::UnsupportedHeader);
        }

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Malformed)?;
        let claims: SessionClaims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.sub.is_empty() || claims.poll_id.is_empty() || claims.name.is_empty() {
            return Err(TokenError::Malformed);
        }

        if now.unix_timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
