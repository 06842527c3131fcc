use rocket::request::{FromRequest, Outcome, Request};
use serde::Deserialize;
use shared::models::SessionIdentity;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::{authenticate, FORBIDDEN_REASON};
use crate::token::CredentialIssuer;

/// Header consulted when the handshake packet has no `auth.token`.
pub const TOKEN_HEADER: &str = "token";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakeAuth {
    #[serde(default)]
    pub token: Option<String>,
}

/// First frame a client sends on a persistent connection: `{"auth": {"token": "..."}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HandshakePacket {
    #[serde(default)]
    pub auth: Option<HandshakeAuth>,
}

/// Everything the guard may look at for one connection attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Handshake {
    pub auth_token: Option<String>,
    pub header_token: Option<String>,
}

impl Handshake {
    pub fn new(packet: Option<HandshakePacket>, header_token: Option<String>) -> Self {
        Self {
            auth_token: packet.and_then(|p| p.auth).and_then(|auth| auth.token),
            header_token,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct HandshakeRejection {
    pub reason: &'static str,
}

impl HandshakeRejection {
    pub fn forbidden() -> Self {
        Self { reason: FORBIDDEN_REASON }
    }
}

/// Admits or refuses persistent connections. Only does the in-memory
/// signature check, so it never stalls the handshake path.
#[derive(Debug, Clone)]
pub struct StreamGuard {
    issuer: Arc<CredentialIssuer>,
    allow_header_token: bool,
}

impl StreamGuard {
    pub fn new(issuer: Arc<CredentialIssuer>, allow_header_token: bool) -> Self {
        Self { issuer, allow_header_token }
    }

    pub fn allows_header_token(&self) -> bool {
        self.allow_header_token
    }

    pub fn admit(&self, handshake: &Handshake) -> Result<SessionIdentity, HandshakeRejection> {
        let primary = handshake.auth_token.as_deref().filter(|t| !t.trim().is_empty());
        let token = match primary {
            Some(token) => Some(token),
            None if self.allow_header_token => handshake.header_token.as_deref(),
            None => {
                if handshake.header_token.is_some() {
                    debug!("Ignoring {} header: header credentials are disabled", TOKEN_HEADER);
                }
                None
            }
        };

        authenticate(&self.issuer, token).map_err(|_| HandshakeRejection::forbidden())
    }
}

/// The `token` header of the upgrade request, if any. Always succeeds.
#[derive(Debug, Clone, Default)]
pub struct HeaderToken(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for HeaderToken {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = req.headers().get_one(TOKEN_HEADER).map(str::to_string);
        Outcome::Success(HeaderToken(token))
    }
}
