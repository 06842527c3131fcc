//! Credential checks for both transports.
//!
//! The request path ([`request::Authorized`]) and the stream path
//! ([`stream::StreamGuard`]) both go through [`authenticate`], so a token
//! decodes to the same identity whichever way it arrives. Every failure
//! collapses into [`Forbidden`]; callers never learn which check failed.

pub mod request;
pub mod stream;

use shared::models::SessionIdentity;
use thiserror::Error;
use tracing::debug;

use crate::token::CredentialIssuer;

/// Close reason sent to a rejected persistent connection.
pub const FORBIDDEN_REASON: &str = "FORBIDDEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Forbidden")]
pub struct Forbidden;

pub fn authenticate(issuer: &CredentialIssuer, token: Option<&str>) -> Result<SessionIdentity, Forbidden> {
    let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) else {
        debug!("No session credential presented");
        return Err(Forbidden);
    };

    issuer
        .verify(token)
        .map(SessionIdentity::from)
        .map_err(|err| {
            debug!("Session credential rejected: {}", err);
            Forbidden
        })
}
