use rocket::data::{self, Data, FromData, Limits};
use rocket::http::Status;
use rocket::request::Request;
use rocket::outcome::Outcome;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::models::SessionIdentity;
use tracing::{debug, error};

use super::{authenticate, Forbidden};
use crate::error::ApiError;
use crate::routes::AppState;
use crate::token::CredentialIssuer;

pub const ACCESS_TOKEN_FIELD: &str = "accessToken";

/// A JSON request body that carried a valid `accessToken`.
///
/// `identity` comes only from the verified token, never from other fields of
/// the body. `body` is the rest of the request decoded as `T`.
#[derive(Debug)]
pub struct Authorized<T> {
    pub identity: SessionIdentity,
    pub body: T,
}

#[derive(Debug, PartialEq)]
pub enum AuthorizeError {
    Forbidden,
    InvalidBody(String),
}

impl From<Forbidden> for AuthorizeError {
    fn from(_: Forbidden) -> Self {
        AuthorizeError::Forbidden
    }
}

impl From<AuthorizeError> for ApiError {
    fn from(err: AuthorizeError) -> Self {
        match err {
            AuthorizeError::Forbidden => ApiError::Forbidden,
            AuthorizeError::InvalidBody(msg) => ApiError::InvalidInput(msg),
        }
    }
}

/// Verifies the token before decoding the rest, so an unauthenticated caller
/// only ever sees `Forbidden`.
pub fn authorize_body<T: DeserializeOwned>(
    issuer: &CredentialIssuer,
    body: &[u8],
) -> Result<Authorized<T>, AuthorizeError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| Forbidden)?;
    let token = value.get(ACCESS_TOKEN_FIELD).and_then(Value::as_str);
    let identity = authenticate(issuer, token)?;

    let body = serde_json::from_value(value).map_err(|e| AuthorizeError::InvalidBody(e.to_string()))?;
    Ok(Authorized { identity, body })
}

#[rocket::async_trait]
impl<'r, T: DeserializeOwned + Send + 'r> FromData<'r> for Authorized<T> {
    type Error = ApiError;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        let Some(state) = req.rocket().state::<AppState>() else {
            error!("AppState is not managed; cannot verify credentials");
            return Outcome::Error((Status::InternalServerError, ApiError::Internal("missing state".into())));
        };

        let limit = req.limits().get("json").unwrap_or(Limits::JSON);
        let bytes = match data.open(limit).into_bytes().await {
            Ok(bytes) if bytes.is_complete() => bytes.into_inner(),
            Ok(_) => {
                debug!("Request body exceeded {} while looking for credentials", limit);
                return Outcome::Error((Status::Forbidden, ApiError::Forbidden));
            }
            Err(e) => {
                debug!("Failed to read request body: {}", e);
                return Outcome::Error((Status::Forbidden, ApiError::Forbidden));
            }
        };

        match authorize_body(&state.issuer, &bytes) {
            Ok(authorized) => Outcome::Success(authorized),
            Err(err) => {
                let err = ApiError::from(err);
                Outcome::Error((Status::from(err.code()), err))
            }
        }
    }
}
