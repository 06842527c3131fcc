use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::error::{ErrorCode, ErrorResponse};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Store unavailable")]
    StoreUnavailable,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Forbidden => ErrorCode::Forbidden,
            ApiError::NotFound(_) => ErrorCode::NotFound,
            ApiError::InvalidInput(_) => ErrorCode::InvalidInput,
            ApiError::StoreUnavailable => ErrorCode::StoreUnavailable,
            ApiError::Internal(_) => ErrorCode::SystemError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let code = self.code();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Request to {} failed: {}", req.uri(), detail);
                "An internal server error occurred.".to_string()
            }
            other => other.to_string(),
        };

        rocket::Response::build_from(Json(ErrorResponse::new(code, message)).respond_to(req)?)
            .status(Status::from(code))
            .ok()
    }
}
