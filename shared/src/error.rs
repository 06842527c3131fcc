use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("Invalid input provided")]
    InvalidInput,
    #[error("Resource not found")]
    NotFound,
    #[error("Forbidden")]
    Forbidden,
    #[error("Store unavailable")]
    StoreUnavailable,
    #[error("Internal system error")]
    SystemError,
}

impl ErrorCode {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::SystemError => 500,
            ErrorCode::StoreUnavailable => 503,
        }
    }
}

/// JSON body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
            status: code.status_code(),
        }
    }
}

#[cfg(feature = "backend")]
mod backend_impl {
    use super::ErrorCode;
    use rocket::http::Status;

    impl From<ErrorCode> for Status {
        fn from(code: ErrorCode) -> Self {
            Status::from_code(code.status_code()).unwrap_or(Status::InternalServerError)
        }
    }
}
