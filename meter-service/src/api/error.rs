use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use meter_client::{db::StoreError, domain::DomainError};
use serde::Serialize;

const MIB: usize = 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Malformed body or query, or a domain check that failed. The cause is
    /// reported under `details`.
    #[error("Validation failed")]
    Validation(String),
    #[error("Gemini API key required (x-gemini-key header)")]
    MissingApiKey,
    #[error("Image too large. Maximum size is {}MB", .0 / MIB)]
    ImageTooLarge(usize),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Store(StoreError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingApiKey => StatusCode::UNAUTHORIZED,
            ApiError::ImageTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let details = match &self {
            ApiError::Validation(cause) => Some(cause.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingApiKey.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::ImageTooLarge(MIB).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::NotFound("Object").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::Conflict("taken".into())).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn messages() {
        assert_eq!(ApiError::ImageTooLarge(2 * MIB).to_string(), "Image too large. Maximum size is 2MB");
        assert_eq!(ApiError::NotFound("Meter type").to_string(), "Meter type not found");
    }
}
