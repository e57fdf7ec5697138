//! Error envelope returned by every failing route.

use axum::{
    extract::rejection::JsonRejection,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};

use super::types::ErrorResponse;
use crate::agents::AgentError;

/// Header carrying the classification tag.
pub static ERROR_TYPE_HEADER: HeaderName = HeaderName::from_static("x-error-type");

/// Failures surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Agent not initialized")]
    AgentNotInitialized,

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("{0}")]
    Validation(String),

    #[error("Not Found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AgentNotInitialized | Self::Agent(_) | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::AgentNotInitialized => "AgentNotInitialized",
            Self::Agent(e) => e.kind(),
            Self::Validation(_) => "ValidationError",
            Self::NotFound => "NotFound",
            Self::Internal => "InternalServerError",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_type = self.error_type();
        let body = ErrorResponse {
            detail: self.to_string(),
            error_type: error_type.to_string(),
        };
        (
            self.status(),
            [(ERROR_TYPE_HEADER.clone(), HeaderValue::from_static(error_type))],
            Json(body),
        )
            .into_response()
    }
}
