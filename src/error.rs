use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TodoAnalyticsError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("AI request failed: {0}")]
    Upstream(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TodoAnalyticsError>;

impl TodoAnalyticsError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) | Self::Upstream(_) | Self::Serialization(_) | Self::Runtime(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for TodoAnalyticsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = match self {
            Self::Validation { field, message } => ErrorResponse {
                error: message,
                field: Some(field),
            },
            other => ErrorResponse {
                error: other.to_string(),
                field: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_status_codes() {
        let err = TodoAnalyticsError::Config("x".to_string());
        assert!(format!("{err}").contains("configuration error"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = TodoAnalyticsError::Upstream("timed out".to_string());
        assert_eq!(err.to_string(), "AI request failed: timed out");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = TodoAnalyticsError::validation("title", "This field is required.");
        assert_eq!(err.to_string(), "title: This field is required.");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = TodoAnalyticsError::NotFound("Not found.".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_body_carries_field() {
        let response =
            TodoAnalyticsError::validation("title", "This field may not be blank.").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
