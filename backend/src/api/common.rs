//! Error handling utilities for API responses.
//!
//! Provides the standard response envelope and the conversion between
//! service-layer errors and HTTP responses.
//!
//! # Response Format
//! All errors return consistent JSON responses containing:
//! - `message`: Human-readable message
//! - `error.error_type`: Machine-readable error category
//!
//! # Error Handling Flow
//! 1. Service layer returns domain-specific `ServiceError`
//! 2. `service_error_to_http` converts to an `ApiError` with the right status
//! 3. `ApiError` renders itself; if encoding fails a fixed body is sent instead

use crate::errors::ServiceError;
use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Sent when the error envelope itself cannot be encoded.
const FALLBACK_ERROR_BODY: &str =
    r#"{"success":false,"message":"Internal server error","error":{"error_type":"internal_error"}}"#;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Indicates if the request was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Human-readable message
    pub message: String,
    /// Error details (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    /// Request timestamp
    pub timestamp: String,
}

/// Error details for failed requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error type identifier
    pub error_type: String,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create an error response
    pub fn error(message: impl Into<String>, error_type: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: message.into(),
            error: Some(ErrorDetails {
                error_type: error_type.into(),
            }),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// An error ready to be written to the client.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ApiResponse<()>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, error_type: &str) -> Self {
        Self {
            status,
            body: ApiResponse::<()>::error(message, error_type),
        }
    }

    /// The one 401 every authentication failure collapses to.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", "unauthorized")
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
            "internal_error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match serde_json::to_string(&self.body) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to encode error response: {}", e);
                FALLBACK_ERROR_BODY.to_string()
            }
        };

        (
            self.status,
            [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        service_error_to_http(error)
    }
}

/// Converts ServiceError to appropriate HTTP response with standard format
pub fn service_error_to_http(error: ServiceError) -> ApiError {
    match error {
        ServiceError::Validation { message } => {
            ApiError::new(StatusCode::BAD_REQUEST, message, "validation_error")
        }
        ServiceError::NotFound { entity, identifier } => ApiError::new(
            StatusCode::NOT_FOUND,
            format!("{} '{}' not found", entity, identifier),
            "not_found",
        ),
        ServiceError::AlreadyExists { entity, identifier } => ApiError::new(
            StatusCode::CONFLICT,
            format!("{} with this {} already exists", entity, identifier),
            "already_exists",
        ),
        ServiceError::Authentication => ApiError::unauthorized(),
        ServiceError::Internal { message } => {
            tracing::error!("Internal error: {}", message);
            ApiError::internal()
        }
    }
}

/// Fallback for unknown routes
pub async fn route_not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "route not found", "route_not_found")
}

/// Fallback for known routes hit with the wrong method
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "method is not valid",
        "method_not_allowed",
    )
}
