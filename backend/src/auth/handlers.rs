//! Handler functions for authentication-related API endpoints.
//!
//! These functions parse request data and hand it to `UserService` for the
//! registration and login logic.

use std::sync::Arc;

use crate::api::common::ApiError;
use crate::auth::models::*;
use crate::services::user_service::UserService;
use axum::{
    extract::{Extension, Json, rejection::JsonRejection},
    http::StatusCode,
    response::Json as ResponseJson,
};

/// Unreadable bodies are a client mistake, reported like any other validation failure.
fn body_rejection(rejection: JsonRejection) -> ApiError {
    tracing::debug!("Rejected request body: {}", rejection);
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "Request body is not valid JSON for this endpoint",
        "validation_error",
    )
}

/// Handle user registration request
#[axum::debug_handler]
pub async fn register(
    Extension(user_service): Extension<Arc<UserService>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ResponseJson<RegisterResponse>, ApiError> {
    let Json(payload) = payload.map_err(body_rejection)?;
    let user = user_service.register(payload).await?;
    Ok(ResponseJson(RegisterResponse::from(user)))
}

/// Handle user login request
#[axum::debug_handler]
pub async fn login(
    Extension(user_service): Extension<Arc<UserService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ResponseJson<LoginResponse>, ApiError> {
    let Json(payload) = payload.map_err(body_rejection)?;
    let response = user_service.login(payload).await?;
    Ok(ResponseJson(response))
}
