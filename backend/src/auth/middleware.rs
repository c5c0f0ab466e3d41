//! Middleware for protecting authenticated routes.
//!
//! Validates the bearer token on each request and attaches the resolved
//! `Identity` to the request extensions. Any failure ends the request with
//! the same 401 before the wrapped handler runs.

use std::sync::Arc;

use crate::api::common::ApiError;
use crate::utils::jwt::{Identity, TokenCodec, TokenError};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};

const BEARER_PREFIX: &str = "Bearer ";

/// Why a request never reached its handler.
#[derive(Debug)]
pub enum AuthRejection {
    MissingHeader,
    NotBearer,
    InvalidToken(TokenError),
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthRejection::MissingHeader)?;

    let token = auth_header
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(AuthRejection::NotBearer)?;

    if token.is_empty() {
        return Err(AuthRejection::NotBearer);
    }
    Ok(token)
}

/// Resolves the caller's identity from the request headers.
pub fn authenticate(codec: &TokenCodec, headers: &HeaderMap) -> Result<Identity, AuthRejection> {
    let token = bearer_token(headers)?;
    codec.validate(token).map_err(AuthRejection::InvalidToken)
}

/// JWT authentication middleware
pub async fn jwt_auth(
    State(codec): State<Arc<TokenCodec>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&codec, request.headers()) {
        Ok(identity) => {
            // Add identity to request extensions for use in handlers
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => {
            match &rejection {
                AuthRejection::InvalidToken(TokenError::Expired) => {
                    tracing::debug!("Rejected request: token expired")
                }
                AuthRejection::InvalidToken(error) => {
                    tracing::warn!("Rejected request: {}", error)
                }
                other => tracing::debug!("Rejected request: {:?}", other),
            }
            ApiError::unauthorized().into_response()
        }
    }
}
