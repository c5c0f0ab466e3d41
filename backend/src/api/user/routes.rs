//! Defines the HTTP routes for user profiles.

use std::sync::Arc;

use super::handlers::{get_user_by_username, me};
use crate::auth::middleware::jwt_auth;
use crate::utils::jwt::TokenCodec;
use axum::{Router, middleware, routing::get};

/// Every user route requires a bearer token.
pub fn user_router(codec: Arc<TokenCodec>) -> Router {
    Router::new()
        .route("/me", get(me))
        .route("/{username}", get(get_user_by_username))
        .route_layer(middleware::from_fn_with_state(codec, jwt_auth))
}
