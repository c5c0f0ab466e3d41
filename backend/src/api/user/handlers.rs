//! Handler functions for user profile endpoints.

use std::sync::Arc;

use crate::api::common::ApiError;
use crate::api::user::models::{PublicProfile, UserProfile};
use crate::services::user_service::UserService;
use crate::utils::jwt::Identity;
use axum::extract::{Extension, Json, Path};

/// Profile of the caller, resolved from the bearer token.
#[axum::debug_handler]
pub async fn me(
    Extension(user_service): Extension<Arc<UserService>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = user_service.current_user(&identity).await?;
    Ok(Json(profile))
}

/// Public profile (username and description) of any user, by username.
#[axum::debug_handler]
pub async fn get_user_by_username(
    Extension(user_service): Extension<Arc<UserService>>,
    Path(username): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    tracing::debug!("Looking up public profile for {}", username);

    let profile = user_service.public_profile(&username).await?;
    Ok(Json(profile))
}
