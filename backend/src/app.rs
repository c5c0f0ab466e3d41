//! Assembles the HTTP application from its collaborators.

use std::sync::Arc;

use axum::{Extension, Router, response::Json, routing::get};
use tower_http::normalize_path::NormalizePath;

use crate::api::common::{ApiResponse, method_not_allowed, route_not_found};
use crate::middleware::{LayerSettings, apply_layers};
use crate::services::user_service::UserService;
use crate::utils::jwt::TokenCodec;
use crate::{api, auth};

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The served application. Trailing and doubled leading slashes are trimmed
/// before routing, so `/user/me/` and `//user/me` reach `/user/me`.
pub type App = NormalizePath<Router>;

pub fn build_app(
    user_service: Arc<UserService>,
    codec: Arc<TokenCodec>,
    settings: &LayerSettings,
) -> App {
    let router = Router::new()
        .route("/", get(root_handler))
        .nest("/auth", auth::routes::auth_router())
        .nest("/user", api::user::routes::user_router(codec))
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(Extension(user_service));

    NormalizePath::trim_trailing_slash(apply_layers(router, settings))
}

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(
        serde_json::json!({
            "service": SERVICE_NAME,
            "version": SERVICE_VERSION
        }),
        "Welcome to the authgate API",
    ))
}
