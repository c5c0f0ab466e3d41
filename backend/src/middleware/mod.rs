//! Cross-cutting HTTP layers wrapped around the router.
//!
//! Outermost first: panic recovery, request tracing, timeout, global
//! concurrency ceiling, CORS, per-client rate limiting. Bearer token checks
//! sit inside all of these, on the protected routes only.

pub mod rate_limit;
pub mod throttle;

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{
        HeaderName, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LINK},
    },
    middleware,
    response::{IntoResponse, Response},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api::common::ApiError;
use crate::config::Config;
use rate_limit::{RateLimiter, rate_limit};
use throttle::{Throttle, throttle};

/// Settings for the layer stack, usually taken from `Config`.
#[derive(Debug, Clone)]
pub struct LayerSettings {
    pub rate_limit_per_minute: u32,
    pub request_timeout: Duration,
    pub max_in_flight_requests: usize,
    /// How many requests may queue for an in-flight slot.
    pub throttle_backlog: usize,
    /// How long a request may queue for an in-flight slot.
    pub throttle_backlog_wait: Duration,
}

impl From<&Config> for LayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            rate_limit_per_minute: config.rate_limit_per_minute,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            max_in_flight_requests: config.max_in_flight_requests,
            throttle_backlog: config.throttle_backlog,
            throttle_backlog_wait: Duration::from_secs(throttle::DEFAULT_BACKLOG_WAIT_SECS),
        }
    }
}

/// Wraps `router` in the full layer stack.
pub fn apply_layers(router: Router, settings: &LayerSettings) -> Router {
    let limiter = Arc::new(RateLimiter::per_minute(settings.rate_limit_per_minute));
    let in_flight = Arc::new(Throttle::new(
        settings.max_in_flight_requests,
        settings.throttle_backlog,
        settings.throttle_backlog_wait,
    ));

    router
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(cors_layer())
        .layer(middleware::from_fn_with_state(in_flight, throttle))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            settings.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([
            ACCEPT,
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .expose_headers([LINK])
        .max_age(Duration::from_secs(300))
}

/// Turns a handler panic into a bare 500. The payload is logged, never sent.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };
    tracing::error!("Request handler panicked: {}", detail);

    ApiError::internal().into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn settings(limit: u32) -> LayerSettings {
        LayerSettings {
            rate_limit_per_minute: limit,
            request_timeout: Duration::from_secs(5),
            max_in_flight_requests: 4,
            throttle_backlog: 4,
            throttle_backlog_wait: Duration::from_secs(1),
        }
    }

    async fn panicking_handler() -> &'static str {
        panic!("secret internal state")
    }

    #[tokio::test]
    async fn test_panic_becomes_opaque_500() {
        let app = apply_layers(
            Router::new().route("/boom", get(panicking_handler)),
            &settings(100),
        );

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("Internal server error"));
        assert!(!body.contains("secret internal state"));
    }

    #[tokio::test]
    async fn test_rate_limit_applies_before_handlers() {
        let app = apply_layers(Router::new().route("/", get(|| async { "ok" })), &settings(2));

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/")
                        .header("X-Real-IP", "9.9.9.9")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                assert!(response.headers().contains_key("retry-after"));
            }
            statuses.push(response.status());
        }

        assert_eq!(
            statuses,
            vec![StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
