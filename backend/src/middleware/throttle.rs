//! Global ceiling on requests being processed at once.
//!
//! Requests over the ceiling queue for a slot. The queue itself is bounded:
//! when it is full, or a queued request waits too long, the answer is 503.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::api::common::ApiError;

pub const DEFAULT_BACKLOG_WAIT_SECS: u64 = 10;

#[derive(Debug)]
pub struct Throttle {
    slots: Arc<Semaphore>,
    backlog: Arc<Semaphore>,
    backlog_wait: Duration,
}

impl Throttle {
    pub fn new(max_in_flight: usize, backlog: usize, backlog_wait: Duration) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            backlog: Arc::new(Semaphore::new(backlog)),
            backlog_wait,
        }
    }

    /// Free in-flight slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Free places in the wait queue.
    pub fn backlog_available(&self) -> usize {
        self.backlog.available_permits()
    }

    /// Takes an in-flight slot, queueing for one if none is free.
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        if let Ok(permit) = self.slots.clone().try_acquire_owned() {
            return Some(permit);
        }

        let _queued = self.backlog.clone().try_acquire_owned().ok()?;
        tokio::time::timeout(self.backlog_wait, self.slots.clone().acquire_owned())
            .await
            .ok()?
            .ok()
    }
}

/// Throttling middleware
pub async fn throttle(
    State(throttle): State<Arc<Throttle>>,
    request: Request,
    next: Next,
) -> Response {
    match throttle.acquire().await {
        Some(_permit) => next.run(request).await,
        None => {
            tracing::warn!("Request rejected: server at capacity");
            ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Server is busy, try again later",
                "server_busy",
            )
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request as HttpRequest, middleware, routing::get};
    use tokio::sync::Notify;
    use tower::ServiceExt;

    /// One route that holds every request until `release` is notified.
    fn held_app(gate: Arc<Throttle>, release: Arc<Notify>) -> Router {
        Router::new()
            .route(
                "/",
                get(move || {
                    let held = release.clone();
                    async move {
                        held.notified().await;
                        "done"
                    }
                }),
            )
            .layer(middleware::from_fn_with_state(gate, throttle))
    }

    fn request() -> HttpRequest<Body> {
        HttpRequest::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_over_capacity_request_is_rejected() {
        let gate = Arc::new(Throttle::new(1, 4, Duration::from_millis(50)));
        let release = Arc::new(Notify::new());
        let app = held_app(gate.clone(), release.clone());

        let first = tokio::spawn(app.clone().oneshot(request()));
        while gate.available() > 0 {
            tokio::task::yield_now().await;
        }

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(gate.backlog_available(), 4);

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_full_backlog_rejects_without_waiting() {
        let gate = Arc::new(Throttle::new(1, 1, Duration::from_secs(30)));
        let release = Arc::new(Notify::new());
        let app = held_app(gate.clone(), release.clone());

        let running = tokio::spawn(app.clone().oneshot(request()));
        while gate.available() > 0 {
            tokio::task::yield_now().await;
        }
        let queued = tokio::spawn(app.clone().oneshot(request()));
        while gate.backlog_available() > 0 {
            tokio::task::yield_now().await;
        }

        let overflow = tokio::time::timeout(Duration::from_secs(1), app.oneshot(request()))
            .await
            .expect("full backlog should answer at once")
            .unwrap();
        assert_eq!(overflow.status(), StatusCode::SERVICE_UNAVAILABLE);

        release.notify_one();
        assert_eq!(running.await.unwrap().unwrap().status(), StatusCode::OK);
        while gate.backlog_available() == 0 {
            tokio::task::yield_now().await;
        }
        release.notify_one();
        assert_eq!(queued.await.unwrap().unwrap().status(), StatusCode::OK);
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.backlog_available(), 1);
    }
}
