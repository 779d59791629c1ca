//! Sliding-window admission control for stream creation.
//!
//! One window is shared by every caller. Each admitted request records its
//! timestamp; a request is admitted only while fewer than `max` timestamps
//! fall inside the trailing window.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use streamgate_common::Error;

use super::error::AppError;
use super::request_id::RequestId;

/// A shared rate limiter instance.
pub type SharedLimiter = Arc<SlidingWindowLimiter>;

#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            admitted: Mutex::new(VecDeque::with_capacity(max)),
        }
    }

    /// Admit a request now, if the window has room.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Admit a request at `now`.
    pub fn allow_at(&self, now: Instant) -> bool {
        let mut admitted = self.admitted.lock();
        if let Some(cutoff) = now.checked_sub(self.window) {
            while admitted.front().is_some_and(|t| *t < cutoff) {
                admitted.pop_front();
            }
        }
        if admitted.len() < self.max {
            admitted.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Create a limiter from config values.
pub fn create_limiter(max_requests: usize, window: Duration) -> SharedLimiter {
    Arc::new(SlidingWindowLimiter::new(max_requests, window))
}

/// Rate limiting middleware. Returns 429 Too Many Requests when exceeded.
pub async fn rate_limit_middleware(
    State(limiter): State<SharedLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.allow() {
        tracing::warn!(
            max = limiter.max,
            window_secs = limiter.window.as_secs(),
            "Stream creation rate limit exceeded"
        );
        let err = match request.extensions().get::<RequestId>() {
            Some(id) => id.error(Error::RateLimited),
            None => AppError::new(Error::RateLimited),
        };
        return err.into_response();
    }

    next.run(request).await
}
