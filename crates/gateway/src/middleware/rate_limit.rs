//! Rate limiting middleware using token bucket algorithm

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use convorag_common::errors::AppError;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide limiter shared by every route
#[derive(Clone)]
pub struct GlobalRateLimit {
    limiter: Arc<DefaultDirectRateLimiter>,
    requests_per_second: u32,
}

impl GlobalRateLimit {
    pub fn new(requests_per_second: u32, burst: u32) -> Result<Self, AppError> {
        let rate = NonZeroU32::new(requests_per_second).ok_or_else(|| AppError::Configuration {
            message: "rate_limit.requests_per_second must be greater than zero".to_string(),
        })?;
        let burst = NonZeroU32::new(burst).ok_or_else(|| AppError::Configuration {
            message: "rate_limit.burst must be greater than zero".to_string(),
        })?;

        Ok(Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst))),
            requests_per_second,
        })
    }

    fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

/// Reject requests once the bucket is empty
pub async fn rate_limit_middleware(
    State(limit): State<GlobalRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if limit.check() {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
        Err(AppError::RateLimited {
            limit: limit.requests_per_second,
        })
    }
}
