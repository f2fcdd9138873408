//! Per-client rate limiting — fixed counting windows keyed by source IP.
//!
//! This is a fixed window, not a sliding one: a window is replaced outright
//! once its `reset_at` passes, so burst traffic straddling a boundary can
//! admit up to 2× the ceiling in a short span. That approximation is an
//! accepted property of the design — do not "fix" it to a sliding window.
//! State lives in-process only and does not survive restarts.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::errors::AppError;
use crate::state::AppState;

struct RateWindow {
    count: u32,
    reset_at: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { retry_after_seconds: u64 },
}

/// Aggregate view over windows that have not yet reset.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterStats {
    pub total_requests: u64,
    pub active_clients: usize,
}

/// Shared fixed-window rate limiter. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RateWindow>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Admits or rejects one request for `key`.
    ///
    /// A fresh window (first sight of the key, or `reset_at` passed) starts
    /// at count 1 and admits. Within a live window the count increments up
    /// to the ceiling; past it the request is rejected with the seconds
    /// remaining until the window resets, rounded up.
    pub fn check(&self, key: &str) -> Admission {
        let now = Instant::now();
        let mut windows = self.windows.write().unwrap();

        match windows.get_mut(key) {
            Some(window) if now <= window.reset_at => {
                if window.count < self.max_requests {
                    window.count += 1;
                    Admission::Admitted
                } else {
                    let remaining = window.reset_at.saturating_duration_since(now);
                    Admission::Rejected {
                        retry_after_seconds: (remaining.as_millis() as u64).div_ceil(1000),
                    }
                }
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    RateWindow {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                Admission::Admitted
            }
        }
    }

    /// Stats over live windows only; clients whose window has reset are
    /// not counted even though their stale entry may still be in the map.
    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let windows = self.windows.read().unwrap();
        let live = windows.values().filter(|w| now <= w.reset_at);

        let mut total_requests = 0u64;
        let mut active_clients = 0usize;
        for window in live {
            total_requests += u64::from(window.count);
            active_clients += 1;
        }

        RateLimiterStats {
            total_requests,
            active_clients,
        }
    }
}

/// Tower middleware gating every route except the liveness probe.
/// Keyed by peer IP; requires `into_make_service_with_connect_info`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    // Health probes must never be throttled.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    match state.rate_limiter.check(&addr.ip().to_string()) {
        Admission::Admitted => next.run(request).await,
        Admission::Rejected {
            retry_after_seconds,
        } => {
            tracing::warn!("Rate limit exceeded for {}", addr.ip());
            AppError::RateLimited {
                retry_after_seconds,
            }
            .into_response()
        }
    }
}
