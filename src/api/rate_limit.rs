//! Per-client request throttling for the write routes that create records.

use crate::{api::AppState, config::settings::RateLimitConfig, errors::Error};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use tracing::warn;

/// Backing store for request counters.
///
/// The in-memory store suits a single process; a shared store (Redis and the like) can be
/// plugged in for several.
pub trait CounterStore: Send + Sync {
    /// Counts one request for `key` in the current fixed window and returns the count so far.
    fn increment(&self, key: &str, window: Duration) -> u32;
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Number of tracked keys above which expired windows are swept on the next increment.
const SWEEP_THRESHOLD: usize = 10_000;

/// Fixed-window counters held in process memory.
#[derive(Default)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, WindowEntry>>,
}

/// Drops windows that have already expired.
fn sweep(entries: &mut HashMap<String, WindowEntry>, window: Duration) {
    let now = Instant::now();
    entries.retain(|_, entry| now.duration_since(entry.window_start) < window);
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, key: &str, window: Duration) -> u32 {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() > SWEEP_THRESHOLD {
            sweep(&mut entries, window);
        }
        let now = Instant::now();
        let entry = entries.entry(key.to_owned()).or_insert_with(|| WindowEntry {
            count: 0,
            window_start: now,
        });

        // Reset window if expired
        if now.duration_since(entry.window_start) >= window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);
        entry.count
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Limiter over a fresh in-memory store.
    pub fn in_memory(config: &RateLimitConfig) -> Self {
        Self::new(
            Arc::new(InMemoryCounterStore::default()),
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
    }

    /// Returns `true` if the request is allowed, `false` if rate-limited.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.store.increment(key, self.window) <= self.max_requests
    }
}

/// Extract client IP: X-Forwarded-For header first, then peer address.
fn extract_ip(request: &Request) -> String {
    if let Some(forwarded) = request.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let ip = first.trim();
        if !ip.is_empty() {
            return ip.to_owned();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ci| ci.0.ip().to_string())
}

/// Middleware rejecting clients over their request budget with 429.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let ip = extract_ip(&request);
    let key = format!("{}:{}", request.uri().path(), ip);
    if !state.rate_limiter.try_acquire(&key) {
        warn!(%ip, path = %request.uri().path(), "Rate limit exceeded");
        return Err(Error::RateLimited);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_window_budget() {
        let limiter = RateLimiter::new(
            Arc::new(InMemoryCounterStore::default()),
            2,
            Duration::from_secs(60),
        );
        assert!(limiter.try_acquire("1.2.3.4"));
        assert!(limiter.try_acquire("1.2.3.4"));
        assert!(!limiter.try_acquire("1.2.3.4"));
        // Keys are independent
        assert!(limiter.try_acquire("5.6.7.8"));
    }

    #[test]
    fn test_window_resets() {
        let store = InMemoryCounterStore::default();
        assert_eq!(store.increment("k", Duration::ZERO), 1);
        // A zero-length window has always expired
        assert_eq!(store.increment("k", Duration::ZERO), 1);

        store.increment("other", Duration::from_secs(60));
        let mut entries = store.entries.lock().unwrap_or_else(PoisonError::into_inner);
        sweep(&mut entries, Duration::ZERO);
        assert!(entries.is_empty());
    }
}
