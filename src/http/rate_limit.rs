//! Fixed-window request limits per client.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

const PRUNE_ABOVE: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Policy {
    pub name: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl Policy {
    /// Login, registration and session management.
    pub const AUTH: Policy = Policy { name: "auth", limit: 10, window: Duration::from_secs(15 * 60) };
    /// One-time codes and token exchanges.
    pub const OTP: Policy = Policy { name: "otp", limit: 5, window: Duration::from_secs(60 * 60) };
}

#[derive(Debug, Clone)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Default)]
pub struct RateLimiter {
    windows: Mutex<HashMap<(&'static str, String), Window>>,
}

impl RateLimiter {
    /// Counts a request. On breach returns how long until the window resets.
    pub async fn hit(&self, policy: &Policy, client: &str, now: Instant) -> Result<(), Duration> {
        let mut lock = self.windows.lock().await;
        if lock.len() > PRUNE_ABOVE {
            lock.retain(|(name, _), w| *name != policy.name || now.duration_since(w.started) < policy.window);
        }
        let window = lock.entry((policy.name, client.to_string())).or_insert(Window { started: now, count: 0 });
        if now.duration_since(window.started) >= policy.window {
            *window = Window { started: now, count: 0 };
        }
        if window.count >= policy.limit {
            return Err(policy.window.saturating_sub(now.duration_since(window.started)));
        }
        window.count += 1;
        Ok(())
    }
}

/// Middleware state: which policy a route group is held to.
#[derive(Clone)]
pub struct RateGuard {
    limiter: Arc<RateLimiter>,
    policy: Policy,
}

impl RateGuard {
    pub fn new(limiter: Arc<RateLimiter>, policy: Policy) -> Self { Self { limiter, policy } }
}

pub async fn enforce(State(guard): State<RateGuard>, req: Request, next: Next) -> Response {
    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip().to_string());
    let client = client_key(req.headers(), peer);
    match guard.limiter.hit(&guard.policy, &client, Instant::now()).await {
        Ok(()) => next.run(req).await,
        Err(retry_after) => {
            warn!(policy = guard.policy.name, %client, path = %req.uri().path(), "rate limit exceeded");
            let secs = retry_after.as_secs().max(1);
            let mut resp = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "success": false, "error": "Too many requests, please try again later." })),
            )
                .into_response();
            resp.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
            resp
        }
    }
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_key(headers: &HeaderMap, peer: Option<String>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_blocks_after_limit_and_resets() {
        let limiter = RateLimiter::default();
        let policy = Policy { name: "t", limit: 2, window: Duration::from_secs(60) };
        let start = Instant::now();
        assert!(limiter.hit(&policy, "a", start).await.is_ok());
        assert!(limiter.hit(&policy, "a", start).await.is_ok());
        let retry = limiter.hit(&policy, "a", start + Duration::from_secs(10)).await.unwrap_err();
        assert_eq!(retry, Duration::from_secs(50));
        assert!(limiter.hit(&policy, "b", start).await.is_ok());
        assert!(limiter.hit(&policy, "a", start + Duration::from_secs(60)).await.is_ok());
    }

    #[tokio::test]
    async fn test_policies_count_separately() {
        let limiter = RateLimiter::default();
        let a = Policy { name: "a", limit: 1, window: Duration::from_secs(60) };
        let b = Policy { name: "b", limit: 1, window: Duration::from_secs(60) };
        let now = Instant::now();
        assert!(limiter.hit(&a, "c", now).await.is_ok());
        assert!(limiter.hit(&b, "c", now).await.is_ok());
        assert!(limiter.hit(&a, "c", now).await.is_err());
    }

    #[test]
    fn test_client_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some("10.0.0.1".into())), "10.0.0.1");
        assert_eq!(client_key(&headers, None), "unknown");
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.2"));
        assert_eq!(client_key(&headers, Some("10.0.0.1".into())), "203.0.113.9");
    }
}
