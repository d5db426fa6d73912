//! Fixed-window request rate limiting and its HTTP rendering.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 60;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests. Please retry shortly.";
const EVALUATION_FAILED_MESSAGE: &str = "Failed to evaluate rate limit.";
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RateLimitError {
    pub status: StatusCode,
    pub message: String,
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitError {
    pub fn new(message: impl Into<String>, status: StatusCode, retry_after_seconds: Option<u64>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after_seconds,
        }
    }

    fn too_many_requests(retry_after_seconds: u64) -> Self {
        Self::new(
            TOO_MANY_REQUESTS_MESSAGE,
            StatusCode::TOO_MANY_REQUESTS,
            Some(retry_after_seconds),
        )
    }

    fn evaluation_failed() -> Self {
        Self::new(EVALUATION_FAILED_MESSAGE, StatusCode::SERVICE_UNAVAILABLE, None)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_seconds: Option<u64>,
}

/// Render a rate-limit rejection. `Retry-After` is only attached when the
/// error carries a retry delay.
pub fn create_rate_limit_response(error: &RateLimitError) -> Response {
    let body = RateLimitBody {
        error: &error.message,
        retry_after_seconds: error.retry_after_seconds,
    };
    let mut response = (error.status, Json(body)).into_response();
    if let Some(seconds) = error.retry_after_seconds {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
    }
    response
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        create_rate_limit_response(&self)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { reset_at: Instant },
}

#[derive(Debug, Default)]
struct BucketTable {
    entries: HashMap<String, Bucket>,
    last_sweep: Option<Instant>,
}

impl BucketTable {
    /// Drop expired buckets, at most once per window.
    fn sweep_expired(&mut self, now: Instant, window: Duration) {
        let due = self
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= window);
        if !due {
            return;
        }
        let before = self.entries.len();
        self.entries.retain(|_, bucket| bucket.reset_at > now);
        self.last_sweep = Some(now);
        let dropped = before - self.entries.len();
        if dropped > 0 {
            debug!("rate limit swept {} expired buckets", dropped);
        }
    }
}

/// In-process fixed-window limiter keyed by `namespace:identifier`.
pub struct MemoryRateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Mutex<BucketTable>,
}

impl MemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            buckets: Mutex::new(BucketTable::default()),
        }
    }

    fn limit_at(
        &self,
        namespace: &str,
        identifier: &str,
        now: Instant,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let key = format!("{}:{}", namespace, identifier);
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| RateLimitError::evaluation_failed())?;
        buckets.sweep_expired(now, self.window);

        let fresh = Bucket {
            count: 0,
            reset_at: now + self.window,
        };
        let bucket = buckets.entries.entry(key).or_insert(fresh);
        if bucket.reset_at <= now {
            *bucket = fresh;
        }

        if bucket.count >= self.max_requests {
            return Ok(RateLimitDecision::Limited {
                reset_at: bucket.reset_at,
            });
        }

        bucket.count += 1;
        Ok(RateLimitDecision::Allowed {
            remaining: self.max_requests.saturating_sub(bucket.count),
        })
    }

    pub fn reset(&self) {
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.entries.clear();
            buckets.last_sweep = None;
        }
    }

    #[cfg(test)]
    fn tracked_buckets(&self) -> usize {
        self.buckets.lock().expect("bucket lock").entries.len()
    }
}

/// Prefix a scope and replace anything outside `[A-Za-z0-9:_-]` with `-`.
pub fn normalize_namespace(scope: &str) -> String {
    let sanitized: String = scope
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, ':' | '_' | '-') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    format!("nyte-{}", sanitized)
}

/// First non-empty `x-forwarded-for` entry, then `x-real-ip`, else `"unknown"`.
pub fn client_address(headers: &HeaderMap) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
        .find_map(|value| {
            value
                .split(',')
                .map(str::trim)
                .find(|entry| !entry.is_empty())
        })
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub fn rate_limit_request(
    limiter: &MemoryRateLimiter,
    headers: &HeaderMap,
    scope: &str,
) -> Result<(), RateLimitError> {
    rate_limit_request_at(limiter, headers, scope, Instant::now())
}

fn rate_limit_request_at(
    limiter: &MemoryRateLimiter,
    headers: &HeaderMap,
    scope: &str,
    now: Instant,
) -> Result<(), RateLimitError> {
    let identifier = client_address(headers);
    let namespace = normalize_namespace(scope);
    match limiter.limit_at(&namespace, &identifier, now)? {
        RateLimitDecision::Allowed { remaining } => {
            debug!("rate limit ok namespace={} remaining={}", namespace, remaining);
            Ok(())
        }
        RateLimitDecision::Limited { reset_at } => {
            let remaining = reset_at.saturating_duration_since(now);
            let seconds = remaining.as_millis().div_ceil(1000) as u64;
            Err(RateLimitError::too_many_requests(seconds.max(1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn response_carries_status_header_and_body() {
        let error = RateLimitError::new("slow down", StatusCode::TOO_MANY_REQUESTS, Some(30));
        let response = create_rate_limit_response(&error);

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("30")
        );
        assert_eq!(
            body_json(response).await,
            json!({"error": "slow down", "retryAfterSeconds": 30})
        );
    }

    #[tokio::test]
    async fn response_without_retry_after_has_no_header() {
        let error = RateLimitError::new("Failed to evaluate rate limit.", StatusCode::SERVICE_UNAVAILABLE, None);
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        assert_eq!(
            body_json(response).await,
            json!({"error": "Failed to evaluate rate limit."})
        );
    }

    #[test]
    fn limiter_allows_up_to_max_then_limits() {
        let limiter = MemoryRateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(
            limiter.limit_at("ns", "client", now),
            Ok(RateLimitDecision::Allowed { remaining: 1, .. })
        ));
        assert!(matches!(
            limiter.limit_at("ns", "client", now),
            Ok(RateLimitDecision::Allowed { remaining: 0, .. })
        ));
        assert_eq!(
            limiter.limit_at("ns", "client", now),
            Ok(RateLimitDecision::Limited {
                reset_at: now + Duration::from_secs(60)
            })
        );
    }

    #[test]
    fn limiter_keys_are_independent() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(matches!(limiter.limit_at("ns", "a", now), Ok(RateLimitDecision::Allowed { .. })));
        assert!(matches!(limiter.limit_at("ns", "b", now), Ok(RateLimitDecision::Allowed { .. })));
        assert!(matches!(limiter.limit_at("other", "a", now), Ok(RateLimitDecision::Allowed { .. })));
        assert!(matches!(limiter.limit_at("ns", "a", now), Ok(RateLimitDecision::Limited { .. })));
    }

    #[test]
    fn limiter_opens_new_window_after_reset() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(10));
        let now = Instant::now();

        assert!(matches!(limiter.limit_at("ns", "a", now), Ok(RateLimitDecision::Allowed { .. })));
        assert!(matches!(limiter.limit_at("ns", "a", now), Ok(RateLimitDecision::Limited { .. })));

        let later = now + Duration::from_secs(10);
        assert_eq!(
            limiter.limit_at("ns", "a", later),
            Ok(RateLimitDecision::Allowed { remaining: 0 })
        );
        assert_eq!(
            limiter.limit_at("ns", "a", later),
            Ok(RateLimitDecision::Limited {
                reset_at: later + Duration::from_secs(10)
            })
        );
    }

    #[test]
    fn reset_clears_buckets() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        let _ = limiter.limit_at("ns", "a", now);
        limiter.reset();
        assert!(matches!(limiter.limit_at("ns", "a", now), Ok(RateLimitDecision::Allowed { .. })));
    }

    #[test]
    fn expired_buckets_are_swept_once_the_window_passes() {
        let limiter = MemoryRateLimiter::new(5, Duration::from_secs(1));
        let start = Instant::now();
        for index in 0..10_000 {
            let _ = limiter.limit_at("ns", &format!("10.0.{}.{}", index / 256, index % 256), start);
        }
        assert_eq!(limiter.tracked_buckets(), 10_000);

        let later = start + Duration::from_secs(3600);
        assert!(matches!(
            limiter.limit_at("ns", "203.0.113.1", later),
            Ok(RateLimitDecision::Allowed { remaining: 4 })
        ));
        assert_eq!(limiter.tracked_buckets(), 1);
    }

    #[test]
    fn live_buckets_survive_a_sweep() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();
        let _ = limiter.limit_at("ns", "old", start);
        let mid = start + Duration::from_secs(5);
        let _ = limiter.limit_at("ns", "fresh", mid);

        let sweep_at = start + Duration::from_secs(12);
        let _ = limiter.limit_at("ns", "other", sweep_at);
        assert_eq!(limiter.tracked_buckets(), 2);
        assert_eq!(
            limiter.limit_at("ns", "fresh", sweep_at),
            Ok(RateLimitDecision::Limited {
                reset_at: mid + Duration::from_secs(10)
            })
        );
    }

    #[test]
    fn rate_limit_request_reports_retry_after() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(60));
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        let now = Instant::now();

        assert_eq!(rate_limit_request_at(&limiter, &headers, "feedback", now), Ok(()));

        let err = rate_limit_request_at(
            &limiter,
            &headers,
            "feedback",
            now + Duration::from_millis(500),
        )
        .expect_err("second request is limited");
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.message, "Too many requests. Please retry shortly.");
        assert_eq!(err.retry_after_seconds, Some(60));
    }

    #[test]
    fn rate_limit_request_retry_after_is_at_least_one_second() {
        let limiter = MemoryRateLimiter::new(1, Duration::from_secs(1));
        let headers = HeaderMap::new();
        let now = Instant::now();

        assert_eq!(rate_limit_request_at(&limiter, &headers, "sync", now), Ok(()));
        let err = rate_limit_request_at(
            &limiter,
            &headers,
            "sync",
            now + Duration::from_millis(999),
        )
        .expect_err("limited");
        assert_eq!(err.retry_after_seconds, Some(1));
    }

    #[test]
    fn client_address_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_address(&headers), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static(" 192.168.1.4 "));
        assert_eq!(client_address(&headers), "192.168.1.4");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 203.0.113.9, 10.0.0.1"));
        assert_eq!(client_address(&headers), "203.0.113.9");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , "));
        assert_eq!(client_address(&headers), "192.168.1.4");
    }

    #[test]
    fn namespace_replaces_unsupported_characters() {
        assert_eq!(normalize_namespace("actions/approve"), "nyte-actions-approve");
        assert_eq!(normalize_namespace("queue:sync_v2"), "nyte-queue:sync_v2");
    }
}
