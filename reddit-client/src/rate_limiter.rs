use reqwest::header::HeaderMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window: Duration,
    pub burst: u32,
}

impl RateLimitConfig {
    /// Reddit's OAuth quota: 600 requests per rolling 10 minute window.
    pub fn reddit_oauth() -> Self {
        Self {
            requests_per_window: 600,
            window: Duration::from_secs(600),
            burst: 10,
        }
    }
}

/// Quota Reddit reports on every OAuth response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaHeaders {
    pub remaining: f64,
    pub reset: Duration,
}

impl QuotaHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
        };
        let remaining = read(HEADER_REMAINING)?;
        let reset = read(HEADER_RESET)?;
        Some(Self {
            remaining,
            reset: Duration::from_secs_f64(reset.max(0.0)),
        })
    }
}

#[derive(Debug)]
struct Budget {
    tokens: f64,
    last_refill: Instant,
    blocked_until: Option<Instant>,
}

/// Request budget shared by the submission and comment streams. A local
/// token bucket paces requests and the server's quota headers can shrink
/// it or block it until the window resets.
#[derive(Debug)]
pub struct RateLimiter {
    budget: Mutex<Budget>,
    config: RateLimitConfig,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.burst.max(1));
        let refill_per_sec =
            f64::from(config.requests_per_window) / config.window.as_secs_f64().max(1.0);
        Self {
            budget: Mutex::new(Budget {
                tokens: capacity,
                last_refill: Instant::now(),
                blocked_until: None,
            }),
            config,
            capacity,
            refill_per_sec,
        }
    }

    /// Takes one token now, or returns how long until one is available.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut budget = self.budget.lock().await;
        let now = Instant::now();

        if let Some(until) = budget.blocked_until {
            if until > now {
                return Err(until - now);
            }
            budget.blocked_until = None;
            budget.last_refill = now;
        }

        self.refill(&mut budget, now);
        if budget.tokens >= 1.0 {
            budget.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64(
                (1.0 - budget.tokens) / self.refill_per_sec,
            ))
        }
    }

    /// Waits until a request may be sent. Returns the time spent waiting.
    pub async fn acquire_permit(&self) -> Duration {
        let started = Instant::now();
        while let Err(wait) = self.try_acquire().await {
            debug!("Request budget exhausted, waiting {:?}", wait);
            sleep(wait).await;
        }
        started.elapsed()
    }

    /// Aligns the local budget with the quota Reddit reported.
    pub async fn observe_quota(&self, quota: QuotaHeaders) {
        let mut budget = self.budget.lock().await;
        if quota.remaining < 1.0 {
            warn!("Reddit quota used up, pausing for {:?}", quota.reset);
            budget.blocked_until = Some(Instant::now() + quota.reset);
            budget.tokens = 0.0;
        } else {
            budget.tokens = budget.tokens.min(quota.remaining);
        }
    }

    /// Blocks all requests for `duration`, used after a 429.
    pub async fn pause_for(&self, duration: Duration) {
        let mut budget = self.budget.lock().await;
        let until = Instant::now() + duration;
        if budget.blocked_until.map_or(true, |current| current < until) {
            budget.blocked_until = Some(until);
        }
    }

    pub async fn status(&self) -> RateLimitStatus {
        let mut budget = self.budget.lock().await;
        let now = Instant::now();
        let blocked = budget.blocked_until.is_some_and(|until| until > now);
        if !blocked {
            self.refill(&mut budget, now);
        }
        RateLimitStatus {
            available_tokens: budget.tokens.floor() as u32,
            burst: self.config.burst,
            requests_per_window: self.config.requests_per_window,
            blocked,
        }
    }

    fn refill(&self, budget: &mut Budget, now: Instant) {
        let elapsed = now.duration_since(budget.last_refill).as_secs_f64();
        budget.tokens = (budget.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        budget.last_refill = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub available_tokens: u32,
    pub burst: u32,
    pub requests_per_window: u32,
    pub blocked: bool,
}
