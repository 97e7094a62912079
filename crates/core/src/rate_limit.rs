//! Fixed-window request counting per client identity.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_per_window: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn per_minute(max_per_window: u32) -> Self {
        Self { max_per_window, window: Duration::from_secs(60) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

#[derive(Clone, Debug)]
struct ClientBucket {
    window_start: Instant,
    count: u32,
}

impl ClientBucket {
    fn new(now: Instant) -> Self {
        Self { window_start: now, count: 0 }
    }

    fn record(&mut self, now: Instant, policy: &RateLimitPolicy) -> Admission {
        if now.saturating_duration_since(self.window_start) > policy.window {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);

        let allowed = self.count <= policy.max_per_window;
        let remaining = policy.max_per_window.saturating_sub(self.count);
        let retry_after_secs = if allowed {
            0
        } else {
            let window_end = self.window_start + policy.window;
            ceil_secs(window_end.saturating_duration_since(now)).max(1)
        };

        Admission { allowed, limit: policy.max_per_window, remaining, retry_after_secs }
    }

    fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        now.saturating_duration_since(self.window_start) >= max_idle
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Process-local limiter. Buckets are sharded through `DashMap`, so an update
/// only locks the shard of its own key.
#[derive(Debug)]
pub struct RateLimiter {
    name: &'static str,
    policy: RateLimitPolicy,
    buckets: DashMap<String, ClientBucket>,
}

impl RateLimiter {
    pub fn new(name: &'static str, policy: RateLimitPolicy) -> Self {
        Self { name, policy, buckets: DashMap::new() }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, Instant::now())
    }

    pub fn admit_at(&self, client_key: &str, now: Instant) -> Admission {
        let admission = {
            let mut bucket = self
                .buckets
                .entry(client_key.to_string())
                .or_insert_with(|| ClientBucket::new(now));
            bucket.record(now, &self.policy)
        };

        if !admission.allowed {
            warn!(
                event_name = "rate_limit.rejected",
                limiter = self.name,
                limit = admission.limit,
                retry_after_secs = admission.retry_after_secs,
                "client exceeded request budget"
            );
        }
        admission
    }

    /// Drops buckets whose window started more than `max_idle` ago. A dropped
    /// client simply starts a fresh window on its next request.
    pub fn sweep_idle(&self, now: Instant, max_idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| !bucket.is_idle(now, max_idle));
        let removed = before.saturating_sub(self.buckets.len());
        if removed > 0 {
            debug!(
                event_name = "rate_limit.swept",
                limiter = self.name,
                removed,
                remaining = self.buckets.len(),
                "idle rate-limit buckets removed"
            );
        }
        removed
    }
}

/// Best-effort client identity: first forwarded address (or the peer address)
/// plus a coarse user-agent. Several real clients may share one key.
pub fn client_key(
    forwarded_for: Option<&str>,
    peer_addr: Option<&str>,
    user_agent: Option<&str>,
) -> String {
    let forwarded = forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let address = forwarded.or(peer_addr).unwrap_or("unknown");
    let agent: String = user_agent.unwrap_or("unknown").chars().take(120).collect();
    format!("{address}|{agent}")
}
