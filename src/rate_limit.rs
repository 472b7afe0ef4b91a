use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding window in-memory rate limiter (pod local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            enabled,
        }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled {
            return true;
        }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window {
                entry.pop_front();
            } else {
                break;
            }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }
}

/// Per-intent limits derived from env. Votes get a generous window (toggles
/// are cheap and benign), submissions a tight one.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub submit_limit: usize,
    pub submit_window: Duration,
    pub vote_limit: usize,
    pub vote_window: Duration,
    pub image_limit: usize,
    pub image_window: Duration,
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        fn usize_env(name: &str, default: usize) -> usize {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn dur_env(name: &str, default: u64) -> Duration {
            Duration::from_secs(
                std::env::var(name)
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default),
            )
        }
        Self {
            submit_limit: usize_env("RL_SUBMIT_LIMIT", 5),
            submit_window: dur_env("RL_SUBMIT_WINDOW", 300),
            vote_limit: usize_env("RL_VOTE_LIMIT", 60),
            vote_window: dur_env("RL_VOTE_WINDOW", 60),
            image_limit: usize_env("RL_IMAGE_LIMIT", 10),
            image_window: dur_env("RL_IMAGE_WINDOW", 3600),
        }
    }
}

/// High level guard used by handlers, keyed by viewer id.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitConfig,
}

impl RateLimiterFacade {
    pub fn new(limiter: InMemoryRateLimiter, cfg: RateLimitConfig) -> Self {
        Self { limiter, cfg }
    }
    pub fn allow_submit(&self, user: &str) -> bool {
        self.limiter.check(
            &format!("submit:{user}"),
            self.cfg.submit_limit,
            self.cfg.submit_window,
        )
    }
    pub fn allow_vote(&self, user: &str) -> bool {
        self.limiter.check(
            &format!("vote:{user}"),
            self.cfg.vote_limit,
            self.cfg.vote_window,
        )
    }
    pub fn allow_image(&self, user: &str) -> bool {
        self.limiter.check(
            &format!("image:{user}"),
            self.cfg.image_limit,
            self.cfg.image_window,
        )
    }
}
