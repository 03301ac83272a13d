use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

use crate::settings::RateLimitSettings;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window { entry.pop_front(); } else { break; }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops keys with no hit inside `window`.
    pub fn evict_idle(&self, window: Duration) {
        let now = Instant::now();
        self.store.retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < window));
    }
}

/// Checks between sweeps of idle keys.
const SWEEP_EVERY: usize = 256;

/// Per-user guard for the two write paths.
#[derive(Clone)]
pub struct RateLimiterFacade {
    pub limiter: InMemoryRateLimiter,
    pub cfg: RateLimitSettings,
    checks: Arc<AtomicUsize>,
}

impl RateLimiterFacade {
    pub fn new(cfg: RateLimitSettings) -> Self {
        Self { limiter: InMemoryRateLimiter::new(cfg.enabled), cfg, checks: Arc::new(AtomicUsize::new(0)) }
    }
    pub fn allow_story(&self, user_id: &str) -> bool {
        self.sweep();
        self.limiter.check(&format!("story:{user_id}"), self.cfg.story_limit, self.cfg.story_window)
    }
    pub fn allow_comment(&self, user_id: &str) -> bool {
        self.sweep();
        self.limiter.check(&format!("comment:{user_id}"), self.cfg.comment_limit, self.cfg.comment_window)
    }

    fn sweep(&self) {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.limiter.evict_idle(self.cfg.story_window.max(self.cfg.comment_window));
        }
    }
}
