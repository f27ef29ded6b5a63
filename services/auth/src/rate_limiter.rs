//! Login rate limiter keyed by account

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts allowed inside one window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lockout duration in seconds
    pub lockout_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 900,
        }
    }
}

/// Tracked keys above which stale entries are swept on the next check
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Attempts {
    count: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl Attempts {
    /// Neither the window nor a lockout still applies
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        let window_over = now.duration_since(self.window_start) >= window;
        let lock_over = self.locked_until.is_none_or(|until| now >= until);
        window_over && lock_over
    }
}

/// Tracks login attempts per key and locks a key out after too many
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Attempts>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Key for an account login
    pub fn login_key(email: &str, school_id: i64) -> String {
        format!("{}:{}", school_id, email.to_ascii_lowercase())
    }

    /// Record an attempt and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.len() >= PRUNE_THRESHOLD {
            self.prune(&mut entries, now);
        }
        let entry = entries.entry(key.to_string()).or_insert(Attempts {
            count: 0,
            window_start: now,
            locked_until: None,
        });

        if let Some(until) = entry.locked_until {
            if now < until {
                return false;
            }
            entry.locked_until = None;
            entry.count = 0;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds) {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.config.max_attempts {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            warn!(key = %key, seconds = self.config.lockout_seconds, "Login locked out");
            return false;
        }

        entry.count += 1;
        true
    }

    fn prune(&self, entries: &mut HashMap<String, Attempts>, now: Instant) {
        let window = Duration::from_secs(self.config.window_seconds);
        let before = entries.len();
        entries.retain(|_, attempts| !attempts.is_stale(now, window));
        debug!(removed = before - entries.len(), "Pruned login attempts");
    }

    /// Forget the attempts of a key after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}
