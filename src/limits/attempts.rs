// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Per-source-IP authentication-failure throttling.
//!
//! Unlike the per-key rate limiter, callers here are unauthenticated, so
//! entries are keyed by a namespaced client IP (`api_key:<ip>`,
//! `google_admin:<ip>`). Enough failures inside the window blocks the key
//! for the block duration; a success wipes the entry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_MAX_FAILURES: u32 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);
const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(15 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const STALE_ENTRY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Attempt {
    failures: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
    last_seen: Instant,
}

struct Inner {
    entries: HashMap<String, Attempt>,
    last_cleanup: Instant,
}

/// In-memory brute-force throttle for authentication failures.
pub struct AuthAttemptLimiter {
    inner: Mutex<Inner>,
    max_failures: u32,
    window: Duration,
    block_duration: Duration,
}

impl AuthAttemptLimiter {
    /// Zero values fall back to the defaults (5 failures / 5 min window /
    /// 15 min block).
    pub fn new(max_failures: u32, window: Duration, block_duration: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
            max_failures: if max_failures == 0 {
                DEFAULT_MAX_FAILURES
            } else {
                max_failures
            },
            window: if window.is_zero() {
                DEFAULT_WINDOW
            } else {
                window
            },
            block_duration: if block_duration.is_zero() {
                DEFAULT_BLOCK_DURATION
            } else {
                block_duration
            },
        }
    }

    /// Whether a request from this key may proceed to authentication.
    pub fn allow(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let allowed = match inner.entries.get_mut(key) {
            None => true,
            Some(entry) => {
                entry.last_seen = now;
                if entry.blocked_until.is_some_and(|until| now < until) {
                    false
                } else {
                    if now.duration_since(entry.window_start) > self.window {
                        entry.failures = 0;
                        entry.window_start = now;
                    }
                    true
                }
            }
        };

        self.cleanup_locked(&mut inner, now);
        allowed
    }

    /// Record an authentication failure; blocks the key once the failure
    /// threshold is reached inside the window.
    pub fn register_failure(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let entry = inner.entries.entry(key.to_string()).or_insert(Attempt {
            failures: 0,
            window_start: now,
            blocked_until: None,
            last_seen: now,
        });

        entry.last_seen = now;
        if now.duration_since(entry.window_start) > self.window {
            entry.window_start = now;
            entry.failures = 0;
        }

        entry.failures += 1;
        if entry.failures >= self.max_failures {
            entry.blocked_until = Some(now + self.block_duration);
            entry.failures = 0;
            entry.window_start = now;
        }

        self.cleanup_locked(&mut inner, now);
    }

    /// Record a successful authentication, wiping prior failures.
    pub fn register_success(&self, key: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.remove(key);
        self.cleanup_locked(&mut inner, Instant::now());
    }

    fn cleanup_locked(&self, inner: &mut Inner, now: Instant) {
        if now.duration_since(inner.last_cleanup) < CLEANUP_INTERVAL {
            return;
        }

        inner.entries.retain(|_, entry| {
            now.duration_since(entry.last_seen) <= STALE_ENTRY_TTL
                || entry.blocked_until.is_some_and(|until| now < until)
        });
        inner.last_cleanup = now;
    }
}

impl Default for AuthAttemptLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILURES, DEFAULT_WINDOW, DEFAULT_BLOCK_DURATION)
    }
}
