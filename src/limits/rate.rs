// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Per-API-key fixed-window rate limiting.
//!
//! Counters live in a single mutex-guarded map. Stale entries are evicted
//! lazily under the same lock, at most once per cleanup interval, so no
//! janitor task is needed.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::ApiKey;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const EXPIRED_WINDOW_GRACE: chrono::Duration = chrono::Duration::minutes(10);
const STALE_ENTRY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a rate-limit check, echoed in `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: i32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Window {
    count: i32,
    #[allow(dead_code)]
    window_start: DateTime<Utc>,
    reset_at: DateTime<Utc>,
    last_seen: Instant,
}

struct Inner {
    counters: HashMap<Uuid, Window>,
    last_cleanup: Instant,
}

/// In-memory per-key rate limiter.
pub struct RateLimiter {
    inner: Mutex<Inner>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                counters: HashMap::new(),
                last_cleanup: Instant::now(),
            }),
        }
    }

    /// Record a request against the key's window.
    pub fn allow(&self, api_key: &ApiKey) -> RateDecision {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now();
        let window_length = chrono::Duration::seconds(i64::from(api_key.rate_limit_window));

        let decision = match inner.counters.entry(api_key.id) {
            Entry::Occupied(mut occupied) if now <= occupied.get().reset_at => {
                let window = occupied.get_mut();
                window.last_seen = Instant::now();
                if window.count >= api_key.rate_limit_max {
                    RateDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: window.reset_at,
                    }
                } else {
                    window.count += 1;
                    RateDecision {
                        allowed: true,
                        remaining: api_key.rate_limit_max - window.count,
                        reset_at: window.reset_at,
                    }
                }
            }
            // Missing or expired: start a fresh window.
            entry => {
                let reset_at = now + window_length;
                let window = Window {
                    count: 1,
                    window_start: now,
                    reset_at,
                    last_seen: Instant::now(),
                };
                match entry {
                    Entry::Occupied(mut occupied) => {
                        occupied.insert(window);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(window);
                    }
                }
                RateDecision {
                    allowed: true,
                    remaining: api_key.rate_limit_max - 1,
                    reset_at,
                }
            }
        };

        Self::cleanup_locked(&mut inner);
        decision
    }

    /// The remaining request count, without consuming a request. Used by
    /// the usage endpoint.
    pub fn remaining(&self, api_key: &ApiKey) -> i32 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let now = Utc::now();
        let remaining = match inner.counters.get_mut(&api_key.id) {
            Some(entry) if now <= entry.reset_at => {
                entry.last_seen = Instant::now();
                (api_key.rate_limit_max - entry.count).max(0)
            }
            _ => api_key.rate_limit_max,
        };

        Self::cleanup_locked(&mut inner);
        remaining
    }

    fn cleanup_locked(inner: &mut Inner) {
        if inner.last_cleanup.elapsed() < CLEANUP_INTERVAL {
            return;
        }

        let now = Utc::now();
        inner.counters.retain(|_, window| {
            window.last_seen.elapsed() <= STALE_ENTRY_TTL
                && now <= window.reset_at + EXPIRED_WINDOW_GRACE
        });
        inner.last_cleanup = Instant::now();
    }
}
