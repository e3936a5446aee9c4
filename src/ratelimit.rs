use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::observability;

/// Read and write endpoints are limited independently: reads are cheap and
/// frequent, writes mutate the booking index and get the tighter budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    Read,
    Write,
}

impl EndpointClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointClass::Read => "read",
            EndpointClass::Write => "write",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CounterKey {
    class: EndpointClass,
    client: String,
}

/// One fixed window of request counting for a (class, client) pair.
#[derive(Debug)]
struct WindowCounter {
    window_start: u64,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset: u64,
    },
    Limited {
        limit: u32,
        reset: u64,
        retry_after: u64,
    },
}

impl RateDecision {
    pub fn limit(&self) -> u32 {
        match self {
            RateDecision::Allowed { limit, .. } | RateDecision::Limited { limit, .. } => *limit,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self {
            RateDecision::Allowed { remaining, .. } => *remaining,
            RateDecision::Limited { .. } => 0,
        }
    }

    pub fn reset(&self) -> u64 {
        match self {
            RateDecision::Allowed { reset, .. } | RateDecision::Limited { reset, .. } => *reset,
        }
    }
}

/// Lock acquisition budget: one initial try plus `LOCK_RETRIES` retries,
/// sleeping `LOCK_RETRY_DELAY` between tries. Exhausting the budget fails
/// open — see `check`.
const LOCK_RETRIES: u32 = 3;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(2);

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs()
}

/// Fixed-window request counter, independent per (endpoint class, client
/// identity). Each key's read-reset-increment cycle runs under a short-lived
/// exclusive lock so the count can never be torn by concurrent checkers.
pub struct RateLimiter {
    counters: DashMap<CounterKey, Arc<Mutex<WindowCounter>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            counters: DashMap::new(),
            config: config.sanitized(),
        }
    }

    pub fn limit_for(&self, class: EndpointClass) -> u32 {
        match class {
            EndpointClass::Read => self.config.read_limit,
            EndpointClass::Write => self.config.write_limit,
        }
    }

    /// Count one request against the key's current window and decide.
    ///
    /// If the key's lock cannot be acquired within the retry budget, the
    /// request is allowed through uncounted. That is a deliberate
    /// availability-over-enforcement policy: lock contention degrades
    /// rate-limit precision instead of blocking legitimate traffic.
    pub async fn check(&self, class: EndpointClass, client: &str) -> RateDecision {
        let limit = self.limit_for(class);
        let window = self.config.window_secs;

        let cell = self
            .counters
            .entry(CounterKey {
                class,
                client: client.to_string(),
            })
            .or_insert_with(|| {
                Arc::new(Mutex::new(WindowCounter {
                    window_start: epoch_secs(),
                    count: 0,
                }))
            })
            .value()
            .clone();

        let mut guard = None;
        for attempt in 0..=LOCK_RETRIES {
            if let Ok(g) = cell.try_lock() {
                guard = Some(g);
                break;
            }
            if attempt < LOCK_RETRIES {
                tokio::time::sleep(LOCK_RETRY_DELAY).await;
            }
        }
        let Some(mut counter) = guard else {
            metrics::counter!(observability::RATE_LIMITER_FAILOPEN_TOTAL).increment(1);
            tracing::debug!(
                class = class.as_str(),
                "rate-limit lock contended, allowing uncounted"
            );
            let now = epoch_secs();
            return RateDecision::Allowed {
                limit,
                remaining: 0,
                reset: now + window,
            };
        };

        let now = epoch_secs();
        if now >= counter.window_start + window {
            counter.window_start = now;
            counter.count = 0;
        }
        let reset = counter.window_start + window;

        if counter.count >= limit {
            metrics::counter!(observability::RATE_LIMITED_TOTAL, "class" => class.as_str())
                .increment(1);
            return RateDecision::Limited {
                limit,
                reset,
                retry_after: reset.saturating_sub(now).max(1),
            };
        }
        counter.count += 1;
        RateDecision::Allowed {
            limit,
            remaining: limit - counter.count,
            reset,
        }
    }

    /// Drop counters whose window ended more than `idle` ago. Entries whose
    /// lock is held are in use and kept. Returns the number removed.
    pub fn prune_idle(&self, idle: Duration) -> usize {
        let now = epoch_secs();
        let horizon = self.config.window_secs + idle.as_secs();
        let before = self.counters.len();
        self.counters.retain(|_, cell| match cell.try_lock() {
            Ok(c) => now < c.window_start + horizon,
            Err(_) => true,
        });
        let after = self.counters.len();
        metrics::gauge!(observability::RATE_COUNTERS_ACTIVE).set(after as f64);
        before.saturating_sub(after)
    }
}
