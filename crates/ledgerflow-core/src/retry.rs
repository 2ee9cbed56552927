//! Retry budget and backoff for bulk writes
//!
//! [`RetryPolicy`] describes the schedule, [`RetryState`] tracks one chunk's
//! progress through it, and [`Sleeper`] performs the wait so tests can record
//! delays instead of spending them.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default number of submissions per chunk
pub const MAX_RETRIES: u32 = 5;

/// Default delay after the first failed submission
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of submissions before a chunk is reported as failed
    pub max_retries: u32,
    /// Delay after the first failed submission
    pub initial_backoff: Duration,
    /// Multiplier applied after each failure
    pub backoff_multiplier: f64,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_backoff: INITIAL_BACKOFF,
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create the default policy (5 submissions, 0.5s doubling)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max retries (builder pattern)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial backoff (builder pattern)
    pub fn with_initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = delay;
        self
    }

    /// Set backoff multiplier (builder pattern)
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set max backoff (builder pattern)
    pub fn with_max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = delay;
        self
    }

    /// Delay after the `attempt`-th failure (1-indexed); zero for attempt 0
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        // cap the exponent so powi stays finite
        let capped_attempt = attempt.min(30);
        let base = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(capped_attempt as i32 - 1);

        Duration::from_secs_f64(base.min(self.max_backoff.as_secs_f64()).max(0.0))
    }

    /// Sum of every delay the policy can incur
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|a| self.delay_for_attempt(a)).sum()
    }
}

/// Per-chunk progress through a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempts: u32,
}

impl RetryState {
    /// Fresh state for a new chunk
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Failed submissions so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed submission and return the delay before the next one
    pub fn record_failure(&mut self) -> Duration {
        self.attempts += 1;
        self.policy.delay_for_attempt(self.attempts)
    }

    /// Whether the budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_retries
    }
}

/// Waits out a backoff delay
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// [`Sleeper`] that records delays and returns immediately
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Every requested delay in order
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Sum of requested delays
    pub fn total(&self) -> Duration {
        self.delays.lock().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}
