//! Retry budget, backoff delay policy and retry eligibility.
//!
//! A [`RetryConfig`] holds one request's attempt state. A [`Retryer`] turns
//! that state, plus the error of the failed attempt, into a decision and a
//! delay. [`DefaultRetryer`] escalates its delay exponentially and
//! randomizes each delay with symmetric jitter.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::{Error, Temporary};

/// Per-request retry budget and state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryConfig {
    /// Explicit override set by a caller or a retry hook after classifying
    /// the failure.
    pub retryable: Option<bool>,
    /// Number of retries already performed.
    pub retry_count: u32,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Wall-time cap measured from the first send attempt.
    pub max_elapsed: Option<Duration>,
    /// Additional error codes (see [`Error::code`]) treated as retryable.
    pub retry_error_codes: Vec<String>,
    started_at: Option<Instant>,
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    pub fn with_retry_error_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.retry_error_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Conservative base policy: only an explicit `retryable = Some(true)`
    /// permits a retry, and it is honored before the budget check.
    pub fn is_retryable(&self) -> bool {
        if self.retryable == Some(true) {
            return true;
        }
        if self.retry_count >= self.max_retries {
            return false;
        }
        false
    }

    /// Whether the retry budget in attempts is used up.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Time since the first send attempt, zero before it started.
    pub fn elapsed(&self) -> Duration {
        self.started_at
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    /// Time left before the elapsed cap, `None` when no cap is set.
    pub fn remaining_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
            .map(|max_elapsed| max_elapsed.saturating_sub(self.elapsed()))
    }

    /// Shortens `delay` so a wait never runs past the elapsed cap.
    pub fn cap_delay(&self, delay: Duration) -> Duration {
        self.remaining_elapsed()
            .map_or(delay, |remaining| delay.min(remaining))
    }

    pub fn elapsed_exceeded(&self) -> bool {
        self.max_elapsed
            .is_some_and(|max_elapsed| self.elapsed() >= max_elapsed)
    }

    pub(crate) fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Records one more retry, never moving past `max_retries`.
    pub(crate) fn record_retry(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1).min(self.max_retries);
        self.retryable = None;
    }
}

/// Backoff escalation policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayConfig {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the delay used as symmetric random spread, in `[0, 1]`.
    pub jitter: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

impl DelayConfig {
    /// Fixed-step policy with no randomization, mostly useful in tests.
    pub fn constant(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }
}

/// Policy deciding whether and when a failed request is attempted again.
pub trait Retryer: Send + Sync {
    /// Delay to wait before the next attempt. May advance internal state.
    fn retry_delay(&mut self, retry: &RetryConfig) -> Duration;

    /// Whether another attempt is permitted after `error`.
    fn is_retryable(&self, retry: &RetryConfig, error: Option<&Error>) -> bool;
}

/// Retryer used when no retry behavior is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpRetryer;

impl Retryer for NoOpRetryer {
    fn retry_delay(&mut self, _retry: &RetryConfig) -> Duration {
        Duration::ZERO
    }

    fn is_retryable(&self, _retry: &RetryConfig, _error: Option<&Error>) -> bool {
        false
    }
}

/// Exponential backoff retryer with jitter and error classification.
#[derive(Clone, Debug, Default)]
pub struct DefaultRetryer {
    delay: DelayConfig,
    current: Option<Duration>,
}

impl DefaultRetryer {
    pub fn new(delay: DelayConfig) -> Self {
        Self {
            delay,
            current: None,
        }
    }

    pub fn delay_config(&self) -> &DelayConfig {
        &self.delay
    }

    /// Un-jittered delay the next call to `retry_delay` will start from.
    pub fn current_delay(&self) -> Duration {
        self.current.unwrap_or(self.delay.initial_delay)
    }
}

impl Retryer for DefaultRetryer {
    fn retry_delay(&mut self, _retry: &RetryConfig) -> Duration {
        let current = self.current_delay();
        let next = (current.as_secs_f64() * self.delay.multiplier)
            .min(self.delay.max_delay.as_secs_f64())
            .max(0.0);
        self.current =
            Some(Duration::try_from_secs_f64(next).unwrap_or(self.delay.max_delay));
        apply_jitter(current, self.delay.jitter)
    }

    fn is_retryable(&self, retry: &RetryConfig, error: Option<&Error>) -> bool {
        if retry.max_retries == 0 || retry.is_exhausted() || retry.elapsed_exceeded() {
            return false;
        }
        if let Some(retryable) = retry.retryable {
            return retryable;
        }
        let Some(error) = error else {
            return true;
        };
        if error.is_interruption() {
            return false;
        }
        let code = error.code();
        retry.retry_error_codes.iter().any(|candidate| *candidate == code) || error.is_temporary()
    }
}

/// Randomizes `delay` uniformly within `delay * (1 ± jitter)`.
pub fn apply_jitter(delay: Duration, jitter: f64) -> Duration {
    if jitter.is_nan() || jitter <= 0.0 {
        return delay;
    }
    let unit: f64 = rand::rng().random();
    jitter_with(delay, jitter, unit)
}

/// Deterministic form of [`apply_jitter`] for a given uniform draw
/// `unit` in `[0, 1)`.
pub fn jitter_with(delay: Duration, jitter: f64, unit: f64) -> Duration {
    if jitter.is_nan() || jitter <= 0.0 {
        return delay;
    }
    let jitter = jitter.min(1.0);
    let current = delay.as_secs_f64();
    let delta = current * jitter;
    let low = current - delta;
    let high = current + delta;
    let value = low + unit.clamp(0.0, 1.0) * (high - low);
    Duration::try_from_secs_f64(value.clamp(low.max(0.0), high)).unwrap_or(delay)
}
