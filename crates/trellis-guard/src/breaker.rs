//! Two-step circuit breaker.
//!
//! Admission happens in two steps: [`CircuitBreaker::allow`] hands out a
//! [`Permit`] (or fails fast), and the caller reports the observed outcome
//! through [`CircuitBreaker::on_result`]. Generations guard against stale
//! reports: an outcome observed across a state change is discarded.
//!
//! States: **closed** (everything passes, counters accumulate and reset
//! every `interval`), **open** (fail fast, dwell for `timeout`), and
//! **half-open** (at most `max_requests` probes; any failure reopens,
//! `max_requests` consecutive successes close).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use trellis_core::{Context, Problem};

use crate::interceptor::{BoxFuture, Interceptor, Next};
use crate::types::{Outcome, Request};

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Probes permitted while half-open.
    pub max_requests: u32,
    /// Counter reset period while closed. Zero disables periodic resets.
    pub interval: Duration,
    /// Open-state dwell before probing again.
    pub timeout: Duration,
    /// Consecutive failures required to trip.
    pub max_consecutive_failures: u32,
    /// Failure ratio (totalFailures / requests) required to trip.
    pub max_failure_ratio: f64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            interval: Duration::from_secs(15),
            timeout: Duration::from_secs(15),
            max_consecutive_failures: 10,
            max_failure_ratio: 0.6,
        }
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Requests pass; counters accumulate.
    Closed,
    /// Requests fail fast.
    Open,
    /// A bounded number of probes pass.
    HalfOpen,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Closed => f.write_str("closed"),
            State::Open => f.write_str("open"),
            State::HalfOpen => f.write_str("half-open"),
        }
    }
}

/// Request counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Requests admitted.
    pub requests: u32,
    /// Successful completions.
    pub total_successes: u32,
    /// Failed completions.
    pub total_failures: u32,
    /// Current success streak.
    pub consecutive_successes: u32,
    /// Current failure streak.
    pub consecutive_failures: u32,
}

/// Admission failure.
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq, Eq)]
pub enum BreakerError {
    /// The breaker is open.
    #[error("circuit breaker is open")]
    Open,
    /// The half-open probe budget is spent.
    #[error("too many requests in half-open state")]
    TooManyRequests,
}

/// A completion token returned by [`CircuitBreaker::allow`].
#[derive(Debug)]
#[must_use = "report the outcome via on_result"]
pub struct Permit {
    generation: u64,
}

struct Inner {
    state: State,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// A per-endpoint circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given configuration.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let interval = config.interval;
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry: expiry_for(State::Closed, Instant::now(), interval, Duration::ZERO),
            }),
        }
    }

    /// The breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state, advancing expired timers first.
    pub fn state(&self) -> State {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// The current generation's counters.
    pub fn counts(&self) -> Counts {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Requests admission. On success the returned permit must be fed back
    /// through [`CircuitBreaker::on_result`].
    pub fn allow(&self) -> Result<Permit, BreakerError> {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        match inner.state {
            State::Open => Err(BreakerError::Open),
            State::HalfOpen if inner.counts.requests >= self.config.max_requests => {
                Err(BreakerError::TooManyRequests)
            }
            _ => {
                inner.counts.requests += 1;
                Ok(Permit {
                    generation: inner.generation,
                })
            }
        }
    }

    /// Reports the outcome observed for a permitted request. Reports from a
    /// previous generation are discarded.
    pub fn on_result(&self, permit: Permit, success: bool) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);
        if permit.generation != inner.generation {
            return;
        }
        if success {
            inner.counts.total_successes += 1;
            inner.counts.consecutive_successes += 1;
            inner.counts.consecutive_failures = 0;
            if inner.state == State::HalfOpen
                && inner.counts.consecutive_successes >= self.config.max_requests
            {
                self.transition(&mut inner, State::Closed, now);
            }
        } else {
            inner.counts.total_failures += 1;
            inner.counts.consecutive_failures += 1;
            inner.counts.consecutive_successes = 0;
            match inner.state {
                State::Closed if self.ready_to_trip(&inner.counts) => {
                    self.transition(&mut inner, State::Open, now);
                }
                State::HalfOpen => self.transition(&mut inner, State::Open, now),
                _ => {}
            }
        }
    }

    fn ready_to_trip(&self, counts: &Counts) -> bool {
        if counts.requests == 0 {
            return false;
        }
        let ratio = f64::from(counts.total_failures) / f64::from(counts.requests);
        counts.consecutive_failures >= self.config.max_consecutive_failures
            && ratio >= self.config.max_failure_ratio
    }

    /// Advances expired timers: open -> half-open after `timeout`, and a
    /// fresh counting generation every `interval` while closed.
    fn refresh(&self, inner: &mut Inner, now: Instant) {
        match inner.state {
            State::Open => {
                if inner.expiry.is_some_and(|e| e <= now) {
                    self.transition(inner, State::HalfOpen, now);
                }
            }
            State::Closed => {
                if inner.expiry.is_some_and(|e| e <= now) {
                    inner.generation += 1;
                    inner.counts = Counts::default();
                    inner.expiry =
                        expiry_for(State::Closed, now, self.config.interval, self.config.timeout);
                }
            }
            State::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut Inner, to: State, now: Instant) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = expiry_for(to, now, self.config.interval, self.config.timeout);
        tracing::info!(
            breaker = %self.name,
            %from,
            %to,
            "circuit breaker state changed"
        );
    }
}

fn expiry_for(state: State, now: Instant, interval: Duration, timeout: Duration) -> Option<Instant> {
    match state {
        State::Closed => (!interval.is_zero()).then(|| now + interval),
        State::Open => Some(now + timeout),
        State::HalfOpen => None,
    }
}

/// The circuit-breaker interceptor.
///
/// Admission failure renders as the built-in `CIRCUIT_BROKEN` problem. On
/// the way out, an `Ok` outcome or an error with status below 500 counts
/// as success.
pub struct BreakerInterceptor {
    breaker: Arc<CircuitBreaker>,
}

impl BreakerInterceptor {
    /// Wraps a breaker instance.
    #[must_use]
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    /// The underlying breaker.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

impl Interceptor for BreakerInterceptor {
    fn name(&self) -> &'static str {
        "circuit-breaker"
    }

    fn around<'a>(
        &'a self,
        ctx: &'a mut Context,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let permit = match self.breaker.allow() {
                Ok(permit) => permit,
                Err(_) => return Err(Problem::circuit_broken()),
            };
            let outcome = next.run(ctx, request).await;
            let success = match &outcome {
                Ok(_) => true,
                Err(problem) => !problem.is_server_error(),
            };
            self.breaker.on_result(permit, success);
            outcome
        })
    }
}
