//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: testing if the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure ratio over the sampling window >= threshold
//! Open → Half-Open: after the open timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-service breaker (not global)
//! - Fail fast in Open state with a distinguished error the handler maps
//!   to the fallback path
//! - Single probe in Half-Open (prevents hammering a recovering upstream)
//! - Only transport-level failures count; upstream HTTP error statuses are
//!   forwarded to the client as-is
//! - Generation counter so results from a previous window or state cannot
//!   corrupt the current counts

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::CircuitBreakerConfig;

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker refused the call without contacting the upstream.
    #[error("circuit breaker is open")]
    Open,

    /// The wrapped call ran and failed.
    #[error(transparent)]
    Call(E),
}

/// Breaker state observed through [`CircuitBreaker::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Rolling counts for the current window or probe phase.
#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    requests: u64,
    total_failures: u64,
    consecutive_failures: u64,
    consecutive_successes: u64,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.total_failures as f64 / self.requests as f64
    }
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    counts: Counts,
    /// Start of the current sampling window (Closed) or of the open period.
    since: Instant,
    generation: u64,
}

impl BreakerCore {
    fn shift(&mut self, state: CircuitState, now: Instant) {
        self.state = state;
        self.counts = Counts::default();
        self.since = now;
        self.generation += 1;
    }
}

/// A three-state circuit breaker wrapping calls to one upstream service.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    enabled: bool,
    open_timeout: Duration,
    sampling_interval: Duration,
    failure_ratio: f64,
    core: Mutex<BreakerCore>,
}

impl CircuitBreaker {
    pub fn from_config(name: &str, config: &CircuitBreakerConfig) -> Self {
        Self {
            name: format!("cb-{name}"),
            enabled: config.enabled,
            open_timeout: Duration::from_secs(config.timeout),
            sampling_interval: Duration::from_secs(config.interval),
            failure_ratio: config.failure_ratio,
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                counts: Counts::default(),
                since: Instant::now(),
                generation: 0,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Current state, without side effects.
    pub fn state(&self) -> CircuitState {
        self.core.lock().expect("breaker lock poisoned").state
    }

    /// Run `f` under the breaker discipline.
    ///
    /// The lock is taken only around state transitions, never across the
    /// awaited call.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.before_call()?;
        let result = f().await;
        self.after_call(generation, result.is_ok());
        result.map_err(BreakerError::Call)
    }

    /// Admission check; returns the generation the call belongs to.
    fn before_call<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut core = self.core.lock().expect("breaker lock poisoned");
        let now = Instant::now();

        match core.state {
            CircuitState::Closed => {
                if !self.sampling_interval.is_zero()
                    && now.duration_since(core.since) >= self.sampling_interval
                {
                    let state = core.state;
                    core.shift(state, now);
                }
            }
            CircuitState::Open => {
                if now.duration_since(core.since) >= self.open_timeout {
                    tracing::info!(breaker = %self.name, "Breaker half-open, admitting probe");
                    core.shift(CircuitState::HalfOpen, now);
                } else {
                    return Err(BreakerError::Open);
                }
            }
            CircuitState::HalfOpen => {
                // The single probe slot is taken.
                if core.counts.requests >= 1 {
                    return Err(BreakerError::Open);
                }
            }
        }

        core.counts.on_request();
        Ok(core.generation)
    }

    fn after_call(&self, generation: u64, success: bool) {
        let mut core = self.core.lock().expect("breaker lock poisoned");
        if core.generation != generation {
            // The window rolled or the state changed while the call was in
            // flight; its outcome no longer belongs to the current counts.
            return;
        }
        let now = Instant::now();

        if success {
            core.counts.on_success();
            if core.state == CircuitState::HalfOpen && core.counts.consecutive_successes >= 1 {
                tracing::info!(breaker = %self.name, "Probe succeeded, closing breaker");
                core.shift(CircuitState::Closed, now);
            }
            return;
        }

        core.counts.on_failure();
        match core.state {
            CircuitState::Closed => {
                if core.counts.failure_ratio() >= self.failure_ratio {
                    tracing::warn!(
                        breaker = %self.name,
                        requests = core.counts.requests,
                        failures = core.counts.total_failures,
                        consecutive_failures = core.counts.consecutive_failures,
                        "Failure ratio reached, opening breaker"
                    );
                    core.shift(CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "Probe failed, reopening breaker");
                core.shift(CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }
}
