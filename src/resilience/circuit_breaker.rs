//! Consecutive-failure circuit breaker.
//!
//! Three states: Closed (calls pass), Open (calls short-circuit) and
//! HalfOpen (a single probe call decides whether to close again). State is
//! kept behind one short-lived lock that is never held across an await.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Breaker parameters for one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub fail_max: u32,
    /// How long an open breaker waits before allowing a probe
    pub timeout_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            fail_max: 3,
            timeout_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Circuit breaker shared by every caller of one dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        info!(
            dependency = %name,
            fail_max = config.fail_max,
            timeout_secs = config.timeout_duration.as_secs(),
            "Circuit breaker initialized"
        );
        CircuitBreaker {
            name,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Ask to make a call. Returns `None` when the call must short-circuit.
    ///
    /// The returned permit must be settled with `success` or `failure`;
    /// dropping it unsettled (a cancelled call) counts as a failure.
    pub fn acquire(&self) -> Option<BreakerPermit<'_>> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.timeout_duration)
                    .unwrap_or(true);
                if !elapsed {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                info!(dependency = %self.name, "Circuit breaker half-open: probing");
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return None;
                }
                inner.probe_in_flight = true;
            }
        }
        Some(BreakerPermit {
            breaker: self,
            settled: false,
        })
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                info!(dependency = %self.name, "Circuit breaker closed");
            }
            CircuitState::Closed => inner.consecutive_failures = 0,
            // A call admitted before the breaker opened; the open period stands.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.probe_in_flight = false;
                warn!(dependency = %self.name, "Probe failed, circuit breaker re-opened");
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.fail_max {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        dependency = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }
}

/// Admission to make one call through a breaker.
#[must_use]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl BreakerPermit<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure();
        }
    }
}
