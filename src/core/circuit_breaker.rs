//! Per-operation circuit breaking with an explicit fallback path.
//!
//! Each named operation owns one state machine:
//!
//! - **Closed**: calls pass through; consecutive failures are counted and the
//!   configured threshold opens the circuit.
//! - **Open**: the protected path is not attempted and the fallback runs
//!   immediately, until the cool-down since `opened_at` elapses.
//! - **Half-open**: exactly one trial call is let through; success closes the
//!   circuit, failure reopens it with a fresh `opened_at`.
//!
//! [`CircuitBreaker::protect`] wires this to a primary/fallback closure pair:
//! the breaker never surfaces the primary's failure to the caller, it records
//! it and serves the fallback instead. Only a failure of the fallback itself
//! propagates. A tripped breaker is a designed degraded mode, so the
//! short-circuit path logs at debug, not as an error.
use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

/// State of one breaker, per named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "closed"),
            BreakerState::Open => write!(f, "open"),
            BreakerState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Breaker tuning, shared by every operation in the registry.
#[derive(Debug, Clone, Copy)]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Cool-down before a half-open trial is allowed.
    pub open_duration: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Outcome of reading the state before a call attempt.
enum Permit {
    /// Attempt the protected path. `trial` marks the single half-open probe.
    Primary { trial: bool },
    /// Circuit is open: skip straight to the fallback.
    ShortCircuit,
}

/// Failure-tracking gate around one named operation.
pub struct CircuitBreaker {
    operation: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(operation: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            operation: operation.into(),
            settings,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Current state, for diagnostics and tests.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Run `primary` under the breaker, substituting `fallback` when the
    /// circuit is open or the primary path fails.
    pub async fn protect<T, E, P, F, PFut, FFut>(&self, primary: P, fallback: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        P: FnOnce() -> PFut,
        F: FnOnce() -> FFut,
        PFut: Future<Output = Result<T, E>>,
        FFut: Future<Output = Result<T, E>>,
    {
        match self.acquire() {
            Permit::Primary { trial } => {
                // The inbound caller may drop us mid-trial; the slot must
                // not stay claimed by a future that never completes.
                let mut trial_guard = trial.then(|| TrialSlotGuard { breaker: self });
                match primary().await {
                    Ok(value) => {
                        if let Some(guard) = trial_guard.take() {
                            guard.disarm();
                        }
                        self.on_success(trial);
                        Ok(value)
                    }
                    Err(e) => {
                        if let Some(guard) = trial_guard.take() {
                            guard.disarm();
                        }
                        self.on_failure(trial);
                        tracing::info!(
                            operation = %self.operation,
                            error = %e,
                            "primary path failed, serving fallback"
                        );
                        fallback().await
                    }
                }
            }
            Permit::ShortCircuit => {
                tracing::debug!(
                    operation = %self.operation,
                    "circuit open, serving fallback without attempting primary"
                );
                fallback().await
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read-and-maybe-mutate exactly one state per call attempt.
    fn acquire(&self) -> Permit {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => Permit::Primary { trial: false },
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.settings.open_duration {
                    inner.state = BreakerState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(
                        operation = %self.operation,
                        "cool-down elapsed, circuit half-open for one trial call"
                    );
                    Permit::Primary { trial: true }
                } else {
                    Permit::ShortCircuit
                }
            }
            BreakerState::HalfOpen => {
                if inner.trial_in_flight {
                    Permit::ShortCircuit
                } else {
                    inner.trial_in_flight = true;
                    Permit::Primary { trial: true }
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        if trial || inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Closed;
            inner.opened_at = None;
            inner.trial_in_flight = false;
            tracing::info!(operation = %self.operation, "trial call succeeded, circuit closed");
        }
        inner.consecutive_failures = 0;
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        if trial || inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            tracing::warn!(operation = %self.operation, "trial call failed, circuit reopened");
            return;
        }
        if inner.state == BreakerState::Closed {
            inner.consecutive_failures += 1;
            if inner.consecutive_failures >= self.settings.failure_threshold {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    operation = %self.operation,
                    failures = inner.consecutive_failures,
                    "failure threshold reached, circuit opened"
                );
            }
        }
    }
}

/// Releases the half-open trial slot if the trial future is dropped before
/// it completes, so an abandoned call cannot leave the breaker serving the
/// fallback forever.
struct TrialSlotGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl TrialSlotGuard<'_> {
    /// The trial ran to completion; state transitions are handled by
    /// `on_success`/`on_failure` instead.
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl Drop for TrialSlotGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.breaker.lock();
        if inner.state == BreakerState::HalfOpen && inner.trial_in_flight {
            inner.trial_in_flight = false;
            tracing::warn!(
                operation = %self.breaker.operation,
                "half-open trial abandoned, releasing the trial slot"
            );
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("operation", &self.operation)
            .field("state", &self.state())
            .finish()
    }
}

/// Process-wide registry of breakers, keyed by operation name. Shared across
/// all concurrent requests.
pub struct BreakerRegistry {
    settings: BreakerSettings,
    breakers: scc::HashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: scc::HashMap::new(),
        }
    }

    /// Fetch the breaker for an operation, creating it on first use.
    pub fn get_or_create(&self, operation: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read_sync(operation, |_, b| b.clone()) {
            return existing;
        }
        let created = Arc::new(CircuitBreaker::new(operation, self.settings));
        match self.breakers.insert_sync(operation.to_string(), created.clone()) {
            Ok(()) => created,
            // Lost the race: another request registered it first.
            Err(_) => self
                .breakers
                .read_sync(operation, |_, b| b.clone())
                .unwrap_or(created),
        }
    }

    pub fn get(&self, operation: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read_sync(operation, |_, b| b.clone())
    }
}
