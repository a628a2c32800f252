//! Circuit breaking for the search backend.
//!
//! [`ResilientSearchBackend`] stops calling a backend that keeps dropping
//! requests. Once `breaker_failure_threshold` transport faults
//! ([`IndexError::is_unavailable`]) arrive in a row, calls fail fast with
//! [`IndexError::CircuitOpen`] until `breaker_reset_timeout_ms` has passed.
//! After that a limited number of trial calls go through; the first answer
//! decides whether the circuit closes again or stays open for another period.
//!
//! A rejection or a failed task means the backend answered, so it clears the
//! fault streak instead of extending it.
//!
//! [`SearchBackend::health`] always reaches the backend.
//!
//! ```rust,ignore
//! let resilient = ResilientSearchBackend::new(backend, &config.search.breaker);
//! resilient.upsert_documents("products", &documents)?;
//! ```

use crate::models::Document;
use crate::storage::traits::{BackendHealth, IndexError, IndexResult, SearchBackend};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Resilience configuration for the search backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for StorageResilienceConfig {
    fn default() -> Self {
        Self {
            breaker_failure_threshold: 5,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl StorageResilienceConfig {
    /// Loads resilience configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `RAPIDSTOCK_SEARCH_BREAKER_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(parsed) = env_parse::<u32>("RAPIDSTOCK_SEARCH_BREAKER_FAILURE_THRESHOLD") {
            self.breaker_failure_threshold = parsed.max(1);
        }
        if let Some(parsed) = env_parse::<u64>("RAPIDSTOCK_SEARCH_BREAKER_RESET_MS") {
            self.breaker_reset_timeout_ms = parsed;
        }
        if let Some(parsed) = env_parse::<u32>("RAPIDSTOCK_SEARCH_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.breaker_half_open_max_calls = parsed.max(1);
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.breaker_failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.breaker_reset_timeout_ms = timeout_ms;
        self
    }

    /// Sets the half-open max calls.
    #[must_use]
    pub const fn with_half_open_max_calls(mut self, max_calls: u32) -> Self {
        self.breaker_half_open_max_calls = max_calls;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Where a [`CircuitBreaker`] currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerPosition {
    /// Calls pass through.
    Closed,
    /// Calls fail fast.
    Open,
    /// A bounded number of trial calls pass through.
    HalfOpen,
}

impl BreakerPosition {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }

    /// Value reported on the `search_circuit_breaker_state` gauge.
    const fn gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::Open => 1.0,
            Self::HalfOpen => 2.0,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Closed { streak: u32 },
    Open { retry_at: Instant },
    HalfOpen { admitted: u32 },
}

/// Counts consecutive transport faults for one backend.
#[derive(Debug)]
pub struct CircuitBreaker {
    phase: Phase,
    threshold: u32,
    cooldown: Duration,
    trial_calls: u32,
    backend: &'static str,
}

impl CircuitBreaker {
    /// Creates a closed breaker. Zero thresholds are raised to 1.
    #[must_use]
    pub fn new(config: &StorageResilienceConfig, backend: &'static str) -> Self {
        Self {
            phase: Phase::Closed { streak: 0 },
            threshold: config.breaker_failure_threshold.max(1),
            cooldown: Duration::from_millis(config.breaker_reset_timeout_ms),
            trial_calls: config.breaker_half_open_max_calls.max(1),
            backend,
        }
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> BreakerPosition {
        match self.phase {
            Phase::Closed { .. } => BreakerPosition::Closed,
            Phase::Open { .. } => BreakerPosition::Open,
            Phase::HalfOpen { .. } => BreakerPosition::HalfOpen,
        }
    }

    /// Name of the guarded backend.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        self.backend
    }

    /// Admits a call, or refuses it while open or out of trial calls.
    pub fn try_acquire(&mut self) -> bool {
        match self.phase {
            Phase::Closed { .. } => true,
            Phase::Open { retry_at } => {
                if Instant::now() < retry_at {
                    return false;
                }
                tracing::info!(backend = self.backend, "Search circuit half-open");
                self.phase = Phase::HalfOpen { admitted: 1 };
                true
            },
            Phase::HalfOpen { admitted } => {
                if admitted >= self.trial_calls {
                    return false;
                }
                self.phase = Phase::HalfOpen {
                    admitted: admitted + 1,
                };
                true
            },
        }
    }

    /// The backend answered.
    pub fn record_answer(&mut self) {
        if !matches!(self.phase, Phase::Closed { .. }) {
            tracing::info!(
                backend = self.backend,
                from = self.position().as_str(),
                "Search circuit closed"
            );
        }
        self.phase = Phase::Closed { streak: 0 };
    }

    /// The backend could not be reached. Returns `true` when this trips the circuit.
    pub fn record_fault(&mut self) -> bool {
        let streak = match self.phase {
            Phase::Closed { streak } => streak + 1,
            Phase::HalfOpen { .. } => self.threshold,
            Phase::Open { .. } => return false,
        };
        if streak < self.threshold {
            self.phase = Phase::Closed { streak };
            return false;
        }
        tracing::warn!(
            backend = self.backend,
            streak,
            cooldown_ms = u64::try_from(self.cooldown.as_millis()).unwrap_or(u64::MAX),
            "Search circuit open"
        );
        self.phase = Phase::Open {
            retry_at: Instant::now() + self.cooldown,
        };
        true
    }
}

/// Search backend wrapper with circuit breaker protection.
pub struct ResilientSearchBackend<S: SearchBackend> {
    inner: S,
    breaker: Mutex<CircuitBreaker>,
}

impl<S: SearchBackend> ResilientSearchBackend<S> {
    /// Wraps `inner` with a breaker named after the backend.
    #[must_use]
    pub fn new(inner: S, config: &StorageResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(config, inner.name());
        Self {
            inner,
            breaker: Mutex::new(breaker),
        }
    }

    /// Returns the wrapped backend.
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// Current breaker position.
    #[must_use]
    pub fn breaker_position(&self) -> BreakerPosition {
        self.lock_breaker().position()
    }

    fn lock_breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        self.breaker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Runs `call` unless the circuit is open.
    ///
    /// Only faults where the backend could not be reached count toward the
    /// threshold.
    fn execute<T, F>(&self, operation: &'static str, call: F) -> IndexResult<T>
    where
        F: FnOnce() -> IndexResult<T>,
    {
        let backend = self.inner.name();
        let refused = {
            let mut breaker = self.lock_breaker();
            (!breaker.try_acquire()).then(|| breaker.position())
        };
        if let Some(position) = refused {
            Self::record_metrics(backend, operation, "circuit_open", position);
            return Err(IndexError::CircuitOpen { operation, backend });
        }

        let result = call();

        let (status, tripped, position) = {
            let mut breaker = self.lock_breaker();
            let (status, tripped) = match &result {
                Ok(_) => {
                    breaker.record_answer();
                    ("success", false)
                },
                Err(err) if err.is_unavailable() => ("unavailable", breaker.record_fault()),
                Err(_) => {
                    breaker.record_answer();
                    ("error", false)
                },
            };
            (status, tripped, breaker.position())
        };
        Self::record_metrics(backend, operation, status, position);
        if tripped {
            metrics::counter!(
                "search_circuit_breaker_trips_total",
                "backend" => backend,
                "operation" => operation
            )
            .increment(1);
        }

        result
    }

    fn record_metrics(
        backend: &'static str,
        operation: &'static str,
        status: &'static str,
        position: BreakerPosition,
    ) {
        metrics::counter!(
            "search_requests_total",
            "backend" => backend,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::gauge!("search_circuit_breaker_state", "backend" => backend).set(position.gauge());
    }
}

impl<S: SearchBackend> SearchBackend for ResilientSearchBackend<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn ensure_collection_exists(&self, name: &str, primary_key: &str) -> IndexResult<bool> {
        self.execute("ensure_collection_exists", || {
            self.inner.ensure_collection_exists(name, primary_key)
        })
    }

    fn replace_all_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> IndexResult<usize> {
        self.execute("replace_all_documents", || {
            self.inner.replace_all_documents(collection, documents)
        })
    }

    fn upsert_documents(&self, collection: &str, documents: &[Document]) -> IndexResult<()> {
        if documents.is_empty() {
            return Ok(());
        }
        self.execute("upsert_documents", || {
            self.inner.upsert_documents(collection, documents)
        })
    }

    fn delete_documents(&self, collection: &str, ids: &[i64]) -> IndexResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.execute("delete_documents", || {
            self.inner.delete_documents(collection, ids)
        })
    }

    fn delete_document(&self, collection: &str, id: i64) -> IndexResult<()> {
        self.execute("delete_document", || {
            self.inner.delete_document(collection, id)
        })
    }

    fn search(&self, collection: &str, query: &str) -> IndexResult<Vec<Document>> {
        self.execute("search", || self.inner.search(collection, query))
    }

    fn health(&self) -> BackendHealth {
        self.inner.health()
    }
}
