//! In-process counters for authorization checks
//!
//! These count checks; they never store decisions, so they cannot serve
//! stale permissions.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of check counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckMetrics {
    /// Total `has_permission` calls
    pub total_checks: u64,

    /// Checks that returned `true`
    pub allowed: u64,

    /// Checks that returned `false`
    pub denied: u64,

    /// Allowed through the super-admin short-circuit
    pub universal: u64,

    /// Checks denied because resolution failed
    pub resolution_errors: u64,

    /// Latency over the retained samples
    pub avg_latency_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
}

impl CheckMetrics {
    /// Share of checks that were allowed
    pub fn allow_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.allowed as f64 / self.total_checks as f64
        }
    }
}

/// Outcome of a single check, for recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Allowed,
    AllowedUniversal,
    Denied,
    Failed,
}

/// Collects check counters and latency samples
#[derive(Clone)]
pub struct MetricsCollector {
    counters: Arc<RwLock<CheckMetrics>>,
    latency_samples: Arc<RwLock<Vec<f64>>>,
    max_samples: usize,
}

impl MetricsCollector {
    /// Create a collector keeping up to 10,000 latency samples
    pub fn new() -> Self {
        Self::with_max_samples(10_000)
    }

    /// Create a collector keeping up to `max_samples` latency samples
    pub fn with_max_samples(max_samples: usize) -> Self {
        Self {
            counters: Arc::new(RwLock::new(CheckMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::new())),
            max_samples: max_samples.max(1),
        }
    }

    /// Record one check
    pub async fn record(&self, outcome: CheckOutcome, latency: Duration) {
        {
            let mut counters = self.counters.write().await;
            counters.total_checks += 1;

            match outcome {
                CheckOutcome::Allowed => counters.allowed += 1,
                CheckOutcome::AllowedUniversal => {
                    counters.allowed += 1;
                    counters.universal += 1;
                }
                CheckOutcome::Denied => counters.denied += 1,
                CheckOutcome::Failed => {
                    counters.denied += 1;
                    counters.resolution_errors += 1;
                }
            }
        }

        let mut samples = self.latency_samples.write().await;
        if samples.len() >= self.max_samples {
            let excess = samples.len() + 1 - self.max_samples;
            samples.drain(0..excess);
        }
        samples.push(latency.as_secs_f64() * 1000.0);
    }

    /// Current counters with latency figures computed from the samples
    pub async fn snapshot(&self) -> CheckMetrics {
        let mut snapshot = self.counters.read().await.clone();

        let mut sorted = self.latency_samples.read().await.clone();
        if !sorted.is_empty() {
            sorted.sort_by(|a, b| a.total_cmp(b));
            snapshot.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            snapshot.latency_p50_ms = Self::percentile(&sorted, 0.50);
            snapshot.latency_p99_ms = Self::percentile(&sorted, 0.99);
        }

        snapshot
    }

    /// Reset all counters
    pub async fn reset(&self) {
        *self.counters.write().await = CheckMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export counters in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.snapshot().await;

        format!(
            r#"# HELP rbac_checks_total Total number of permission checks
# TYPE rbac_checks_total counter
rbac_checks_total {}

# HELP rbac_allowed_total Number of allowed checks
# TYPE rbac_allowed_total counter
rbac_allowed_total {}

# HELP rbac_denied_total Number of denied checks
# TYPE rbac_denied_total counter
rbac_denied_total {}

# HELP rbac_universal_total Checks allowed by a super-admin role
# TYPE rbac_universal_total counter
rbac_universal_total {}

# HELP rbac_resolution_errors_total Checks denied because resolution failed
# TYPE rbac_resolution_errors_total counter
rbac_resolution_errors_total {}

# HELP rbac_check_latency_seconds Check latency percentiles
# TYPE rbac_check_latency_seconds summary
rbac_check_latency_seconds{{quantile="0.5"}} {}
rbac_check_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_checks,
            metrics.allowed,
            metrics.denied,
            metrics.universal,
            metrics.resolution_errors,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
