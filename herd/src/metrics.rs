//! Prometheus metrics for herd deployments.
//!
//! Compiled only with the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `herd_remote_failures_total` - Failed units of per-instance remote work
//! - `herd_deployment_failures_total` - Orchestration runs aborted, by error kind
//!
//! ## Histograms
//! - `herd_phase_duration_seconds` - Wall time of each orchestration phase
//! - `herd_barrier_wait_seconds` - Time spent waiting on readiness barriers
#![cfg(feature = "metrics")]

use prometheus::{exponential_buckets, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::LazyLock;

/// Global Prometheus registry for herd metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Labels: `task`.
pub static REMOTE_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "herd_remote_failures_total",
        "Total number of failed per-instance remote operations",
    );
    CounterVec::new(opts, &["task"]).expect("herd_remote_failures_total metric creation failed")
});

/// Labels: `error_kind` (see `ProvisionError::kind`).
pub static DEPLOYMENT_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "herd_deployment_failures_total",
        "Total number of aborted orchestration runs",
    );
    CounterVec::new(opts, &["error_kind"])
        .expect("herd_deployment_failures_total metric creation failed")
});

/// Labels: `phase`, `status` (`ok` or `error`).
pub static PHASE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.01, 2.0, 16).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "herd_phase_duration_seconds",
        "Orchestration phase duration in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["phase", "status"])
        .expect("herd_phase_duration_seconds metric creation failed")
});

/// Labels: `barrier`.
pub static BARRIER_WAIT_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.5, 2.0, 12).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "herd_barrier_wait_seconds",
        "Time spent waiting for readiness barriers in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["barrier"]).expect("herd_barrier_wait_seconds metric creation failed")
});

/// Register all metrics with the global registry.
///
/// Idempotent; duplicate registrations are ignored.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(REMOTE_FAILURES_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(DEPLOYMENT_FAILURES_TOTAL.clone()),
        Box::new(PHASE_DURATION_SECONDS.clone()),
        Box::new(BARRIER_WAIT_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_remote_failure(task: &str) {
    REMOTE_FAILURES_TOTAL.with_label_values(&[task]).inc();
}

pub fn record_deployment_failure(error_kind: &str) {
    DEPLOYMENT_FAILURES_TOTAL.with_label_values(&[error_kind]).inc();
}

pub fn observe_phase_duration(phase: &str, status: &str, duration_secs: f64) {
    PHASE_DURATION_SECONDS
        .with_label_values(&[phase, status])
        .observe(duration_secs);
}

pub fn observe_barrier_wait(barrier: &str, waited_secs: f64) {
    BARRIER_WAIT_SECONDS.with_label_values(&[barrier]).observe(waited_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    encoder
        .encode_to_string(&REGISTRY.gather())
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization_is_idempotent() {
        init_metrics().expect("metrics initialization should succeed");
        init_metrics().expect("second initialization should succeed");
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics().expect("metrics initialization should succeed");

        record_remote_failure("install_packages");
        record_deployment_failure("deadline_exceeded");
        observe_phase_duration("await_agents", "error", 300.0);
        observe_barrier_wait("manager", 4.0);

        let output = gather_metrics().expect("gather should succeed");
        assert!(output.contains("herd_remote_failures_total"));
        assert!(output.contains("herd_deployment_failures_total"));
        assert!(output.contains("herd_phase_duration_seconds"));
        assert!(output.contains("herd_barrier_wait_seconds"));
    }
}
