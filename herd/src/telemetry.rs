//! Tracing and telemetry instrumentation for herd.
//!
//! Helpers for creating spans around deployment phases and per-instance
//! remote work, and for recording the outcomes of both. All functions work
//! with and without the `metrics` feature flag; without it they only log.
//!
//! # Example
//!
//! ```ignore
//! use herd::telemetry::{phase_span, record_phase_completed};
//!
//! let span = phase_span("analytics", "install_packages");
//! let _enter = span.enter();
//! // ... phase body
//! record_phase_completed("analytics", "install_packages", elapsed);
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::{info_span, Instrument, Span};

/// Create a span covering one orchestration phase of a cluster.
#[must_use]
pub fn phase_span(cluster: impl AsRef<str>, phase: impl AsRef<str>) -> Span {
    info_span!(
        "herd.phase",
        cluster = %cluster.as_ref(),
        phase = %phase.as_ref(),
    )
}

/// Create a span for one unit of remote work on an instance.
///
/// # Arguments
/// * `task` - Label of the fan-out the work belongs to (e.g. `install_packages`)
/// * `instance` - Name of the target instance
#[must_use]
pub fn instance_span(task: impl AsRef<str>, instance: impl AsRef<str>) -> Span {
    info_span!(
        "herd.instance",
        task = %task.as_ref(),
        instance = %instance.as_ref(),
    )
}

/// Instrument a future with a phase span.
pub fn instrument_phase<F>(
    cluster: impl AsRef<str>,
    phase: impl AsRef<str>,
    future: F,
) -> impl Future<Output = F::Output>
where
    F: Future,
{
    future.instrument(phase_span(cluster, phase))
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Record a phase that ran to completion.
pub fn record_phase_completed(cluster: impl AsRef<str>, phase: impl AsRef<str>, elapsed: Duration) {
    tracing::info!(
        cluster = %cluster.as_ref(),
        phase = %phase.as_ref(),
        elapsed_ms = whole_millis(elapsed),
        "phase completed"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_phase_duration(phase.as_ref(), "ok", elapsed.as_secs_f64());
}

/// Record a phase that aborted the run.
pub fn record_phase_failed(
    cluster: impl AsRef<str>,
    phase: impl AsRef<str>,
    error_kind: impl AsRef<str>,
    elapsed: Duration,
) {
    tracing::error!(
        cluster = %cluster.as_ref(),
        phase = %phase.as_ref(),
        error_kind = %error_kind.as_ref(),
        elapsed_ms = whole_millis(elapsed),
        "phase failed"
    );

    #[cfg(feature = "metrics")]
    {
        crate::metrics::observe_phase_duration(phase.as_ref(), "error", elapsed.as_secs_f64());
        crate::metrics::record_deployment_failure(error_kind.as_ref());
    }
}

/// Record one failed unit of remote work.
pub fn record_remote_failure(task: impl AsRef<str>) {
    #[cfg(feature = "metrics")]
    crate::metrics::record_remote_failure(task.as_ref());

    #[cfg(not(feature = "metrics"))]
    let _ = task;
}

/// Record how long a readiness barrier took to clear and how many times it
/// was evaluated.
pub fn observe_barrier_wait(barrier: impl AsRef<str>, attempts: u32, waited: Duration) {
    tracing::info!(
        barrier = %barrier.as_ref(),
        attempts,
        waited_ms = whole_millis(waited),
        "barrier satisfied"
    );

    #[cfg(feature = "metrics")]
    crate::metrics::observe_barrier_wait(barrier.as_ref(), waited.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_span() {
        let span = phase_span("c1", "configure_os");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "herd.phase");
        }
    }

    #[test]
    fn test_instance_span() {
        let span = instance_span("install_packages", "worker-1");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "herd.instance");
        }
    }

    #[test]
    fn test_whole_millis_saturates() {
        assert_eq!(whole_millis(Duration::from_micros(2_500)), 2);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_instrument_phase_passes_output_through() {
        let value = instrument_phase("c1", "deploy_configs", async { 7 }).await;
        assert_eq!(value, 7);
    }

    #[test]
    fn test_recorders_do_not_panic() {
        record_phase_completed("c1", "start_agents", Duration::from_millis(12));
        record_phase_failed("c1", "await_agents", "deadline_exceeded", Duration::from_secs(300));
        record_remote_failure("install_packages");
        observe_barrier_wait("agents", 3, Duration::from_secs(10));
    }
}
