use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::error::{ProvisionError, Result};
use crate::telemetry;
use crate::topology::Instance;

/// The default number of units allowed to run at once.
pub const DEFAULT_MAX_PARALLELISM: usize = 16;

/// Runs one unit of work per instance concurrently and joins all of them.
///
/// Every unit runs on its own tokio task; at most `max_parallelism` execute
/// at a time. A call returns only after every unit has finished, so a failing
/// unit never leaves siblings running in the background. Units are owned by
/// the call: dropping its future (a caller timeout, say) aborts them. When units fail, the
/// error reported is that of the earliest failing target (in target order),
/// annotated with how many units failed in total.
#[derive(Clone, Debug)]
pub struct FanOut {
    max_parallelism: usize,
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARALLELISM)
    }
}

impl FanOut {
    pub fn new(max_parallelism: usize) -> Self {
        Self {
            max_parallelism: max_parallelism.max(1),
        }
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Run `op` against every target; results are returned in target order.
    pub async fn run<T, F, Fut>(&self, task: &str, targets: &[Instance], op: F) -> Result<Vec<T>>
    where
        F: Fn(Instance) -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut units = JoinSet::new();
        let mut unit_index = HashMap::with_capacity(targets.len());

        for (index, instance) in targets.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let unit = op(instance.clone());
            let span = telemetry::instance_span(task, &instance.name);
            let handle = units.spawn(
                async move {
                    // Held until the unit finishes.
                    let _permit = semaphore.acquire_owned().await.ok();
                    (index, unit.await)
                }
                .instrument(span),
            );
            unit_index.insert(handle.id(), index);
        }

        // Dropping this future drops `units`, which aborts whatever is still running.
        let mut outcomes: Vec<Option<anyhow::Result<T>>> = targets.iter().map(|_| None).collect();
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(join_err) => {
                    if let Some(&index) = unit_index.get(&join_err.id()) {
                        outcomes[index] = Some(Err(anyhow::anyhow!("unit did not complete: {join_err}")));
                    }
                }
            }
        }

        let total = targets.len();
        let mut results = Vec::with_capacity(total);
        let mut first_failure: Option<(String, anyhow::Error)> = None;
        let mut failed = 0usize;

        for (instance, outcome) in targets.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| Err(anyhow::anyhow!("unit did not report an outcome")));
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(task, instance = %instance.name, error = %err, "fan-out unit failed");
                    telemetry::record_remote_failure(task);
                    if first_failure.is_none() {
                        first_failure = Some((instance.name.clone(), err));
                    }
                }
            }
        }

        match first_failure {
            None => Ok(results),
            Some((instance, source)) => Err(ProvisionError::RemoteOperation {
                task: task.to_string(),
                instance,
                failed,
                total,
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn instances(n: usize) -> Vec<Instance> {
        (0..n)
            .map(|i| Instance::new(format!("node-{i}"), format!("node-{i}.lab"), format!("10.0.0.{i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_results_in_target_order() {
        let fan_out = FanOut::new(4);
        let targets = instances(6);

        let names = fan_out
            .run("echo", &targets, |instance| async move {
                let index: u64 = instance.name.trim_start_matches("node-").parse()?;
                // Later targets finish first.
                tokio::time::sleep(Duration::from_millis((6 - index) * 3)).await;
                Ok::<_, anyhow::Error>(instance.name)
            })
            .await
            .unwrap();

        let expected: Vec<_> = targets.iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn test_failure_waits_for_every_unit() {
        let fan_out = FanOut::default();
        let targets = instances(5);
        let finished = Arc::new(AtomicUsize::new(0));

        let err = fan_out
            .run("install", &targets, |instance| {
                let finished = Arc::clone(&finished);
                async move {
                    if instance.name == "node-1" || instance.name == "node-3" {
                        anyhow::bail!("exit status 100 on {}", instance.name);
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap_err();

        assert_eq!(finished.load(Ordering::SeqCst), 3);
        match err {
            ProvisionError::RemoteOperation {
                instance,
                failed,
                total,
                ..
            } => {
                assert_eq!(instance, "node-1");
                assert_eq!(failed, 2);
                assert_eq!(total, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_panicking_unit_is_reported() {
        let fan_out = FanOut::default();
        let targets = instances(2);

        let err = fan_out
            .run("agent-start", &targets, |instance| async move {
                if instance.name == "node-0" {
                    panic!("boom");
                }
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::RemoteOperation { ref instance, .. } if instance == "node-0"));
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let limit = 3;
        let fan_out = FanOut::new(limit);
        let targets = instances(12);
        let running = Arc::new(AtomicUsize::new(0));

        let watermarks = fan_out
            .run("bounded", &targets, |_| {
                let running = Arc::clone(&running);
                async move {
                    let watermark = running.fetch_add(1, Ordering::SeqCst) + 1;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(watermark)
                }
            })
            .await
            .unwrap();

        assert!(watermarks.into_iter().all(|w| w <= limit));
    }

    #[tokio::test]
    async fn test_dropped_run_aborts_units() {
        let fan_out = FanOut::default();
        let targets = instances(4);
        let finished = Arc::new(AtomicUsize::new(0));

        let run = fan_out.run("slow", &targets, |_| {
            let finished = Arc::clone(&finished);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), run).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_targets() {
        let out: Vec<()> = FanOut::default()
            .run("noop", &[], |_| async { Ok(()) })
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
