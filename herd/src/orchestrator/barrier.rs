use std::collections::HashSet;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{ProvisionError, Result};
use crate::events::DeployEventPayload;
use crate::poller::{PollError, ReadinessPoller};
use crate::telemetry;
use crate::topology::Instance;

use super::Run;

pub(super) const MANAGER_BARRIER: &str = "control plane reachability";
pub(super) const AGENT_BARRIER: &str = "agent registration";

impl Run<'_> {
    /// Block until the control-plane API port on `manager` accepts connections.
    pub(super) async fn await_manager(&self, manager: &Instance) -> Result<()> {
        let poller = ReadinessPoller::from(self.config.manager_barrier);
        let address = (manager.management_ip.clone(), self.config.manager_api_port);
        let attempt_timeout = poller.interval().max(Duration::from_secs(1));
        tracing::debug!(
            timeout = ?poller.timeout(),
            node = %manager.management_ip,
            port = address.1,
            "waiting for control plane to accept connections"
        );

        let started = Instant::now();
        let polled = poller
            .poll(|| {
                let address = address.clone();
                async move {
                    let reachable = match tokio::time::timeout(attempt_timeout, TcpStream::connect(address)).await {
                        Ok(Ok(_stream)) => true,
                        Ok(Err(err)) => {
                            tracing::debug!(error = %err, "control plane not reachable yet");
                            false
                        }
                        Err(_) => false,
                    };
                    Ok::<_, anyhow::Error>(reachable)
                }
            })
            .await;

        let attempts = polled.map_err(|err| match err {
            PollError::DeadlineExceeded { timeout, .. } => ProvisionError::DeadlineExceeded {
                barrier: MANAGER_BARRIER.to_string(),
                cluster: self.cluster.name.clone(),
                node: manager.management_ip.clone(),
                timeout,
            },
            PollError::Predicate(source) => ProvisionError::remote("await_manager", &manager.name, source),
        })?;

        self.barrier_satisfied(MANAGER_BARRIER, attempts, started.elapsed()).await;
        tracing::info!("control plane has been started");
        Ok(())
    }

    /// Block until every instance in `targets` is registered with the control plane.
    pub(super) async fn await_agents(&self, targets: &[Instance]) -> Result<()> {
        let poller = ReadinessPoller::from(self.config.agent_barrier);
        let fqdns: Vec<String> = targets.iter().map(|i| i.fqdn.clone()).collect();
        let unregistered = Mutex::new(fqdns.clone());
        tracing::debug!(timeout = ?poller.timeout(), agents = fqdns.len(), "waiting for agents to register");

        let started = Instant::now();
        let expected = &fqdns;
        let last_missing = &unregistered;
        let polled = poller
            .poll(move || {
                async move {
                    let registered: HashSet<String> = self
                        .control_plane()
                        .get_all_hosts()
                        .await?
                        .into_iter()
                        .map(|host| host.hostname)
                        .collect();
                    let missing: Vec<String> = expected
                        .iter()
                        .filter(|fqdn| !registered.contains(*fqdn))
                        .cloned()
                        .collect();
                    let ready = missing.is_empty();
                    *last_missing.lock().await = missing;
                    Ok::<_, anyhow::Error>(ready)
                }
            })
            .await;
        let missing = unregistered.into_inner();

        let attempts = polled.map_err(|err| match err {
            PollError::DeadlineExceeded { timeout, .. } => ProvisionError::DeadlineExceeded {
                barrier: AGENT_BARRIER.to_string(),
                cluster: self.cluster.name.clone(),
                node: missing.join(", "),
                timeout,
            },
            PollError::Predicate(source) => ProvisionError::control_plane("get_all_hosts", source),
        })?;

        self.barrier_satisfied(AGENT_BARRIER, attempts, started.elapsed()).await;
        Ok(())
    }

    async fn barrier_satisfied(&self, barrier: &str, attempts: u32, waited: Duration) {
        telemetry::observe_barrier_wait(barrier, attempts, waited);
        self.publish(DeployEventPayload::BarrierSatisfied {
            barrier: barrier.to_string(),
            attempts,
        })
        .await;
    }
}
