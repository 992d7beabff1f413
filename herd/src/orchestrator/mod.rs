//! Cluster lifecycle flows: bootstrap, start, scale and decommission.

/// Builder for [`Deployer`].
pub mod builder;

mod barrier;
mod bootstrap;
mod decommission;
mod scale;
mod start;

pub use builder::DeployerBuilder;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::catalog::ServiceCatalog;
use crate::config::DeployConfig;
use crate::control_plane::ControlPlane;
use crate::error::{ProvisionError, Result};
use crate::events::{
    DeployEvent, DeployEventPayload, DeployEventPublisher, DeploymentId, EventMeta, Phase,
};
use crate::fanout::FanOut;
use crate::merge::ConfigResolver;
use crate::planner::ServicePlanner;
use crate::remote::{Remote, RemoteConnector};
use crate::swift::SiteCodec;
use crate::telemetry;
use crate::topology::{Cluster, Instance};

/// Drives a cluster through its lifecycle against a control plane and the
/// cluster's hosts.
///
/// Every flow is at-least-once: a run that fails part way leaves whatever it
/// already applied in place, and re-running it repeats steps that succeeded.
pub struct Deployer {
    config: DeployConfig,
    control_plane: Arc<dyn ControlPlane>,
    connector: Arc<dyn RemoteConnector>,
    catalog: Arc<ServiceCatalog>,
    resolver: ConfigResolver,
    site_codec: Option<Arc<dyn SiteCodec>>,
    events: Arc<dyn DeployEventPublisher>,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .field("site_codec_set", &self.site_codec.is_some())
            .finish_non_exhaustive()
    }
}

impl Deployer {
    pub fn builder(config: DeployConfig) -> DeployerBuilder {
        DeployerBuilder::new(config)
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    pub fn planner(&self) -> ServicePlanner<'_> {
        ServicePlanner::new(&self.catalog)
    }

    /// Subscribe to progress events of every subsequent run.
    pub fn subscribe(&self) -> broadcast::Receiver<DeployEvent> {
        self.events.subscribe()
    }

    /// Bring a freshly provisioned cluster under management and configure it.
    pub async fn configure_cluster(&self, cluster: &Cluster) -> Result<()> {
        cluster.validate()?;
        self.require_site_codec(cluster)?;
        Run::new(self, cluster).bootstrap().await
    }

    /// Initialise and start every service planned for `cluster`.
    pub async fn start_cluster(&self, cluster: &Cluster) -> Result<()> {
        cluster.validate()?;
        Run::new(self, cluster).start().await
    }

    /// Add `instances` (already part of `cluster`'s node groups) to a running cluster.
    pub async fn scale_cluster(&self, cluster: &Cluster, instances: &[Instance]) -> Result<()> {
        if instances.is_empty() {
            return Ok(());
        }
        cluster.validate()?;
        self.require_site_codec(cluster)?;
        Run::new(self, cluster).scale(instances).await
    }

    /// Fail before any work starts if `cluster` enables the object-storage
    /// bridge but no site codec was supplied.
    fn require_site_codec(&self, cluster: &Cluster) -> Result<()> {
        if self.site_codec.is_none() && self.config.for_cluster(cluster).swift_enabled {
            return Err(ProvisionError::MissingCollaborator("site codec"));
        }
        Ok(())
    }

    /// Drain and remove `instances` from a running cluster.
    pub async fn decommission_cluster(&self, cluster: &Cluster, instances: &[Instance]) -> Result<()> {
        cluster.validate()?;
        Run::new(self, cluster).decommission(instances).await
    }
}

/// State shared by the phases of one orchestration run.
struct Run<'a> {
    deployer: &'a Deployer,
    cluster: &'a Cluster,
    config: DeployConfig,
    id: DeploymentId,
    fan_out: FanOut,
}

impl<'a> Run<'a> {
    fn new(deployer: &'a Deployer, cluster: &'a Cluster) -> Self {
        let config = deployer.config.for_cluster(cluster);
        let fan_out = FanOut::new(config.max_parallelism);
        let id = DeploymentId::new();
        tracing::debug!(deployment_id = %id, cluster = %cluster.name, "orchestration run created");
        Self {
            deployer,
            cluster,
            config,
            id,
            fan_out,
        }
    }

    fn control_plane(&self) -> &dyn ControlPlane {
        self.deployer.control_plane.as_ref()
    }

    fn planner(&self) -> ServicePlanner<'_> {
        self.deployer.planner()
    }

    /// Run `body` as `phase`, with its span, timing and events.
    async fn phase<T, Fut>(&self, phase: Phase, body: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.publish(DeployEventPayload::PhaseStarted { phase }).await;
        let started = Instant::now();

        let outcome = telemetry::instrument_phase(&self.cluster.name, phase.as_str(), body).await;

        let elapsed = started.elapsed();
        match &outcome {
            Ok(_) => {
                telemetry::record_phase_completed(&self.cluster.name, phase.as_str(), elapsed);
                self.publish(DeployEventPayload::PhaseCompleted {
                    phase,
                    elapsed_ms: telemetry::whole_millis(elapsed),
                })
                .await;
            }
            Err(err) => {
                telemetry::record_phase_failed(&self.cluster.name, phase.as_str(), err.kind(), elapsed);
                self.publish(DeployEventPayload::PhaseFailed {
                    phase,
                    error_kind: err.kind().to_string(),
                    message: err.to_string(),
                })
                .await;
            }
        }
        outcome
    }

    async fn publish(&self, payload: DeployEventPayload) {
        let event = DeployEvent {
            meta: EventMeta::new(self.id, &self.cluster.name),
            payload,
        };
        if let Err(err) = self.deployer.events.publish(event).await {
            tracing::warn!(error = %err, "failed to publish deployment event");
        }
    }

    /// Open a connection to a single instance outside a fan-out.
    async fn connect(&self, task: &str, instance: &Instance) -> Result<Box<dyn Remote>> {
        self.deployer
            .connector
            .connect(instance)
            .await
            .map_err(|err| ProvisionError::remote(task, &instance.name, err))
    }
}
