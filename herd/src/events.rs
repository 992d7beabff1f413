use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identifies one orchestration run (bootstrap, start, scale or decommission).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(pub Uuid);

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentId {
    /// Create a new deployment ID using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Display for DeploymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named step of an orchestration flow.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Phase {
    DetectPreInstalled,
    ConfigureOs,
    InstallPackages,
    StartAgents,
    StartManager,
    AwaitAgents,
    CreateMgmtService,
    CreateServices,
    ConfigureServices,
    AssignRoles,
    DeployConfigs,
    ConfigureSwift,
    StartServices,
    ScaleInstances,
    Decommission,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::DetectPreInstalled => "detect_pre_installed",
            Phase::ConfigureOs => "configure_os",
            Phase::InstallPackages => "install_packages",
            Phase::StartAgents => "start_agents",
            Phase::StartManager => "start_manager",
            Phase::AwaitAgents => "await_agents",
            Phase::CreateMgmtService => "create_mgmt_service",
            Phase::CreateServices => "create_services",
            Phase::ConfigureServices => "configure_services",
            Phase::AssignRoles => "assign_roles",
            Phase::DeployConfigs => "deploy_configs",
            Phase::ConfigureSwift => "configure_swift",
            Phase::StartServices => "start_services",
            Phase::ScaleInstances => "scale_instances",
            Phase::Decommission => "decommission",
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata envelope attached to every deployment event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub deployment_id: DeploymentId,
    pub cluster: String,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(deployment_id: DeploymentId, cluster: impl Into<String>) -> Self {
        Self {
            version: 1,
            deployment_id,
            cluster: cluster.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Progress event emitted while a deployment runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployEvent {
    pub meta: EventMeta,
    pub payload: DeployEventPayload,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DeployEventPayload {
    PhaseStarted { phase: Phase },
    PhaseCompleted { phase: Phase, elapsed_ms: u64 },
    /// The phase aborted the run.
    PhaseFailed {
        phase: Phase,
        error_kind: String,
        message: String,
    },
    /// A readiness barrier was satisfied after `attempts` evaluations.
    BarrierSatisfied { barrier: String, attempts: u32 },
    RoleCreated {
        service: String,
        role_name: String,
        fqdn: String,
    },
    ServiceStarted { service: String },
    /// Roles were decommissioned ahead of instance removal.
    NodesDecommissioned { role_type: String, role_names: Vec<String> },
}

/// Publishes deployment events.
#[async_trait]
pub trait DeployEventPublisher: Send + Sync {
    /// Publish an event to all subscribers.
    async fn publish(&self, event: DeployEvent) -> anyhow::Result<()>;
    /// Subscribe to events published from now on.
    fn subscribe(&self) -> broadcast::Receiver<DeployEvent>;
}

/// In-process event bus using a tokio broadcast channel.
///
/// Publishing never waits for subscribers; a slow subscriber receives
/// `RecvError::Lagged` instead of blocking the deployment. Events published
/// with no subscriber are dropped.
pub struct InProcEventBus {
    sender: broadcast::Sender<DeployEvent>,
    capacity: usize,
}

impl std::fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl InProcEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, capacity }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl DeployEventPublisher for InProcEventBus {
    async fn publish(&self, event: DeployEvent) -> anyhow::Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<DeployEvent> {
        self.sender.subscribe()
    }
}
