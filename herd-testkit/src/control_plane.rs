use async_trait::async_trait;
use herd::*;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// One call received by [`MockControlPlane`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ControlPlaneCall {
    CreateCluster {
        name: String,
        version: String,
    },
    CreateMgmtService {
        manager_fqdn: String,
    },
    CreateService {
        name: String,
        service_type: String,
    },
    UpdateServiceConfig {
        service: String,
        config: BTreeMap<String, String>,
    },
    CreateRole {
        service: String,
        role_name: String,
        role_type: Role,
        fqdn: String,
    },
    UpdateRoleConfig {
        service: String,
        role_name: String,
        config: BTreeMap<String, String>,
    },
    DeployConfigs,
    RunServiceCommand {
        service: String,
        command: ServiceCommand,
    },
    StartService {
        service: String,
    },
    StartRoles {
        service: String,
        role_names: Vec<String>,
    },
    RefreshNodes {
        role_type: Role,
        service: String,
    },
    DecommissionNodes {
        role_type: Role,
        role_names: Vec<String>,
    },
    DeleteInstances {
        fqdns: Vec<String>,
    },
    GetAllHosts,
}

impl ControlPlaneCall {
    /// Name of the trait method that produced this call.
    pub fn name(&self) -> &'static str {
        match self {
            ControlPlaneCall::CreateCluster { .. } => "create_cluster",
            ControlPlaneCall::CreateMgmtService { .. } => "create_mgmt_service",
            ControlPlaneCall::CreateService { .. } => "create_service",
            ControlPlaneCall::UpdateServiceConfig { .. } => "update_service_config",
            ControlPlaneCall::CreateRole { .. } => "create_role",
            ControlPlaneCall::UpdateRoleConfig { .. } => "update_role_config",
            ControlPlaneCall::DeployConfigs => "deploy_configs",
            ControlPlaneCall::RunServiceCommand { .. } => "run_service_command",
            ControlPlaneCall::StartService { .. } => "start_service",
            ControlPlaneCall::StartRoles { .. } => "start_roles",
            ControlPlaneCall::RefreshNodes { .. } => "refresh_nodes",
            ControlPlaneCall::DecommissionNodes { .. } => "decommission_nodes",
            ControlPlaneCall::DeleteInstances { .. } => "delete_instances",
            ControlPlaneCall::GetAllHosts => "get_all_hosts",
        }
    }
}

#[derive(Default)]
struct State {
    calls: Vec<ControlPlaneCall>,
    hosts: Vec<String>,
    /// `get_all_hosts` calls that still report no hosts.
    hidden_polls: u32,
    failing: HashSet<String>,
}

/// Recording control-plane client.
///
/// Hosts become visible to `get_all_hosts` once registered with
/// [`MockControlPlane::register_hosts`]; [`MockControlPlane::hide_hosts_for`]
/// delays that by a number of polls.
#[derive(Clone, Default)]
pub struct MockControlPlane {
    state: Arc<Mutex<State>>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// A control plane that already sees every instance of `cluster`.
    pub fn registered(cluster: &Cluster) -> Self {
        let control_plane = Self::new();
        control_plane.register_hosts(cluster.instances().map(|i| i.fqdn.clone()));
        control_plane
    }

    pub fn register_hosts<I, S>(&self, fqdns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().hosts.extend(fqdns.into_iter().map(Into::into));
    }

    pub fn hide_hosts_for(&self, polls: u32) {
        self.state.lock().hidden_polls = polls;
    }

    /// Make every call to the named method fail.
    pub fn fail_on(&self, method: &str) {
        self.state.lock().failing.insert(method.to_string());
    }

    pub fn calls(&self) -> Vec<ControlPlaneCall> {
        self.state.lock().calls.clone()
    }

    /// Method names of recorded calls, excluding host polling.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .calls
            .iter()
            .map(ControlPlaneCall::name)
            .filter(|name| *name != "get_all_hosts")
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.name() == method)
            .count()
    }

    pub fn clear(&self) {
        self.state.lock().calls.clear();
    }

    fn record(&self, call: ControlPlaneCall) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        let name = call.name();
        state.calls.push(call);
        if state.failing.contains(name) {
            tracing::debug!(method = name, "injecting control-plane failure");
            anyhow::bail!("injected failure in {name}");
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn create_cluster(&self, name: &str, version: &str) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::CreateCluster {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    async fn create_mgmt_service(&self, manager_fqdn: &str) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::CreateMgmtService {
            manager_fqdn: manager_fqdn.to_string(),
        })
    }

    async fn create_service(&self, name: &str, service_type: &str) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::CreateService {
            name: name.to_string(),
            service_type: service_type.to_string(),
        })
    }

    async fn update_service_config(
        &self,
        service: &str,
        config: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::UpdateServiceConfig {
            service: service.to_string(),
            config: config.clone(),
        })
    }

    async fn create_role(
        &self,
        service: &str,
        role_name: &str,
        role_type: Role,
        fqdn: &str,
    ) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::CreateRole {
            service: service.to_string(),
            role_name: role_name.to_string(),
            role_type,
            fqdn: fqdn.to_string(),
        })
    }

    async fn update_role_config(
        &self,
        service: &str,
        role_name: &str,
        config: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::UpdateRoleConfig {
            service: service.to_string(),
            role_name: role_name.to_string(),
            config: config.clone(),
        })
    }

    async fn deploy_configs(&self) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::DeployConfigs)
    }

    async fn run_service_command(&self, service: &str, command: ServiceCommand) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::RunServiceCommand {
            service: service.to_string(),
            command,
        })
    }

    async fn start_service(&self, service: &str) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::StartService {
            service: service.to_string(),
        })
    }

    async fn start_roles(&self, service: &str, role_names: &[String]) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::StartRoles {
            service: service.to_string(),
            role_names: role_names.to_vec(),
        })
    }

    async fn refresh_nodes(&self, role_type: Role, service: &str) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::RefreshNodes {
            role_type,
            service: service.to_string(),
        })
    }

    async fn decommission_nodes(&self, role_type: Role, role_names: &[String]) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::DecommissionNodes {
            role_type,
            role_names: role_names.to_vec(),
        })
    }

    async fn delete_instances(&self, fqdns: &[String]) -> anyhow::Result<()> {
        self.record(ControlPlaneCall::DeleteInstances {
            fqdns: fqdns.to_vec(),
        })
    }

    async fn get_all_hosts(&self) -> anyhow::Result<Vec<HostRecord>> {
        self.record(ControlPlaneCall::GetAllHosts)?;
        let mut state = self.state.lock();
        if state.hidden_polls > 0 {
            state.hidden_polls -= 1;
            return Ok(Vec::new());
        }
        Ok(state
            .hosts
            .iter()
            .map(|hostname| HostRecord {
                hostname: hostname.clone(),
            })
            .collect())
    }
}
