use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::topology::Role;

/// A host known to the control plane.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    pub hostname: String,
}

/// Service-level commands run before a service is first started.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ServiceCommand {
    /// Only effective on a filesystem that was never formatted.
    FormatNameNode,
    CreateYarnJobHistoryDir,
    CreateOozieDb,
    InstallOozieShareLib,
    CreateHiveMetastoreDb,
    CreateHiveDirs,
}

impl ServiceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCommand::FormatNameNode => "format_namenode",
            ServiceCommand::CreateYarnJobHistoryDir => "create_yarn_job_history_dir",
            ServiceCommand::CreateOozieDb => "create_oozie_db",
            ServiceCommand::InstallOozieShareLib => "install_oozie_sharelib",
            ServiceCommand::CreateHiveMetastoreDb => "create_hive_metastore_db",
            ServiceCommand::CreateHiveDirs => "create_hive_dirs",
        }
    }
}

impl Display for ServiceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Client for the cluster-management control plane.
///
/// One client is shared by every concurrent unit of a deployment, so
/// implementations must be safe for concurrent use. Calls block until the
/// control plane has finished the requested operation; connection pooling and
/// retries are the implementation's concern.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn create_cluster(&self, name: &str, version: &str) -> anyhow::Result<()>;

    /// Create the manager's own monitoring service on the manager host.
    async fn create_mgmt_service(&self, manager_fqdn: &str) -> anyhow::Result<()>;

    async fn create_service(&self, name: &str, service_type: &str) -> anyhow::Result<()>;

    async fn update_service_config(
        &self,
        service: &str,
        config: &BTreeMap<String, String>,
    ) -> anyhow::Result<()>;

    async fn create_role(
        &self,
        service: &str,
        role_name: &str,
        role_type: Role,
        fqdn: &str,
    ) -> anyhow::Result<()>;

    async fn update_role_config(
        &self,
        service: &str,
        role_name: &str,
        config: &BTreeMap<String, String>,
    ) -> anyhow::Result<()>;

    /// Push the current configuration to every agent.
    async fn deploy_configs(&self) -> anyhow::Result<()>;

    async fn run_service_command(&self, service: &str, command: ServiceCommand) -> anyhow::Result<()>;

    /// Start a service; a service that is already started is left as is.
    async fn start_service(&self, service: &str) -> anyhow::Result<()>;

    async fn start_roles(&self, service: &str, role_names: &[String]) -> anyhow::Result<()>;

    async fn refresh_nodes(&self, role_type: Role, service: &str) -> anyhow::Result<()>;

    /// Decommission roles and wait for the decommission to complete.
    async fn decommission_nodes(&self, role_type: Role, role_names: &[String]) -> anyhow::Result<()>;

    /// Remove hosts (and their roles) from the cluster.
    async fn delete_instances(&self, fqdns: &[String]) -> anyhow::Result<()>;

    /// Every host with an agent registered, in full detail.
    async fn get_all_hosts(&self) -> anyhow::Result<Vec<HostRecord>>;
}
