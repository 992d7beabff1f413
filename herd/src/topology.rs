use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use uuid::Uuid;

use crate::error::{ProvisionError, Result};

/// Section of the cluster-wide configuration that holds deployment switches
/// rather than service settings.
pub const GENERAL_SECTION: &str = "general";

/// Mount point used when a node group declares no storage.
pub const DEFAULT_STORAGE_PATH: &str = "/mnt";

/// Service name -> (key -> value). Ordered so merges are deterministic.
pub type ServiceConfigMap = BTreeMap<String, BTreeMap<String, String>>;

/// A process type an instance can run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Manager,
    #[serde(rename = "NAMENODE")]
    NameNode,
    #[serde(rename = "SECONDARYNAMENODE")]
    SecondaryNameNode,
    #[serde(rename = "DATANODE")]
    DataNode,
    #[serde(rename = "RESOURCEMANAGER")]
    ResourceManager,
    #[serde(rename = "NODEMANAGER")]
    NodeManager,
    #[serde(rename = "JOBHISTORY")]
    JobHistory,
    OozieServer,
    #[serde(rename = "HIVEMETASTORE")]
    HiveMetastore,
    #[serde(rename = "HIVESERVER2")]
    HiveServer2,
    HueServer,
    SparkYarnHistoryServer,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::Manager,
        Role::NameNode,
        Role::SecondaryNameNode,
        Role::DataNode,
        Role::ResourceManager,
        Role::NodeManager,
        Role::JobHistory,
        Role::OozieServer,
        Role::HiveMetastore,
        Role::HiveServer2,
        Role::HueServer,
        Role::SparkYarnHistoryServer,
    ];

    /// Name used by the control plane and in configuration sections.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "MANAGER",
            Role::NameNode => "NAMENODE",
            Role::SecondaryNameNode => "SECONDARYNAMENODE",
            Role::DataNode => "DATANODE",
            Role::ResourceManager => "RESOURCEMANAGER",
            Role::NodeManager => "NODEMANAGER",
            Role::JobHistory => "JOBHISTORY",
            Role::OozieServer => "OOZIE_SERVER",
            Role::HiveMetastore => "HIVEMETASTORE",
            Role::HiveServer2 => "HIVESERVER2",
            Role::HueServer => "HUE_SERVER",
            Role::SparkYarnHistoryServer => "SPARK_YARN_HISTORY_SERVER",
        }
    }

    /// Prefix used when naming a role instance on the control plane.
    pub fn short_name(&self) -> &'static str {
        match self {
            Role::NameNode => "NN",
            Role::SecondaryNameNode => "SNN",
            Role::DataNode => "DN",
            Role::ResourceManager => "RM",
            Role::NodeManager => "NM",
            Role::JobHistory => "JS",
            Role::OozieServer => "OS",
            Role::HiveMetastore => "HVM",
            Role::HiveServer2 => "HVS",
            Role::SparkYarnHistoryServer => "SHS",
            other => other.as_str(),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single provisioned machine.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub hostname: String,
    pub fqdn: String,
    pub management_ip: String,
    pub internal_ip: String,
    /// Name of the owning node group.
    #[serde(default)]
    pub node_group: String,
}

impl Instance {
    pub fn new(
        name: impl Into<String>,
        fqdn: impl Into<String>,
        management_ip: impl Into<String>,
    ) -> Self {
        let fqdn = fqdn.into();
        let hostname = fqdn.split('.').next().unwrap_or_default().to_string();
        let management_ip = management_ip.into();
        Self {
            name: name.into(),
            hostname,
            fqdn,
            internal_ip: management_ip.clone(),
            management_ip,
            node_group: String::new(),
        }
    }

    pub fn with_internal_ip(mut self, ip: impl Into<String>) -> Self {
        self.internal_ip = ip.into();
        self
    }

    /// Name of `role` on this instance as registered with the control plane.
    pub fn role_name(&self, role: Role) -> String {
        format!("{}_{}", role.short_name(), self.hostname.replace('-', "_"))
    }
}

/// A set of instances sharing one role assignment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub name: String,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub storage_paths: Vec<String>,
    /// User overrides keyed by role name (e.g. `DATANODE`).
    #[serde(default)]
    pub node_configs: ServiceConfigMap,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl NodeGroup {
    pub fn new(name: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            name: name.into(),
            roles: roles.into_iter().collect(),
            storage_paths: Vec::new(),
            node_configs: ServiceConfigMap::new(),
            instances: Vec::new(),
        }
    }

    pub fn with_storage_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.storage_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_node_config(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.node_configs
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn with_instance(mut self, mut instance: Instance) -> Self {
        instance.node_group = self.name.clone();
        self.instances.push(instance);
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Declared mount points, falling back to `/mnt`.
    pub fn storage_paths(&self) -> Vec<String> {
        if self.storage_paths.is_empty() {
            vec![DEFAULT_STORAGE_PATH.to_string()]
        } else {
            self.storage_paths.clone()
        }
    }
}

/// Declared cluster topology handed to the orchestrators.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub node_groups: Vec<NodeGroup>,
    #[serde(default)]
    pub cluster_configs: ServiceConfigMap,
    #[serde(default = "generate_password")]
    pub hive_db_password: String,
}

fn generate_password() -> String {
    Uuid::new_v4().to_string()
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            node_groups: Vec::new(),
            cluster_configs: ServiceConfigMap::new(),
            hive_db_password: generate_password(),
        }
    }

    /// Load a topology from a JSON descriptor and validate it.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut cluster: Cluster = serde_json::from_str(raw)
            .map_err(|err| ProvisionError::InvalidTopology(err.to_string()))?;
        for group in &mut cluster.node_groups {
            for instance in &mut group.instances {
                instance.node_group = group.name.clone();
            }
        }
        cluster.validate()?;
        Ok(cluster)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_node_group(mut self, group: NodeGroup) -> Self {
        self.node_groups.push(group);
        self
    }

    pub fn with_cluster_config(
        mut self,
        section: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.cluster_configs
            .entry(section.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn with_hive_db_password(mut self, password: impl Into<String>) -> Self {
        self.hive_db_password = password.into();
        self
    }

    /// Check the structural invariants the orchestrators rely on.
    pub fn validate(&self) -> Result<()> {
        for role in [Role::Manager, Role::NameNode] {
            let count = self.instances_with_role(role).count();
            if count != 1 {
                return Err(ProvisionError::InvalidTopology(format!(
                    "cluster '{}' must have exactly one {role} instance, found {count}",
                    self.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for instance in self.instances() {
            if !seen.insert(instance.name.as_str()) {
                return Err(ProvisionError::InvalidTopology(format!(
                    "instance '{}' is declared more than once",
                    instance.name
                )));
            }
        }
        Ok(())
    }

    /// All instances, in node-group declaration order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.node_groups.iter().flat_map(|ng| ng.instances.iter())
    }

    pub fn instances_with_role(&self, role: Role) -> impl Iterator<Item = &Instance> {
        self.node_groups
            .iter()
            .filter(move |ng| ng.has_role(role))
            .flat_map(|ng| ng.instances.iter())
    }

    pub fn first_with_role(&self, role: Role) -> Option<&Instance> {
        self.instances_with_role(role).next()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.first_with_role(role).is_some()
    }

    pub fn node_group(&self, name: &str) -> Option<&NodeGroup> {
        self.node_groups.iter().find(|ng| ng.name == name)
    }

    /// Node group owning `instance`.
    pub fn group_of(&self, instance: &Instance) -> Result<&NodeGroup> {
        self.node_group(&instance.node_group).ok_or_else(|| {
            ProvisionError::InvalidTopology(format!(
                "instance '{}' references unknown node group '{}'",
                instance.name, instance.node_group
            ))
        })
    }

    pub fn manager(&self) -> Result<&Instance> {
        self.require(Role::Manager)
    }

    pub fn namenode(&self) -> Result<&Instance> {
        self.require(Role::NameNode)
    }

    pub fn oozie_server(&self) -> Option<&Instance> {
        self.first_with_role(Role::OozieServer)
    }

    pub fn hive_metastore(&self) -> Option<&Instance> {
        self.first_with_role(Role::HiveMetastore)
    }

    pub fn hue_server(&self) -> Option<&Instance> {
        self.first_with_role(Role::HueServer)
    }

    pub fn spark_history_server(&self) -> Option<&Instance> {
        self.first_with_role(Role::SparkYarnHistoryServer)
    }

    /// Value from the `general` section of the cluster-wide configuration.
    pub fn general_setting(&self, key: &str) -> Option<&str> {
        self.cluster_configs
            .get(GENERAL_SECTION)
            .and_then(|section| section.get(key))
            .map(String::as_str)
    }

    fn require(&self, role: Role) -> Result<&Instance> {
        self.first_with_role(role).ok_or_else(|| {
            ProvisionError::InvalidTopology(format!(
                "cluster '{}' has no {role} instance",
                self.name
            ))
        })
    }
}
