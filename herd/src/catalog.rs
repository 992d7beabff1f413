use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::topology::{NodeGroup, Role};

/// A service created once per cluster on the control plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    Hdfs,
    Yarn,
    Oozie,
    Hive,
    Hue,
    SparkOnYarn,
}

impl ServiceKind {
    /// Services in start order.
    pub const ALL: [ServiceKind; 6] = [
        ServiceKind::Hdfs,
        ServiceKind::Yarn,
        ServiceKind::Oozie,
        ServiceKind::Hive,
        ServiceKind::Hue,
        ServiceKind::SparkOnYarn,
    ];

    /// Name the service is registered under.
    pub fn service_name(&self) -> &'static str {
        match self {
            ServiceKind::Hdfs => "hdfs01",
            ServiceKind::Yarn => "yarn01",
            ServiceKind::Oozie => "oozie01",
            ServiceKind::Hive => "hive01",
            ServiceKind::Hue => "hue01",
            ServiceKind::SparkOnYarn => "spark_on_yarn01",
        }
    }

    /// Control-plane service type, also the configuration section name.
    pub fn service_type(&self) -> &'static str {
        match self {
            ServiceKind::Hdfs => "HDFS",
            ServiceKind::Yarn => "YARN",
            ServiceKind::Oozie => "OOZIE",
            ServiceKind::Hive => "HIVE",
            ServiceKind::Hue => "HUE",
            ServiceKind::SparkOnYarn => "SPARK_ON_YARN",
        }
    }
}

impl Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.service_name())
    }
}

/// Builds storage-derived defaults for one role in a node group.
pub type RoleDefaults = fn(&NodeGroup) -> BTreeMap<String, String>;

/// How a role is realised on the control plane.
#[derive(Clone, Copy, Debug)]
pub struct RoleSpec {
    pub service: Option<ServiceKind>,
    /// Whether a control-plane role is created for it.
    pub creatable: bool,
    pub defaults: Option<RoleDefaults>,
}

/// Immutable role -> service table consulted by the planner and orchestrators.
#[derive(Clone, Debug)]
pub struct ServiceCatalog {
    roles: BTreeMap<Role, RoleSpec>,
    /// Role whose presence makes an optional service required.
    optional: BTreeMap<ServiceKind, Role>,
}

fn hadoop_dirs(group: &NodeGroup, key: &str, suffix: &str) -> BTreeMap<String, String> {
    let dirs = group
        .storage_paths()
        .iter()
        .map(|path| format!("{path}{suffix}"))
        .collect::<Vec<_>>()
        .join(",");
    BTreeMap::from([(key.to_string(), dirs)])
}

fn namenode_dirs(group: &NodeGroup) -> BTreeMap<String, String> {
    hadoop_dirs(group, "dfs_name_dir_list", "/fs/nn")
}

fn secondary_namenode_dirs(group: &NodeGroup) -> BTreeMap<String, String> {
    hadoop_dirs(group, "fs_checkpoint_dir_list", "/fs/snn")
}

fn datanode_dirs(group: &NodeGroup) -> BTreeMap<String, String> {
    hadoop_dirs(group, "dfs_data_dir_list", "/fs/dn")
}

fn nodemanager_dirs(group: &NodeGroup) -> BTreeMap<String, String> {
    hadoop_dirs(group, "yarn_nodemanager_local_dirs", "/yarn/local")
}

impl ServiceCatalog {
    pub fn new(
        roles: BTreeMap<Role, RoleSpec>,
        optional: BTreeMap<ServiceKind, Role>,
    ) -> Self {
        Self { roles, optional }
    }

    /// Role table of the CDH 5 deployment.
    pub fn cdh5() -> Self {
        let role = |service, defaults| RoleSpec {
            service: Some(service),
            creatable: true,
            defaults,
        };
        let roles = BTreeMap::from([
            (
                Role::Manager,
                RoleSpec {
                    service: None,
                    creatable: false,
                    defaults: None,
                },
            ),
            (Role::NameNode, role(ServiceKind::Hdfs, Some(namenode_dirs as RoleDefaults))),
            (
                Role::SecondaryNameNode,
                role(ServiceKind::Hdfs, Some(secondary_namenode_dirs as RoleDefaults)),
            ),
            (Role::DataNode, role(ServiceKind::Hdfs, Some(datanode_dirs as RoleDefaults))),
            (Role::ResourceManager, role(ServiceKind::Yarn, None)),
            (Role::NodeManager, role(ServiceKind::Yarn, Some(nodemanager_dirs as RoleDefaults))),
            (Role::JobHistory, role(ServiceKind::Yarn, None)),
            (Role::OozieServer, role(ServiceKind::Oozie, None)),
            (Role::HiveMetastore, role(ServiceKind::Hive, None)),
            (Role::HiveServer2, role(ServiceKind::Hive, None)),
            (Role::HueServer, role(ServiceKind::Hue, None)),
            (Role::SparkYarnHistoryServer, role(ServiceKind::SparkOnYarn, None)),
        ]);
        let optional = BTreeMap::from([
            (ServiceKind::Hive, Role::HiveMetastore),
            (ServiceKind::Hue, Role::HueServer),
            (ServiceKind::SparkOnYarn, Role::SparkYarnHistoryServer),
        ]);
        Self::new(roles, optional)
    }

    pub fn role(&self, role: Role) -> Option<&RoleSpec> {
        self.roles.get(&role)
    }

    /// Service owning `role`, if it is created on the control plane.
    pub fn creatable_service(&self, role: Role) -> Option<ServiceKind> {
        self.role(role)
            .filter(|spec| spec.creatable)
            .and_then(|spec| spec.service)
    }

    /// Role that gates an optional service; `None` for unconditional services.
    pub fn gating_role(&self, service: ServiceKind) -> Option<Role> {
        self.optional.get(&service).copied()
    }

    /// Storage-derived defaults for every role of `group`, keyed by role name.
    pub fn role_defaults(&self, group: &NodeGroup) -> BTreeMap<String, BTreeMap<String, String>> {
        group
            .roles
            .iter()
            .filter_map(|role| {
                self.role(*role)
                    .and_then(|spec| spec.defaults)
                    .map(|defaults| (role.as_str().to_string(), defaults(group)))
            })
            .collect()
    }
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::cdh5()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_role_is_catalogued() {
        let catalog = ServiceCatalog::cdh5();
        for role in Role::ALL {
            assert!(catalog.role(role).is_some(), "{role} missing");
        }
    }

    #[test]
    fn test_manager_is_not_creatable() {
        let catalog = ServiceCatalog::cdh5();
        assert_eq!(catalog.creatable_service(Role::Manager), None);
        assert_eq!(catalog.creatable_service(Role::DataNode), Some(ServiceKind::Hdfs));
        assert_eq!(catalog.creatable_service(Role::JobHistory), Some(ServiceKind::Yarn));
        assert_eq!(
            catalog.creatable_service(Role::SparkYarnHistoryServer),
            Some(ServiceKind::SparkOnYarn)
        );
    }

    #[test]
    fn test_role_defaults_join_mount_points() {
        let catalog = ServiceCatalog::cdh5();
        let group = NodeGroup::new("workers", [Role::DataNode, Role::NodeManager])
            .with_storage_paths(["/volumes/disk1", "/volumes/disk2"]);

        let defaults = catalog.role_defaults(&group);
        assert_eq!(
            defaults["DATANODE"]["dfs_data_dir_list"],
            "/volumes/disk1/fs/dn,/volumes/disk2/fs/dn"
        );
        assert_eq!(
            defaults["NODEMANAGER"]["yarn_nodemanager_local_dirs"],
            "/volumes/disk1/yarn/local,/volumes/disk2/yarn/local"
        );
        assert!(!defaults.contains_key("NAMENODE"));
    }

    #[test]
    fn test_gating_roles() {
        let catalog = ServiceCatalog::cdh5();
        assert_eq!(catalog.gating_role(ServiceKind::Hdfs), None);
        assert_eq!(catalog.gating_role(ServiceKind::Oozie), None);
        assert_eq!(catalog.gating_role(ServiceKind::Hive), Some(Role::HiveMetastore));
        assert_eq!(catalog.gating_role(ServiceKind::Hue), Some(Role::HueServer));
    }
}
