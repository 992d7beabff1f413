//! Layered configuration resolution.
//!
//! Settings handed to a service or role come from five layers, lowest
//! precedence first:
//!
//! 1. static cross-service wiring (which YARN service Oozie uses, ...),
//! 2. storage-derived directories computed per node group,
//! 3. per-node-group user overrides,
//! 4. values computed from the resolved cluster (metastore database
//!    coordinates, Hue's WebHDFS role),
//! 5. cluster-wide user overrides.
//!
//! Later layers overwrite colliding keys service by service and never remove
//! keys. Resolution is pure: the same topology always yields the same map,
//! which matters because it runs once at bootstrap and again for each
//! instance added by a scale operation.

use std::collections::BTreeMap;

use crate::catalog::{ServiceCatalog, ServiceKind};
use crate::error::Result;
use crate::topology::{Cluster, NodeGroup, Role, ServiceConfigMap};

/// Port of the embedded database on the manager node.
pub const MANAGER_DB_PORT: &str = "7432";

/// Merge `layers` in order; later layers win on key collisions.
pub fn merge<'a, I>(layers: I) -> ServiceConfigMap
where
    I: IntoIterator<Item = &'a ServiceConfigMap>,
{
    let mut merged = ServiceConfigMap::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Fold one layer into an accumulator.
pub fn merge_into(acc: &mut ServiceConfigMap, layer: &ServiceConfigMap) {
    for (service, configs) in layer {
        let entry = acc.entry(service.clone()).or_default();
        for (key, value) in configs {
            entry.insert(key.clone(), value.clone());
        }
    }
}

fn section<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Resolves the merged settings for services and roles of one deployment.
#[derive(Clone, Debug, Default)]
pub struct ConfigResolver {
    catalog: ServiceCatalog,
}

impl ConfigResolver {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self { catalog }
    }

    /// Layer 1: cross-service wiring.
    pub fn static_defaults(&self) -> ServiceConfigMap {
        ServiceConfigMap::from([
            (
                ServiceKind::Oozie.service_type().to_string(),
                section([(
                    "mapreduce_yarn_service",
                    ServiceKind::Yarn.service_name().to_string(),
                )]),
            ),
            (
                ServiceKind::Yarn.service_type().to_string(),
                section([("hdfs_service", ServiceKind::Hdfs.service_name().to_string())]),
            ),
            (
                ServiceKind::Hue.service_type().to_string(),
                section([
                    ("hive_service", ServiceKind::Hive.service_name().to_string()),
                    ("oozie_service", ServiceKind::Oozie.service_name().to_string()),
                ]),
            ),
            (
                ServiceKind::SparkOnYarn.service_type().to_string(),
                section([("yarn_service", ServiceKind::Yarn.service_name().to_string())]),
            ),
        ])
    }

    /// Layer 4: settings derived from other resolved roles of the cluster.
    pub fn cluster_computed(&self, cluster: &Cluster) -> Result<ServiceConfigMap> {
        let mut computed = ServiceConfigMap::new();

        let namenode = cluster.namenode()?;
        computed.insert(
            ServiceKind::Hue.service_type().to_string(),
            section([("hue_webhdfs", namenode.role_name(Role::NameNode))]),
        );

        let manager = cluster.manager()?;
        computed.insert(
            ServiceKind::Hive.service_type().to_string(),
            section([
                ("hive_metastore_database_type", "postgresql".to_string()),
                ("hive_metastore_database_host", manager.internal_ip.clone()),
                ("hive_metastore_database_port", MANAGER_DB_PORT.to_string()),
                ("hive_metastore_database_password", cluster.hive_db_password.clone()),
                (
                    "mapreduce_yarn_service",
                    ServiceKind::Yarn.service_name().to_string(),
                ),
            ]),
        );

        Ok(computed)
    }

    /// Full merged map for the given scope.
    pub fn resolve(
        &self,
        cluster: Option<&Cluster>,
        node_group: Option<&NodeGroup>,
    ) -> Result<ServiceConfigMap> {
        let mut all = self.static_defaults();

        if let Some(group) = node_group {
            merge_into(&mut all, &self.catalog.role_defaults(group));
            merge_into(&mut all, &group.node_configs);
        }

        if let Some(cluster) = cluster {
            merge_into(&mut all, &self.cluster_computed(cluster)?);
            merge_into(&mut all, &cluster.cluster_configs);
        }

        Ok(all)
    }

    /// Resolved settings for one service or role section, empty if unknown.
    pub fn get_configs(
        &self,
        service: &str,
        cluster: Option<&Cluster>,
        node_group: Option<&NodeGroup>,
    ) -> Result<BTreeMap<String, String>> {
        let mut all = self.resolve(cluster, node_group)?;
        Ok(all.remove(service).unwrap_or_default())
    }
}
