use herd::*;
use std::time::Duration;

/// Management address of the manager in fixture clusters; the reachability
/// barrier connects to it, so tests bind a listener on it.
pub const MANAGER_IP: &str = "127.0.0.1";

pub fn manager_group() -> NodeGroup {
    NodeGroup::new("manager", [Role::Manager]).with_instance(
        Instance::new("mgr-1", "mgr-1.herd.test", MANAGER_IP).with_internal_ip("10.0.0.10"),
    )
}

pub fn master_group() -> NodeGroup {
    NodeGroup::new("master", [Role::NameNode, Role::ResourceManager])
        .with_instance(Instance::new("master-1", "master-1.herd.test", "10.0.0.11"))
}

pub fn worker_group(count: usize) -> NodeGroup {
    (1..=count).fold(
        NodeGroup::new("worker", [Role::DataNode, Role::NodeManager])
            .with_storage_paths(["/volumes/disk1", "/volumes/disk2"]),
        |group, i| group.with_instance(worker_instance(i)),
    )
}

pub fn worker_instance(index: usize) -> Instance {
    Instance::new(
        format!("worker-{index}"),
        format!("worker-{index}.herd.test"),
        format!("10.0.1.{index}"),
    )
}

/// One manager, one {name-node, resource-manager} host and two
/// {data-node, node-manager} hosts.
pub fn sample_cluster() -> Cluster {
    Cluster::new("sample")
        .with_hive_db_password("fixture-password")
        .with_node_group(manager_group())
        .with_node_group(master_group())
        .with_node_group(worker_group(2))
}

/// [`sample_cluster`] plus a host carrying every optional role.
pub fn full_cluster() -> Cluster {
    sample_cluster().with_node_group(
        NodeGroup::new(
            "services",
            [
                Role::SecondaryNameNode,
                Role::JobHistory,
                Role::OozieServer,
                Role::HiveMetastore,
                Role::HiveServer2,
                Role::HueServer,
                Role::SparkYarnHistoryServer,
            ],
        )
        .with_instance(Instance::new("svc-1", "svc-1.herd.test", "10.0.0.12")),
    )
}

/// `cluster` with `count` more workers; returns the new instances as they
/// appear in the cluster.
pub fn with_new_workers(cluster: &Cluster, count: usize) -> (Cluster, Vec<Instance>) {
    let mut cluster = cluster.clone();
    let mut added = Vec::with_capacity(count);
    if let Some(group) = cluster.node_groups.iter_mut().find(|g| g.name == "worker") {
        let start = group.instances.len() + 1;
        for index in start..start + count {
            let mut instance = worker_instance(index);
            instance.node_group = group.name.clone();
            group.instances.push(instance.clone());
            added.push(instance);
        }
    }
    (cluster, added)
}

/// Deploy settings with millisecond barriers for tests.
pub fn fast_config(manager_api_port: u16) -> DeployConfig {
    DeployConfig::default()
        .with_manager_api_port(manager_api_port)
        .with_agent_barrier(Duration::from_millis(200), Duration::from_millis(10))
        .with_manager_barrier(Duration::from_millis(200), Duration::from_millis(10))
}
