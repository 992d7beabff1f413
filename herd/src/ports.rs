use crate::topology::{NodeGroup, Role};

/// Port the manager agent listens on; open on every node.
pub const AGENT_PORT: u16 = 9000;

/// Ports a role needs reachable from the rest of the cluster.
pub fn role_ports(role: Role) -> &'static [u16] {
    match role {
        Role::Manager => &[
            7180, 7182, 7183, 7432, 7184, 8084, 8086, 10101, 9997, 9996, 8087, 9998, 9999, 8085,
            9995, 9994,
        ],
        Role::NameNode => &[8020, 8022, 50070, 50470],
        Role::SecondaryNameNode => &[50090, 50495],
        Role::DataNode => &[50010, 1004, 50075, 1006, 50020],
        Role::ResourceManager => &[8030, 8031, 8032, 8033, 8088],
        Role::NodeManager => &[8040, 8041, 8042],
        Role::JobHistory => &[10020, 19888],
        Role::HiveMetastore => &[9083],
        Role::HiveServer2 => &[10000],
        Role::HueServer => &[8888],
        Role::OozieServer => &[11000, 11001],
        Role::SparkYarnHistoryServer => &[18088],
    }
}

/// Ports to open for a node group: the agent port, then each role's list in
/// declaration order.
pub fn open_ports(node_group: &NodeGroup) -> Vec<u16> {
    std::iter::once(AGENT_PORT)
        .chain(node_group.roles.iter().flat_map(|role| role_ports(*role).iter().copied()))
        .collect()
}
