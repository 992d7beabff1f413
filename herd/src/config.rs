use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::topology::Cluster;

/// Package set installed on every node unless the image is pre-provisioned.
pub const DEFAULT_PACKAGES: &[&str] = &[
    "cloudera-manager-agent",
    "cloudera-manager-daemons",
    "cloudera-manager-server",
    "cloudera-manager-server-db-2",
    "hadoop-hdfs-datanode",
    "hadoop-hdfs-namenode",
    "hadoop-hdfs-secondarynamenode",
    "hadoop-mapreduce",
    "hadoop-mapreduce-historyserver",
    "hadoop-yarn-nodemanager",
    "hadoop-yarn-resourcemanager",
    "hive-metastore",
    "hive-server2",
    "hue",
    "ntp",
    "oozie",
    "oracle-j2sdk1.7",
    "spark-history-server",
    "unzip",
];

pub const DEFAULT_SWIFT_LIB_URL: &str = "https://repository.cloudera.com/artifactory/repo/org/apache/hadoop/hadoop-openstack/2.3.0-cdh5.1.0/hadoop-openstack-2.3.0-cdh5.1.0.jar";
pub const DEFAULT_EXTJS_LIB_URL: &str = "http://extjs.com/deploy/ext-2.2.zip";

/// Keys read from the cluster's `general` configuration section.
pub mod general {
    pub const ENABLE_SWIFT: &str = "Enable Swift";
    pub const SWIFT_LIB_URL: &str = "Hadoop OpenStack library URL";
    pub const EXTJS_LIB_URL: &str = "ExtJS library URL";
    pub const CDH5_REPO_URL: &str = "CDH5 repo list URL";
    pub const CDH5_KEY_URL: &str = "CDH5 repo key URL (for debian-based only)";
    pub const CM5_REPO_URL: &str = "CM5 repo list URL";
    pub const CM5_KEY_URL: &str = "CM5 repo key URL (for debian-based only)";
}

/// Repository locations; `None` means the OS-family default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub cdh5_repo_url: Option<String>,
    pub cdh5_key_url: Option<String>,
    pub cm5_repo_url: Option<String>,
    pub cm5_key_url: Option<String>,
}

/// Timing of one readiness barrier.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BarrierConfig {
    /// Total time to wait before failing, in milliseconds.
    pub timeout_ms: u64,
    /// Delay between predicate evaluations, in milliseconds.
    pub interval_ms: u64,
}

impl BarrierConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Deployment settings for one cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Version tag the control-plane cluster is created with.
    pub cdh_version: String,
    /// Control-plane API port checked by the reachability barrier.
    pub manager_api_port: u16,
    /// Wait for every agent to register with the control plane.
    pub agent_barrier: BarrierConfig,
    /// Wait for the control-plane API port to accept connections.
    pub manager_barrier: BarrierConfig,
    /// Maximum concurrent units in one fan-out.
    pub max_parallelism: usize,
    pub packages: Vec<String>,
    pub repositories: RepositoryConfig,
    /// Install the object-storage bridge on every node.
    pub swift_enabled: bool,
    pub swift_lib_url: String,
    pub extjs_lib_url: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            cdh_version: "CDH5".to_string(),
            manager_api_port: 7180,
            agent_barrier: BarrierConfig {
                timeout_ms: 300_000,
                interval_ms: 5_000,
            },
            manager_barrier: BarrierConfig {
                timeout_ms: 300_000,
                interval_ms: 2_000,
            },
            max_parallelism: 16,
            packages: DEFAULT_PACKAGES.iter().map(|p| p.to_string()).collect(),
            repositories: RepositoryConfig::default(),
            swift_enabled: true,
            swift_lib_url: DEFAULT_SWIFT_LIB_URL.to_string(),
            extjs_lib_url: DEFAULT_EXTJS_LIB_URL.to_string(),
        }
    }
}

impl DeployConfig {
    /// Overlay the cluster's `general` settings onto `self`.
    pub fn for_cluster(&self, cluster: &Cluster) -> Self {
        let mut resolved = self.clone();
        let setting = |key: &str| cluster.general_setting(key).map(str::to_string);

        if let Some(enabled) = cluster.general_setting(general::ENABLE_SWIFT) {
            resolved.swift_enabled = parse_flag(enabled).unwrap_or(self.swift_enabled);
        }
        if let Some(url) = setting(general::SWIFT_LIB_URL) {
            resolved.swift_lib_url = url;
        }
        if let Some(url) = setting(general::EXTJS_LIB_URL) {
            resolved.extjs_lib_url = url;
        }
        let repos = &mut resolved.repositories;
        repos.cdh5_repo_url = setting(general::CDH5_REPO_URL).or(repos.cdh5_repo_url.take());
        repos.cdh5_key_url = setting(general::CDH5_KEY_URL).or(repos.cdh5_key_url.take());
        repos.cm5_repo_url = setting(general::CM5_REPO_URL).or(repos.cm5_repo_url.take());
        repos.cm5_key_url = setting(general::CM5_KEY_URL).or(repos.cm5_key_url.take());

        if !cluster.version.is_empty() {
            resolved.cdh_version = cluster.version.clone();
        }
        resolved
    }

    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism.max(1);
        self
    }

    pub fn with_manager_api_port(mut self, port: u16) -> Self {
        self.manager_api_port = port;
        self
    }

    pub fn with_agent_barrier(mut self, timeout: Duration, interval: Duration) -> Self {
        self.agent_barrier = BarrierConfig::new(timeout, interval);
        self
    }

    pub fn with_manager_barrier(mut self, timeout: Duration, interval: Duration) -> Self {
        self.manager_barrier = BarrierConfig::new(timeout, interval);
        self
    }

    pub fn with_swift(mut self, enabled: bool) -> Self {
        self.swift_enabled = enabled;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
