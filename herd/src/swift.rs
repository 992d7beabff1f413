//! Object-storage (Swift) bridge installation.

use crate::remote::{ExecOptions, Remote};
use crate::topology::Cluster;

pub const CORE_SITE_PATH: &str = "/etc/hadoop/conf/core-site.xml";
pub const HADOOP_LIB_DIR: &str = "/usr/lib/hadoop-mapreduce";

/// Cluster configuration section whose entries extend the bridge settings.
pub const SWIFT_SECTION: &str = "swift";

const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    ("fs.swift.impl", "org.apache.hadoop.fs.swift.snative.SwiftNativeFileSystem"),
    ("fs.swift.connect.timeout", "15000"),
    ("fs.swift.socket.timeout", "60000"),
    ("fs.swift.connect.retry.count", "3"),
    ("fs.swift.connect.throttle.delay", "0"),
    ("fs.swift.blocksize", "32768"),
    ("fs.swift.partsize", "4718592"),
    ("fs.swift.requestsize", "64"),
    ("fs.swift.service.sahara.public", "true"),
    ("fs.swift.service.sahara.http.port", "8080"),
    ("fs.swift.service.sahara.https.port", "443"),
];

/// Reads and writes Hadoop site files as ordered name/value pairs.
pub trait SiteCodec: Send + Sync {
    fn parse(&self, raw: &str) -> anyhow::Result<Vec<(String, String)>>;
    fn render(&self, properties: &[(String, String)]) -> String;
}

/// Bridge settings for `cluster`: built-in values overlaid by its `swift` section.
pub fn bridge_settings(cluster: &Cluster) -> Vec<(String, String)> {
    let defaults = DEFAULT_SETTINGS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()));
    let overrides = cluster
        .cluster_configs
        .get(SWIFT_SECTION)
        .into_iter()
        .flat_map(|section| section.iter().map(|(k, v)| (k.clone(), v.clone())));
    union(Vec::new(), defaults.chain(overrides))
}

/// Union `extra` into `existing`; values from `extra` win, existing order is kept.
pub fn union<I>(mut existing: Vec<(String, String)>, extra: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (name, value) in extra {
        match existing.iter_mut().find(|(existing_name, _)| *existing_name == name) {
            Some(slot) => slot.1 = value,
            None => existing.push((name, value)),
        }
    }
    existing
}

/// Fetch the bridge library and merge `settings` into the node's core-site file.
pub async fn configure_instance(
    remote: &dyn Remote,
    codec: &dyn SiteCodec,
    lib_url: &str,
    settings: &[(String, String)],
) -> anyhow::Result<()> {
    remote
        .execute_command(
            &format!("sudo curl {lib_url} -o {HADOOP_LIB_DIR}/hadoop-openstack.jar"),
            ExecOptions::default(),
        )
        .await?;

    let core_site = remote.read_file_from(CORE_SITE_PATH).await?;
    let merged = union(codec.parse(&core_site)?, settings.iter().cloned());
    remote
        .write_file_to(CORE_SITE_PATH, &codec.render(&merged), true)
        .await
}
