//! In-memory collaborators and topology fixtures for testing herd.

mod codec;
mod control_plane;
mod fixtures;
mod remote;

pub use codec::PropertiesCodec;
pub use control_plane::{ControlPlaneCall, MockControlPlane};
pub use fixtures::*;
pub use remote::{CommandRecord, MockConnector, MockRemote};

use herd::*;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Core-site content every fixture instance starts with.
pub const CORE_SITE: &str = "fs.defaultFS=hdfs://master-1.herd.test:8020\nfs.swift.blocksize=1024\n";

/// A deployer wired to fresh mocks, plus the handles to inspect them.
pub struct Harness {
    pub deployer: Deployer,
    pub control_plane: MockControlPlane,
    pub connector: MockConnector,
    /// Stands in for the control-plane API port.
    pub listener: TcpListener,
}

impl Harness {
    /// Build a harness whose control plane already sees every instance of
    /// `cluster`. Each instance starts with [`CORE_SITE`] as its core-site file.
    pub async fn new(cluster: &Cluster) -> anyhow::Result<Self> {
        Self::with(cluster, MockControlPlane::registered(cluster), |config| config).await
    }

    pub async fn with<F>(
        cluster: &Cluster,
        control_plane: MockControlPlane,
        tune: F,
    ) -> anyhow::Result<Self>
    where
        F: FnOnce(DeployConfig) -> DeployConfig,
    {
        let listener = TcpListener::bind((MANAGER_IP, 0)).await?;
        let port = listener.local_addr()?.port();
        let connector = MockConnector::new();
        for instance in cluster.instances() {
            connector.put_file(&instance.name, CORE_SITE_PATH, CORE_SITE);
        }

        let deployer = DeployerBuilder::new(tune(fast_config(port)))
            .with_control_plane(Arc::new(control_plane.clone()))
            .with_connector(Arc::new(connector.clone()))
            .with_site_codec(Arc::new(PropertiesCodec))
            .build()?;

        Ok(Self {
            deployer,
            control_plane,
            connector,
            listener,
        })
    }
}
