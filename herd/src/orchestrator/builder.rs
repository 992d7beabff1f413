use std::fmt;
use std::sync::Arc;

use crate::catalog::ServiceCatalog;
use crate::config::DeployConfig;
use crate::control_plane::ControlPlane;
use crate::error::{ProvisionError, Result};
use crate::events::{DeployEventPublisher, InProcEventBus};
use crate::merge::ConfigResolver;
use crate::remote::RemoteConnector;
use crate::swift::SiteCodec;

use super::Deployer;

/// Builder for constructing a [`Deployer`] with explicit collaborators.
///
/// The control-plane client and the remote connector are required. The
/// catalog defaults to [`ServiceCatalog::cdh5`] and events go to a fresh
/// [`InProcEventBus`] unless another publisher is supplied. A site codec is
/// only needed when the object-storage bridge is enabled; flows that need it
/// fail with [`ProvisionError::MissingCollaborator`] when it is absent.
///
/// # Example
///
/// ```ignore
/// use herd::*;
///
/// let deployer = DeployerBuilder::new(DeployConfig::default())
///     .with_control_plane(control_plane)
///     .with_connector(connector)
///     .with_site_codec(codec)
///     .build()?;
/// deployer.configure_cluster(&cluster).await?;
/// ```
pub struct DeployerBuilder {
    config: DeployConfig,
    control_plane: Option<Arc<dyn ControlPlane>>,
    connector: Option<Arc<dyn RemoteConnector>>,
    catalog: Option<ServiceCatalog>,
    site_codec: Option<Arc<dyn SiteCodec>>,
    events: Option<Arc<dyn DeployEventPublisher>>,
}

impl fmt::Debug for DeployerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerBuilder")
            .field("config", &self.config)
            .field("control_plane_set", &self.control_plane.is_some())
            .field("connector_set", &self.connector.is_some())
            .field("catalog_set", &self.catalog.is_some())
            .field("site_codec_set", &self.site_codec.is_some())
            .field("events_set", &self.events.is_some())
            .finish()
    }
}

impl DeployerBuilder {
    pub fn new(config: DeployConfig) -> Self {
        Self {
            config,
            control_plane: None,
            connector: None,
            catalog: None,
            site_codec: None,
            events: None,
        }
    }

    /// Set the control-plane client.
    pub fn with_control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    /// Set the connector used to reach cluster instances.
    pub fn with_connector(mut self, connector: Arc<dyn RemoteConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_catalog(mut self, catalog: ServiceCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Set the codec for the core filesystem site file.
    pub fn with_site_codec(mut self, codec: Arc<dyn SiteCodec>) -> Self {
        self.site_codec = Some(codec);
        self
    }

    /// Set the event publisher.
    pub fn with_events(mut self, events: Arc<dyn DeployEventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the `Deployer`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MissingCollaborator`] if the control plane or
    /// the connector was not provided.
    pub fn build(self) -> Result<Deployer> {
        let control_plane = self
            .control_plane
            .ok_or(ProvisionError::MissingCollaborator("control plane"))?;
        let connector = self
            .connector
            .ok_or(ProvisionError::MissingCollaborator("remote connector"))?;
        let catalog = self.catalog.unwrap_or_default();
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InProcEventBus::default()));

        Ok(Deployer {
            config: self.config,
            control_plane,
            connector,
            resolver: ConfigResolver::new(catalog.clone()),
            catalog: Arc::new(catalog),
            site_codec: self.site_codec,
            events,
        })
    }
}
