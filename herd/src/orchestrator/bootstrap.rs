use std::sync::Arc;

use crate::catalog::ServiceKind;
use crate::commands;
use crate::error::{ControlPlaneResultExt, ProvisionError, Result};
use crate::events::{DeployEventPayload, Phase};
use crate::swift;
use crate::topology::Instance;

use super::Run;

impl Run<'_> {
    pub(super) async fn bootstrap(&self) -> Result<()> {
        let cluster = self.cluster;
        let instances: Vec<Instance> = cluster.instances().cloned().collect();
        let manager = cluster.manager()?;
        tracing::info!(cluster = %cluster.name, instances = instances.len(), "configuring cluster");

        let pre_installed = self
            .phase(Phase::DetectPreInstalled, self.detect_pre_installed(manager))
            .await?;
        if !pre_installed {
            self.phase(Phase::ConfigureOs, self.configure_os(&instances)).await?;
            self.phase(Phase::InstallPackages, self.install_packages(&instances)).await?;
        }

        self.phase(Phase::StartAgents, self.start_agents(&instances)).await?;
        self.phase(Phase::StartManager, self.start_manager(manager)).await?;
        self.phase(Phase::AwaitAgents, self.await_agents(&instances)).await?;

        self.phase(Phase::CreateMgmtService, async {
            self.control_plane()
                .create_mgmt_service(&manager.fqdn)
                .await
                .call("create_mgmt_service")
        })
        .await?;
        self.phase(Phase::CreateServices, self.create_services()).await?;
        self.phase(Phase::ConfigureServices, self.configure_services()).await?;

        self.phase(Phase::AssignRoles, async {
            for instance in &instances {
                self.assign_roles(instance).await?;
            }
            Ok(())
        })
        .await?;

        self.phase(Phase::DeployConfigs, async {
            self.control_plane().deploy_configs().await.call("deploy_configs")
        })
        .await?;

        if self.config.swift_enabled {
            self.phase(Phase::ConfigureSwift, self.configure_swift(&instances)).await?;
        }

        tracing::info!(cluster = %cluster.name, "cluster configured");
        Ok(())
    }

    /// Whether the image on `host` already carries the distribution.
    pub(super) async fn detect_pre_installed(&self, host: &Instance) -> Result<bool> {
        let remote = self.connect("detect_pre_installed", host).await?;
        let pre_installed = commands::is_pre_installed(remote.as_ref())
            .await
            .map_err(|err| ProvisionError::remote("detect_pre_installed", &host.name, err))?;
        tracing::info!(pre_installed, host = %host.name, "checked for pre-installed distribution");
        Ok(pre_installed)
    }

    pub(super) async fn configure_os(&self, targets: &[Instance]) -> Result<()> {
        let connector = Arc::clone(&self.deployer.connector);
        let repositories = self.config.repositories.clone();
        self.fan_out
            .run("configure_os", targets, move |instance| {
                let connector = Arc::clone(&connector);
                let repositories = repositories.clone();
                async move {
                    let remote = connector.connect(&instance).await?;
                    let os = commands::configure_repositories(remote.as_ref(), &repositories).await?;
                    tracing::debug!(instance = %instance.name, ?os, "package repositories configured");
                    Ok::<_, anyhow::Error>(())
                }
            })
            .await?;
        Ok(())
    }

    pub(super) async fn install_packages(&self, targets: &[Instance]) -> Result<()> {
        let connector = Arc::clone(&self.deployer.connector);
        let packages = Arc::new(self.config.packages.clone());
        self.fan_out
            .run("install_packages", targets, move |instance| {
                let connector = Arc::clone(&connector);
                let packages = Arc::clone(&packages);
                async move {
                    let remote = connector.connect(&instance).await?;
                    commands::install_packages(remote.as_ref(), &packages).await
                }
            })
            .await?;
        Ok(())
    }

    /// Start the time service and the agent on every target, pointed at the manager.
    pub(super) async fn start_agents(&self, targets: &[Instance]) -> Result<()> {
        let connector = Arc::clone(&self.deployer.connector);
        let manager_hostname = self.cluster.manager()?.hostname.clone();
        self.fan_out
            .run("start_agents", targets, move |instance| {
                let connector = Arc::clone(&connector);
                let manager_hostname = manager_hostname.clone();
                async move {
                    let remote = connector.connect(&instance).await?;
                    commands::start_ntp(remote.as_ref()).await?;
                    commands::configure_agent(remote.as_ref(), &manager_hostname).await?;
                    commands::start_agent(remote.as_ref()).await
                }
            })
            .await?;
        Ok(())
    }

    async fn start_manager(&self, manager: &Instance) -> Result<()> {
        let remote = self.connect("start_manager", manager).await?;
        async {
            commands::start_manager_db(remote.as_ref()).await?;
            commands::start_manager(remote.as_ref()).await
        }
        .await
        .map_err(|err| ProvisionError::remote("start_manager", &manager.name, err))?;
        drop(remote);

        self.await_manager(manager).await
    }

    async fn create_services(&self) -> Result<()> {
        let control_plane = self.control_plane();
        control_plane
            .create_cluster(&self.cluster.name, &self.config.cdh_version)
            .await
            .call("create_cluster")?;

        for service in self.planner().plan(self.cluster) {
            tracing::debug!(service = %service, "creating service");
            control_plane
                .create_service(service.service_name(), service.service_type())
                .await
                .call("create_service")?;
        }
        Ok(())
    }

    async fn configure_services(&self) -> Result<()> {
        for service in self.planner().plan(self.cluster) {
            self.configure_service(service).await?;
        }
        Ok(())
    }

    async fn configure_service(&self, service: ServiceKind) -> Result<()> {
        let configs = self
            .deployer
            .resolver
            .get_configs(service.service_type(), Some(self.cluster), None)?;
        self.control_plane()
            .update_service_config(service.service_name(), &configs)
            .await
            .call("update_service_config")
    }

    /// Create the control-plane roles declared by `instance`'s node group.
    ///
    /// Returns the `(service, role_name)` pairs that were created.
    pub(super) async fn assign_roles(&self, instance: &Instance) -> Result<Vec<(ServiceKind, String)>> {
        let group = self.cluster.group_of(instance)?;
        let mut created = Vec::with_capacity(group.roles.len());

        for role in &group.roles {
            let Some(service) = self.deployer.catalog.creatable_service(*role) else {
                continue;
            };
            let role_name = instance.role_name(*role);
            let configs = self
                .deployer
                .resolver
                .get_configs(role.as_str(), None, Some(group))?;

            self.control_plane()
                .create_role(service.service_name(), &role_name, *role, &instance.fqdn)
                .await
                .call("create_role")?;
            self.control_plane()
                .update_role_config(service.service_name(), &role_name, &configs)
                .await
                .call("update_role_config")?;

            self.publish(DeployEventPayload::RoleCreated {
                service: service.service_name().to_string(),
                role_name: role_name.clone(),
                fqdn: instance.fqdn.clone(),
            })
            .await;
            created.push((service, role_name));
        }
        Ok(created)
    }

    /// Install the object-storage bridge on every target.
    pub(super) async fn configure_swift(&self, targets: &[Instance]) -> Result<()> {
        let codec = self
            .deployer
            .site_codec
            .clone()
            .ok_or(ProvisionError::MissingCollaborator("site codec"))?;
        let connector = Arc::clone(&self.deployer.connector);
        let lib_url = self.config.swift_lib_url.clone();
        let settings = Arc::new(swift::bridge_settings(self.cluster));

        self.fan_out
            .run("configure_swift", targets, move |instance| {
                let connector = Arc::clone(&connector);
                let codec = Arc::clone(&codec);
                let lib_url = lib_url.clone();
                let settings = Arc::clone(&settings);
                async move {
                    let remote = connector.connect(&instance).await?;
                    swift::configure_instance(remote.as_ref(), codec.as_ref(), &lib_url, &settings).await
                }
            })
            .await?;
        Ok(())
    }
}
