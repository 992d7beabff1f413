use crate::catalog::ServiceKind;
use crate::error::{ControlPlaneResultExt, Result};
use crate::events::Phase;
use crate::topology::{Instance, Role};

use super::Run;

impl Run<'_> {
    /// Bring `added` (non-empty) under management and start their worker roles.
    pub(super) async fn scale(&self, added: &[Instance]) -> Result<()> {
        tracing::info!(cluster = %self.cluster.name, added = added.len(), "scaling cluster");

        let pre_installed = match added.first() {
            Some(first) => {
                self.phase(Phase::DetectPreInstalled, self.detect_pre_installed(first))
                    .await?
            }
            None => return Ok(()),
        };
        if !pre_installed {
            self.phase(Phase::ConfigureOs, self.configure_os(added)).await?;
            self.phase(Phase::InstallPackages, self.install_packages(added)).await?;
        }

        self.phase(Phase::StartAgents, self.start_agents(added)).await?;
        self.phase(Phase::AwaitAgents, self.await_agents(added)).await?;

        self.phase(Phase::ScaleInstances, async {
            for instance in added {
                self.scale_instance(instance).await?;
            }
            Ok(())
        })
        .await
    }

    async fn scale_instance(&self, instance: &Instance) -> Result<()> {
        let group = self.cluster.group_of(instance)?;
        self.assign_roles(instance).await?;
        self.control_plane().deploy_configs().await.call("deploy_configs")?;

        if group.has_role(Role::DataNode) {
            self.control_plane()
                .refresh_nodes(Role::DataNode, ServiceKind::Hdfs.service_name())
                .await
                .call("refresh_nodes")?;
        }

        if self.config.swift_enabled {
            self.configure_swift(std::slice::from_ref(instance)).await?;
        }

        for (role, service) in [
            (Role::DataNode, ServiceKind::Hdfs),
            (Role::NodeManager, ServiceKind::Yarn),
        ] {
            if group.has_role(role) {
                self.control_plane()
                    .start_roles(service.service_name(), &[instance.role_name(role)])
                    .await
                    .call("start_roles")?;
            }
        }

        tracing::info!(instance = %instance.name, "instance added");
        Ok(())
    }
}
