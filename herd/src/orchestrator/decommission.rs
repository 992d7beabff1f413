use crate::catalog::ServiceKind;
use crate::error::{ControlPlaneResultExt, Result};
use crate::events::{DeployEventPayload, Phase};
use crate::topology::{Instance, Role};

use super::Run;

impl Run<'_> {
    pub(super) async fn decommission(&self, removed: &[Instance]) -> Result<()> {
        self.phase(Phase::Decommission, async {
            let mut datanodes = Vec::new();
            let mut nodemanagers = Vec::new();
            for instance in removed {
                let group = self.cluster.group_of(instance)?;
                if group.has_role(Role::DataNode) {
                    datanodes.push(instance.role_name(Role::DataNode));
                }
                if group.has_role(Role::NodeManager) {
                    nodemanagers.push(instance.role_name(Role::NodeManager));
                }
            }

            // Roles must be drained before their hosts are released.
            for (role, names) in [(Role::DataNode, datanodes), (Role::NodeManager, nodemanagers)] {
                if names.is_empty() {
                    continue;
                }
                tracing::info!(%role, count = names.len(), "decommissioning roles");
                self.control_plane()
                    .decommission_nodes(role, &names)
                    .await
                    .call("decommission_nodes")?;
                self.publish(DeployEventPayload::NodesDecommissioned {
                    role_type: role.as_str().to_string(),
                    role_names: names,
                })
                .await;
            }

            let fqdns: Vec<String> = removed.iter().map(|i| i.fqdn.clone()).collect();
            self.control_plane()
                .delete_instances(&fqdns)
                .await
                .call("delete_instances")?;

            // Both node lists are refreshed even when nothing of that kind was removed.
            for (role, service) in [
                (Role::DataNode, ServiceKind::Hdfs),
                (Role::NodeManager, ServiceKind::Yarn),
            ] {
                self.control_plane()
                    .refresh_nodes(role, service.service_name())
                    .await
                    .call("refresh_nodes")?;
            }
            Ok(())
        })
        .await
    }
}
