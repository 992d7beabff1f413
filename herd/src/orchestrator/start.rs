use crate::catalog::ServiceKind;
use crate::commands;
use crate::control_plane::ServiceCommand;
use crate::db;
use crate::error::{ControlPlaneResultExt, ProvisionError, Result};
use crate::events::{DeployEventPayload, Phase};
use crate::remote::ExecOptions;
use crate::topology::Instance;

use super::Run;

const OOZIE_LIB_DIR: &str = "/var/lib/oozie";
const EXTJS_DIR: &str = "/var/lib/oozie/ext-2.2";

const SPARK_HDFS_SETUP: &[&str] = &[
    "hdfs dfs -mkdir -p /user/spark/applicationHistory",
    "hdfs dfs -mkdir -p /user/spark/share/lib",
    "hdfs dfs -put /usr/lib/spark/assembly/lib/spark-assembly-hadoop* /user/spark/share/lib/spark-assembly.jar",
    "hdfs dfs -chown -R spark:spark /user/spark",
    "hdfs dfs -chmod 0751 /user/spark",
    "hdfs dfs -chmod 1777 /user/spark/applicationHistory",
];

impl Run<'_> {
    pub(super) async fn start(&self) -> Result<()> {
        self.phase(Phase::StartServices, async {
            let planned = self.planner().plan(self.cluster);

            self.prepare_and_start(ServiceKind::Hdfs, &[ServiceCommand::FormatNameNode])
                .await?;
            self.prepare_and_start(ServiceKind::Yarn, &[ServiceCommand::CreateYarnJobHistoryDir])
                .await?;

            // The workflow service is always created, but only started with a server role.
            if let Some(oozie) = self.cluster.oozie_server() {
                self.install_extjs(oozie).await?;
                self.prepare_and_start(
                    ServiceKind::Oozie,
                    &[ServiceCommand::CreateOozieDb, ServiceCommand::InstallOozieShareLib],
                )
                .await?;
            }

            if planned.contains(&ServiceKind::Hive) {
                self.prepare_hive().await?;
                self.prepare_and_start(
                    ServiceKind::Hive,
                    &[ServiceCommand::CreateHiveMetastoreDb, ServiceCommand::CreateHiveDirs],
                )
                .await?;
            }

            if planned.contains(&ServiceKind::Hue) {
                self.prepare_and_start(ServiceKind::Hue, &[]).await?;
            }

            if planned.contains(&ServiceKind::SparkOnYarn) {
                self.prepare_spark().await?;
                self.prepare_and_start(ServiceKind::SparkOnYarn, &[]).await?;
            }
            Ok(())
        })
        .await
    }

    async fn prepare_and_start(&self, service: ServiceKind, prerequisites: &[ServiceCommand]) -> Result<()> {
        let name = service.service_name();
        for command in prerequisites {
            tracing::debug!(service = name, %command, "running service command");
            self.control_plane()
                .run_service_command(name, *command)
                .await
                .call(command.as_str())?;
        }
        self.control_plane().start_service(name).await.call("start_service")?;

        tracing::info!(service = name, "service started");
        self.publish(DeployEventPayload::ServiceStarted {
            service: name.to_string(),
        })
        .await;
        Ok(())
    }

    /// Fetch and unpack the workflow console library unless already present.
    async fn install_extjs(&self, oozie: &Instance) -> Result<()> {
        let remote = self.connect("install_extjs", oozie).await?;
        let archive = format!("{OOZIE_LIB_DIR}/extjs.zip");
        let url = &self.config.extjs_lib_url;

        async {
            let present = remote
                .execute_command(&format!("ls {EXTJS_DIR}"), ExecOptions::unchecked())
                .await?
                .is_success();
            if present {
                tracing::debug!("workflow console library already installed");
                return Ok::<_, anyhow::Error>(());
            }
            remote
                .execute_command(&format!("curl -L -o '{archive}' {url}"), ExecOptions::as_root())
                .await?;
            remote
                .execute_command(&format!("unzip {archive} -d {OOZIE_LIB_DIR}"), ExecOptions::as_root())
                .await?;
            Ok::<_, anyhow::Error>(())
        }
        .await
        .map_err(|err| ProvisionError::remote("install_extjs", &oozie.name, err))
    }

    /// Create the metastore database on the manager and its scratch directory in HDFS.
    async fn prepare_hive(&self) -> Result<()> {
        let manager = self.cluster.manager()?;
        let remote = self.connect("create_hive_database", manager).await?;
        db::create_hive_database(remote.as_ref(), &self.cluster.hive_db_password)
            .await
            .map_err(|err| ProvisionError::remote("create_hive_database", &manager.name, err))?;
        drop(remote);

        let namenode = self.cluster.namenode()?;
        let remote = self.connect("create_hive_scratch_dir", namenode).await?;
        async {
            commands::hdfs_command(remote.as_ref(), "hadoop fs -mkdir -p /tmp/hive-hive").await?;
            commands::hdfs_command(remote.as_ref(), "hadoop fs -chown hive /tmp/hive-hive").await
        }
        .await
        .map_err(|err| ProvisionError::remote("create_hive_scratch_dir", &namenode.name, err))
    }

    async fn prepare_spark(&self) -> Result<()> {
        let Some(history) = self.cluster.spark_history_server() else {
            return Ok(());
        };
        let remote = self.connect("prepare_spark", history).await?;
        async {
            for command in SPARK_HDFS_SETUP {
                commands::hdfs_command(remote.as_ref(), command).await?;
            }
            Ok::<_, anyhow::Error>(())
        }
        .await
        .map_err(|err| ProvisionError::remote("prepare_spark", &history.name, err))
    }
}
