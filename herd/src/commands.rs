//! Shell commands issued on cluster nodes.
//!
//! Everything here is idempotent: repositories are (re)written in place,
//! package installation skips installed packages and service starts are
//! no-ops for running services.

use crate::config::RepositoryConfig;
use crate::remote::{ExecOptions, Remote};

pub const AGENT_CONFIG_PATH: &str = "/etc/cloudera-scm-agent/config.ini";

pub const DEFAULT_CDH5_UBUNTU_REPO_LIST_URL: &str =
    "http://archive.cloudera.com/cdh5/ubuntu/precise/amd64/cdh/cloudera.list";
pub const DEFAULT_CDH5_UBUNTU_REPO_KEY_URL: &str =
    "http://archive.cloudera.com/cdh5/ubuntu/precise/amd64/cdh/archive.key";
pub const DEFAULT_CM5_UBUNTU_REPO_LIST_URL: &str =
    "http://archive.cloudera.com/cm5/ubuntu/precise/amd64/cm/cloudera.list";
pub const DEFAULT_CM5_UBUNTU_REPO_KEY_URL: &str =
    "http://archive.cloudera.com/cm5/ubuntu/precise/amd64/cm/archive.key";
pub const DEFAULT_CDH5_CENTOS_REPO_LIST_URL: &str =
    "http://archive.cloudera.com/cdh5/redhat/6/x86_64/cdh/cloudera-cdh5.repo";
pub const DEFAULT_CM5_CENTOS_REPO_LIST_URL: &str =
    "http://archive.cloudera.com/cm5/redhat/6/x86_64/cm/cloudera-manager.repo";

/// Package-management family of a node's distribution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsFamily {
    Ubuntu,
    CentOs,
    Other,
}

pub async fn detect_os(remote: &dyn Remote) -> anyhow::Result<OsFamily> {
    let output = remote
        .execute_command("lsb_release -is", ExecOptions::unchecked())
        .await?;
    let distro = output.stdout.trim().to_ascii_lowercase();
    Ok(if distro.contains("ubuntu") {
        OsFamily::Ubuntu
    } else if distro.contains("centos") {
        OsFamily::CentOs
    } else {
        OsFamily::Other
    })
}

/// Whether the image already carries the distribution and agent.
pub async fn is_pre_installed(remote: &dyn Remote) -> anyhow::Result<bool> {
    let output = remote
        .execute_command(&format!("ls {AGENT_CONFIG_PATH}"), ExecOptions::unchecked())
        .await?;
    Ok(output.is_success())
}

/// Register the CDH and manager repositories for the node's OS family.
pub async fn configure_repositories(
    remote: &dyn Remote,
    repos: &RepositoryConfig,
) -> anyhow::Result<OsFamily> {
    let os = detect_os(remote).await?;
    let or_default = |value: &Option<String>, default: &str| {
        value.clone().unwrap_or_else(|| default.to_string())
    };

    match os {
        OsFamily::Ubuntu => {
            let cdh5_repo = or_default(&repos.cdh5_repo_url, DEFAULT_CDH5_UBUNTU_REPO_LIST_URL);
            let cdh5_key = or_default(&repos.cdh5_key_url, DEFAULT_CDH5_UBUNTU_REPO_KEY_URL);
            let cm5_repo = or_default(&repos.cm5_repo_url, DEFAULT_CM5_UBUNTU_REPO_LIST_URL);
            let cm5_key = or_default(&repos.cm5_key_url, DEFAULT_CM5_UBUNTU_REPO_KEY_URL);

            add_ubuntu_repository(remote, &cdh5_repo, "cdh").await?;
            add_apt_key(remote, &cdh5_key).await?;
            add_ubuntu_repository(remote, &cm5_repo, "cm").await?;
            add_apt_key(remote, &cm5_key).await?;
            remote
                .execute_command("apt-get update", ExecOptions::as_root())
                .await?;
        }
        OsFamily::CentOs => {
            let cdh5_repo = or_default(&repos.cdh5_repo_url, DEFAULT_CDH5_CENTOS_REPO_LIST_URL);
            let cm5_repo = or_default(&repos.cm5_repo_url, DEFAULT_CM5_CENTOS_REPO_LIST_URL);

            add_centos_repository(remote, &cdh5_repo, "cdh").await?;
            add_centos_repository(remote, &cm5_repo, "cm").await?;
        }
        OsFamily::Other => {
            tracing::warn!("unrecognised distribution; leaving package repositories untouched");
        }
    }
    Ok(os)
}

async fn add_ubuntu_repository(remote: &dyn Remote, url: &str, name: &str) -> anyhow::Result<()> {
    remote
        .execute_command(
            &format!("wget -O /etc/apt/sources.list.d/{name}.list {url}"),
            ExecOptions::as_root(),
        )
        .await?;
    Ok(())
}

async fn add_apt_key(remote: &dyn Remote, url: &str) -> anyhow::Result<()> {
    remote
        .execute_command(&format!("wget -qO - {url} | apt-key add -"), ExecOptions::as_root())
        .await?;
    Ok(())
}

async fn add_centos_repository(remote: &dyn Remote, url: &str, name: &str) -> anyhow::Result<()> {
    remote
        .execute_command(
            &format!("wget -O /etc/yum.repos.d/{name}.repo {url}"),
            ExecOptions::as_root(),
        )
        .await?;
    Ok(())
}

pub async fn install_packages(remote: &dyn Remote, packages: &[String]) -> anyhow::Result<()> {
    let packages = packages.join(" ");
    let command = match detect_os(remote).await? {
        OsFamily::Ubuntu => format!("RUNLEVEL=1 apt-get install -y {packages}"),
        OsFamily::CentOs => format!("yum install -y {packages}"),
        OsFamily::Other => anyhow::bail!("cannot install packages on an unrecognised distribution"),
    };
    remote.execute_command(&command, ExecOptions::as_root()).await?;
    Ok(())
}

pub async fn start_ntp(remote: &dyn Remote) -> anyhow::Result<()> {
    let service = match detect_os(remote).await? {
        OsFamily::CentOs => "ntpd",
        _ => "ntp",
    };
    remote
        .execute_command(&format!("service {service} start"), ExecOptions::as_root())
        .await?;
    Ok(())
}

/// Point the local agent at the manager host.
pub async fn configure_agent(remote: &dyn Remote, manager_hostname: &str) -> anyhow::Result<()> {
    remote
        .execute_command(
            &format!("sed -i.back 's/^server_host=.*/server_host={manager_hostname}/' {AGENT_CONFIG_PATH}"),
            ExecOptions::as_root(),
        )
        .await?;
    Ok(())
}

pub async fn start_agent(remote: &dyn Remote) -> anyhow::Result<()> {
    start_service(remote, "cloudera-scm-agent").await
}

pub async fn start_manager_db(remote: &dyn Remote) -> anyhow::Result<()> {
    start_service(remote, "cloudera-scm-server-db").await
}

pub async fn start_manager(remote: &dyn Remote) -> anyhow::Result<()> {
    start_service(remote, "cloudera-scm-server").await
}

async fn start_service(remote: &dyn Remote, service: &str) -> anyhow::Result<()> {
    remote
        .execute_command(&format!("service {service} start"), ExecOptions::as_root())
        .await?;
    Ok(())
}

/// Run `command` in HDFS as the `hdfs` superuser.
pub async fn hdfs_command(remote: &dyn Remote, command: &str) -> anyhow::Result<()> {
    remote
        .execute_command(&format!("sudo su - -c \"{command}\" hdfs"), ExecOptions::default())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recorder {
        distro: &'static str,
        commands: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(distro: &'static str) -> Self {
            Self {
                distro,
                commands: Mutex::new(Vec::new()),
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Remote for Recorder {
        async fn run(&self, command: &str, _run_as_root: bool) -> anyhow::Result<CommandOutput> {
            self.commands.lock().unwrap().push(command.to_string());
            if command == "lsb_release -is" {
                return Ok(CommandOutput::success(self.distro));
            }
            if command.starts_with("ls ") {
                return Ok(CommandOutput::failure(2, ""));
            }
            Ok(CommandOutput::success(""))
        }

        async fn read_file_from(&self, _path: &str) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn write_file_to(&self, _path: &str, _content: &str, _run_as_root: bool) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ubuntu_repositories_use_defaults_and_keys() {
        let remote = Recorder::new("Ubuntu\n");
        let os = configure_repositories(&remote, &RepositoryConfig::default())
            .await
            .unwrap();

        assert_eq!(os, OsFamily::Ubuntu);
        let commands = remote.commands();
        assert!(commands.contains(&format!(
            "wget -O /etc/apt/sources.list.d/cdh.list {DEFAULT_CDH5_UBUNTU_REPO_LIST_URL}"
        )));
        assert!(commands.iter().any(|c| c.contains("apt-key add")));
        assert_eq!(commands.last().map(String::as_str), Some("apt-get update"));
    }

    #[tokio::test]
    async fn test_centos_repositories_honour_overrides() {
        let remote = Recorder::new("CentOS");
        let repos = RepositoryConfig {
            cm5_repo_url: Some("http://mirror.local/cm5.repo".into()),
            ..RepositoryConfig::default()
        };
        configure_repositories(&remote, &repos).await.unwrap();

        let commands = remote.commands();
        assert!(commands.contains(&"wget -O /etc/yum.repos.d/cm.repo http://mirror.local/cm5.repo".to_string()));
        assert!(!commands.iter().any(|c| c.contains("apt-key")));
    }

    #[tokio::test]
    async fn test_install_packages_per_family() {
        let remote = Recorder::new("CentOS");
        install_packages(&remote, &["ntp".into(), "unzip".into()]).await.unwrap();
        assert!(remote.commands().contains(&"yum install -y ntp unzip".to_string()));

        let remote = Recorder::new("Gentoo");
        assert!(install_packages(&remote, &["ntp".into()]).await.is_err());
    }

    #[tokio::test]
    async fn test_pre_installed_checks_agent_config() {
        let remote = Recorder::new("Ubuntu");
        assert!(!is_pre_installed(&remote).await.unwrap());
        assert_eq!(remote.commands(), vec![format!("ls {AGENT_CONFIG_PATH}")]);
    }
}
