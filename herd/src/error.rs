//! Error types for cluster provisioning.

use std::time::Duration;

use thiserror::Error;

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, ProvisionError>;

/// Errors that abort a bootstrap, start, scale or decommission run.
///
/// None of these roll back work already applied: a run that fails part way
/// leaves the cluster partially configured.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A readiness barrier never became satisfied.
    #[error(
        "{barrier} not satisfied within {timeout:?} on node '{node}' of cluster '{cluster}'"
    )]
    DeadlineExceeded {
        barrier: String,
        cluster: String,
        node: String,
        timeout: Duration,
    },

    /// At least one unit of a fan-out (or a single remote command) failed.
    /// Reported after every sibling unit has finished.
    #[error("{task} failed on instance '{instance}' ({failed} of {total} units failed): {source:#}")]
    RemoteOperation {
        task: String,
        instance: String,
        failed: usize,
        total: usize,
        #[source]
        source: anyhow::Error,
    },

    /// A control-plane call failed.
    #[error("control plane call '{call}' failed: {source:#}")]
    ControlPlane {
        call: String,
        #[source]
        source: anyhow::Error,
    },

    /// The declared topology breaks an invariant.
    #[error("invalid cluster topology: {0}")]
    InvalidTopology(String),

    /// A collaborator required by the requested flow was not configured.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(&'static str),
}

impl ProvisionError {
    pub(crate) fn control_plane(call: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ControlPlane {
            call: call.into(),
            source,
        }
    }

    pub(crate) fn remote(
        task: impl Into<String>,
        instance: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Self::RemoteOperation {
            task: task.into(),
            instance: instance.into(),
            failed: 1,
            total: 1,
            source,
        }
    }

    /// Short label for events and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::RemoteOperation { .. } => "remote_operation",
            Self::ControlPlane { .. } => "control_plane",
            Self::InvalidTopology(_) => "invalid_topology",
            Self::MissingCollaborator(_) => "missing_collaborator",
        }
    }
}

/// Extension for tagging control-plane results with the call that produced them.
pub(crate) trait ControlPlaneResultExt<T> {
    fn call(self, call: &str) -> Result<T>;
}

impl<T> ControlPlaneResultExt<T> for anyhow::Result<T> {
    fn call(self, call: &str) -> Result<T> {
        self.map_err(|err| ProvisionError::control_plane(call, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_message_names_cluster_and_node() {
        let err = ProvisionError::DeadlineExceeded {
            barrier: "control plane reachability".into(),
            cluster: "prod".into(),
            node: "10.0.0.1".into(),
            timeout: Duration::from_secs(300),
        };
        let message = err.to_string();
        assert!(message.contains("prod"));
        assert!(message.contains("10.0.0.1"));
        assert_eq!(err.kind(), "deadline_exceeded");
    }

    #[test]
    fn test_control_plane_ext_wraps_call_name() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("connection reset"));
        let err = res.call("create_service").unwrap_err();
        assert!(err.to_string().contains("create_service"));
        assert!(err.to_string().contains("connection reset"));
    }
}
