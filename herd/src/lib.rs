//! Herd - Hadoop cluster bootstrap orchestration.
//!
//! Drives freshly provisioned machines through repository setup, package
//! installation, agent registration and control-plane configuration until they
//! form a running CDH cluster, and later scales or shrinks that cluster.
//!
//! # Core Concepts
//!
//! - **Topology**: a [`Cluster`] of [`NodeGroup`]s, each holding
//!   [`Instance`]s that share a set of [`Role`]s.
//!
//! - **Collaborators**: the control plane ([`ControlPlane`]) and per-host
//!   command execution ([`RemoteConnector`] / [`Remote`]) are traits; callers
//!   supply implementations.
//!
//! - **Planning and configuration**: the [`ServicePlanner`] decides which
//!   services a topology needs from the immutable [`ServiceCatalog`]; the
//!   [`ConfigResolver`] merges layered settings for every service and role.
//!
//! - **Concurrency**: per-instance work runs through [`FanOut`], which joins
//!   every unit before reporting; the [`ReadinessPoller`] implements the two
//!   blocking barriers (control-plane reachability and agent registration).
//!
//! - **Orchestration**: the [`Deployer`] exposes `configure_cluster`,
//!   `start_cluster`, `scale_cluster` and `decommission_cluster`, publishing
//!   [`DeployEvent`]s as it goes.
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use herd::*;
//! use std::sync::Arc;
//!
//! let cluster = Cluster::from_json(&descriptor)?;
//! let deployer = DeployerBuilder::new(DeployConfig::default())
//!     .with_control_plane(Arc::new(my_control_plane))
//!     .with_connector(Arc::new(my_ssh_connector))
//!     .with_site_codec(Arc::new(my_xml_codec))
//!     .build()?;
//!
//! deployer.configure_cluster(&cluster).await?;
//! deployer.start_cluster(&cluster).await?;
//! ```

/// Role-to-service catalog.
///
/// The `catalog` module defines [`ServiceKind`] and the [`ServiceCatalog`]
/// table mapping each role to its owning service, whether it is created on
/// the control plane, and its storage-derived defaults.
pub mod catalog;

/// Host command layer.
///
/// Repository, package, time-service, agent and manager commands issued
/// through a [`Remote`] handle.
pub mod commands;

/// Deployment settings.
///
/// [`DeployConfig`] carries barrier timings, fan-out parallelism, package
/// and repository settings and library URLs, overlaid per cluster from its
/// `general` configuration section.
pub mod config;

/// Control-plane client contract.
pub mod control_plane;

/// Metastore database creation on the manager node.
pub mod db;

/// Error taxonomy for provisioning flows.
pub mod error;

/// Deployment progress events.
///
/// The `events` module provides [`DeployEvent`], the [`DeployEventPublisher`]
/// trait and the broadcast-based [`InProcEventBus`].
pub mod events;

/// Concurrent per-instance execution with join-all semantics.
pub mod fanout;

/// Layered configuration merge and resolution.
pub mod merge;

#[cfg(feature = "metrics")]
/// Prometheus metrics.
pub mod metrics;

/// Cluster lifecycle orchestration.
///
/// The `orchestrator` module provides the [`Deployer`] and its
/// [`DeployerBuilder`].
pub mod orchestrator;

/// Topology-conditional service planning.
pub mod planner;

/// Readiness polling with a deadline.
pub mod poller;

/// Network ports each role needs open.
pub mod ports;

/// Remote execution contract.
pub mod remote;

/// Object-storage bridge installation.
pub mod swift;

/// Tracing spans and telemetry helpers.
pub mod telemetry;

/// Cluster topology model.
pub mod topology;

pub use catalog::*;
pub use config::*;
pub use control_plane::*;
pub use error::*;
pub use events::*;
pub use fanout::*;
pub use merge::*;
pub use orchestrator::*;
pub use planner::*;
pub use poller::*;
pub use ports::*;
pub use remote::*;
pub use swift::*;
pub use topology::*;
