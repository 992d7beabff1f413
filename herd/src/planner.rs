use std::collections::BTreeSet;

use crate::catalog::{ServiceCatalog, ServiceKind};
use crate::topology::Cluster;

/// Decides which services a topology needs.
///
/// Service creation, configuration and start each call [`ServicePlanner::plan`]
/// (or [`ServicePlanner::includes`]) against the topology rather than sharing
/// a cached plan; the decision is a pure function of the declared roles.
#[derive(Clone, Copy, Debug)]
pub struct ServicePlanner<'a> {
    catalog: &'a ServiceCatalog,
}

impl<'a> ServicePlanner<'a> {
    pub fn new(catalog: &'a ServiceCatalog) -> Self {
        Self { catalog }
    }

    /// Whether `service` is required by `cluster`.
    pub fn includes(&self, cluster: &Cluster, service: ServiceKind) -> bool {
        match self.catalog.gating_role(service) {
            None => true,
            Some(role) => cluster.has_role(role),
        }
    }

    /// Services to create, configure and start, in start order.
    pub fn plan(&self, cluster: &Cluster) -> BTreeSet<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|service| self.includes(cluster, *service))
            .collect()
    }
}
