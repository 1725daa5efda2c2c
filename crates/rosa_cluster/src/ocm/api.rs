use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::cluster::patch::ClusterPatch;
use crate::cluster::types::{ClusterSpec, Topology};
use crate::ocm::types::{Cluster, Page, UpgradePolicy, UpgradePolicyState, Version, VersionGate};
use crate::util::errors::Result;

/// Clusters-management operations the core depends on.
///
/// Every call is a single remote round trip. Implementations never retry.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterManager: Send + Sync {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<Cluster>;

    /// The cluster registered under `name`, if any.
    async fn find_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>>;

    /// Fails with a not-found error once the cluster is gone.
    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster>;

    async fn update_cluster(&self, cluster_id: &str, patch: &ClusterPatch) -> Result<Cluster>;

    async fn delete_cluster(&self, cluster_id: &str) -> Result<()>;

    async fn list_versions(&self, search: &str, order: &str, page: u32, size: u32) -> Result<Page<Version>>;

    async fn get_version(&self, version_id: &str) -> Result<Version>;

    async fn list_upgrade_policies(
        &self,
        topology: Topology,
        cluster_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<UpgradePolicy>>;

    async fn get_upgrade_policy_state(
        &self,
        topology: Topology,
        cluster_id: &str,
        policy_id: &str,
    ) -> Result<UpgradePolicyState>;

    async fn delete_upgrade_policy(&self, topology: Topology, cluster_id: &str, policy_id: &str) -> Result<()>;

    async fn add_upgrade_policy(
        &self,
        topology: Topology,
        cluster_id: &str,
        policy: &UpgradePolicy,
    ) -> Result<UpgradePolicy>;

    /// Gates that block an upgrade to `version`, found with a dry-run schedule.
    async fn missing_gate_agreements(
        &self,
        topology: Topology,
        cluster_id: &str,
        version: &str,
    ) -> Result<Vec<VersionGate>>;

    async fn add_gate_agreement(&self, cluster_id: &str, gate_id: &str) -> Result<()>;
}
