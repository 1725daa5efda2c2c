use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::cluster::patch::ClusterPatch;
use crate::cluster::types::{ClusterSpec, Topology};
use crate::ocm::api::ClusterManager;
use crate::ocm::types::{
    ApiError, Cluster, GateAgreement, GateRef, Page, UpgradePolicy, UpgradePolicyState, Version, VersionGate,
};
use crate::util::errors::{Error, Result, StdError};

const API_PREFIX: &str = "/api/clusters_mgmt/v1";

/// Clusters-management REST client authenticated with a bearer token.
pub struct OcmClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl OcmClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn policies_path(topology: Topology, cluster_id: &str) -> String {
        match topology {
            Topology::Classic => format!("/clusters/{cluster_id}/upgrade_policies"),
            Topology::HostedControlPlane => format!("/clusters/{cluster_id}/control_plane/upgrade_policies"),
        }
    }

    async fn execute(&self, request: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request.bearer_auth(&self.token).send().await.map_err(|e| {
            error!("Failed to reach the cluster management API: {}", e);
            Error::transport(e.status().map(|s| s.as_u16()), format!("{what}: {e}"))
        })?;

        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "{} failed", what);
        Err(error_from_response(status, &body, what))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self.execute(request, what).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(None, format!("{what}: failed to read response: {e}")))?;
        serde_json::from_slice(&body).map_err(|e| Error::StdError(StdError::Serialization(e)))
    }
}

/// Maps a failed response onto the error taxonomy, preferring the API's own reason.
pub fn error_from_response(status: StatusCode, body: &str, what: &str) -> Error {
    let reason = serde_json::from_str::<ApiError>(body)
        .ok()
        .map(|e| e.reason)
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| match body.trim() {
            "" => status.to_string(),
            text => text.to_string(),
        });
    let message = format!("{what}: {reason}");
    match status {
        StatusCode::NOT_FOUND => Error::not_found(message),
        StatusCode::CONFLICT => Error::conflict(message),
        _ => Error::transport(Some(status.as_u16()), message),
    }
}

/// Decodes the gate list carried in the details of a rejected dry-run.
///
/// `None` means the rejection is not about gates.
pub fn gates_from_dry_run(body: &str) -> Option<Vec<VersionGate>> {
    let details = serde_json::from_str::<ApiError>(body).ok()?.details?;
    let gates: Vec<VersionGate> = serde_json::from_value(details).ok()?;
    if gates.first().is_some_and(|g| g.id.is_empty()) {
        return None;
    }
    Some(gates)
}

pub fn cluster_name_search(name: &str) -> String {
    format!("name = '{}'", name.replace('\'', "''"))
}

#[async_trait]
impl ClusterManager for OcmClient {
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<Cluster> {
        info!(name = %spec.name, "Creating cluster");
        let request = self.client.post(self.url("/clusters")).json(spec);
        self.send(request, &format!("Can't create cluster with name '{}'", spec.name))
            .await
    }

    async fn find_cluster_by_name(&self, name: &str) -> Result<Option<Cluster>> {
        let request = self
            .client
            .get(self.url("/clusters"))
            .query(&[("search", cluster_name_search(name)), ("size", "1".to_string())]);
        let page: Page<Cluster> = self
            .send(request, &format!("Can't search for cluster with name '{name}'"))
            .await?;
        Ok(page.items.into_iter().next())
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        let request = self.client.get(self.url(&format!("/clusters/{cluster_id}")));
        self.send(request, &format!("Can't get cluster '{cluster_id}'")).await
    }

    async fn update_cluster(&self, cluster_id: &str, patch: &ClusterPatch) -> Result<Cluster> {
        info!(cluster_id, "Updating cluster");
        let request = self
            .client
            .patch(self.url(&format!("/clusters/{cluster_id}")))
            .json(patch);
        self.send(request, &format!("Can't update cluster with identifier '{cluster_id}'"))
            .await
    }

    async fn delete_cluster(&self, cluster_id: &str) -> Result<()> {
        info!(cluster_id, "Deleting cluster");
        let request = self.client.delete(self.url(&format!("/clusters/{cluster_id}")));
        self.execute(request, &format!("Can't delete cluster with identifier '{cluster_id}'"))
            .await?;
        Ok(())
    }

    async fn list_versions(&self, search: &str, order: &str, page: u32, size: u32) -> Result<Page<Version>> {
        debug!(search, page, "Listing versions");
        let request = self.client.get(self.url("/versions")).query(&[
            ("search", search.to_string()),
            ("order", order.to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ]);
        self.send(request, "Can't list versions").await
    }

    async fn get_version(&self, version_id: &str) -> Result<Version> {
        let request = self.client.get(self.url(&format!("/versions/{version_id}")));
        self.send(request, &format!("Can't get version '{version_id}'")).await
    }

    async fn list_upgrade_policies(
        &self,
        topology: Topology,
        cluster_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Page<UpgradePolicy>> {
        let request = self
            .client
            .get(self.url(&Self::policies_path(topology, cluster_id)))
            .query(&[("page", page), ("size", size)]);
        self.send(request, "Can't list upgrade policies").await
    }

    async fn get_upgrade_policy_state(
        &self,
        topology: Topology,
        cluster_id: &str,
        policy_id: &str,
    ) -> Result<UpgradePolicyState> {
        let path = format!("{}/{policy_id}", Self::policies_path(topology, cluster_id));
        match topology {
            Topology::Classic => {
                let request = self.client.get(self.url(&format!("{path}/state")));
                self.send(request, "Can't get upgrade policy state").await
            }
            Topology::HostedControlPlane => {
                let request = self.client.get(self.url(&path));
                let policy: UpgradePolicy = self.send(request, "Can't get upgrade policy state").await?;
                Ok(policy.state.unwrap_or_default())
            }
        }
    }

    async fn delete_upgrade_policy(&self, topology: Topology, cluster_id: &str, policy_id: &str) -> Result<()> {
        info!(cluster_id, policy_id, "Deleting upgrade policy");
        let path = format!("{}/{policy_id}", Self::policies_path(topology, cluster_id));
        let request = self.client.delete(self.url(&path));
        self.execute(request, &format!("Can't delete upgrade policy '{policy_id}'"))
            .await?;
        Ok(())
    }

    async fn add_upgrade_policy(
        &self,
        topology: Topology,
        cluster_id: &str,
        policy: &UpgradePolicy,
    ) -> Result<UpgradePolicy> {
        info!(cluster_id, version = %policy.version, "Scheduling upgrade policy");
        let request = self
            .client
            .post(self.url(&Self::policies_path(topology, cluster_id)))
            .json(policy);
        self.send(request, &format!("Can't add upgrade policy to cluster '{cluster_id}'"))
            .await
    }

    async fn missing_gate_agreements(
        &self,
        topology: Topology,
        cluster_id: &str,
        version: &str,
    ) -> Result<Vec<VersionGate>> {
        let policy = UpgradePolicy::manual(version, None);
        let response = self
            .client
            .post(self.url(&Self::policies_path(topology, cluster_id)))
            .query(&[("dryRun", "true")])
            .json(&policy)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::transport(None, format!("Can't dry-run upgrade of cluster '{cluster_id}': {e}")))?;

        if response.status().is_success() {
            return Ok(Vec::new());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match gates_from_dry_run(&body) {
            Some(gates) => {
                debug!(cluster_id, version, count = gates.len(), "Found missing gate agreements");
                Ok(gates)
            }
            None => Err(error_from_response(
                status,
                &body,
                &format!("Can't dry-run upgrade of cluster '{cluster_id}'"),
            )),
        }
    }

    async fn add_gate_agreement(&self, cluster_id: &str, gate_id: &str) -> Result<()> {
        let agreement = GateAgreement {
            version_gate: GateRef {
                id: gate_id.to_string(),
            },
        };
        let request = self
            .client
            .post(self.url(&format!("/clusters/{cluster_id}/gate_agreements")))
            .json(&agreement);
        self.execute(request, "Can't add gate agreement").await?;
        Ok(())
    }
}
