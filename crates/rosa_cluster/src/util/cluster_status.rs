use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};
use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::api::v1::rosacluster::{RosaCluster, RosaClusterSpec, RosaClusterStatus};
use crate::ocm::types::{Cluster, ClusterState};
use crate::util::errors::{Error, Result, StdError};
use crate::util::status::set_status_condition;

pub const READY_CONDITION: &str = "Ready";
pub const SYNCED_CONDITION: &str = "Synced";

pub const STATUS_FIELD_MANAGER: &str = "rosa-cluster-status-manager";

// Phase represents the high-level status of a RosaCluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ClusterPhase {
    Pending,
    Creating,
    Installing,
    Ready,
    Updating,
    Failed,
    Terminating,
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClusterPhase::Pending => write!(f, "Pending"),
            ClusterPhase::Creating => write!(f, "Creating"),
            ClusterPhase::Installing => write!(f, "Installing"),
            ClusterPhase::Ready => write!(f, "Ready"),
            ClusterPhase::Updating => write!(f, "Updating"),
            ClusterPhase::Failed => write!(f, "Failed"),
            ClusterPhase::Terminating => write!(f, "Terminating"),
        }
    }
}

impl From<ClusterState> for ClusterPhase {
    fn from(state: ClusterState) -> Self {
        match state {
            ClusterState::Ready => ClusterPhase::Ready,
            ClusterState::Pending | ClusterState::Validating | ClusterState::Waiting => ClusterPhase::Creating,
            ClusterState::Installing => ClusterPhase::Installing,
            ClusterState::Uninstalling | ClusterState::PoweringDown => ClusterPhase::Terminating,
            ClusterState::Error => ClusterPhase::Failed,
            ClusterState::Hibernating | ClusterState::Resuming | ClusterState::Unknown => ClusterPhase::Pending,
        }
    }
}

// Status reasons for conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    ClusterReady,
    ClusterNotReady,
    Applied,
    ValidationFailed,
    UpgradeBlocked,
    RemoteError,
}

impl fmt::Display for StatusReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StatusReason::ClusterReady => write!(f, "ClusterReady"),
            StatusReason::ClusterNotReady => write!(f, "ClusterNotReady"),
            StatusReason::Applied => write!(f, "Applied"),
            StatusReason::ValidationFailed => write!(f, "ValidationFailed"),
            StatusReason::UpgradeBlocked => write!(f, "UpgradeBlocked"),
            StatusReason::RemoteError => write!(f, "RemoteError"),
        }
    }
}

impl StatusReason {
    pub fn for_error(e: &Error) -> Self {
        match e.inner() {
            StdError::Validation(_) => StatusReason::ValidationFailed,
            StdError::Conflict(_) => StatusReason::UpgradeBlocked,
            _ => StatusReason::RemoteError,
        }
    }
}

fn condition(type_: &str, ok: bool, reason: StatusReason, message: &str, generation: Option<i64>) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: if ok { "True" } else { "False" }.to_string(),
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Time(chrono::Utc::now()),
        observed_generation: generation,
    }
}

/// Copies what the management API reports about the cluster into the status.
pub fn observe_remote(status: &mut RosaClusterStatus, remote: &Cluster, generation: Option<i64>) {
    status.cluster_id = Some(remote.id.clone());
    status.state = serde_json::to_value(remote.state)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string));
    status.current_version = remote.current_version().map(str::to_string);
    status.phase = Some(ClusterPhase::from(remote.state).to_string());

    let ready = remote.state == ClusterState::Ready;
    let (reason, message) = if ready {
        (StatusReason::ClusterReady, "Cluster is ready".to_string())
    } else {
        (StatusReason::ClusterNotReady, format!("Cluster state is {:?}", remote.state))
    };
    let (conditions, _) = set_status_condition(
        &status.conditions,
        condition(READY_CONDITION, ready, reason, &message, generation),
    );
    status.conditions = conditions;
}

pub fn record_applied(status: &mut RosaClusterStatus, applied: &RosaClusterSpec, generation: Option<i64>) -> Result<()> {
    status.last_applied_spec =
        Some(serde_json::to_string(applied).map_err(|e| Error::StdError(StdError::Serialization(e)))?);
    status.observed_generation = generation;
    let (conditions, _) = set_status_condition(
        &status.conditions,
        condition(SYNCED_CONDITION, true, StatusReason::Applied, "Spec applied", generation),
    );
    status.conditions = conditions;
    Ok(())
}

pub fn record_failure(status: &mut RosaClusterStatus, e: &Error, generation: Option<i64>) {
    status.phase = Some(ClusterPhase::Failed.to_string());
    status.observed_generation = generation;
    let (conditions, _) = set_status_condition(
        &status.conditions,
        condition(SYNCED_CONDITION, false, StatusReason::for_error(e), &e.to_string(), generation),
    );
    status.conditions = conditions;
}

pub fn status_patch(status: &RosaClusterStatus) -> serde_json::Value {
    json!({
        "apiVersion": RosaCluster::api_version(&()),
        "kind": RosaCluster::kind(&()),
        "status": status,
    })
}

pub struct ClusterStatusManager<'a> {
    cluster: &'a RosaCluster,
    client: kube::Client,
}

impl<'a> ClusterStatusManager<'a> {
    pub fn new(client: &kube::Client, cluster: &'a RosaCluster) -> Self {
        Self {
            cluster,
            client: client.clone(),
        }
    }

    fn api(&self) -> Result<Api<RosaCluster>> {
        let namespace = self
            .cluster
            .namespace()
            .ok_or_else(|| Error::StdError(StdError::MetadataMissing("namespace".to_string())))?;
        Ok(Api::namespaced(self.client.clone(), &namespace))
    }

    /// Reads the latest status, applies `mutate` and writes the whole status back.
    pub async fn update<F>(&self, mutate: F) -> Result<RosaClusterStatus>
    where
        F: FnOnce(&mut RosaClusterStatus, Option<i64>) -> Result<()>,
    {
        let name = self.cluster.name_any();
        let api = self.api()?;
        let current = api.get(&name).await.map_err(Error::kube)?;
        let mut status = current.status.unwrap_or_default();
        mutate(&mut status, current.metadata.generation)?;

        let patch = Patch::Apply(status_patch(&status));
        api.patch_status(&name, &PatchParams::apply(STATUS_FIELD_MANAGER).force(), &patch)
            .await
            .map_err(Error::kube)?;
        Ok(status)
    }

    pub async fn update_phase(&self, phase: ClusterPhase) -> Result<()> {
        self.update(|status, _| {
            status.phase = Some(phase.to_string());
            Ok(())
        })
        .await?;
        info!("Updated cluster {} phase to {}", self.cluster.name_any(), phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocm::types::ClusterVersion;
    use crate::util::status::{find_status_condition, is_status_condition_true};

    fn remote(state: ClusterState) -> Cluster {
        Cluster {
            id: "2a3b".to_string(),
            name: "my-cluster".to_string(),
            state,
            version: Some(ClusterVersion {
                raw_id: "4.14.2".to_string(),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn remote_state_drives_phase_and_ready() {
        let mut status = RosaClusterStatus::default();
        observe_remote(&mut status, &remote(ClusterState::Installing), Some(2));
        assert_eq!(status.phase.as_deref(), Some("Installing"));
        assert_eq!(status.state.as_deref(), Some("installing"));
        assert!(!is_status_condition_true(&status.conditions, READY_CONDITION));

        observe_remote(&mut status, &remote(ClusterState::Ready), Some(2));
        assert_eq!(status.phase.as_deref(), Some("Ready"));
        assert_eq!(status.current_version.as_deref(), Some("4.14.2"));
        assert!(is_status_condition_true(&status.conditions, READY_CONDITION));
        assert_eq!(status.conditions.len(), 1);
    }

    #[test]
    fn failures_are_reported_with_reason() {
        let mut status = RosaClusterStatus::default();
        record_failure(&mut status, &Error::conflict("a cluster upgrade is already in progress"), Some(3));
        assert_eq!(status.phase.as_deref(), Some("Failed"));
        let synced = find_status_condition(&status.conditions, SYNCED_CONDITION).unwrap();
        assert_eq!(synced.reason, "UpgradeBlocked");
        assert!(synced.message.contains("already in progress"));

        let spec = RosaClusterSpec {
            name: "my-cluster".to_string(),
            ..Default::default()
        };
        record_applied(&mut status, &spec, Some(4)).unwrap();
        assert!(is_status_condition_true(&status.conditions, SYNCED_CONDITION));
        assert_eq!(status.observed_generation, Some(4));
    }

    #[test]
    fn patch_carries_type_meta() {
        let patch = status_patch(&RosaClusterStatus::default());
        assert_eq!(patch["apiVersion"], "rosa.molnett.org/v1");
        assert_eq!(patch["kind"], "RosaCluster");
    }
}
