use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    Error,
    Hibernating,
    Installing,
    Pending,
    PoweringDown,
    Ready,
    Resuming,
    Uninstalling,
    Validating,
    Waiting,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterVersion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub raw_id: String,
    #[serde(default)]
    pub channel_group: String,
    #[serde(default)]
    pub available_upgrades: Vec<String>,
}

/// The subset of a remote cluster the operator reads back.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Cluster {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: ClusterState,
    #[serde(default)]
    pub version: Option<ClusterVersion>,
}

impl Cluster {
    pub fn current_version(&self) -> Option<&str> {
        self.version
            .as_ref()
            .map(|v| v.raw_id.as_str())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Version {
    pub id: String,
    #[serde(default)]
    pub raw_id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub channel_group: String,
    #[serde(default)]
    pub rosa_enabled: bool,
    #[serde(default)]
    pub hosted_control_plane_enabled: bool,
    #[serde(default)]
    pub available_upgrades: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpgradePolicyStateValue {
    Pending,
    Scheduled,
    Started,
    Delayed,
    Completed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpgradePolicyState {
    #[serde(default)]
    pub value: UpgradePolicyStateValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpgradePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    pub schedule_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_type: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<UpgradePolicyState>,
}

impl UpgradePolicy {
    pub const SCHEDULE_MANUAL: &'static str = "manual";

    pub fn manual(version: impl Into<String>, next_run: Option<DateTime<Utc>>) -> Self {
        UpgradePolicy {
            schedule_type: Self::SCHEDULE_MANUAL.to_string(),
            version: version.into(),
            next_run,
            ..Default::default()
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionGate {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version_raw_id_prefix: String,
    #[serde(default)]
    pub sts_only: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub warning_message: String,
    #[serde(default)]
    pub documentation_url: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GateAgreement {
    pub version_gate: GateRef,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GateRef {
    pub id: String,
}

/// One page of a collection.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn of(page: u32, items: Vec<T>) -> Self {
        Page {
            page,
            size: items.len() as u32,
            total: items.len() as u32,
            items,
        }
    }
}

/// Error body returned by the management API.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_states_do_not_fail_decoding() {
        let cluster: Cluster = serde_json::from_value(json!({
            "id": "abc",
            "state": "something_new",
            "version": {"id": "openshift-v4.14.2", "raw_id": "4.14.2", "channel_group": "stable"}
        }))
        .unwrap();
        assert_eq!(cluster.state, ClusterState::Unknown);
        assert_eq!(cluster.current_version(), Some("4.14.2"));

        let state: UpgradePolicyState = serde_json::from_value(json!({"value": "rolling"})).unwrap();
        assert_eq!(state.value, UpgradePolicyStateValue::Unknown);
    }

    #[test]
    fn manual_policy_wire_shape() {
        let next_run = DateTime::parse_from_rfc3339("2024-01-01T10:10:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let policy = UpgradePolicy::manual("4.14.3", Some(next_run));
        assert_eq!(
            serde_json::to_value(&policy).unwrap(),
            json!({"schedule_type": "manual", "version": "4.14.3", "next_run": "2024-01-01T10:10:00Z"})
        );
    }
}
