//! Upgrade policies already scheduled on a cluster.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::cluster::types::Topology;
use crate::ocm::api::ClusterManager;
use crate::ocm::types::{UpgradePolicy, UpgradePolicyStateValue};
use crate::util::errors::{Error, Result};
use crate::version::semver;

pub const POLICIES_PAGE_SIZE: u32 = 100;
/// Classic clusters also carry add-on policies, only these upgrade the cluster itself.
pub const UPGRADE_TYPE_OSD: &str = "OSD";

/// How far in the future new upgrades are scheduled.
pub fn schedule_delay() -> Duration {
    Duration::minutes(10)
}

/// Cluster upgrade policies with their current state filled in.
pub async fn scheduled_upgrades(
    api: &dyn ClusterManager,
    topology: Topology,
    cluster_id: &str,
) -> Result<Vec<UpgradePolicy>> {
    let mut policies = Vec::new();
    let mut page = 1;
    loop {
        let response = api
            .list_upgrade_policies(topology, cluster_id, page, POLICIES_PAGE_SIZE)
            .await?;
        let received = response.items.len();
        policies.extend(response.items.into_iter().filter(|p| {
            topology == Topology::HostedControlPlane || p.upgrade_type.as_deref() == Some(UPGRADE_TYPE_OSD)
        }));
        if received < POLICIES_PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }

    for policy in policies.iter_mut() {
        let Some(policy_id) = policy.id.as_deref() else {
            continue;
        };
        let state = api.get_upgrade_policy_state(topology, cluster_id, policy_id).await?;
        policy.state = Some(state);
    }
    Ok(policies)
}

fn state_of(policy: &UpgradePolicy) -> UpgradePolicyStateValue {
    policy.state.as_ref().map(|s| s.value).unwrap_or_default()
}

/// Cancels policies that do not lead to `desired_version` soon, returning whether one that does
/// is already in place.
///
/// A policy that is already running for another version cannot be cancelled and fails the check.
pub async fn check_and_cancel(
    api: &dyn ClusterManager,
    topology: Topology,
    cluster_id: &str,
    policies: &[UpgradePolicy],
    desired_version: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let mut correct_pending = false;
    for policy in policies {
        match state_of(policy) {
            UpgradePolicyStateValue::Delayed | UpgradePolicyStateValue::Started => {
                if !semver::equal(&policy.version, desired_version)? {
                    return Err(Error::conflict("a cluster upgrade is already in progress"));
                }
                correct_pending = true;
            }
            UpgradePolicyStateValue::Pending | UpgradePolicyStateValue::Scheduled => {
                let due_soon = policy.next_run.is_some_and(|at| at < now + schedule_delay());
                if due_soon && semver::equal(&policy.version, desired_version)? {
                    correct_pending = true;
                    continue;
                }
                let Some(policy_id) = policy.id.as_deref() else {
                    continue;
                };
                info!(cluster_id, policy_id, version = %policy.version, "Cancelling upgrade policy");
                api.delete_upgrade_policy(topology, cluster_id, policy_id)
                    .await
                    .map_err(|e| e.context("failed to delete upgrade policy"))?;
            }
            state => debug!(cluster_id, ?state, "Ignoring finished upgrade policy"),
        }
    }
    Ok(correct_pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocm::api::MockClusterManager;
    use crate::ocm::types::{Page, UpgradePolicyState};
    use mockall::predicate::{always, eq};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn policy(id: &str, version: &str, state: UpgradePolicyStateValue, next_run: DateTime<Utc>) -> UpgradePolicy {
        UpgradePolicy {
            id: Some(id.to_string()),
            upgrade_type: Some(UPGRADE_TYPE_OSD.to_string()),
            state: Some(UpgradePolicyState {
                value: state,
                description: None,
            }),
            ..UpgradePolicy::manual(version, Some(next_run))
        }
    }

    #[tokio::test]
    async fn only_cluster_upgrades_are_returned_with_state() {
        let mut api = MockClusterManager::new();
        api.expect_list_upgrade_policies()
            .with(eq(Topology::Classic), eq("c1"), eq(1), eq(POLICIES_PAGE_SIZE))
            .times(1)
            .returning(|_, _, page, _| {
                let mut addon = UpgradePolicy::manual("1.0.0", None);
                addon.id = Some("addon".to_string());
                addon.upgrade_type = Some("ADDON".to_string());
                let mut osd = UpgradePolicy::manual("4.14.3", None);
                osd.id = Some("p1".to_string());
                osd.upgrade_type = Some(UPGRADE_TYPE_OSD.to_string());
                Ok(Page::of(page, vec![addon, osd]))
            });
        api.expect_get_upgrade_policy_state()
            .with(always(), eq("c1"), eq("p1"))
            .times(1)
            .returning(|_, _, _| {
                Ok(UpgradePolicyState {
                    value: UpgradePolicyStateValue::Scheduled,
                    description: None,
                })
            });

        let policies = scheduled_upgrades(&api, Topology::Classic, "c1").await.unwrap();
        assert_eq!(policies.len(), 1);
        assert_eq!(state_of(&policies[0]), UpgradePolicyStateValue::Scheduled);
    }

    #[tokio::test]
    async fn matching_policy_due_soon_is_kept() {
        let mut api = MockClusterManager::new();
        api.expect_delete_upgrade_policy().times(0);
        let policies = [policy(
            "p1",
            "4.14.3",
            UpgradePolicyStateValue::Scheduled,
            now() + Duration::minutes(5),
        )];
        let kept = check_and_cancel(&api, Topology::Classic, "c1", &policies, "4.14.3", now())
            .await
            .unwrap();
        assert!(kept);
    }

    #[tokio::test]
    async fn stale_policy_is_cancelled() {
        let mut api = MockClusterManager::new();
        api.expect_delete_upgrade_policy()
            .with(eq(Topology::Classic), eq("c1"), eq("p1"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let policies = [policy(
            "p1",
            "4.14.2",
            UpgradePolicyStateValue::Pending,
            now() + Duration::minutes(5),
        )];
        let kept = check_and_cancel(&api, Topology::Classic, "c1", &policies, "4.14.3", now())
            .await
            .unwrap();
        assert!(!kept);
    }

    #[tokio::test]
    async fn running_upgrade_to_another_version_conflicts() {
        let api = MockClusterManager::new();
        let policies = [policy("p1", "4.14.2", UpgradePolicyStateValue::Started, now())];
        let err = check_and_cancel(&api, Topology::Classic, "c1", &policies, "4.14.3", now())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("a cluster upgrade is already in progress"));
    }

    #[tokio::test]
    async fn versions_are_matched_by_precedence() {
        let mut api = MockClusterManager::new();
        api.expect_delete_upgrade_policy().times(0);
        let policies = [
            policy("p1", "4.14.0", UpgradePolicyStateValue::Started, now()),
            policy("p2", "4.14.0", UpgradePolicyStateValue::Scheduled, now() + Duration::minutes(5)),
        ];
        let kept = check_and_cancel(&api, Topology::Classic, "c1", &policies, "4.14", now())
            .await
            .unwrap();
        assert!(kept);
    }
}
