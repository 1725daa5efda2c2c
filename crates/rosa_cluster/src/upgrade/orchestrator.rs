//! Moves a running cluster towards the requested version, one evaluation per update.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt;
use tracing::{debug, info};

use crate::cluster::types::Topology;
use crate::ocm::api::ClusterManager;
use crate::ocm::types::UpgradePolicy;
use crate::upgrade::{gates, policies};
use crate::util::errors::{Error, Result};
use crate::version::{resolver, semver};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradePhase {
    NoVersionInfo,
    Evaluating,
    CancelingOnly,
    Scheduling,
    Blocked,
    Done,
}

impl fmt::Display for UpgradePhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What an evaluation decided to do about the upgrade policies of a cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Nothing to do, no remote mutation.
    NoOp,
    /// The cluster runs the desired version; only stale policies are cancelled.
    CancelOnly,
    /// The desired version is newer; a policy is scheduled unless a matching one exists.
    ScheduleNew,
}

impl UpgradeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpgradeDecision::NoOp => "no_op",
            UpgradeDecision::CancelOnly => "cancel_only",
            UpgradeDecision::ScheduleNew => "schedule_new",
        }
    }

    pub fn phase(&self) -> UpgradePhase {
        match self {
            UpgradeDecision::NoOp => UpgradePhase::Done,
            UpgradeDecision::CancelOnly => UpgradePhase::CancelingOnly,
            UpgradeDecision::ScheduleNew => UpgradePhase::Scheduling,
        }
    }
}

/// Everything one evaluation needs to know about the cluster and the request.
#[derive(Clone, Debug, Default)]
pub struct UpgradeRequest<'a> {
    pub topology: Topology,
    pub cluster_id: &'a str,
    /// Version the cluster runs now
    pub current_version: Option<&'a str>,
    pub channel_group: &'a str,
    /// Version requested by the current spec
    pub desired_version: Option<&'a str>,
    /// Version requested by the last applied resource
    pub previous_desired_version: Option<&'a str>,
    pub acknowledgements_for: Option<&'a str>,
}

/// Compares running and desired version. No remote calls.
pub fn decide(current: &str, desired: &str, requested_changed: bool) -> Result<UpgradeDecision> {
    match semver::compare(current, desired)? {
        Ordering::Greater if requested_changed => Err(Error::conflict(format!(
            "cluster version is already above the requested version: downgrades are not supported \
             (running {current}, requested {desired})"
        ))),
        Ordering::Greater => Ok(UpgradeDecision::NoOp),
        Ordering::Equal => Ok(UpgradeDecision::CancelOnly),
        Ordering::Less => Ok(UpgradeDecision::ScheduleNew),
    }
}

/// Fails unless `desired` is reachable from the running version, returning the matching
/// available version as the remote API spells it.
pub async fn validate_upgrade(
    api: &dyn ClusterManager,
    current: &str,
    channel_group: &str,
    desired: &str,
) -> Result<String> {
    let current_id = semver::create_version_id(current, channel_group);
    let available = resolver::available_upgrade_versions(api, &current_id)
        .await
        .map_err(|e| e.context("failed to get available upgrades"))?;
    if let Some(found) = available
        .iter()
        .find(|v| semver::equal(&v.raw_id, desired).unwrap_or(false))
    {
        return Ok(found.raw_id.clone());
    }
    let listed: Vec<&str> = available.iter().map(|v| v.raw_id.as_str()).collect();
    Err(Error::conflict(format!(
        "desired version ({desired}) is not in the list of available upgrades ({listed:?})"
    )))
}

pub async fn reconcile_upgrade(api: &dyn ClusterManager, request: &UpgradeRequest<'_>) -> Result<UpgradeDecision> {
    reconcile_upgrade_at(api, request, Utc::now()).await
}

/// Evaluates the request once. Gates are acknowledged before scheduling and stale policies are
/// cancelled before a new one is created.
pub async fn reconcile_upgrade_at(
    api: &dyn ClusterManager,
    request: &UpgradeRequest<'_>,
    now: DateTime<Utc>,
) -> Result<UpgradeDecision> {
    let cluster_id = request.cluster_id;
    let (Some(current), Some(desired)) = (
        request.current_version.filter(|v| !v.is_empty()),
        request.desired_version.filter(|v| !v.is_empty()),
    ) else {
        debug!(cluster_id, phase = %UpgradePhase::NoVersionInfo, "Skipping upgrade evaluation");
        return Ok(UpgradeDecision::NoOp);
    };

    semver::reject_legacy_prefix(desired)?;

    debug!(cluster_id, current, desired, phase = %UpgradePhase::Evaluating, "Evaluating upgrade");
    let requested_changed = request.previous_desired_version != Some(desired);
    let decision = decide(current, desired, requested_changed).inspect_err(|_| {
        debug!(cluster_id, current, desired, phase = %UpgradePhase::Blocked, "Upgrade blocked");
    })?;
    if decision == UpgradeDecision::NoOp {
        return Ok(decision);
    }

    let target = if decision == UpgradeDecision::ScheduleNew {
        validate_upgrade(api, current, request.channel_group, desired).await?
    } else {
        desired.to_string()
    };

    let scheduled = policies::scheduled_upgrades(api, request.topology, cluster_id)
        .await
        .map_err(|e| e.context("failed to get upgrade policies"))?;
    let correct_pending =
        policies::check_and_cancel(api, request.topology, cluster_id, &scheduled, &target, now).await?;
    debug!(cluster_id, phase = %decision.phase(), correct_pending, "Checked scheduled upgrades");

    if correct_pending || decision == UpgradeDecision::CancelOnly {
        return Ok(decision);
    }

    gates::resolve_gates(api, request.topology, cluster_id, &target, request.acknowledgements_for).await?;

    let policy = UpgradePolicy::manual(&target, Some(now + policies::schedule_delay()));
    api.add_upgrade_policy(request.topology, cluster_id, &policy)
        .await
        .map_err(|e| e.context("failed to schedule upgrade"))?;
    info!(cluster_id, version = %target, phase = %UpgradePhase::Done, "Scheduled cluster upgrade");
    Ok(decision)
}
