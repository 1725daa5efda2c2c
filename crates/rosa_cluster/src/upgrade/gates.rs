//! Version gates that must be agreed to before an upgrade can be scheduled.

use tracing::{debug, info};

use crate::cluster::types::Topology;
use crate::ocm::api::ClusterManager;
use crate::ocm::types::VersionGate;
use crate::util::errors::{Error, Result};
use crate::version::semver;

/// STS-only gates are agreed to on the user's behalf, the rest need an explicit acknowledgement.
pub fn partition(gates: Vec<VersionGate>) -> (Vec<VersionGate>, Vec<VersionGate>) {
    gates.into_iter().partition(|g| g.sts_only)
}

/// Lists every manual gate and names the acknowledgement string that unblocks them.
pub fn missing_acknowledgement_message(manual: &[VersionGate], minor: &str) -> String {
    let mut message = String::from(
        "\nMissing required acknowledgements to schedule upgrade.\n\
         Read the below description and acknowledge to proceed with upgrade.\n\
         Description:",
    );
    for (index, gate) in manual.iter().enumerate() {
        message.push_str(&format!("\n{}) {}\n", index + 1, gate.description));
        if !gate.warning_message.is_empty() {
            message.push_str(&format!("   Warning:     {}\n", gate.warning_message));
        }
        message.push_str(&format!("   URL:         {}\n", gate.documentation_url));
    }
    message.push_str(&format!(
        "\nTo acknowledge these items, please add \"upgrade_acknowledgements_for = {minor}\" and re-apply the changes"
    ));
    message
}

/// Agrees to every outstanding gate for `target_version`, returning how many were acknowledged.
///
/// Nothing is acknowledged when a manual gate exists and `acknowledgements_for` does not name
/// the target's minor version. The first failed acknowledgement aborts the rest.
pub async fn resolve_gates(
    api: &dyn ClusterManager,
    topology: Topology,
    cluster_id: &str,
    target_version: &str,
    acknowledgements_for: Option<&str>,
) -> Result<usize> {
    let gates = api
        .missing_gate_agreements(topology, cluster_id, target_version)
        .await
        .map_err(|e| e.context("failed to check for missing upgrade agreements"))?;
    if gates.is_empty() {
        return Ok(0);
    }

    let (auto, manual) = partition(gates);
    let minor = semver::minor_key(target_version);
    if !manual.is_empty() && acknowledgements_for != Some(minor.as_str()) {
        return Err(Error::conflict(missing_acknowledgement_message(&manual, &minor)));
    }

    let mut acknowledged = 0;
    for gate in auto.iter().chain(manual.iter()) {
        debug!(cluster_id, gate_id = %gate.id, sts_only = gate.sts_only, "Acknowledging version gate");
        api.add_gate_agreement(cluster_id, &gate.id).await.map_err(|e| {
            e.context(format!(
                "failed to acknowledge version gate '{}' for cluster '{cluster_id}'",
                gate.id
            ))
        })?;
        acknowledged += 1;
    }
    info!(cluster_id, target_version, acknowledged, "Acknowledged version gates");
    Ok(acknowledged)
}
