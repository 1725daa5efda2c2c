//! Changes to a running cluster. Most attributes are fixed at creation.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::api::v1::rosacluster::RosaClusterSpec;
use crate::cluster::builder::BuilderConfig;
use crate::cluster::types::{ProxyConfig, VersionRef};
use crate::cluster::validation::{self, PROPERTY_ROSA_CREATOR_ARN};
use crate::ocm::api::ClusterManager;
use crate::util::errors::{Error, Result};
use crate::version::{resolver, semver};

/// Body of the cluster PATCH request. Unset fields are left untouched remotely.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_trust_bundle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_user_workload_monitoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, String>>,
}

impl ClusterPatch {
    pub fn is_empty(&self) -> bool {
        *self == ClusterPatch::default()
    }
}

fn as_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

fn ensure_unchanged<T: Serialize + PartialEq>(attribute: &str, old: &T, new: &T) -> Result<()> {
    if old == new {
        return Ok(());
    }
    Err(Error::validation(format!(
        "Attribute {attribute}, cannot be changed from {} to {}",
        as_json(old),
        as_json(new)
    )))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub fn channel_group_changed(previous: &RosaClusterSpec, desired: &RosaClusterSpec, default: &str) -> bool {
    desired.channel_group.is_some()
        && non_empty(&previous.channel_group).unwrap_or(default) != non_empty(&desired.channel_group).unwrap_or(default)
}

pub fn version_changed(previous: &RosaClusterSpec, desired: &RosaClusterSpec) -> bool {
    match non_empty(&desired.version) {
        Some(version) => non_empty(&previous.version) != Some(version),
        None => false,
    }
}

/// Rejects changes to attributes that are fixed once the cluster exists.
pub fn validate_update(previous: &RosaClusterSpec, desired: &RosaClusterSpec, default_channel_group: &str) -> Result<()> {
    ensure_unchanged("name", &previous.name, &desired.name)?;
    ensure_unchanged("cloud_region", &previous.cloud_region, &desired.cloud_region)?;
    ensure_unchanged("topology", &previous.topology, &desired.topology)?;
    ensure_unchanged("domain_prefix", &previous.domain_prefix, &desired.domain_prefix)?;
    ensure_unchanged("external_id", &previous.external_id, &desired.external_id)?;
    ensure_unchanged("tags", &previous.tags, &desired.tags)?;
    ensure_unchanged("etcd_encryption", &previous.etcd_encryption, &desired.etcd_encryption)?;
    ensure_unchanged("base_dns_domain", &previous.base_dns_domain, &desired.base_dns_domain)?;
    ensure_unchanged("aws_account_id", &previous.aws_account_id, &desired.aws_account_id)?;
    ensure_unchanged("aws_subnet_ids", &previous.aws_subnet_ids, &desired.aws_subnet_ids)?;
    ensure_unchanged("kms_key_arn", &previous.kms_key_arn, &desired.kms_key_arn)?;
    ensure_unchanged("fips", &previous.fips, &desired.fips)?;
    ensure_unchanged("private", &previous.private, &desired.private)?;
    ensure_unchanged("machine_cidr", &previous.machine_cidr, &desired.machine_cidr)?;
    ensure_unchanged("service_cidr", &previous.service_cidr, &desired.service_cidr)?;
    ensure_unchanged("pod_cidr", &previous.pod_cidr, &desired.pod_cidr)?;
    ensure_unchanged("host_prefix", &previous.host_prefix, &desired.host_prefix)?;
    ensure_unchanged("sts", &previous.sts, &desired.sts)?;
    ensure_unchanged(
        "aws_additional_compute_security_group_ids",
        &previous.aws_additional_compute_security_group_ids,
        &desired.aws_additional_compute_security_group_ids,
    )?;
    ensure_unchanged("private_hosted_zone", &previous.private_hosted_zone, &desired.private_hosted_zone)?;
    ensure_unchanged("classic", &previous.classic, &desired.classic)?;
    ensure_unchanged("hosted_control_plane", &previous.hosted_control_plane, &desired.hosted_control_plane)?;
    ensure_unchanged("replicas", &previous.replicas, &desired.replicas)?;
    ensure_unchanged("compute_machine_type", &previous.compute_machine_type, &desired.compute_machine_type)?;
    ensure_unchanged("default_mp_labels", &previous.default_mp_labels, &desired.default_mp_labels)?;
    ensure_unchanged("availability_zones", &previous.availability_zones, &desired.availability_zones)?;
    ensure_unchanged("multi_az", &previous.multi_az, &desired.multi_az)?;
    ensure_unchanged("worker_disk_size", &previous.worker_disk_size, &desired.worker_disk_size)?;
    ensure_unchanged("create_admin_user", &previous.create_admin_user, &desired.create_admin_user)?;
    ensure_unchanged("admin_username", &previous.admin_username, &desired.admin_username)?;

    if channel_group_changed(previous, desired, default_channel_group) && version_changed(previous, desired) {
        return Err(Error::validation(
            "Cannot change channel group and version simultaneously. Channel group changes and version upgrades \
             must be performed in separate operations. Please apply one change at a time.",
        ));
    }
    if let Some(version) = non_empty(&desired.version) {
        semver::reject_legacy_prefix(version)?;
    }
    Ok(())
}

/// Properties to send, or `None` when they did not change.
pub fn patch_properties(
    previous: &RosaClusterSpec,
    desired: &RosaClusterSpec,
    config: &BuilderConfig,
) -> Result<Option<BTreeMap<String, String>>> {
    if previous.properties == desired.properties {
        return Ok(None);
    }
    let old_creator = previous.properties.as_ref().and_then(|p| p.get(PROPERTY_ROSA_CREATOR_ARN));
    let new_creator = desired.properties.as_ref().and_then(|p| p.get(PROPERTY_ROSA_CREATOR_ARN));
    if let (Some(old), Some(new)) = (old_creator, new_creator) {
        if old != new {
            return Err(Error::validation(format!(
                "Shouldn't patch property '{PROPERTY_ROSA_CREATOR_ARN}'"
            )));
        }
    }
    validation::validate_properties(desired.properties.as_ref(), &config.default_properties)?;
    Ok(Some(config.merged_properties(desired.properties.as_ref())))
}

/// Proxy fields to send, clearing removed values with empty strings.
pub fn patch_proxy(previous: &RosaClusterSpec, desired: &RosaClusterSpec) -> Result<(Option<ProxyConfig>, Option<String>)> {
    if previous.proxy == desired.proxy {
        return Ok((None, None));
    }
    let proxy = desired.proxy.clone().unwrap_or_default();
    let http_proxy = non_empty(&proxy.http_proxy);
    let https_proxy = non_empty(&proxy.https_proxy);
    let no_proxy = non_empty(&proxy.no_proxy);
    if http_proxy.is_some() || https_proxy.is_some() || no_proxy.is_some() {
        validation::validate_proxy(http_proxy, https_proxy)?;
    }
    let config = ProxyConfig {
        http_proxy: Some(http_proxy.unwrap_or_default().to_string()),
        https_proxy: Some(https_proxy.unwrap_or_default().to_string()),
        no_proxy: Some(no_proxy.unwrap_or_default().to_string()),
    };
    let bundle = non_empty(&proxy.additional_trust_bundle).unwrap_or_default().to_string();
    Ok((Some(config), Some(bundle)))
}

/// Builds the PATCH body for the mutable attributes. Version upgrades are not part of it.
pub async fn build_cluster_patch(
    api: &dyn ClusterManager,
    previous: &RosaClusterSpec,
    desired: &RosaClusterSpec,
    current_version: Option<&str>,
    config: &BuilderConfig,
    default_channel_group: &str,
) -> Result<ClusterPatch> {
    let mut patch = ClusterPatch::default();

    let (proxy, bundle) = patch_proxy(previous, desired)?;
    patch.proxy = proxy;
    patch.additional_trust_bundle = bundle;

    if channel_group_changed(previous, desired, default_channel_group) {
        let group = non_empty(&desired.channel_group).unwrap_or(default_channel_group);
        let current = current_version.unwrap_or_default();
        resolver::get_and_validate_version_in_channel_group(api, desired.topology, group, Some(current))
            .await
            .map_err(|e| e.context(format!("Current cluster version {current} is not available in channel group {group}")))?;
        debug!(channel_group = group, "Updating channel group");
        patch.version = Some(VersionRef {
            id: None,
            channel_group: group.to_string(),
        });
    }

    if desired.disable_workload_monitoring.is_some()
        && desired.disable_workload_monitoring != previous.disable_workload_monitoring
    {
        patch.disable_user_workload_monitoring = desired.disable_workload_monitoring;
    }

    patch.properties = patch_properties(previous, desired, config)?;
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::rosacluster::ProxySpec;
    use crate::ocm::api::MockClusterManager;
    use crate::ocm::types::{Page, Version};
    use serde_json::json;

    fn spec() -> RosaClusterSpec {
        RosaClusterSpec {
            name: "my-cluster".to_string(),
            cloud_region: "us-east-1".to_string(),
            aws_account_id: "123456789012".to_string(),
            version: Some("4.14.2".to_string()),
            properties: Some(BTreeMap::from([(
                PROPERTY_ROSA_CREATOR_ARN.to_string(),
                "arn:aws:iam::123456789012:user/admin".to_string(),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn immutable_attributes() {
        let previous = spec();
        let mut desired = spec();
        desired.replicas = Some(5);
        assert_eq!(
            validate_update(&previous, &desired, "stable").unwrap_err().to_string(),
            "ValidationError: Attribute replicas, cannot be changed from null to 5"
        );

        let mut desired = spec();
        desired.cloud_region = "eu-west-1".to_string();
        assert!(validate_update(&previous, &desired, "stable")
            .unwrap_err()
            .to_string()
            .contains("Attribute cloud_region"));

        let mut desired = spec();
        desired.disable_workload_monitoring = Some(true);
        desired.version = Some("4.14.3".to_string());
        assert!(validate_update(&previous, &desired, "stable").is_ok());
    }

    #[test]
    fn channel_group_and_version_not_together() {
        let previous = spec();
        let mut desired = spec();
        desired.channel_group = Some("fast".to_string());
        assert!(validate_update(&previous, &desired, "stable").is_ok());
        desired.version = Some("4.15.0".to_string());
        assert!(validate_update(&previous, &desired, "stable")
            .unwrap_err()
            .to_string()
            .contains("Cannot change channel group and version simultaneously"));

        let mut same = spec();
        same.channel_group = Some("stable".to_string());
        assert!(!channel_group_changed(&previous, &same, "stable"));
    }

    #[test]
    fn prefixed_version_is_rejected_on_update() {
        let previous = spec();
        let mut desired = spec();
        desired.version = Some("openshift-v4.14.3".to_string());
        let err = validate_update(&previous, &desired, "stable").unwrap_err();
        assert!(err.is_terminal());
        assert!(err.to_string().contains("no longer supported"));
    }

    #[test]
    fn creator_arn_cannot_change() {
        let previous = spec();
        let mut desired = spec();
        desired.properties = Some(BTreeMap::from([(
            PROPERTY_ROSA_CREATOR_ARN.to_string(),
            "arn:aws:iam::123456789012:user/someone-else".to_string(),
        )]));
        assert!(patch_properties(&previous, &desired, &BuilderConfig::default())
            .unwrap_err()
            .to_string()
            .contains("Shouldn't patch property 'rosa_creator_arn'"));

        let mut desired = spec();
        if let Some(p) = desired.properties.as_mut() {
            p.insert("team".to_string(), "platform".to_string());
        }
        let properties = patch_properties(&previous, &desired, &BuilderConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(properties.get("team").map(String::as_str), Some("platform"));
        assert!(properties.contains_key("rosa_operator_version"));
    }

    #[test]
    fn removed_proxy_is_cleared() {
        let mut previous = spec();
        previous.proxy = Some(ProxySpec {
            http_proxy: Some("http://proxy:3128".to_string()),
            ..Default::default()
        });
        let patch = ClusterPatch {
            proxy: patch_proxy(&previous, &spec()).unwrap().0,
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"proxy": {"http_proxy": "", "https_proxy": "", "no_proxy": ""}})
        );
    }

    #[tokio::test]
    async fn unchanged_spec_yields_empty_patch() {
        let mut api = MockClusterManager::new();
        api.expect_list_versions().times(0);
        let patch = build_cluster_patch(&api, &spec(), &spec(), Some("4.14.2"), &BuilderConfig::default(), "stable")
            .await
            .unwrap();
        assert!(patch.is_empty());
    }

    #[tokio::test]
    async fn channel_group_change_checks_current_version() {
        let mut api = MockClusterManager::new();
        api.expect_list_versions()
            .withf(|search, _, _, _| search.contains("channel_group = 'fast'"))
            .times(1)
            .returning(|_, _, page, _| {
                Ok(Page::of(
                    page,
                    vec![Version {
                        raw_id: "4.15.0".to_string(),
                        ..Default::default()
                    }],
                ))
            });
        let mut desired = spec();
        desired.channel_group = Some("fast".to_string());
        let err = build_cluster_patch(&api, &spec(), &desired, Some("4.14.2"), &BuilderConfig::default(), "stable")
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Current cluster version 4.14.2 is not available in channel group fast"));
    }
}
