//! Turns a desired state into the cluster description submitted on create.
//!
//! Checks run in a fixed order and the first violation wins: name, properties,
//! nodes, AWS networking, API privacy, FIPS and network, version, admin user,
//! proxy. The remote version checks run last.

use rand::distributions::{Alphanumeric, DistString};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::api::v1::rosacluster::{ProxySpec, StsSpec};
use crate::cluster::desired::{DesiredState, TopologyConfig};
use crate::cluster::types::{
    AwsNetworkConfig, Ccs, ClusterApi, ClusterSpec, ComputeReplicas, Dns, Ec2MetadataHttpTokens, Enabled,
    HtpasswdIdentityProvider, HtpasswdUser, HtpasswdUserList, IdRef, InstanceIamRoles, Listening, Network,
    NodePoolConfig, ProxyConfig, RootVolume, StsConfig, Topology, VersionRef, VolumeSize,
};
use crate::cluster::validation::{self, PROPERTY_ROSA_CREATOR_ARN};
use crate::ocm::api::ClusterManager;
use crate::util::errors::{Error, Result};
use crate::version::{resolver, semver};

pub const CLUSTER_ADMIN_USERNAME: &str = "cluster-admin";
pub const GENERATED_PASSWORD_LENGTH: usize = 23;
pub const PROPERTY_OPERATOR_VERSION: &str = "rosa_operator_version";
const CLOUD_PROVIDER_AWS: &str = "aws";
const PRODUCT_ROSA: &str = "rosa";

/// Builder inputs that do not come from the resource.
#[derive(Clone, Debug)]
pub struct BuilderConfig {
    /// Merged into every cluster's properties. Users may not override these keys.
    pub default_properties: BTreeMap<String, String>,
    pub classic_min_version: String,
    pub hosted_min_version: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig {
            default_properties: BTreeMap::from([(
                PROPERTY_OPERATOR_VERSION.to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            )]),
            classic_min_version: "4.10.0".to_string(),
            hosted_min_version: "4.12.0".to_string(),
        }
    }
}

impl BuilderConfig {
    pub fn min_version(&self, topology: Topology) -> &str {
        match topology {
            Topology::Classic => &self.classic_min_version,
            Topology::HostedControlPlane => &self.hosted_min_version,
        }
    }

    /// Default properties with the user's on top.
    pub fn merged_properties(&self, user: Option<&BTreeMap<String, String>>) -> BTreeMap<String, String> {
        let mut properties = self.default_properties.clone();
        if let Some(user) = user {
            properties.extend(user.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        properties
    }
}

/// Plain-text admin credentials, only ever handed back to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct BuiltCluster {
    pub spec: ClusterSpec,
    pub admin: Option<AdminCredentials>,
    /// The version the cluster will be installed with, requested or channel default.
    pub resolved_version: Option<String>,
}

pub struct NodesRequest<'a> {
    pub topology: Topology,
    pub region: &'a str,
    pub autoscaling: bool,
    pub replicas: Option<i64>,
    pub min_replicas: Option<i64>,
    pub max_replicas: Option<i64>,
    pub machine_type: Option<&'a str>,
    pub labels: Option<&'a BTreeMap<String, String>>,
    pub availability_zones: Option<&'a [String]>,
    pub multi_az: bool,
    pub disk_size: Option<i64>,
}

pub fn build_nodes(req: &NodesRequest) -> Result<NodePoolConfig> {
    let az_count = match req.availability_zones {
        Some(zones) => {
            if req.topology == Topology::Classic {
                validation::validate_availability_zone_count(req.multi_az, zones.len())?;
            }
            for zone in zones {
                validation::validate_availability_zone_belongs_to_region(zone, req.region)?;
            }
            zones.len()
        }
        None => 0,
    };

    let replicas: ComputeReplicas = validation::validate_replica_counts(
        req.topology,
        req.autoscaling,
        req.replicas,
        req.min_replicas,
        req.max_replicas,
        req.multi_az,
        az_count,
    )?;
    validation::validate_worker_disk_size(req.disk_size, req.topology)?;

    Ok(NodePoolConfig {
        replicas,
        compute_machine_type: req.machine_type.map(IdRef::new),
        compute_labels: req.labels.cloned(),
        availability_zones: req.availability_zones.map(<[String]>::to_vec),
        compute_root_volume: req.disk_size.map(|size| RootVolume {
            aws: VolumeSize { size },
        }),
    })
}

pub struct AwsRequest<'a> {
    pub topology: Topology,
    pub tags: Option<&'a BTreeMap<String, String>>,
    pub ec2_metadata_http_tokens: Option<Ec2MetadataHttpTokens>,
    pub kms_key_arn: Option<&'a str>,
    pub private_link: bool,
    pub account_id: &'a str,
    pub billing_account_id: Option<&'a str>,
    pub sts: Option<&'a StsSpec>,
    pub subnet_ids: Option<&'a [String]>,
    pub private_hosted_zone_id: Option<&'a str>,
    pub private_hosted_zone_role_arn: Option<&'a str>,
    pub additional_compute_security_group_ids: Option<&'a [String]>,
    pub additional_infra_security_group_ids: Option<&'a [String]>,
    pub additional_control_plane_security_group_ids: Option<&'a [String]>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

pub fn build_aws(req: &AwsRequest) -> Result<AwsNetworkConfig> {
    validation::validate_kms_arn(req.kms_key_arn)?;

    let has_subnets = req.subnet_ids.is_some_and(|s| !s.is_empty());
    if req.private_link && !has_subnets {
        return Err(Error::validation(
            "Clusters with PrivateLink must have a pre-configured VPC. Make sure to specify the subnet ids.",
        ));
    }

    let zone_id = non_empty(req.private_hosted_zone_id);
    let zone_role = non_empty(req.private_hosted_zone_role_arn);
    if zone_id.is_some() || zone_role.is_some() {
        if zone_id.is_none() || zone_role.is_none() {
            return Err(Error::validation(
                "Both 'private_hosted_zone.id' and 'private_hosted_zone.role_arn' must be set",
            ));
        }
        if req.sts.is_none() || !has_subnets {
            return Err(Error::validation(
                "Parameters 'private_hosted_zone.id' and 'private_hosted_zone.role_arn' require STS and \
                 'aws_subnet_ids' to be set",
            ));
        }
        validation::validate_private_hosted_zone_role_arn(zone_role)?;
    }

    match req.topology {
        Topology::Classic => {
            if non_empty(req.billing_account_id).is_some() {
                return Err(Error::validation(
                    "'aws_billing_account_id' is only supported for hosted control plane clusters",
                ));
            }
        }
        Topology::HostedControlPlane => {
            if req.ec2_metadata_http_tokens.is_some() {
                return Err(Error::validation(
                    "'ec2_metadata_http_tokens' is only supported for classic clusters",
                ));
            }
            if req.sts.is_none() {
                return Err(Error::validation("Hosted control plane clusters require STS"));
            }
            if !has_subnets {
                return Err(Error::validation(
                    "Hosted control plane clusters require 'aws_subnet_ids' to be set",
                ));
            }
        }
    }

    let sts = req.sts.map(|sts| StsConfig {
        role_arn: sts.role_arn.clone(),
        support_role_arn: sts.support_role_arn.clone(),
        instance_iam_roles: InstanceIamRoles {
            master_role_arn: match req.topology {
                Topology::Classic => sts.instance_iam_roles.master_role_arn.clone(),
                Topology::HostedControlPlane => None,
            },
            worker_role_arn: sts.instance_iam_roles.worker_role_arn.clone(),
        },
        operator_role_prefix: sts.operator_role_prefix.clone(),
        oidc_config: non_empty(sts.oidc_config_id.as_deref()).map(IdRef::new),
    });

    Ok(AwsNetworkConfig {
        account_id: Some(req.account_id.to_string()),
        billing_account_id: non_empty(req.billing_account_id).map(str::to_string),
        tags: req.tags.cloned(),
        ec2_metadata_http_tokens: req.ec2_metadata_http_tokens,
        kms_key_arn: non_empty(req.kms_key_arn).map(str::to_string),
        private_link: req.private_link,
        subnet_ids: req.subnet_ids.map(<[String]>::to_vec),
        private_hosted_zone_id: zone_id.map(str::to_string),
        private_hosted_zone_role_arn: zone_role.map(str::to_string),
        additional_compute_security_group_ids: req.additional_compute_security_group_ids.map(<[String]>::to_vec),
        additional_infra_security_group_ids: req.additional_infra_security_group_ids.map(<[String]>::to_vec),
        additional_control_plane_security_group_ids: req
            .additional_control_plane_security_group_ids
            .map(<[String]>::to_vec),
        sts,
    })
}

pub fn set_api_privacy(is_private: bool, is_private_link: bool, is_sts: bool) -> Result<Listening> {
    if is_sts && !is_private && is_private_link {
        return Err(Error::validation("PrivateLink is only supported on private clusters"));
    }
    Ok(if is_private {
        Listening::Internal
    } else {
        Listening::External
    })
}

/// Version reference for an explicitly requested version, or for a non-default channel group.
pub fn build_version(
    requested: Option<&str>,
    channel_group: &str,
    min_version: &str,
) -> Result<Option<VersionRef>> {
    let Some(version) = non_empty(requested) else {
        return Ok((channel_group != semver::DEFAULT_CHANNEL_GROUP).then(|| VersionRef {
            id: None,
            channel_group: channel_group.to_string(),
        }));
    };
    semver::reject_legacy_prefix(version)?;
    let supported = semver::is_greater_than_or_equal(version, min_version)
        .map_err(|e| Error::validation(format!("Can't check if cluster version is supported '{version}': {e}")))?;
    if !supported {
        return Err(Error::validation(format!(
            "Cluster version {version} is not supported (minimal supported version is {min_version})"
        )));
    }
    Ok(Some(VersionRef {
        id: Some(semver::create_version_id(version, channel_group)),
        channel_group: channel_group.to_string(),
    }))
}

/// A random password with upper and lower case letters and digits.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = Alphanumeric.sample_string(&mut rng, GENERATED_PASSWORD_LENGTH);
        if validation::validate_htpasswd_password(&candidate).is_ok() {
            return candidate;
        }
    }
}

/// bcrypt hash in the `$2y$` flavor htpasswd expects.
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash_with_result(password, bcrypt::DEFAULT_COST)
        .map(|parts| parts.format_for_version(bcrypt::Version::TwoY))
        .map_err(|e| Error::validation(format!("Failed to hash the password: {e}")))
}

fn build_admin(
    username: Option<&str>,
    password: Option<&str>,
) -> Result<(HtpasswdIdentityProvider, AdminCredentials)> {
    let username = non_empty(username).unwrap_or(CLUSTER_ADMIN_USERNAME).to_string();
    validation::validate_htpasswd_username(&username)?;
    let password = match non_empty(password) {
        Some(password) => {
            validation::validate_htpasswd_password(password)?;
            password.to_string()
        }
        None => generate_password(),
    };
    let idp = HtpasswdIdentityProvider {
        users: HtpasswdUserList {
            items: vec![HtpasswdUser {
                username: username.clone(),
                hashed_password: hash_password(&password)?,
            }],
        },
    };
    Ok((idp, AdminCredentials { username, password }))
}

fn build_proxy(proxy: &ProxySpec) -> Result<Option<ProxyConfig>> {
    let http_proxy = non_empty(proxy.http_proxy.as_deref());
    let https_proxy = non_empty(proxy.https_proxy.as_deref());
    let no_proxy = non_empty(proxy.no_proxy.as_deref());
    if http_proxy.is_none() && https_proxy.is_none() && no_proxy.is_none() {
        return Ok(None);
    }
    validation::validate_proxy(http_proxy, https_proxy)?;
    Ok(Some(ProxyConfig {
        http_proxy: http_proxy.map(str::to_string),
        https_proxy: https_proxy.map(str::to_string),
        no_proxy: no_proxy.map(str::to_string),
    }))
}

/// Builds the cluster description without any remote call.
pub fn assemble_cluster_spec(desired: &DesiredState, config: &BuilderConfig) -> Result<BuiltCluster> {
    let topology = desired.kind();
    validation::validate_cluster_name(&desired.name)?;

    validation::validate_properties(desired.properties.as_ref(), &config.default_properties)?;
    let properties = config.merged_properties(desired.properties.as_ref());

    let (autoscaling, min_replicas, max_replicas) = match &desired.topology {
        TopologyConfig::Classic(classic) => (classic.autoscaling_enabled, classic.min_replicas, classic.max_replicas),
        TopologyConfig::Hosted(_) => (false, None, None),
    };
    let multi_az = match topology {
        Topology::Classic => desired.multi_az,
        Topology::HostedControlPlane => true,
    };
    let nodes = build_nodes(&NodesRequest {
        topology,
        region: &desired.region,
        autoscaling,
        replicas: desired.replicas,
        min_replicas,
        max_replicas,
        machine_type: desired.compute_machine_type.as_deref(),
        labels: desired.labels.as_ref(),
        availability_zones: desired.availability_zones.as_deref(),
        multi_az,
        disk_size: desired.worker_disk_size,
    })?;

    let disable_scp_checks = match &desired.topology {
        TopologyConfig::Classic(classic) => classic.disable_scp_checks.filter(|d| *d),
        TopologyConfig::Hosted(_) => None,
    };
    let ccs = Ccs {
        enabled: true,
        disable_scp_checks,
    };

    let private_link = match &desired.topology {
        TopologyConfig::Classic(classic) => classic.aws_private_link,
        TopologyConfig::Hosted(_) => desired.private,
    };
    let aws = match &desired.topology {
        TopologyConfig::Classic(classic) => build_aws(&AwsRequest {
            topology,
            tags: desired.tags.as_ref(),
            ec2_metadata_http_tokens: classic.ec2_metadata_http_tokens,
            kms_key_arn: desired.kms_key_arn.as_deref(),
            private_link,
            account_id: &desired.aws_account_id,
            billing_account_id: None,
            sts: desired.sts.as_ref(),
            subnet_ids: desired.subnet_ids.as_deref(),
            private_hosted_zone_id: desired.private_hosted_zone.as_ref().map(|z| z.id.as_str()),
            private_hosted_zone_role_arn: desired.private_hosted_zone.as_ref().map(|z| z.role_arn.as_str()),
            additional_compute_security_group_ids: desired.additional_compute_security_group_ids.as_deref(),
            additional_infra_security_group_ids: classic.aws_additional_infra_security_group_ids.as_deref(),
            additional_control_plane_security_group_ids: classic
                .aws_additional_control_plane_security_group_ids
                .as_deref(),
        })?,
        TopologyConfig::Hosted(hosted) => build_aws(&AwsRequest {
            topology,
            tags: desired.tags.as_ref(),
            ec2_metadata_http_tokens: None,
            kms_key_arn: desired.kms_key_arn.as_deref(),
            private_link,
            account_id: &desired.aws_account_id,
            billing_account_id: hosted.aws_billing_account_id.as_deref(),
            sts: desired.sts.as_ref(),
            subnet_ids: desired.subnet_ids.as_deref(),
            private_hosted_zone_id: desired.private_hosted_zone.as_ref().map(|z| z.id.as_str()),
            private_hosted_zone_role_arn: desired.private_hosted_zone.as_ref().map(|z| z.role_arn.as_str()),
            additional_compute_security_group_ids: desired.additional_compute_security_group_ids.as_deref(),
            additional_infra_security_group_ids: None,
            additional_control_plane_security_group_ids: None,
        })?,
    };

    let listening = set_api_privacy(desired.private, private_link, desired.is_sts())?;

    let network = Network {
        machine_cidr: desired.machine_cidr.clone(),
        service_cidr: desired.service_cidr.clone(),
        pod_cidr: desired.pod_cidr.clone(),
        host_prefix: desired.host_prefix,
    };

    let version = build_version(
        desired.version.as_deref(),
        &desired.channel_group,
        config.min_version(topology),
    )?;

    let (htpasswd, admin) = match &desired.admin {
        Some(admin) => {
            let (idp, credentials) = build_admin(admin.username.as_deref(), admin.password.as_deref())?;
            (Some(idp), Some(credentials))
        }
        None => (None, None),
    };

    let proxy = desired.proxy.as_ref().map(build_proxy).transpose()?.flatten();
    let additional_trust_bundle = desired
        .proxy
        .as_ref()
        .and_then(|p| non_empty(p.additional_trust_bundle.as_deref()))
        .map(str::to_string);

    let spec = ClusterSpec {
        name: desired.name.clone(),
        domain_prefix: non_empty(desired.domain_prefix.as_deref()).map(str::to_string),
        external_id: non_empty(desired.external_id.as_deref()).map(str::to_string),
        cloud_provider: IdRef::new(CLOUD_PROVIDER_AWS),
        product: IdRef::new(PRODUCT_ROSA),
        region: IdRef::new(desired.region.clone()),
        multi_az,
        properties,
        nodes,
        aws,
        api: ClusterApi { listening },
        ccs,
        hypershift: (topology == Topology::HostedControlPlane).then_some(Enabled { enabled: true }),
        fips: desired.fips.filter(|f| *f),
        etcd_encryption: desired.etcd_encryption,
        disable_user_workload_monitoring: desired.disable_workload_monitoring,
        dns: non_empty(desired.base_dns_domain.as_deref()).map(|d| Dns {
            base_domain: d.to_string(),
        }),
        network: (!network.is_empty()).then_some(network),
        version,
        htpasswd,
        proxy,
        additional_trust_bundle,
    };

    Ok(BuiltCluster {
        spec,
        admin,
        resolved_version: None,
    })
}

/// Builds the cluster description, then checks the version against the channel group.
pub async fn build_cluster_spec(
    api: &dyn ClusterManager,
    desired: &DesiredState,
    config: &BuilderConfig,
) -> Result<BuiltCluster> {
    let mut built = assemble_cluster_spec(desired, config)?;

    let version = resolver::get_and_validate_version_in_channel_group(
        api,
        desired.kind(),
        &desired.channel_group,
        desired.version.as_deref(),
    )
    .await?;
    if let TopologyConfig::Classic(classic) = &desired.topology {
        validation::validate_http_tokens_version(classic.ec2_metadata_http_tokens, &version)?;
    }
    debug!(name = %desired.name, version, "Cluster version resolved");

    if desired.properties.is_some() {
        info!(
            name = %desired.name,
            creator = built.spec.properties.get(PROPERTY_ROSA_CREATOR_ARN).map(String::as_str).unwrap_or_default(),
            "Built cluster specification"
        );
    }
    built.resolved_version = Some(version);
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::rosacluster::{
        ClassicSpec, HostedSpec, InstanceIamRolesSpec, PrivateHostedZoneSpec,
    };
    use crate::cluster::desired::AdminUser;
    use crate::ocm::api::MockClusterManager;
    use crate::ocm::types::{Page, Version};
    use assert_json_diff::assert_json_include;
    use serde_json::json;

    fn classic(settings: ClassicSpec) -> DesiredState {
        DesiredState {
            name: "my-cluster".to_string(),
            region: "us-east-1".to_string(),
            aws_account_id: "123456789012".to_string(),
            topology: TopologyConfig::Classic(settings),
            domain_prefix: None,
            external_id: None,
            multi_az: false,
            availability_zones: None,
            subnet_ids: None,
            private: false,
            properties: None,
            tags: None,
            kms_key_arn: None,
            etcd_encryption: None,
            fips: None,
            disable_workload_monitoring: None,
            base_dns_domain: None,
            machine_cidr: None,
            service_cidr: None,
            pod_cidr: None,
            host_prefix: None,
            version: None,
            channel_group: "stable".to_string(),
            compute_machine_type: None,
            replicas: None,
            labels: None,
            worker_disk_size: None,
            sts: None,
            private_hosted_zone: None,
            additional_compute_security_group_ids: None,
            proxy: None,
            admin: None,
        }
    }

    fn sts() -> StsSpec {
        StsSpec {
            role_arn: "arn:aws:iam::123456789012:role/installer".to_string(),
            support_role_arn: "arn:aws:iam::123456789012:role/support".to_string(),
            instance_iam_roles: InstanceIamRolesSpec {
                master_role_arn: Some("arn:aws:iam::123456789012:role/master".to_string()),
                worker_role_arn: "arn:aws:iam::123456789012:role/worker".to_string(),
            },
            operator_role_prefix: "my-cluster".to_string(),
            oidc_config_id: None,
        }
    }

    fn zones(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn nodes<'a>(multi_az: bool, replicas: Option<i64>, azs: Option<&'a [String]>) -> NodesRequest<'a> {
        NodesRequest {
            topology: Topology::Classic,
            region: "us-east-1",
            autoscaling: false,
            replicas,
            min_replicas: None,
            max_replicas: None,
            machine_type: None,
            labels: None,
            availability_zones: azs,
            multi_az,
            disk_size: None,
        }
    }

    fn aws<'a>(topology: Topology) -> AwsRequest<'a> {
        AwsRequest {
            topology,
            tags: None,
            ec2_metadata_http_tokens: None,
            kms_key_arn: None,
            private_link: false,
            account_id: "123456789012",
            billing_account_id: None,
            sts: None,
            subnet_ids: None,
            private_hosted_zone_id: None,
            private_hosted_zone_role_arn: None,
            additional_compute_security_group_ids: None,
            additional_infra_security_group_ids: None,
            additional_control_plane_security_group_ids: None,
        }
    }

    #[test]
    fn multi_az_three_replicas_three_zones() {
        let azs = zones(&["us-east-1a", "us-east-1b", "us-east-1c"]);
        let pool = build_nodes(&nodes(true, Some(3), Some(azs.as_slice()))).unwrap();
        assert_eq!(pool.replicas, ComputeReplicas::Fixed(3));
        assert_eq!(pool.availability_zones.as_ref().map(Vec::len), Some(3));
        let wire = serde_json::to_value(&pool).unwrap();
        assert!(wire.get("autoscale_compute").is_none());
        assert_eq!(wire["compute"], json!(3));
    }

    #[test]
    fn max_below_min_is_rejected() {
        let mut req = nodes(false, None, None);
        req.autoscaling = true;
        req.min_replicas = Some(4);
        req.max_replicas = Some(3);
        assert_eq!(
            build_nodes(&req).unwrap_err().to_string(),
            "ValidationError: max-replicas must be greater or equal to min-replicas"
        );
    }

    #[test]
    fn replica_floor_holds_in_both_modes() {
        for (multi_az, azs, floor) in [(true, zones(&["us-east-1a", "us-east-1b", "us-east-1c"]), 3), (false, zones(&["us-east-1a"]), 2)] {
            for count in 0..floor {
                assert!(build_nodes(&nodes(multi_az, Some(count), Some(azs.as_slice()))).is_err());
                let mut scaled = nodes(multi_az, None, Some(azs.as_slice()));
                scaled.autoscaling = true;
                scaled.min_replicas = Some(count);
                scaled.max_replicas = Some(6);
                assert!(build_nodes(&scaled).is_err());
            }
        }
    }

    #[test]
    fn zone_count_and_region() {
        let two = zones(&["us-east-1a", "us-east-1b"]);
        assert!(build_nodes(&nodes(false, None, Some(two.as_slice())))
            .unwrap_err()
            .to_string()
            .contains("should be 1, instead received: 2"));
        assert!(build_nodes(&nodes(true, Some(3), Some(two.as_slice())))
            .unwrap_err()
            .to_string()
            .contains("at least 3"));
        let elsewhere = zones(&["eu-west-1a"]);
        assert!(build_nodes(&nodes(false, None, Some(elsewhere.as_slice())))
            .unwrap_err()
            .to_string()
            .contains("Invalid AZ"));
    }

    #[test]
    fn private_link_needs_subnets() {
        let mut req = aws(Topology::Classic);
        req.private_link = true;
        assert!(build_aws(&req).unwrap_err().to_string().contains("pre-configured VPC"));
        let subnets = zones(&["subnet-1"]);
        req.subnet_ids = Some(subnets.as_slice());
        assert!(build_aws(&req).unwrap().private_link);
    }

    #[test]
    fn private_hosted_zone_needs_sts_and_subnets() {
        let subnets = zones(&["subnet-1"]);
        let sts = sts();
        let mut req = aws(Topology::Classic);
        req.private_hosted_zone_id = Some("Z123");
        req.private_hosted_zone_role_arn = Some("arn:aws:iam::123456789012:role/shared");
        assert!(build_aws(&req).unwrap_err().to_string().contains("require STS"));
        req.sts = Some(&sts);
        assert!(build_aws(&req).is_err());
        req.subnet_ids = Some(subnets.as_slice());
        let built = build_aws(&req).unwrap();
        assert_eq!(built.private_hosted_zone_id.as_deref(), Some("Z123"));

        req.private_hosted_zone_role_arn = Some("not-an-arn");
        assert!(build_aws(&req).unwrap_err().to_string().contains("role_arn"));
    }

    #[test]
    fn topology_specific_aws_fields() {
        let mut classic_req = aws(Topology::Classic);
        classic_req.billing_account_id = Some("210987654321");
        assert!(build_aws(&classic_req).unwrap_err().to_string().contains("aws_billing_account_id"));

        let subnets = zones(&["subnet-1"]);
        let sts = sts();
        let mut hosted = aws(Topology::HostedControlPlane);
        assert!(build_aws(&hosted).unwrap_err().to_string().contains("require STS"));
        hosted.sts = Some(&sts);
        hosted.subnet_ids = Some(subnets.as_slice());
        hosted.ec2_metadata_http_tokens = Some(Ec2MetadataHttpTokens::Required);
        assert!(build_aws(&hosted).unwrap_err().to_string().contains("ec2_metadata_http_tokens"));
        hosted.ec2_metadata_http_tokens = None;
        hosted.billing_account_id = Some("210987654321");
        let built = build_aws(&hosted).unwrap();
        assert_eq!(built.billing_account_id.as_deref(), Some("210987654321"));
        assert_eq!(built.sts.unwrap().instance_iam_roles.master_role_arn, None);
    }

    #[test]
    fn api_privacy() {
        assert!(set_api_privacy(false, true, true).is_err());
        assert_eq!(set_api_privacy(true, true, true).unwrap(), Listening::Internal);
        assert_eq!(set_api_privacy(false, false, true).unwrap(), Listening::External);
        assert_eq!(set_api_privacy(false, true, false).unwrap(), Listening::External);
    }

    #[test]
    fn version_reference() {
        assert_eq!(build_version(None, "stable", "4.10.0").unwrap(), None);
        assert_eq!(
            build_version(None, "fast", "4.10.0").unwrap(),
            Some(VersionRef {
                id: None,
                channel_group: "fast".to_string()
            })
        );
        assert_eq!(
            build_version(Some("4.14.2"), "candidate", "4.10.0").unwrap().unwrap().id.as_deref(),
            Some("openshift-v4.14.2-candidate")
        );
        assert!(build_version(Some("openshift-v4.14.2"), "stable", "4.10.0")
            .unwrap_err()
            .to_string()
            .contains("no longer supported"));
        assert!(build_version(Some("4.11.0"), "stable", "4.12.0")
            .unwrap_err()
            .to_string()
            .contains("minimal supported version is 4.12.0"));
    }

    #[test]
    fn admin_user_defaults_and_hash() {
        let mut desired = classic(ClassicSpec::default());
        desired.admin = Some(AdminUser {
            username: None,
            password: None,
        });
        let built = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap();
        let admin = built.admin.unwrap();
        assert_eq!(admin.username, CLUSTER_ADMIN_USERNAME);
        assert_eq!(admin.password.len(), GENERATED_PASSWORD_LENGTH);
        let user = &built.spec.htpasswd.unwrap().users.items[0];
        assert!(user.hashed_password.starts_with("$2y$"));
        assert!(bcrypt::verify(&admin.password, &user.hashed_password).unwrap());

        desired.admin = Some(AdminUser {
            username: Some("ops".to_string()),
            password: Some("short".to_string()),
        });
        assert!(assemble_cluster_spec(&desired, &BuilderConfig::default())
            .unwrap_err()
            .to_string()
            .contains("password must be at least 14"));
    }

    #[test]
    fn first_violation_wins() {
        let mut desired = classic(ClassicSpec {
            aws_private_link: true,
            ..Default::default()
        });
        desired.name = "a-name-that-is-too-long".to_string();
        desired.replicas = Some(1);
        let err = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap_err();
        assert!(err.to_string().contains("'name'"), "{err}");

        desired.name = "ok".to_string();
        let err = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap_err();
        assert!(err.to_string().contains("at least 2 compute nodes"), "{err}");

        desired.replicas = Some(2);
        let err = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap_err();
        assert!(err.to_string().contains("PrivateLink"), "{err}");
    }

    #[test]
    fn reserved_properties_are_merged() {
        let mut desired = classic(ClassicSpec::default());
        desired.properties = Some(BTreeMap::from([(
            PROPERTY_ROSA_CREATOR_ARN.to_string(),
            "arn:aws:iam::123456789012:user/admin".to_string(),
        )]));
        let built = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap();
        assert_eq!(built.spec.properties.len(), 2);
        assert!(built.spec.properties.contains_key(PROPERTY_OPERATOR_VERSION));
    }

    #[test]
    fn hosted_cluster_wire_shape() {
        let mut desired = classic(ClassicSpec::default());
        desired.topology = TopologyConfig::Hosted(HostedSpec {
            aws_billing_account_id: Some("210987654321".to_string()),
        });
        desired.private = true;
        desired.sts = Some(sts());
        desired.subnet_ids = Some(zones(&["subnet-1", "subnet-2"]));
        desired.private_hosted_zone = Some(PrivateHostedZoneSpec {
            id: "Z123".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/shared".to_string(),
        });
        desired.version = Some("4.14.2".to_string());
        desired.proxy = Some(ProxySpec {
            https_proxy: Some("https://proxy:3129".to_string()),
            additional_trust_bundle: Some("-----BEGIN CERTIFICATE-----".to_string()),
            ..Default::default()
        });

        let built = assemble_cluster_spec(&desired, &BuilderConfig::default()).unwrap();
        assert_json_include!(
            actual: serde_json::to_value(&built.spec).unwrap(),
            expected: json!({
                "name": "my-cluster",
                "cloud_provider": {"id": "aws"},
                "product": {"id": "rosa"},
                "region": {"id": "us-east-1"},
                "multi_az": true,
                "hypershift": {"enabled": true},
                "api": {"listening": "internal"},
                "ccs": {"enabled": true},
                "nodes": {"compute": 2},
                "aws": {
                    "account_id": "123456789012",
                    "billing_account_id": "210987654321",
                    "private_link": true,
                    "subnet_ids": ["subnet-1", "subnet-2"],
                    "private_hosted_zone_id": "Z123"
                },
                "version": {"id": "openshift-v4.14.2", "channel_group": "stable"},
                "proxy": {"https_proxy": "https://proxy:3129"},
                "additional_trust_bundle": "-----BEGIN CERTIFICATE-----"
            })
        );
    }

    #[tokio::test]
    async fn remote_checks_run_after_local_ones() {
        let mut api = MockClusterManager::new();
        api.expect_list_versions().times(0);
        let mut desired = classic(ClassicSpec::default());
        desired.replicas = Some(1);
        assert!(build_cluster_spec(&api, &desired, &BuilderConfig::default()).await.is_err());

        let mut api = MockClusterManager::new();
        api.expect_list_versions().times(1).returning(|_, _, page, _| {
            Ok(Page::of(
                page,
                vec![Version {
                    raw_id: "4.10.5".to_string(),
                    ..Default::default()
                }],
            ))
        });
        let desired = classic(ClassicSpec {
            ec2_metadata_http_tokens: Some(Ec2MetadataHttpTokens::Required),
            ..Default::default()
        });
        let err = build_cluster_spec(&api, &desired, &BuilderConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("ec2_metadata_http_tokens"), "{err}");
    }

    #[tokio::test]
    async fn resolved_version_defaults_to_highest() {
        let mut api = MockClusterManager::new();
        api.expect_list_versions().times(1).returning(|_, _, page, _| {
            Ok(Page::of(
                page,
                ["4.13.9", "4.14.2"]
                    .iter()
                    .map(|raw| Version {
                        raw_id: raw.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ))
        });
        let built = build_cluster_spec(&api, &classic(ClassicSpec::default()), &BuilderConfig::default())
            .await
            .unwrap();
        assert_eq!(built.resolved_version.as_deref(), Some("4.14.2"));
        assert!(built.spec.version.is_none());
    }
}
