use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Deployment flavor of a managed cluster.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
pub enum Topology {
    #[default]
    #[serde(rename = "classic")]
    Classic,
    #[serde(rename = "hcp")]
    HostedControlPlane,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Topology::Classic => write!(f, "classic"),
            Topology::HostedControlPlane => write!(f, "hcp"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Ec2MetadataHttpTokens {
    Optional,
    Required,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Listening {
    Internal,
    External,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IdRef {
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        IdRef { id: id.into() }
    }
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoscaleRange {
    pub min_replicas: i64,
    pub max_replicas: i64,
}

/// Exactly one of a fixed compute count or an autoscaling range.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeReplicas {
    #[serde(rename = "compute")]
    Fixed(i64),
    #[serde(rename = "autoscale_compute")]
    Autoscaling(AutoscaleRange),
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RootVolume {
    pub aws: VolumeSize,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct VolumeSize {
    pub size: i64,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct NodePoolConfig {
    #[serde(flatten)]
    pub replicas: ComputeReplicas,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_machine_type: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_labels: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_root_volume: Option<RootVolume>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct InstanceIamRoles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_role_arn: Option<String>,
    pub worker_role_arn: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct StsConfig {
    pub role_arn: String,
    pub support_role_arn: String,
    pub instance_iam_roles: InstanceIamRoles,
    pub operator_role_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oidc_config: Option<IdRef>,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AwsNetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_metadata_http_tokens: Option<Ec2MetadataHttpTokens>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_arn: Option<String>,
    pub private_link: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_hosted_zone_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_hosted_zone_role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_compute_security_group_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_infra_security_group_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_control_plane_security_group_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sts: Option<StsConfig>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterApi {
    pub listening: Listening,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Network {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_prefix: Option<i64>,
}

impl Network {
    pub fn is_empty(&self) -> bool {
        *self == Network::default()
    }
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub channel_group: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HtpasswdUser {
    pub username: String,
    pub hashed_password: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HtpasswdUserList {
    pub items: Vec<HtpasswdUser>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HtpasswdIdentityProvider {
    pub users: HtpasswdUserList,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_proxy: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Enabled {
    pub enabled: bool,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Ccs {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_scp_checks: Option<bool>,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Dns {
    pub base_domain: String,
}

/// The cluster description submitted to the management API on create.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ClusterSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub cloud_provider: IdRef,
    pub product: IdRef,
    pub region: IdRef,
    pub multi_az: bool,
    pub properties: BTreeMap<String, String>,
    pub nodes: NodePoolConfig,
    pub aws: AwsNetworkConfig,
    pub api: ClusterApi,
    pub ccs: Ccs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hypershift: Option<Enabled>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fips: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd_encryption: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_user_workload_monitoring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns: Option<Dns>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htpasswd: Option<HtpasswdIdentityProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_trust_bundle: Option<String>,
}
