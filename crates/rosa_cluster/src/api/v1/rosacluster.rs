use k8s_openapi::apimachinery::pkg::apis::meta::v1::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::v1::conditions_schema;
use crate::cluster::types::{Ec2MetadataHttpTokens, Topology};

pub static ROSA_CLUSTER_FINALIZER: &str = "rosa-cluster.rosa.molnett.org";

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct InstanceIamRolesSpec {
    /// Control plane instance role. Classic clusters only.
    pub master_role_arn: Option<String>,
    pub worker_role_arn: String,
}

/// Pre-created roles for security-token-service based credentials.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct StsSpec {
    /// Installer role
    pub role_arn: String,
    pub support_role_arn: String,
    pub instance_iam_roles: InstanceIamRolesSpec,
    pub operator_role_prefix: String,
    /// Registered OIDC configuration to reuse instead of a managed one
    pub oidc_config_id: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct PrivateHostedZoneSpec {
    pub id: String,
    pub role_arn: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ProxySpec {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
    pub additional_trust_bundle: Option<String>,
}

/// Settings that only exist on classic clusters.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct ClassicSpec {
    /// Expose the API through AWS PrivateLink
    #[serde(default)]
    pub aws_private_link: bool,
    pub ec2_metadata_http_tokens: Option<Ec2MetadataHttpTokens>,
    #[serde(default)]
    pub autoscaling_enabled: bool,
    pub min_replicas: Option<i64>,
    pub max_replicas: Option<i64>,
    pub disable_scp_checks: Option<bool>,
    pub aws_additional_infra_security_group_ids: Option<Vec<String>>,
    pub aws_additional_control_plane_security_group_ids: Option<Vec<String>>,
}

/// Settings that only exist on hosted control plane clusters.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct HostedSpec {
    /// Account billed for the hosted control plane
    pub aws_billing_account_id: Option<String>,
}

/// Generate the Kubernetes wrapper struct `RosaCluster` from our Spec and Status struct
///
/// This provides a hook for generating the CRD yaml (in crdgen.rs)
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(kind = "RosaCluster", group = "rosa.molnett.org", version = "v1", namespaced)]
#[kube(status = "RosaClusterStatus", shortname = "rosacluster")]
pub struct RosaClusterSpec {
    pub name: String,
    pub cloud_region: String,
    pub aws_account_id: String,

    #[serde(default)]
    pub topology: Topology,
    pub classic: Option<ClassicSpec>,
    pub hosted_control_plane: Option<HostedSpec>,

    pub domain_prefix: Option<String>,
    pub external_id: Option<String>,
    #[serde(default)]
    pub multi_az: bool,
    pub availability_zones: Option<Vec<String>>,
    pub aws_subnet_ids: Option<Vec<String>>,
    #[serde(default)]
    pub private: bool,

    pub properties: Option<BTreeMap<String, String>>,
    pub tags: Option<BTreeMap<String, String>>,
    pub kms_key_arn: Option<String>,
    pub etcd_encryption: Option<bool>,
    pub fips: Option<bool>,
    pub disable_workload_monitoring: Option<bool>,
    pub base_dns_domain: Option<String>,

    pub machine_cidr: Option<String>,
    pub service_cidr: Option<String>,
    pub pod_cidr: Option<String>,
    pub host_prefix: Option<i64>,

    /// Desired OpenShift version, without the `openshift-v` prefix
    pub version: Option<String>,
    pub channel_group: Option<String>,
    /// Minor version whose breaking-change gates are acknowledged, e.g. "4.14"
    pub upgrade_acknowledgements_for: Option<String>,

    pub compute_machine_type: Option<String>,
    pub replicas: Option<i64>,
    pub default_mp_labels: Option<BTreeMap<String, String>>,
    /// Root disk size of the default pool in GiB
    pub worker_disk_size: Option<i64>,

    pub sts: Option<StsSpec>,
    pub private_hosted_zone: Option<PrivateHostedZoneSpec>,
    pub aws_additional_compute_security_group_ids: Option<Vec<String>>,
    pub proxy: Option<ProxySpec>,

    /// Create an htpasswd admin user, credentials are kept in `<name>-admin-credentials`
    #[serde(default)]
    pub create_admin_user: bool,
    pub admin_username: Option<String>,

    /// Return right after the delete request instead of waiting for the cluster to disappear
    #[serde(default)]
    pub disable_waiting_in_destroy: bool,
    /// Minutes to wait for the cluster to disappear
    pub destroy_timeout: Option<i64>,
}

/// The status object of `RosaCluster`
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
pub struct RosaClusterStatus {
    #[schemars(schema_with = "conditions_schema")]
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub phase: Option<String>,
    /// Identifier assigned by the management API
    pub cluster_id: Option<String>,
    pub state: Option<String>,
    pub current_version: Option<String>,
    /// Spec the remote cluster was last created or updated from, as JSON
    pub last_applied_spec: Option<String>,
    pub observed_generation: Option<i64>,
}

impl RosaCluster {
    pub fn cluster_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.cluster_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn last_applied_spec(&self) -> Option<RosaClusterSpec> {
        self.status
            .as_ref()
            .and_then(|s| s.last_applied_spec.as_deref())
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}
