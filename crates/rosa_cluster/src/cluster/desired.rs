//! The desired state of a cluster, resolved once from a `RosaCluster` spec.

use std::collections::BTreeMap;

use crate::api::v1::rosacluster::{
    ClassicSpec, HostedSpec, PrivateHostedZoneSpec, ProxySpec, RosaClusterSpec, StsSpec,
};
use crate::cluster::types::Topology;
use crate::util::errors::{Error, Result};

/// Topology specific settings. Downstream code matches on this instead of re-checking fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopologyConfig {
    Classic(ClassicSpec),
    Hosted(HostedSpec),
}

impl TopologyConfig {
    pub fn topology(&self) -> Topology {
        match self {
            TopologyConfig::Classic(_) => Topology::Classic,
            TopologyConfig::Hosted(_) => Topology::HostedControlPlane,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminUser {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DesiredState {
    pub name: String,
    pub region: String,
    pub aws_account_id: String,
    pub topology: TopologyConfig,
    pub domain_prefix: Option<String>,
    pub external_id: Option<String>,
    pub multi_az: bool,
    pub availability_zones: Option<Vec<String>>,
    pub subnet_ids: Option<Vec<String>>,
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
    pub version: Option<String>,
    pub channel_group: String,
    pub compute_machine_type: Option<String>,
    pub replicas: Option<i64>,
    pub labels: Option<BTreeMap<String, String>>,
    pub worker_disk_size: Option<i64>,
    pub sts: Option<StsSpec>,
    pub private_hosted_zone: Option<PrivateHostedZoneSpec>,
    pub additional_compute_security_group_ids: Option<Vec<String>>,
    pub proxy: Option<ProxySpec>,
    pub admin: Option<AdminUser>,
}

impl DesiredState {
    /// Maps a resource spec onto the desired state, rejecting settings of the other topology.
    pub fn from_spec(spec: &RosaClusterSpec, default_channel_group: &str) -> Result<Self> {
        let topology = match (spec.topology, &spec.classic, &spec.hosted_control_plane) {
            (Topology::Classic, _, Some(_)) => {
                return Err(Error::validation(
                    "'hosted_control_plane' settings can only be used with topology 'hcp'",
                ))
            }
            (Topology::HostedControlPlane, Some(_), _) => {
                return Err(Error::validation(
                    "'classic' settings can only be used with topology 'classic'",
                ))
            }
            (Topology::Classic, classic, None) => TopologyConfig::Classic(classic.clone().unwrap_or_default()),
            (Topology::HostedControlPlane, None, hosted) => {
                TopologyConfig::Hosted(hosted.clone().unwrap_or_default())
            }
        };

        let admin = (spec.create_admin_user || spec.admin_username.is_some()).then(|| AdminUser {
            username: spec.admin_username.clone(),
            password: None,
        });

        Ok(DesiredState {
            name: spec.name.clone(),
            region: spec.cloud_region.clone(),
            aws_account_id: spec.aws_account_id.clone(),
            topology,
            domain_prefix: spec.domain_prefix.clone(),
            external_id: spec.external_id.clone(),
            multi_az: spec.multi_az,
            availability_zones: spec.availability_zones.clone(),
            subnet_ids: spec.aws_subnet_ids.clone(),
            private: spec.private,
            properties: spec.properties.clone(),
            tags: spec.tags.clone(),
            kms_key_arn: spec.kms_key_arn.clone(),
            etcd_encryption: spec.etcd_encryption,
            fips: spec.fips,
            disable_workload_monitoring: spec.disable_workload_monitoring,
            base_dns_domain: spec.base_dns_domain.clone(),
            machine_cidr: spec.machine_cidr.clone(),
            service_cidr: spec.service_cidr.clone(),
            pod_cidr: spec.pod_cidr.clone(),
            host_prefix: spec.host_prefix,
            version: spec.version.clone(),
            channel_group: spec
                .channel_group
                .clone()
                .unwrap_or_else(|| default_channel_group.to_string()),
            compute_machine_type: spec.compute_machine_type.clone(),
            replicas: spec.replicas,
            labels: spec.default_mp_labels.clone(),
            worker_disk_size: spec.worker_disk_size,
            sts: spec.sts.clone(),
            private_hosted_zone: spec.private_hosted_zone.clone(),
            additional_compute_security_group_ids: spec.aws_additional_compute_security_group_ids.clone(),
            proxy: spec.proxy.clone(),
            admin,
        })
    }

    pub fn with_admin_password(mut self, password: Option<String>) -> Self {
        if let Some(admin) = self.admin.as_mut() {
            admin.password = password;
        }
        self
    }

    pub fn kind(&self) -> Topology {
        self.topology.topology()
    }

    pub fn is_sts(&self) -> bool {
        self.sts.is_some()
    }
}
