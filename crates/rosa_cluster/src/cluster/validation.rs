//! Cross-field rules on a desired cluster. Pure functions, no I/O.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::cluster::types::{AutoscaleRange, ComputeReplicas, Ec2MetadataHttpTokens, Topology};
use crate::util::errors::{Error, Result};
use crate::version::semver;

pub const MAX_CLUSTER_NAME_LENGTH: usize = 15;
pub const DEFAULT_REPLICAS: i64 = 2;
pub const DEFAULT_MULTI_AZ_REPLICAS: i64 = 3;
pub const PROPERTY_ROSA_CREATOR_ARN: &str = "rosa_creator_arn";
pub const LOWEST_HTTP_TOKENS_VERSION: &str = "4.11.0";
pub const MAX_WORKER_DISK_SIZE_GIB: i64 = 16384;
pub const MIN_PASSWORD_LENGTH: usize = 14;

static KMS_ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^arn:aws[\w-]*:kms:[\w-]+:\d{12}:key\/mrk-[0-9a-f]{32}$|[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
    )
    .expect("valid kms arn regex")
});

static PRIVATE_HOSTED_ZONE_ROLE_ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[\w-]*:iam::\d{12}:role(?:(\/?[\w+=,.@-]+)+)$")
        .expect("valid private hosted zone role arn regex")
});

static USER_ARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[\w-]*:(iam|sts)::\d{12}:(user|role|assumed-role)/?[\w+=,.@\-/]*$")
        .expect("valid user arn regex")
});

pub fn validate_cluster_name(name: &str) -> Result<()> {
    let length = name.chars().count();
    if name.is_empty() || length > MAX_CLUSTER_NAME_LENGTH {
        return Err(Error::validation(format!(
            "Expected a valid value for 'name' maximum of {MAX_CLUSTER_NAME_LENGTH} characters in length. \
             Provided Cluster name '{name}' is of length '{length}'"
        )));
    }
    Ok(())
}

/// Single-AZ clusters need exactly one zone, multi-AZ clusters at least three.
pub fn validate_availability_zone_count(multi_az: bool, count: usize) -> Result<()> {
    if multi_az && count < 3 {
        return Err(Error::validation(format!(
            "The number of availability zones for a multi AZ cluster should be at least 3, instead received: {count}"
        )));
    }
    if !multi_az && count != 1 {
        return Err(Error::validation(format!(
            "The number of availability zones for a single AZ cluster should be 1, instead received: {count}"
        )));
    }
    Ok(())
}

pub fn validate_min_replicas(min: i64, multi_az: bool, topology: Topology, az_count: usize) -> Result<()> {
    if min < 0 {
        return Err(Error::validation("min-replicas must be a non-negative integer"));
    }
    match topology {
        Topology::HostedControlPlane => {
            if min < DEFAULT_REPLICAS {
                return Err(Error::validation(format!(
                    "Hosted control plane cluster requires at least {DEFAULT_REPLICAS} compute nodes"
                )));
            }
            if az_count > 0 && min % az_count as i64 != 0 {
                return Err(Error::validation(format!(
                    "Hosted control plane clusters require that the number of compute nodes be a multiple of the \
                     number of availability zones ({az_count})"
                )));
            }
        }
        Topology::Classic if multi_az => {
            if min < 3 {
                return Err(Error::validation("Multi AZ cluster requires at least 3 compute nodes"));
            }
            if min % 3 != 0 {
                return Err(Error::validation(
                    "Multi AZ clusters require that the number of compute nodes be a multiple of 3",
                ));
            }
        }
        Topology::Classic => {
            if min < 2 {
                return Err(Error::validation("Cluster requires at least 2 compute nodes"));
            }
        }
    }
    Ok(())
}

pub fn validate_max_replicas(min: i64, max: i64, multi_az: bool, topology: Topology, az_count: usize) -> Result<()> {
    if max < min {
        return Err(Error::validation("max-replicas must be greater or equal to min-replicas"));
    }
    match topology {
        Topology::HostedControlPlane if az_count > 0 && max % az_count as i64 != 0 => Err(Error::validation(format!(
            "Hosted control plane clusters require that the number of max replicas be a multiple of the number of \
             availability zones ({az_count})"
        ))),
        Topology::Classic if multi_az && max % 3 != 0 => Err(Error::validation(
            "Multi AZ clusters require that the number of max replicas be a multiple of 3",
        )),
        _ => Ok(()),
    }
}

/// Resolves the compute sizing of the default pool, filling defaults for unset values.
///
/// Fixed replicas and an autoscaling range are mutually exclusive.
pub fn validate_replica_counts(
    topology: Topology,
    autoscaling: bool,
    replicas: Option<i64>,
    min_replicas: Option<i64>,
    max_replicas: Option<i64>,
    multi_az: bool,
    az_count: usize,
) -> Result<ComputeReplicas> {
    let range_given = min_replicas.is_some() || max_replicas.is_some();
    if replicas.is_some() && range_given {
        return Err(Error::validation(
            "Autoscaling must be enabled in order to set min and max replicas, and 'replicas' must not be set \
             together with 'min_replicas' or 'max_replicas'",
        ));
    }

    let default = if topology == Topology::Classic && multi_az {
        DEFAULT_MULTI_AZ_REPLICAS
    } else {
        DEFAULT_REPLICAS
    };

    if autoscaling {
        if replicas.is_some() {
            return Err(Error::validation(
                "When autoscaling is enabled, replicas should not be configured",
            ));
        }
        let min = min_replicas.unwrap_or(default);
        validate_min_replicas(min, multi_az, topology, az_count)?;
        let max = max_replicas.unwrap_or(default.max(min));
        validate_max_replicas(min, max, multi_az, topology, az_count)?;
        return Ok(ComputeReplicas::Autoscaling(AutoscaleRange {
            min_replicas: min,
            max_replicas: max,
        }));
    }

    if range_given {
        return Err(Error::validation(
            "Autoscaling must be enabled in order to set min and max replicas",
        ));
    }
    let count = replicas.unwrap_or(default);
    validate_min_replicas(count, multi_az, topology, az_count)?;
    Ok(ComputeReplicas::Fixed(count))
}

fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn validate_kms_arn(arn: Option<&str>) -> Result<()> {
    match provided(arn) {
        Some(arn) if !KMS_ARN_RE.is_match(arn) => Err(Error::validation(format!(
            "Expected a valid value for kms-key-arn matching {}",
            KMS_ARN_RE.as_str()
        ))),
        _ => Ok(()),
    }
}

pub fn validate_private_hosted_zone_role_arn(arn: Option<&str>) -> Result<()> {
    match provided(arn) {
        Some(arn) if !PRIVATE_HOSTED_ZONE_ROLE_ARN_RE.is_match(arn) => Err(Error::validation(format!(
            "Expected a valid value for private_hosted_zone.role_arn matching {}",
            PRIVATE_HOSTED_ZONE_ROLE_ARN_RE.as_str()
        ))),
        _ => Ok(()),
    }
}

/// Loose check: the zone name only has to contain the region name.
///
/// "us-east-1" accepts "us-east-10a", a tighter parser would reject it.
pub fn validate_availability_zone_belongs_to_region(az: &str, region: &str) -> Result<()> {
    if !az.contains(region) {
        return Err(Error::validation(format!("Invalid AZ '{az}' for region '{region}'.")));
    }
    Ok(())
}

/// Reserved keys belong to the operator. User-supplied properties must name their creator.
pub fn validate_properties(
    properties: Option<&BTreeMap<String, String>>,
    reserved: &BTreeMap<String, String>,
) -> Result<()> {
    let Some(properties) = properties else {
        return Ok(());
    };
    if let Some(key) = properties.keys().find(|k| reserved.contains_key(*k)) {
        return Err(Error::validation(format!(
            "Can not override reserved properties keys. {key} is a reserved property key"
        )));
    }
    let Some(creator_arn) = properties.get(PROPERTY_ROSA_CREATOR_ARN) else {
        return Err(Error::validation(format!(
            "Expected property '{PROPERTY_ROSA_CREATOR_ARN}'. Please include the ARN of the identity creating the cluster"
        )));
    };
    if !USER_ARN_RE.is_match(creator_arn) {
        return Err(Error::validation(format!(
            "Property '{PROPERTY_ROSA_CREATOR_ARN}' does not have a valid user arn"
        )));
    }
    Ok(())
}

pub fn validate_http_tokens_version(tokens: Option<Ec2MetadataHttpTokens>, version: &str) -> Result<()> {
    if tokens != Some(Ec2MetadataHttpTokens::Required) {
        return Ok(());
    }
    let supported = semver::is_greater_than_or_equal(version, LOWEST_HTTP_TOKENS_VERSION)
        .map_err(|e| Error::validation(format!("version '{version}' is not supported: {e}")))?;
    if !supported {
        return Err(Error::validation(format!(
            "version '{version}' is not supported with ec2_metadata_http_tokens, minimum supported version is \
             {LOWEST_HTTP_TOKENS_VERSION}"
        )));
    }
    Ok(())
}

pub fn validate_worker_disk_size(size: Option<i64>, topology: Topology) -> Result<()> {
    let Some(size) = size else {
        return Ok(());
    };
    let min = match topology {
        Topology::Classic => 128,
        Topology::HostedControlPlane => 75,
    };
    if !(min..=MAX_WORKER_DISK_SIZE_GIB).contains(&size) {
        return Err(Error::validation(format!(
            "Invalid worker_disk_size '{size}', it must be between {min} GiB and {MAX_WORKER_DISK_SIZE_GIB} GiB"
        )));
    }
    Ok(())
}

pub fn validate_proxy(http_proxy: Option<&str>, https_proxy: Option<&str>) -> Result<()> {
    let http_proxy = provided(http_proxy);
    let https_proxy = provided(https_proxy);
    if http_proxy.is_none() && https_proxy.is_none() {
        return Err(Error::validation(
            "Expected at least one of the following: http-proxy, https-proxy",
        ));
    }
    if let Some(url) = http_proxy {
        if !url.starts_with("http://") {
            return Err(Error::validation(format!(
                "Invalid http-proxy '{url}', expected a URL with the http scheme"
            )));
        }
    }
    if let Some(url) = https_proxy {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::validation(format!(
                "Invalid https-proxy '{url}', expected a URL with the http or https scheme"
            )));
        }
    }
    Ok(())
}

pub fn validate_htpasswd_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::validation("Username can't be empty"));
    }
    if username.contains(['/', ':', '%']) {
        return Err(Error::validation(format!(
            "invalid username '{username}': username must not contain /, :, or %"
        )));
    }
    Ok(())
}

pub fn validate_htpasswd_password(password: &str) -> Result<()> {
    let printable_ascii = password.chars().all(|c| (' '..='~').contains(&c));
    if !printable_ascii || password.contains(' ') || password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters (ASCII-standard) without whitespaces"
        )));
    }
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_other = password.chars().any(|c| !c.is_ascii_alphabetic());
    if !(has_upper && has_lower && has_other) {
        return Err(Error::validation(
            "password must include uppercase letters, lowercase letters, and numbers or symbols \
             (ASCII-standard characters only)",
        ));
    }
    Ok(())
}
