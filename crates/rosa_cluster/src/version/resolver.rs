//! Installable versions of a channel group and the upgrade graph between them.

use std::cmp::Ordering;
use tracing::debug;

use crate::cluster::types::Topology;
use crate::ocm::api::ClusterManager;
use crate::ocm::types::Version;
use crate::util::errors::{Error, Result};
use crate::version::semver;

pub const VERSIONS_PAGE_SIZE: u32 = 100;
pub const VERSIONS_ORDER: &str = "default desc, id desc";

pub fn versions_search(topology: Topology, channel_group: &str) -> String {
    let mut filters = vec![
        "enabled = 'true'".to_string(),
        "rosa_enabled = 'true'".to_string(),
        format!("channel_group = '{channel_group}'"),
    ];
    if topology == Topology::HostedControlPlane {
        filters.push("hosted_control_plane_enabled = 'true'".to_string());
    }
    filters.join(" AND ")
}

/// Highest version first. Versions that do not parse compare as lower than any that do.
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| match (semver::parse(a), semver::parse(b)) {
        (Ok(a), Ok(b)) => b.cmp(&a),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => Ordering::Equal,
    });
}

/// Raw ids of every installable version in the channel group, highest first.
pub async fn list_versions(api: &dyn ClusterManager, topology: Topology, channel_group: &str) -> Result<Vec<String>> {
    let search = versions_search(topology, channel_group);
    let mut versions = Vec::new();
    let mut page = 1;
    loop {
        let response = api
            .list_versions(&search, VERSIONS_ORDER, page, VERSIONS_PAGE_SIZE)
            .await
            .map_err(|e| e.context("Failed to retrieve versions"))?;
        let received = response.items.len();
        versions.extend(response.items.into_iter().map(|v| v.raw_id));
        if received < VERSIONS_PAGE_SIZE as usize {
            break;
        }
        page += 1;
    }
    debug!(channel_group, count = versions.len(), "Listed versions");
    sort_descending(&mut versions);
    Ok(versions)
}

/// The requested version when it is listed, the highest listed version when nothing is requested.
pub fn resolve_requested_or_default(versions: &[String], requested: Option<&str>) -> Result<String> {
    let Some(default) = versions.first() else {
        return Err(Error::not_found("Could not find versions"));
    };
    let Some(requested) = requested.filter(|v| !v.is_empty()) else {
        return Ok(default.clone());
    };
    if versions.iter().any(|v| v == requested) {
        return Ok(requested.to_string());
    }
    Err(Error::validation(format!(
        "version {requested} is not in the list of supported versions: {versions:?}"
    )))
}

pub async fn get_and_validate_version_in_channel_group(
    api: &dyn ClusterManager,
    topology: Topology,
    channel_group: &str,
    requested: Option<&str>,
) -> Result<String> {
    let versions = list_versions(api, topology, channel_group).await?;
    let version = resolve_requested_or_default(&versions, requested)?;
    debug!(version, channel_group, "Resolved cluster version");
    Ok(version)
}

/// Versions reachable from `current_version_id` that are enabled for ROSA.
pub async fn available_upgrade_versions(api: &dyn ClusterManager, current_version_id: &str) -> Result<Vec<Version>> {
    let current = api
        .get_version(current_version_id)
        .await
        .map_err(|e| e.context("failed to get version information"))?;

    let mut available = Vec::new();
    for raw in &current.available_upgrades {
        let id = semver::create_version_id(raw, &current.channel_group);
        let version = api
            .get_version(&id)
            .await
            .map_err(|e| e.context("failed to get version information"))?;
        if version.rosa_enabled {
            available.push(version);
        }
    }
    Ok(available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocm::api::MockClusterManager;
    use crate::ocm::types::Page;
    use mockall::predicate::{always, eq};

    fn version(raw: &str) -> Version {
        Version {
            id: semver::create_version_id(raw, "stable"),
            raw_id: raw.to_string(),
            enabled: true,
            rosa_enabled: true,
            channel_group: "stable".to_string(),
            ..Default::default()
        }
    }

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn search_adds_hosted_filter() {
        assert_eq!(
            versions_search(Topology::Classic, "stable"),
            "enabled = 'true' AND rosa_enabled = 'true' AND channel_group = 'stable'"
        );
        assert_eq!(
            versions_search(Topology::HostedControlPlane, "fast"),
            "enabled = 'true' AND rosa_enabled = 'true' AND channel_group = 'fast' AND \
             hosted_control_plane_enabled = 'true'"
        );
    }

    #[test]
    fn sort_is_descending_for_any_input_order() {
        let expected = strings(&["4.14.1", "4.14.0", "4.13.10", "4.13.9", "4.12.0-rc.1", "nightly"]);
        let orders = [
            strings(&["4.13.9", "nightly", "4.14.0", "4.12.0-rc.1", "4.13.10", "4.14.1"]),
            strings(&["nightly", "4.12.0-rc.1", "4.13.9", "4.13.10", "4.14.0", "4.14.1"]),
            expected.clone(),
        ];
        for mut order in orders {
            sort_descending(&mut order);
            assert_eq!(order, expected);
            let once = order.clone();
            sort_descending(&mut order);
            assert_eq!(order, once);
        }
    }

    #[test]
    fn requested_or_default() {
        let versions = strings(&["4.14.1", "4.13.9"]);
        assert_eq!(resolve_requested_or_default(&versions, None).unwrap(), "4.14.1");
        assert_eq!(resolve_requested_or_default(&versions, Some("4.13.9")).unwrap(), "4.13.9");
        let err = resolve_requested_or_default(&versions, Some("4.12.0")).unwrap_err();
        assert!(err.to_string().contains("is not in the list of supported versions"));
        let err = resolve_requested_or_default(&[], None).unwrap_err();
        assert!(err.to_string().contains("Could not find versions"));
    }

    #[tokio::test]
    async fn list_versions_pages_until_a_short_page() {
        let mut api = MockClusterManager::new();
        let full: Vec<Version> = (0..VERSIONS_PAGE_SIZE).map(|i| version(&format!("4.13.{i}"))).collect();
        api.expect_list_versions()
            .with(always(), eq(VERSIONS_ORDER), eq(1), eq(VERSIONS_PAGE_SIZE))
            .times(1)
            .returning(move |_, _, page, _| Ok(Page::of(page, full.clone())));
        api.expect_list_versions()
            .with(always(), always(), eq(2), always())
            .times(1)
            .returning(|_, _, page, _| Ok(Page::of(page, vec![version("4.14.0")])));

        let versions = list_versions(&api, Topology::Classic, "stable").await.unwrap();
        assert_eq!(versions.len(), VERSIONS_PAGE_SIZE as usize + 1);
        assert_eq!(versions[0], "4.14.0");
        assert_eq!(versions[1], "4.13.99");
    }

    #[tokio::test]
    async fn available_upgrades_keep_rosa_enabled_versions() {
        let mut api = MockClusterManager::new();
        api.expect_get_version()
            .with(eq("openshift-v4.13.9-fast"))
            .times(1)
            .returning(|_| {
                Ok(Version {
                    channel_group: "fast".to_string(),
                    available_upgrades: vec!["4.13.10".to_string(), "4.14.0".to_string()],
                    ..version("4.13.9")
                })
            });
        api.expect_get_version()
            .with(eq("openshift-v4.13.10-fast"))
            .times(1)
            .returning(|_| Ok(version("4.13.10")));
        api.expect_get_version()
            .with(eq("openshift-v4.14.0-fast"))
            .times(1)
            .returning(|_| {
                Ok(Version {
                    rosa_enabled: false,
                    ..version("4.14.0")
                })
            });

        let available = available_upgrade_versions(&api, "openshift-v4.13.9-fast").await.unwrap();
        let raw: Vec<&str> = available.iter().map(|v| v.raw_id.as_str()).collect();
        assert_eq!(raw, vec!["4.13.10"]);
    }
}
