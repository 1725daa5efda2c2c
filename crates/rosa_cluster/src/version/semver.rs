use ::semver::Version;
use std::cmp::Ordering;

use crate::util::errors::{Error, Result};

pub const DEFAULT_CHANNEL_GROUP: &str = "stable";
pub const LEGACY_VERSION_PREFIX: &str = "openshift-v";

/// Parses a version, tolerating the legacy `openshift-v` prefix, a bare `v` and
/// missing minor or patch components (`4.12` parses as `4.12.0`).
pub fn parse(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix(LEGACY_VERSION_PREFIX)
        .or_else(|| trimmed.strip_prefix('v'))
        .unwrap_or(trimmed);

    // Pad the numeric core only, a pre-release or build suffix stays attached.
    let split = stripped.find(['-', '+']).unwrap_or(stripped.len());
    let (core, suffix) = stripped.split_at(split);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => stripped.to_string(),
    };

    Version::parse(&padded).map_err(|e| Error::validation(format!("invalid version '{raw}': {e}")))
}

pub fn compare(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse(a)?.cmp(&parse(b)?))
}

/// Equality by precedence, so `4.14` and `4.14.0` name the same version.
pub fn equal(a: &str, b: &str) -> Result<bool> {
    Ok(compare(a, b)? == Ordering::Equal)
}

pub fn is_greater_than_or_equal(a: &str, b: &str) -> Result<bool> {
    Ok(compare(a, b)? != Ordering::Less)
}

/// Returns the `major.minor` key used for gate acknowledgements.
pub fn minor_key(raw: &str) -> String {
    match parse(raw) {
        Ok(v) => format!("{}.{}", v.major, v.minor),
        Err(_) => raw.split('.').take(2).collect::<Vec<_>>().join("."),
    }
}

/// Builds the remote version identifier of a raw version in a channel group.
pub fn create_version_id(raw: &str, channel_group: &str) -> String {
    if channel_group.is_empty() || channel_group == DEFAULT_CHANNEL_GROUP {
        format!("{LEGACY_VERSION_PREFIX}{raw}")
    } else {
        format!("{LEGACY_VERSION_PREFIX}{raw}-{channel_group}")
    }
}

pub fn has_legacy_prefix(raw: &str) -> bool {
    raw.trim().starts_with(LEGACY_VERSION_PREFIX)
}

/// Requested versions are bare, `openshift-v` is only used in remote identifiers.
pub fn reject_legacy_prefix(raw: &str) -> Result<()> {
    if has_legacy_prefix(raw) {
        return Err(Error::validation(format!(
            "Openshift version must be provided without the \"{LEGACY_VERSION_PREFIX}\" prefix, the prefixed format is no longer supported"
        )));
    }
    Ok(())
}
