//! Runtime configuration.

use serde::Deserialize;

/// Runtime configuration of the operator, read from the environment.
#[derive(Clone, Debug, Deserialize)]
pub struct OperatorConfig {
    /// Base URL of the cluster management API.
    #[serde(default = "default_ocm_url")]
    pub ocm_url: String,
    /// Bearer token used for every request against the management API.
    pub ocm_token: String,
    /// The port of the diagnostics and metrics server.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Channel group used when a `RosaCluster` does not name one.
    #[serde(default = "default_channel_group")]
    pub default_channel_group: String,
    /// Seconds between reconciles of a cluster that is not yet ready.
    #[serde(default = "default_not_ready_requeue_seconds")]
    pub not_ready_requeue_seconds: u64,
}

fn default_ocm_url() -> String {
    "https://api.openshift.com".to_string()
}

fn default_http_port() -> u16 {
    8080
}

pub fn default_channel_group() -> String {
    crate::version::semver::DEFAULT_CHANNEL_GROUP.to_string()
}

fn default_not_ready_requeue_seconds() -> u64 {
    60
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
