pub mod api;
pub mod client;
pub mod types;

pub use api::ClusterManager;
#[cfg(test)]
pub use api::MockClusterManager;
pub use client::OcmClient;
