pub mod api;
pub mod cluster;
pub mod controllers;
pub mod deletion;
pub mod ocm;
pub mod upgrade;
pub mod util;
pub mod version;

pub use cluster::builder::build_cluster_spec;
pub use deletion::await_deletion;
pub use upgrade::orchestrator::reconcile_upgrade;

#[cfg(test)]
pub mod tests;
