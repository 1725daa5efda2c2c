pub mod gates;
pub mod orchestrator;
pub mod policies;

pub use orchestrator::{reconcile_upgrade, UpgradeDecision, UpgradePhase, UpgradeRequest};
