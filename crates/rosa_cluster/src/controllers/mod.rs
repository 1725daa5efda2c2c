pub mod cluster_controller;
pub mod secrets;

pub use cluster_controller::{run, Context, Diagnostics, State};
