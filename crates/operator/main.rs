use std::sync::Arc;

use anyhow::Context;
use rosa_cluster::controllers::{self, State};
use rosa_cluster::ocm::OcmClient;
use rosa_cluster::util::config::OperatorConfig;
use rosa_cluster::util::telemetry;
use tracing::info;

mod handlers;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    let config = OperatorConfig::from_env().context("failed to read operator configuration")?;
    info!(ocm_url = %config.ocm_url, port = config.http_port, "Starting rosa-operator");

    let ocm = Arc::new(OcmClient::new(&config.ocm_url, &config.ocm_token));
    let port = config.http_port;

    // Initialize Kubernetes controller state
    let state = State::default();
    let controller = controllers::run(state.clone(), ocm, config);
    let server = server::start_server(state, port);

    // Both runtimes implement graceful shutdown, so poll until both are done
    let (controller, server) = tokio::join!(controller, server);
    controller.context("controller stopped")?;
    server
}
