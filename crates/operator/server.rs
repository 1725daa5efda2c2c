use actix_web::{middleware, web::Data, App, HttpServer};
use anyhow::Result;
use rosa_cluster::controllers::State;

use crate::handlers::{health, metrics};

/// Configure and start the HTTP server
pub async fn start_server(state: State, port: u16) -> Result<()> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(health::index)
            .service(health::health)
            .service(metrics::metrics)
    })
    .bind(("0.0.0.0", port))?
    .shutdown_timeout(5);

    server.run().await?;
    Ok(())
}
