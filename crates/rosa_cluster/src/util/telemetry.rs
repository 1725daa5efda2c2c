use tracing_subscriber::{prelude::*, EnvFilter, Registry};

#[cfg(feature = "telemetry")]
async fn init_tracer() -> opentelemetry::sdk::trace::Tracer {
    let otlp_endpoint =
        std::env::var("OPENTELEMETRY_ENDPOINT_URL").expect("Need a otel tracing collector configured");

    let channel = tonic::transport::Channel::from_shared(otlp_endpoint)
        .expect("invalid OPENTELEMETRY_ENDPOINT_URL")
        .connect()
        .await
        .expect("failed to connect to the otel collector");

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_channel(channel))
        .with_trace_config(opentelemetry::sdk::trace::config().with_resource(
            opentelemetry::sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                "service.name",
                "rosa-operator",
            )]),
        ))
        .install_batch(opentelemetry::runtime::Tokio)
        .expect("failed to install the otlp pipeline")
}

/// Initialize tracing
pub async fn init() {
    // Setup tracing layers
    #[cfg(feature = "telemetry")]
    let telemetry = tracing_opentelemetry::layer().with_tracer(init_tracer().await);
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_default_env()
        .or(EnvFilter::try_new("info"))
        .expect("valid default log filter");

    let collector = Registry::default().with(logger).with(env_filter);
    #[cfg(feature = "telemetry")]
    let collector = collector.with(telemetry);

    // Initialize tracing
    tracing::subscriber::set_global_default(collector).expect("tracing subscriber already set");
}
