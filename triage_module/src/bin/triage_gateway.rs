use tracing::info;
use tracing_subscriber::EnvFilter;

use triage_module::service::{ctrl_c_shutdown, run_server, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    info!("triage gateway starting host={} port={}", config.host, config.port);

    run_server(config, ctrl_c_shutdown()).await
}
