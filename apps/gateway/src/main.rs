//! mission-relay gateway entry point.

mod app;
mod config;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting mission gateway"
    );

    let config = config::Config::load()?;
    tracing::info!(
        addr = %config.addr,
        auth = !config.agent_secret.is_empty(),
        max_upload_size = config.max_upload_size,
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("gateway shut down cleanly");
    Ok(())
}
