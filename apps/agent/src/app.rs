//! Wires the agent together and runs it until a shutdown signal.

use std::time::Duration;

use anyhow::Context;
use mission_agent::{Supervisor, UploadReceiver, WsDialer};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the reconnect supervisor until Ctrl-C or SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let scratch_dir = config.scratch_dir();
    for dir in [&config.mission_dir, &scratch_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let receiver = UploadReceiver::new(&config.mission_dir, &scratch_dir);
    let dialer = WsDialer::new(&config.gateway_url, &config.agent_secret);
    let supervisor = Supervisor::new(dialer, receiver)
        .with_backoff(Duration::from_secs(config.reconnect_backoff_secs))
        .with_heartbeat_interval(Duration::from_secs(config.heartbeat_interval_secs));

    let cancel = CancellationToken::new();
    let mut supervisor_task = tokio::spawn(supervisor.run(cancel.clone()));

    tracing::info!("agent ready");

    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut supervisor_task => {
            result.context("supervisor task failed")?;
            return Ok(());
        }
    }

    cancel.cancel();
    supervisor_task.await.context("supervisor task failed")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
