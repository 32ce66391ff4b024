//! Reconnect supervisor: dial, run a session, wait, repeat.

use std::time::Duration;

use mission_protocol::constants::{HEARTBEAT_INTERVAL, RECONNECT_BACKOFF};
use tokio_util::sync::CancellationToken;

use crate::SessionEnd;
use crate::dialer::Dialer;
use crate::receiver::UploadReceiver;
use crate::session::run_session;

/// Keeps the agent connected to the gateway until cancelled.
///
/// The wait between attempts is fixed. It applies after a failed dial and
/// after a session ends, and is cut short by cancellation.
pub struct Supervisor<D> {
    dialer: D,
    receiver: UploadReceiver,
    backoff: Duration,
    heartbeat: Duration,
}

impl<D: Dialer> Supervisor<D> {
    pub fn new(dialer: D, receiver: UploadReceiver) -> Self {
        Self {
            dialer,
            receiver,
            backoff: RECONNECT_BACKOFF,
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_heartbeat_interval(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Runs until `cancel` fires. Never dials again once cancellation has
    /// been observed.
    pub async fn run(mut self, cancel: CancellationToken) {
        let endpoint = self.dialer.endpoint().to_owned();
        let mut attempt: u32 = 0;

        while !cancel.is_cancelled() {
            attempt = attempt.saturating_add(1);
            let dialed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                dialed = self.dialer.dial() => dialed,
            };

            match dialed {
                Ok(socket) => {
                    tracing::info!(%endpoint, "connected to gateway");
                    attempt = 0;
                    match run_session(socket, &mut self.receiver, self.heartbeat, &cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::ClosedByPeer => {
                            tracing::info!(%endpoint, "gateway closed the connection");
                        }
                        SessionEnd::Transport(e) => {
                            tracing::warn!(%endpoint, "connection lost: {e}");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%endpoint, attempt, "dial failed: {e}");
                }
            }

            tracing::debug!(delay_secs = self.backoff.as_secs_f64(), "reconnecting after backoff");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        tracing::info!("supervisor stopped");
    }
}
