//! Worker side of the mission relay.
//!
//! The [`Supervisor`] keeps one WebSocket connection to the gateway open,
//! redialing with a fixed backoff. Each connected session feeds inbound
//! frames to an [`UploadReceiver`], which reassembles uploads in scratch
//! storage and moves verified files into the mission directory.

mod dialer;
mod pumps;
mod receiver;
mod session;
mod supervisor;

pub use dialer::{DialFuture, Dialer, WsDialer};
pub use receiver::{Step, UploadReceiver};
pub use session::run_session;
pub use supervisor::Supervisor;

use tokio_tungstenite::tungstenite;

/// Why a session ended.
#[derive(Debug, thiserror::Error)]
pub enum SessionEnd {
    /// Shutdown was requested. Not an error.
    #[error("session cancelled")]
    Cancelled,

    #[error("connection closed by gateway")]
    ClosedByPeer,

    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),
}
