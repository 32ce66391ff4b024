//! Control-plane side of the mission relay.
//!
//! Holds the single WebSocket connection to the remote agent in a
//! [`ConnectionRegistry`], turns HTTP uploads into the
//! `begin_upload` / chunk / `end_upload` frame sequence via the
//! [`Dispatcher`], and exposes both through an axum [`router`].
//!
//! Success of a dispatch means the frames were written to the agent
//! connection. The protocol has no acknowledgment path, so whether the
//! agent committed the file is not observable here.

mod auth;
mod connection;
mod dispatch;
mod registry;
mod server;
mod upload;
mod ws;

pub use auth::authorize;
pub use connection::{Connection, FrameSink, SinkFuture};
pub use dispatch::{DispatchReport, Dispatcher};
pub use registry::ConnectionRegistry;
pub use server::{AppState, DEFAULT_MAX_UPLOAD_SIZE, GatewaySettings, router, serve};

/// Header carrying the declared filename of an upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Header carrying the optional expected SHA-256 of an upload.
pub const FILE_SHA256_HEADER: &str = "x-file-sha256";

/// Write-side errors on the agent connection.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by [`Dispatcher::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No agent connection is installed; nothing was written.
    #[error("agent offline")]
    AgentOffline,

    /// The caller cancelled; `end_upload` was not sent.
    #[error("dispatch cancelled")]
    Cancelled,

    #[error("reading upload source: {0}")]
    Source(std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
