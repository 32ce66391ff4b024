use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Path the gateway accepts agent WebSocket upgrades on.
pub const AGENT_WS_PATH: &str = "/agent/ws";

/// Default URL the agent dials.
pub const DEFAULT_GATEWAY_URL: &str = "ws://127.0.0.1:8000/agent/ws";

/// Keep-alive text payload written by the agent.
pub const HEARTBEAT: &str = "ping";

/// How often the agent writes [`HEARTBEAT`].
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed wait between reconnect attempts.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

/// Payload size of one binary chunk frame (64 KiB).
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Filename used when the declared name sanitizes to nothing.
pub const DEFAULT_FILENAME: &str = "upload.bin";

/// Prefix of the `Authorization` header value.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Control frame type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    #[serde(rename = "begin_upload")]
    BeginUpload,
    #[serde(rename = "end_upload")]
    EndUpload,

    /// Forward compatibility: unknown control types deserialize here.
    #[serde(other)]
    Unknown,
}
