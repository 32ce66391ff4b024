use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{ControlKind, HEARTBEAT};
use crate::violation::ProtocolViolation;

/// Metadata of one transfer, fixed by the gateway when the transfer starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferMeta {
    pub id: String,
    /// Name as declared by the uploader. Never used as a path unsanitized.
    pub filename: String,
    /// Declared size in bytes; `-1` or `0` when unknown.
    pub size: i64,
    /// Expected SHA-256 as hex, if the uploader declared one.
    pub sha256: Option<String>,
}

impl TransferMeta {
    /// Returns the declared digest normalized to lowercase hex.
    ///
    /// A blank digest counts as not declared.
    pub fn expected_digest(&self) -> Option<String> {
        self.sha256
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
    }
}

/// JSON control frame marking transfer boundaries.
///
/// Flat on the wire: `{"type", "id", "filename", "size", "sha256"}` with
/// every field besides `type` optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    #[serde(rename = "type")]
    pub kind: ControlKind,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub filename: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub size: i64,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub sha256: String,
}

fn is_zero(n: &i64) -> bool {
    *n == 0
}

/// Explicit `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ControlFrame {
    /// Builds the `begin_upload` frame for a transfer.
    pub fn begin(meta: &TransferMeta) -> Self {
        Self {
            kind: ControlKind::BeginUpload,
            id: meta.id.clone(),
            filename: meta.filename.clone(),
            size: meta.size,
            sha256: meta.sha256.clone().unwrap_or_default(),
        }
    }

    /// Builds the `end_upload` frame for a transfer.
    pub fn end(id: impl Into<String>) -> Self {
        Self {
            kind: ControlKind::EndUpload,
            id: id.into(),
            filename: String::new(),
            size: 0,
            sha256: String::new(),
        }
    }

    /// Extracts the transfer metadata carried by this frame.
    pub fn meta(&self) -> TransferMeta {
        TransferMeta {
            id: self.id.clone(),
            filename: self.filename.clone(),
            size: self.size,
            sha256: if self.sha256.is_empty() {
                None
            } else {
                Some(self.sha256.clone())
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// One message on the agent connection, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Control(ControlFrame),
    /// Raw bytes of the transfer in flight. Any size is accepted.
    Chunk(Vec<u8>),
    /// Keep-alive; valid but carries nothing.
    Heartbeat,
}

impl Frame {
    /// Classifies a text message.
    ///
    /// The heartbeat payload is recognized before any JSON parsing.
    pub fn from_text(text: &str) -> Result<Self, ProtocolViolation> {
        if text == HEARTBEAT {
            return Ok(Frame::Heartbeat);
        }
        serde_json::from_str(text)
            .map(Frame::Control)
            .map_err(|e| ProtocolViolation::MalformedControl(e.to_string()))
    }
}
