/// A frame arrived that the receiver's current state cannot accept.
///
/// Violations are logged and dropped; they never change receiver state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("begin_upload received while transfer {active} is in progress")]
    BeginWhileReceiving { active: String },

    #[error("binary chunk received with no active transfer")]
    ChunkWhileIdle,

    #[error("end_upload received with no active transfer (id={id})")]
    EndWhileIdle { id: String },

    #[error("end_upload id mismatch: got={got} expected={expected}")]
    EndIdMismatch { got: String, expected: String },

    #[error("unknown control frame type")]
    UnknownControl,

    #[error("malformed control frame: {0}")]
    MalformedControl(String),
}
