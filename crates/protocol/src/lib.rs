//! Wire protocol shared by the mission gateway and the mission agent.
//!
//! A transfer is a `begin_upload` control frame, any number of binary
//! chunk frames, and an `end_upload` control frame, all carried over one
//! WebSocket connection. Control frames are JSON text messages; chunks are
//! raw binary messages.

pub mod constants;
pub mod frame;
pub mod violation;

pub use constants::ControlKind;
pub use frame::{ControlFrame, Frame, TransferMeta};
pub use violation::ProtocolViolation;
