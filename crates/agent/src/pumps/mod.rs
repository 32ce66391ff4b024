//! Tasks that make up one agent session.

pub(crate) mod heartbeat;
pub(crate) mod read;
pub(crate) mod write;
