//! Checkpoint error types.

use crate::checkpoint::codec::CodecError;
use crate::effects::DispatchError;
use thiserror::Error;

/// Errors that can occur while saving or resuming a state machine
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// Serialization to JSON or binary format failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Deserialization from JSON or binary format failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Checkpoint version is not supported by this version
    #[error("Unsupported checkpoint version {found}, supported: {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Saved state was produced by a machine with a different topology
    #[error("Saved state does not match the state machine structure (expected signature '{expected}', found '{found}')")]
    SignatureMismatch { expected: String, found: String },

    /// Saved state is internally inconsistent with the topology
    #[error("Saved state is corrupt: {0}")]
    Corrupt(String),

    #[error("State machine must be in Nirvana to resume")]
    NotInNirvana,

    #[error("State machine is busy dispatching")]
    Busy,

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// An entry or do-action failed while re-entering the saved configuration
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
