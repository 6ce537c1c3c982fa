use thiserror::Error;

/// Errors surfaced by the replay buffer.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Step index {index} is beyond the buffer length {total_steps}")]
    IndexOutOfRange { index: usize, total_steps: usize },

    #[error("Replay buffer is empty")]
    EmptyBuffer,

    #[error("Cannot store an episode with no steps")]
    EmptyEpisode,

    #[error("Expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid sampling weights: {0}")]
    InvalidWeights(String),

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
