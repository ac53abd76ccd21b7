use thiserror::Error;

/// Result type used by `bitladder-abr`.
pub type AbrResult<T> = Result<T, AbrError>;

/// Configuration errors raised while building selection components.
///
/// Everything here is fatal at construction time. Normal control flow (empty
/// queue, rate limit not elapsed, degenerate Lyapunov parameters) never
/// produces an error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AbrError {
    #[error("bitrate ladder is empty")]
    EmptyLadder,

    #[error("invalid bitrate {bitrate_kbps} kbps at ladder position {position}")]
    InvalidBitrate { position: usize, bitrate_kbps: f64 },

    #[error("allocation checkpoint table needs at least 2 entries, got {len}")]
    CheckpointTableTooShort { len: usize },

    #[error("allocation checkpoints are not sorted by total bandwidth at index {index}")]
    CheckpointTableUnsorted { index: usize },

    #[error("selection {selection} has no quality levels")]
    EmptySelection { selection: usize },

    #[error("ladder of {levels} levels does not fit a state window of {slots} slots")]
    LadderTooWide { levels: usize, slots: usize },

    #[error("chunk-size table has {tables} levels, ladder has {levels}")]
    ChunkSizeLevels { tables: usize, levels: usize },

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

/// Failure reported by a [`PolicyModel`](crate::PolicyModel).
///
/// Caught inside the policy strategy; never surfaces to the playback pipeline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("model resource unavailable: {0}")]
    Unavailable(String),

    #[error("malformed output: expected {expected} scores, got {actual}")]
    MalformedOutput { expected: usize, actual: usize },

    #[error("inference runtime fault: {0}")]
    Runtime(String),
}
