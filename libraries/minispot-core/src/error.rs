/// Core error types for minispot
use thiserror::Error;

/// Result type alias using `MinispotError`
pub type Result<T> = std::result::Result<T, MinispotError>;

/// Core error type for minispot
///
/// Every control operation of the engine reports one of these. None of them
/// leave the engine in a partially mutated state.
#[derive(Error, Debug)]
pub enum MinispotError {
    /// The catalog returned no metadata, or the identifier was empty/invalid
    #[error("Not found: {0}")]
    NotFound(String),

    /// The track and all of its alternatives lack a decodable variant
    #[error("No playable variant for track {0}")]
    NoPlayableVariant(String),

    /// The byte stream for a variant could not be obtained
    #[error("Stream unavailable: {0}")]
    Transport(String),

    /// The decoder rejected the container/codec header
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Playlist index outside `0..len`
    #[error("Index {index} out of range for playlist of {len} tracks")]
    OutOfRange { index: usize, len: usize },

    /// An operation needed a playlist context but none is bound
    #[error("No playlist loaded")]
    NoPlaylist,

    /// The playlist entry is not a remotely streamable track
    #[error("Local tracks are not supported: {0}")]
    LocalTrackUnsupported(String),

    /// Audio output backend errors (device, stream build, start/stop)
    #[error("Audio backend error: {0}")]
    Backend(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MinispotError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an unsupported format error
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
