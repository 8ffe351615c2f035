//! minispot Core
//!
//! Platform-agnostic types, collaborator traits and error handling for the
//! minispot streaming playback engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `TrackId`, `Gid`, `TrackMetadata`, `EncodedVariant`, `AudioConfig`
//! - **Collaborator Traits**: `Catalog`, `ByteStream`, `DecoderFactory`, `AudioBackend`, `Playlist`
//! - **Error Handling**: Unified `MinispotError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use minispot_core::{AudioConfig, TrackId};
//!
//! let id = TrackId::from_uri("spotify:track:6rqhFgbbKwnb9MLmUQDhG6").unwrap();
//! assert_eq!(id.as_str(), "6rqhFgbbKwnb9MLmUQDhG6");
//! assert!(id.to_gid().is_some());
//!
//! let config = AudioConfig::default();
//! assert_eq!(config.channels(), 2);
//! assert_eq!(config.sample_rate(), 44_100);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{MinispotError, Result};
pub use traits::{
    AudioBackend, ByteStream, Catalog, DecoderFactory, Playlist, ReadStatus, RenderCallback,
    SampleDecoder, StreamCanceller,
};
pub use types::{
    playlist_path_from_uri, Album, Artist, AudioConfig, AudioFile, AudioFormat, EncodedVariant,
    Gid, PlaylistContents, Quality, TrackId, TrackMetadata, TRACK_URI_PREFIX,
};
