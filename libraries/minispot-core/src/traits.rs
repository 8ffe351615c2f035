/// Collaborator traits for the playback engine
use crate::error::Result;
use crate::types::{AudioConfig, EncodedVariant, Gid, PlaylistContents, TrackMetadata};
use std::io::{Read, Seek};
use std::sync::Arc;

/// Remote catalog/session service
///
/// All calls block the caller until the service answers. Implementations
/// report a missing entity as `MinispotError::NotFound` and any failure to
/// reach the service as `MinispotError::Transport`.
pub trait Catalog: Send + Sync {
    /// Fetch track metadata by catalog key
    fn resolve_track(&self, gid: &Gid) -> Result<TrackMetadata>;

    /// Open the byte stream of an encoded variant
    fn load_track(&self, variant: &EncodedVariant, gid: &Gid) -> Result<Box<dyn ByteStream>>;

    /// Fetch a playlist by catalog path (see `playlist_path_from_uri`)
    fn playlist(&self, path: &str) -> Result<PlaylistContents>;

    /// Fetch the list of playlists owned by a user
    ///
    /// The returned `tracks` are playlist URIs rather than track URIs.
    fn root_playlists(&self, username: &str) -> Result<PlaylistContents>;
}

/// Cancels an in-flight byte stream from another thread
pub trait StreamCanceller: Send + Sync {
    /// Abort the transfer; pending and future reads return end of data
    fn cancel(&self);
}

/// Readable byte stream of one encoded file
pub trait ByteStream: Read + Seek + Send + Sync {
    /// Handle that can cancel this stream while a decoder owns it
    fn canceller(&self) -> Arc<dyn StreamCanceller>;

    /// Total length in bytes when known
    fn byte_len(&self) -> Option<u64> {
        None
    }

    /// Whether `seek` may move backwards/forwards arbitrarily
    fn is_seekable(&self) -> bool {
        false
    }
}

/// Outcome of a decoder read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// More samples may follow
    Ok,
    /// No samples will follow; the count returned alongside may be partial
    EndOfStream,
}

/// Streaming decoder producing interleaved `f32` samples
///
/// `read` runs on the session's decode thread, never on the audio thread,
/// and may block on the underlying byte stream until data arrives or the
/// stream is cancelled. Once `EndOfStream` was returned, every later call
/// returns `(0, EndOfStream)`.
pub trait SampleDecoder: Send {
    /// Fill `out` with up to `out.len()` interleaved samples
    fn read(&mut self, out: &mut [f32]) -> (usize, ReadStatus);
}

/// Builds decoders over byte streams
pub trait DecoderFactory: Send + Sync {
    /// Parse the container header and prepare a decoder
    ///
    /// # Errors
    /// `MinispotError::UnsupportedFormat` when the header cannot be parsed
    fn open(&self, stream: Box<dyn ByteStream>, config: AudioConfig)
        -> Result<Box<dyn SampleDecoder>>;
}

/// Real-time render callback invoked by an audio backend
pub trait RenderCallback: Send + Sync {
    /// Fill `out` (interleaved) and return the number of complete frames
    /// written. Samples past that count are left for the backend to zero.
    fn render(&self, out: &mut [f32]) -> usize;
}

/// Audio output device abstraction
pub trait AudioBackend: Send + Sync {
    /// Start invoking the render callback
    fn start(&self) -> Result<()>;

    /// Stop invoking the render callback; no callback runs after this returns
    fn stop(&self) -> Result<()>;

    /// Whether the device is currently started
    fn is_started(&self) -> bool;
}

/// Ordered list of track URIs
///
/// Implementations may be backed by the catalog or by any other source.
pub trait Playlist: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Number of entries
    fn len(&self) -> usize;

    /// URI at `index`
    ///
    /// # Panics
    /// Panics when `index >= len()`; callers check bounds first.
    fn track_at(&self, index: usize) -> &str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
