/// Track metadata as resolved from the catalog
use serde::{Deserialize, Serialize};

/// Quality tag of an encoded variant, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Concrete encoding of an audio file as reported by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "OGG_VORBIS_96")]
    OggVorbis96,
    #[serde(rename = "OGG_VORBIS_160")]
    OggVorbis160,
    #[serde(rename = "OGG_VORBIS_320")]
    OggVorbis320,
    #[serde(rename = "MP3_96")]
    Mp3_96,
    #[serde(rename = "MP3_160")]
    Mp3_160,
    #[serde(rename = "MP3_256")]
    Mp3_256,
    #[serde(rename = "MP3_320")]
    Mp3_320,
    #[serde(rename = "AAC_24")]
    Aac24,
    #[serde(rename = "AAC_48")]
    Aac48,
    /// Anything the engine does not know about
    #[serde(other)]
    Unknown,
}

impl AudioFormat {
    /// Quality tag of a decodable format
    ///
    /// Only Ogg Vorbis is decoded; every other format yields `None` and is
    /// never selected for playback.
    pub fn quality(self) -> Option<Quality> {
        match self {
            Self::OggVorbis96 => Some(Quality::Low),
            Self::OggVorbis160 => Some(Quality::Medium),
            Self::OggVorbis320 => Some(Quality::High),
            _ => None,
        }
    }
}

/// One encoded file of a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    /// Opaque handle used to load the byte stream
    pub file_id: String,
    pub format: AudioFormat,
}

/// The variant selected for playback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedVariant {
    pub file_id: String,
    pub quality: Quality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub name: String,
}

/// Metadata of a track, immutable once resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Catalog key as returned by the service (hex); may be empty for
    /// tracks the catalog cannot serve
    pub gid: String,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Option<Album>,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,

    /// Encoded files available for this track
    #[serde(default)]
    pub files: Vec<AudioFile>,

    /// Substitute tracks, tried in order when no file is playable
    #[serde(default)]
    pub alternatives: Vec<TrackMetadata>,
}

impl TrackMetadata {
    /// Name of the first credited artist, if any
    pub fn first_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }

    /// All artist names joined with `", "`
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Contents of a catalog playlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistContents {
    pub name: String,
    /// Track URIs in playlist order
    pub tracks: Vec<String>,
}
