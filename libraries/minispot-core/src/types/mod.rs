mod audio;
mod ids;
mod track;

pub use audio::AudioConfig;
pub use ids::{playlist_path_from_uri, Gid, TrackId, TRACK_URI_PREFIX};
pub use track::{
    Album, Artist, AudioFile, AudioFormat, EncodedVariant, PlaylistContents, Quality,
    TrackMetadata,
};
