//! Playlist implementations

use minispot_core::{playlist_path_from_uri, Catalog, Playlist, PlaylistContents, Result};
use tracing::debug;

/// Playlist fetched from the remote catalog
///
/// Contents are snapshotted at fetch time.
#[derive(Debug, Clone)]
pub struct RemotePlaylist {
    path: String,
    contents: PlaylistContents,
}

impl RemotePlaylist {
    /// Fetch a playlist by catalog path (`user/<name>/playlist/<id>`)
    pub fn fetch(catalog: &dyn Catalog, path: &str) -> Result<Self> {
        let contents = catalog.playlist(path)?;
        debug!(path, name = %contents.name, tracks = contents.tracks.len(), "Fetched playlist");
        Ok(Self {
            path: path.to_string(),
            contents,
        })
    }

    /// Fetch a playlist by its `spotify:user:...:playlist:...` URI
    pub fn fetch_uri(catalog: &dyn Catalog, uri: &str) -> Result<Self> {
        Self::fetch(catalog, &playlist_path_from_uri(uri))
    }

    /// Catalog path this playlist was fetched from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Playlist for RemotePlaylist {
    fn name(&self) -> &str {
        &self.contents.name
    }

    fn len(&self) -> usize {
        self.contents.tracks.len()
    }

    fn track_at(&self, index: usize) -> &str {
        &self.contents.tracks[index]
    }
}

/// Ad-hoc playlist over a caller-supplied list of track URIs
#[derive(Debug, Clone, Default)]
pub struct TrackListPlaylist {
    name: String,
    uris: Vec<String>,
}

impl TrackListPlaylist {
    pub fn new(name: impl Into<String>, uris: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            uris: uris.into_iter().map(Into::into).collect(),
        }
    }
}

impl Playlist for TrackListPlaylist {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.uris.len()
    }

    fn track_at(&self, index: usize) -> &str {
        &self.uris[index]
    }
}
