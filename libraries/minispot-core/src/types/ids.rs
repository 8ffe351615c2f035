/// Identifier types for catalog entities
use serde::{Deserialize, Serialize};
use std::fmt;

/// URI scheme prefix of remotely streamable tracks
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

const URI_SCHEME: &str = "spotify:";

const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of a canonical base62 track identifier
const BASE62_LEN: usize = 22;

/// Base62 track identifier as it appears in track URIs
///
/// The identifier is not validated on construction; use [`TrackId::to_gid`]
/// to obtain the catalog key, which fails for malformed identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    /// Create a new track ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a `spotify:track:<id>` URI
    ///
    /// Returns `None` for any other scheme (local files, episodes, ...) and for
    /// an empty identifier.
    pub fn from_uri(uri: &str) -> Option<Self> {
        uri.strip_prefix(TRACK_URI_PREFIX)
            .filter(|id| !id.is_empty())
            .map(Self::new)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Render as a track URI
    pub fn to_uri(&self) -> String {
        format!("{TRACK_URI_PREFIX}{}", self.0)
    }

    /// Convert the base62 identifier to the 128-bit catalog key
    pub fn to_gid(&self) -> Option<Gid> {
        if self.0.is_empty() || self.0.len() > BASE62_LEN {
            return None;
        }

        let mut value: u128 = 0;
        for byte in self.0.bytes() {
            let digit = BASE62_ALPHABET.iter().position(|&c| c == byte)? as u128;
            value = value.checked_mul(62)?.checked_add(digit)?;
        }
        Some(Gid(value))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 128-bit catalog key of a track, rendered as 32 lowercase hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid(u128);

impl Gid {
    /// Wrap a raw key
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Parse a hex key; empty or malformed input yields `None`
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.is_empty() || hex.len() > 32 {
            return None;
        }
        u128::from_str_radix(hex, 16).ok().map(Self)
    }

    /// Raw value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Hex rendering used on the catalog wire
    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }

    /// Base62 track identifier for this key
    pub fn to_track_id(&self) -> TrackId {
        let mut digits = [b'0'; BASE62_LEN];
        let mut value = self.0;
        for slot in digits.iter_mut().rev() {
            *slot = BASE62_ALPHABET[(value % 62) as usize];
            value /= 62;
        }
        TrackId(digits.iter().map(|&b| b as char).collect())
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Map a root-list playlist URI to the catalog path it is served under
///
/// `spotify:user:alice:playlist:37i9` becomes `user/alice/playlist/37i9`.
pub fn playlist_path_from_uri(uri: &str) -> String {
    uri.strip_prefix(URI_SCHEME).unwrap_or(uri).replace(':', "/")
}
