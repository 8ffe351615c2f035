//! Track resolution
//!
//! Maps a track identifier to metadata plus the best decodable variant,
//! falling back to the catalog's alternative tracks when the primary has
//! nothing playable.

use minispot_core::{
    AudioFile, Catalog, EncodedVariant, Gid, MinispotError, Quality, Result, TrackId,
    TrackMetadata,
};
use std::sync::Arc;
use tracing::debug;

/// A track ready to be opened
#[derive(Debug, Clone)]
pub struct ResolvedTrack {
    /// Metadata of the requested track (what the presentation layer shows)
    pub metadata: Arc<TrackMetadata>,

    /// Variant chosen for playback
    pub variant: EncodedVariant,

    /// Catalog key the variant belongs to; differs from the requested
    /// track's key when an alternative was used
    pub gid: Gid,
}

/// Pick the highest-quality decodable file
///
/// Files without a quality tag are ignored. On ties the first file wins.
pub fn select_variant(files: &[AudioFile]) -> Option<EncodedVariant> {
    let mut best: Option<(&AudioFile, Quality)> = None;
    for file in files {
        let Some(quality) = file.format.quality() else {
            continue;
        };
        match best {
            Some((_, current)) if current >= quality => {}
            _ => best = Some((file, quality)),
        }
    }

    best.map(|(file, quality)| EncodedVariant {
        file_id: file.file_id.clone(),
        quality,
    })
}

/// Resolves track identifiers against a catalog
pub struct TrackResolver {
    catalog: Arc<dyn Catalog>,
}

impl TrackResolver {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Resolve `id` to metadata and a playable variant
    ///
    /// # Errors
    /// - `NotFound` for malformed identifiers, unknown tracks, or metadata
    ///   without a valid catalog key
    /// - `NoPlayableVariant` when neither the track nor any alternative has
    ///   a decodable file
    /// - `Transport` when the catalog is unreachable
    pub fn resolve(&self, id: &TrackId) -> Result<ResolvedTrack> {
        let gid = id
            .to_gid()
            .ok_or_else(|| MinispotError::not_found(format!("invalid track id '{id}'")))?;

        let metadata = self.catalog.resolve_track(&gid)?;
        let Some(track_gid) = Gid::from_hex(&metadata.gid) else {
            return Err(MinispotError::not_found(format!(
                "track {id} has no content identifier"
            )));
        };

        if let Some(variant) = select_variant(&metadata.files) {
            debug!(track = %id, quality = ?variant.quality, "Selected variant");
            return Ok(ResolvedTrack {
                metadata: Arc::new(metadata),
                variant,
                gid: track_gid,
            });
        }

        for alternative in &metadata.alternatives {
            let Some(alt_gid) = Gid::from_hex(&alternative.gid) else {
                continue;
            };
            if let Some(variant) = select_variant(&alternative.files) {
                debug!(
                    track = %id,
                    alternative = %alt_gid,
                    quality = ?variant.quality,
                    "Selected variant from alternative"
                );
                return Ok(ResolvedTrack {
                    metadata: Arc::new(metadata),
                    variant,
                    gid: alt_gid,
                });
            }
        }

        Err(MinispotError::NoPlayableVariant(id.to_string()))
    }
}
