//! minispot catalog client
//!
//! Blocking HTTP implementation of [`minispot_core::Catalog`]: track
//! metadata, playlists, user rootlists and streamed audio files.
//!
//! # Example
//!
//! ```ignore
//! use minispot_catalog::{CatalogConfig, HttpCatalog};
//! use minispot_core::{Catalog, TrackId};
//!
//! let catalog = HttpCatalog::new(CatalogConfig::with_token("https://catalog.example.com", "t0ken"))?;
//! let gid = TrackId::new("6rqhFgbbKwnb9MLmUQDhG6").to_gid().ok_or("invalid track id")?;
//! let track = catalog.resolve_track(&gid)?;
//! println!("{} by {}", track.name, track.first_artist().unwrap_or("unknown"));
//! ```

mod client;
mod error;
mod stream;
mod types;

pub use client::HttpCatalog;
pub use error::{CatalogClientError, Result};
pub use stream::HttpByteStream;
pub use types::{CatalogConfig, ErrorResponse, PlaylistItem, PlaylistResponse};
