//! Types for the catalog HTTP API.

use minispot_core::PlaylistContents;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to a catalog service.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL of the service (e.g., "https://catalog.example.com/v1")
    pub url: String,
    /// Bearer token sent with every request
    pub access_token: Option<String>,
    /// Name this client announces to the service
    pub device_name: String,
    /// Timeout for metadata requests; audio downloads are not bounded
    pub request_timeout: Duration,
}

impl CatalogConfig {
    /// Create a new config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
            device_name: "minispot".into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create a config with an access token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::new(url)
        }
    }

    /// Replace the announced device name.
    #[must_use]
    pub fn with_device_name(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = device_name.into();
        self
    }
}

// =============================================================================
// Playlist Types
// =============================================================================

/// One entry of a playlist response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub uri: String,
}

/// Response from the playlist and rootlist endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

impl From<PlaylistResponse> for PlaylistContents {
    fn from(response: PlaylistResponse) -> Self {
        Self {
            name: response.name,
            tracks: response.items.into_iter().map(|item| item.uri).collect(),
        }
    }
}

/// Error body returned by the service on failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
