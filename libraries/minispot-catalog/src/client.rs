//! Blocking catalog client over HTTP.

use crate::error::{CatalogClientError, Result};
use crate::stream::{spawn_download, HttpByteStream};
use crate::types::{CatalogConfig, ErrorResponse, PlaylistResponse};
use minispot_core::{
    ByteStream, Catalog, EncodedVariant, Gid, MinispotError, PlaylistContents, TrackMetadata,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};
use url::Url;

/// Catalog service client.
///
/// Requests run on a small runtime owned by the client, so every method
/// blocks the calling thread. Do not call it from inside another tokio
/// runtime.
///
/// # Example
///
/// ```ignore
/// use minispot_catalog::{CatalogConfig, HttpCatalog};
///
/// let catalog = HttpCatalog::new(CatalogConfig::with_token("https://catalog.example.com", "t0ken"))?;
/// let rootlist = catalog.rootlist("alice")?;
/// println!("{} playlists", rootlist.tracks.len());
/// ```
pub struct HttpCatalog {
    http: Client,
    config: CatalogConfig,
    runtime: Runtime,
}

impl HttpCatalog {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(CatalogClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let url = config.url.trim_end_matches('/').to_string();
        let parsed = Url::parse(&url).map_err(|e| CatalogClientError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        // No overall timeout: audio bodies stream for the length of a track
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!(
                "minispot/{} ({})",
                env!("CARGO_PKG_VERSION"),
                config.device_name
            ))
            .build()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("minispot-catalog")
            .enable_all()
            .build()?;

        Ok(Self {
            http,
            config: CatalogConfig { url, ..config },
            runtime,
        })
    }

    /// Normalized service URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Check if the client sends an access token.
    pub fn is_authenticated(&self) -> bool {
        self.config.access_token.is_some()
    }

    /// Fetch track metadata.
    pub fn track_metadata(&self, gid: &Gid) -> Result<TrackMetadata> {
        let url = format!("{}/metadata/tracks/{}", self.config.url, gid.to_hex());
        self.get_json(&url, &format!("track {gid}"))
    }

    /// Fetch a playlist by path (`user/<name>/playlist/<id>`).
    pub fn playlist_contents(&self, path: &str) -> Result<PlaylistContents> {
        let url = format!("{}/playlists/{}", self.config.url, path.trim_matches('/'));
        let response: PlaylistResponse = self.get_json(&url, &format!("playlist {path}"))?;
        Ok(response.into())
    }

    /// Fetch the playlists owned by `username`; entries are playlist URIs.
    pub fn rootlist(&self, username: &str) -> Result<PlaylistContents> {
        let url = format!("{}/users/{}/rootlist", self.config.url, username);
        let response: PlaylistResponse = self.get_json(&url, &format!("rootlist of {username}"))?;
        Ok(response.into())
    }

    /// Start streaming an audio file.
    ///
    /// Returns once the response headers arrived; the body keeps
    /// downloading in the background.
    pub fn open_audio(&self, file_id: &str, gid: &Gid) -> Result<HttpByteStream> {
        let url = format!("{}/audio/{}", self.config.url, file_id);
        debug!(url = %url, gid = %gid, "Opening audio stream");

        let request = self
            .authorize(self.http.get(&url))
            .query(&[("gid", gid.to_hex())]);
        let what = format!("audio file {file_id}");

        let response = self.runtime.block_on(async {
            let response = send(request).await?;
            check_status(response, &what).await
        })?;

        info!(file = %file_id, bytes = ?response.content_length(), "Audio stream opened");
        Ok(spawn_download(
            self.runtime.handle(),
            file_id.to_string(),
            response,
        ))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        debug!(url = %url, "Catalog request");

        let request = self
            .authorize(self.http.get(url))
            .timeout(self.config.request_timeout);

        self.runtime.block_on(async {
            let response = check_status(send(request).await?, what).await?;
            response
                .json::<T>()
                .await
                .map_err(|e| CatalogClientError::ParseError(format!("{what}: {e}")))
        })
    }
}

async fn send(request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(|e| {
        if e.is_connect() || e.is_timeout() {
            CatalogClientError::Unreachable(e.to_string())
        } else {
            CatalogClientError::Request(e)
        }
    })
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::NOT_FOUND => Err(CatalogClientError::NotFound(what.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CatalogClientError::AuthFailed(what.to_string()))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            Err(CatalogClientError::ServerError {
                status: status.as_u16(),
                message,
            })
        }
    }
}

impl Catalog for HttpCatalog {
    fn resolve_track(&self, gid: &Gid) -> minispot_core::Result<TrackMetadata> {
        Ok(self.track_metadata(gid)?)
    }

    fn load_track(
        &self,
        variant: &EncodedVariant,
        gid: &Gid,
    ) -> minispot_core::Result<Box<dyn ByteStream>> {
        let stream = self
            .open_audio(&variant.file_id, gid)
            .map_err(MinispotError::from)?;
        Ok(Box::new(stream))
    }

    fn playlist(&self, path: &str) -> minispot_core::Result<PlaylistContents> {
        Ok(self.playlist_contents(path)?)
    }

    fn root_playlists(&self, username: &str) -> minispot_core::Result<PlaylistContents> {
        Ok(self.rootlist(username)?)
    }
}
