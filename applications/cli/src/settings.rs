/// Player configuration
use minispot_catalog::CatalogConfig;
use minispot_core::{AudioConfig, MinispotError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "minispot.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub player: PlayerSettings,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogSettings {
    /// Base URL of the catalog service
    #[serde(default)]
    pub url: String,

    /// Bearer token
    pub token: Option<String>,

    /// Account whose playlists are listed
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerSettings {
    /// Name announced to the catalog
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Output device; the system default when unset
    pub output_device: Option<String>,

    /// Device buffer size hint, in frames
    #[serde(default = "default_buffer_frames")]
    pub buffer_frames: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            output_device: None,
            buffer_frames: default_buffer_frames(),
        }
    }
}

/// Values given on the command line; `None` keeps the loaded setting
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub device_name: Option<String>,
    pub output_device: Option<String>,
}

impl Settings {
    /// Load configuration from file and environment
    ///
    /// `path` must exist when given; otherwise `minispot.toml` is read if
    /// present. Environment variables prefixed with `MINISPOT_` override the
    /// file, with `__` separating sections (`MINISPOT_CATALOG__URL`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of
    /// the process environment when given
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut settings = config::Config::builder();

        settings = match path {
            Some(path) => settings.add_source(config::File::from(path).required(true)),
            None => settings.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        settings = settings.add_source(
            config::Environment::with_prefix("MINISPOT")
                .prefix_separator("_")
                .separator("__")
                .source(env),
        );

        let config = settings
            .build()
            .map_err(|e| MinispotError::config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| MinispotError::config(e.to_string()))
    }

    /// Apply command line values on top of the loaded settings
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.url {
            self.catalog.url = url;
        }
        if overrides.token.is_some() {
            self.catalog.token = overrides.token;
        }
        if overrides.username.is_some() {
            self.catalog.username = overrides.username;
        }
        if let Some(device_name) = overrides.device_name {
            self.player.device_name = device_name;
        }
        if overrides.output_device.is_some() {
            self.player.output_device = overrides.output_device;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.catalog.url.is_empty() {
            return Err(MinispotError::config(
                "catalog URL is required (set MINISPOT_CATALOG__URL or --url)",
            ));
        }
        if self.player.buffer_frames == 0 {
            return Err(MinispotError::config("player.buffer_frames must be positive"));
        }
        Ok(())
    }

    pub fn catalog_config(&self) -> CatalogConfig {
        let config = match &self.catalog.token {
            Some(token) => CatalogConfig::with_token(&self.catalog.url, token),
            None => CatalogConfig::new(&self.catalog.url),
        };
        config.with_device_name(&self.player.device_name)
    }

    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig::STANDARD.with_buffer_frames(self.player.buffer_frames)
    }
}

// Default values
fn default_device_name() -> String {
    "minispot".to_string()
}

fn default_buffer_frames() -> u32 {
    AudioConfig::STANDARD.buffer_frames()
}
