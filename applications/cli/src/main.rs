/// minispot - terminal client for a streaming catalog
use anyhow::Context;
use clap::{Parser, Subcommand};
use minispot_audio_desktop::{CpalBackend, SymphoniaDecoderFactory};
use minispot_catalog::HttpCatalog;
use minispot_cli::{parse_playlist_path, parse_track_id, run_interactive, Overrides, Settings};
use minispot_core::{Catalog, Playlist};
use minispot_playback::{PlaybackEngine, RemotePlaylist};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minispot")]
#[command(about = "Stream tracks and playlists from the catalog", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MINISPOT_CONFIG")]
    config: Option<PathBuf>,

    /// Catalog base URL
    #[arg(long)]
    url: Option<String>,

    /// Catalog access token
    #[arg(long)]
    token: Option<String>,

    /// Account whose playlists are listed
    #[arg(short, long)]
    username: Option<String>,

    /// Name announced to the catalog
    #[arg(long)]
    device_name: Option<String>,

    /// Audio output device
    #[arg(long)]
    output_device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the user's playlists
    Playlists,
    /// Play a playlist by path or URI
    Play {
        /// `user/<name>/playlist/<id>` or `spotify:user:<name>:playlist:<id>`
        playlist: String,
        /// Entry to start from
        #[arg(short, long, default_value_t = 0)]
        index: usize,
    },
    /// Play a single track by id or URI
    Track {
        /// Base62 id or `spotify:track:<id>`
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minispot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    settings.apply(Overrides {
        url: cli.url,
        token: cli.token,
        username: cli.username,
        device_name: cli.device_name,
        output_device: cli.output_device,
    });
    settings.validate()?;

    let catalog: Arc<dyn Catalog> = Arc::new(HttpCatalog::new(settings.catalog_config())?);
    tracing::info!(
        url = %settings.catalog.url,
        device = %settings.player.device_name,
        "Starting minispot"
    );

    match cli.command {
        Commands::Playlists => list_playlists(catalog.as_ref(), &settings),
        Commands::Play { playlist, index } => {
            let path = parse_playlist_path(&playlist);
            let playlist = RemotePlaylist::fetch(catalog.as_ref(), &path)
                .with_context(|| format!("loading playlist {path}"))?;
            println!("Playlist: {} ({} tracks)", playlist.name(), playlist.len());

            let engine = build_engine(catalog, &settings)?;
            engine.play_playlist(Arc::new(playlist), index)?;
            run_interactive(&engine)
        }
        Commands::Track { id } => {
            let engine = build_engine(catalog, &settings)?;
            engine.play(&parse_track_id(&id))?;
            run_interactive(&engine)
        }
    }
}

fn build_engine(catalog: Arc<dyn Catalog>, settings: &Settings) -> anyhow::Result<PlaybackEngine> {
    let output_device = settings.player.output_device.clone();
    let engine = PlaybackEngine::new(
        catalog,
        Arc::new(SymphoniaDecoderFactory::new()),
        settings.audio_config(),
        move |config, renderer| {
            CpalBackend::open(output_device.as_deref(), config, renderer).map_err(Into::into)
        },
    )?;
    Ok(engine)
}

fn list_playlists(catalog: &dyn Catalog, settings: &Settings) -> anyhow::Result<()> {
    let username = settings
        .catalog
        .username
        .as_deref()
        .context("a username is required (set MINISPOT_CATALOG__USERNAME or --username)")?;

    let rootlist = catalog.root_playlists(username)?;
    for uri in &rootlist.tracks {
        match RemotePlaylist::fetch_uri(catalog, uri) {
            Ok(playlist) => println!(
                "{:<40} {:>4} tracks  {}",
                playlist.name(),
                playlist.len(),
                playlist.path()
            ),
            Err(e) => tracing::warn!(uri = %uri, error = %e, "Skipping playlist"),
        }
    }
    Ok(())
}
