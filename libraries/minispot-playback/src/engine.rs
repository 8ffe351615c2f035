//! Playback engine - core orchestration
//!
//! Coordinates the resolver, the decode pipeline, the audio backend and the
//! playlist cursor, and reacts to end-of-stream signals from the render path.
//!
//! # Threads
//!
//! - **Control** (any caller thread): `play`, `play_playlist`, `play_next`,
//!   `set_pause_state`. Serialised by one control mutex; may block on the
//!   catalog.
//! - **Render** (audio backend thread): [`RenderCallback::render`] only.
//! - **Dispatcher** (`minispot-events`): turns render signals into listener
//!   calls and performs automatic advance.

use crate::events::{EventListeners, PlaybackEvent};
use crate::render::{Renderer, Shared, EXHAUSTED_CAPACITY, PROGRESS_CAPACITY};
use crate::resolver::TrackResolver;
use crate::session::DecodePipeline;
use crate::types::{NextTrack, PlaybackState, PlaylistContext};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use minispot_core::{
    AudioBackend, AudioConfig, Catalog, DecoderFactory, MinispotError, Playlist, RenderCallback,
    Result, TrackId, TrackMetadata,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Mutable control-side state, guarded by the control mutex
#[derive(Debug, Default)]
struct ControlState {
    playlist: Option<PlaylistContext>,
}

/// Result of a playlist advance performed under the control lock
enum Advance {
    Started(usize, Arc<TrackMetadata>),
    End,
}

struct EngineInner {
    shared: Arc<Shared>,
    resolver: TrackResolver,
    pipeline: DecodePipeline,
    backend: Box<dyn AudioBackend>,
    control: Mutex<ControlState>,
    current_track: RwLock<Option<Arc<TrackMetadata>>>,
    listeners: EventListeners,
}

/// Streaming playback engine
///
/// Turns track identifiers (or a playlist) into continuous audio on an
/// [`AudioBackend`], exposing pause/resume, advance and progress to the
/// presentation layer.
///
/// # Example
///
/// ```ignore
/// use minispot_playback::{PlaybackEngine, TrackListPlaylist};
/// use minispot_core::AudioConfig;
/// use std::sync::Arc;
///
/// let engine = PlaybackEngine::new(catalog, decoders, AudioConfig::STANDARD, |config, renderer| {
///     CpalBackend::open(None, config, renderer)
/// })?;
///
/// engine.set_on_track_started(|track| println!("Now playing {}", track.name));
///
/// let playlist = Arc::new(TrackListPlaylist::new("Mix", ["spotify:track:4uLU6hMCjMI75M1A2tKUQC"]));
/// engine.play_playlist(playlist, 0)?;
/// engine.set_pause_state(true)?;
/// ```
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
    shutdown_tx: Option<Sender<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    /// Create an engine in the `Idle` state
    ///
    /// `build_backend` receives the audio format and the render callback and
    /// must return a backend that is not yet started.
    pub fn new<B, F>(
        catalog: Arc<dyn Catalog>,
        decoders: Arc<dyn DecoderFactory>,
        config: AudioConfig,
        build_backend: F,
    ) -> Result<Self>
    where
        B: AudioBackend + 'static,
        F: FnOnce(AudioConfig, Arc<dyn RenderCallback>) -> Result<B>,
    {
        let shared = Arc::new(Shared::new(config));
        let (exhausted_tx, exhausted_rx) = bounded::<u64>(EXHAUSTED_CAPACITY);
        let (progress_tx, progress_rx) = bounded::<()>(PROGRESS_CAPACITY);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let renderer: Arc<dyn RenderCallback> =
            Arc::new(Renderer::new(Arc::clone(&shared), exhausted_tx, progress_tx));
        let backend = build_backend(config, renderer)?;

        let inner = Arc::new(EngineInner {
            shared,
            resolver: TrackResolver::new(Arc::clone(&catalog)),
            pipeline: DecodePipeline::new(catalog, decoders, config),
            backend: Box::new(backend),
            control: Mutex::new(ControlState::default()),
            current_track: RwLock::new(None),
            listeners: EventListeners::default(),
        });

        let weak = Arc::downgrade(&inner);
        let dispatcher = thread::Builder::new()
            .name("minispot-events".into())
            .spawn(move || run_dispatcher(&weak, &exhausted_rx, &progress_rx, &shutdown_rx))?;

        debug!(
            channels = config.channels(),
            sample_rate = config.sample_rate(),
            buffer_frames = config.buffer_frames(),
            "Playback engine created"
        );

        Ok(Self {
            inner,
            shutdown_tx: Some(shutdown_tx),
            dispatcher: Some(dispatcher),
        })
    }

    // ===== Control =====

    /// Play a single track, replacing whatever is playing
    ///
    /// Works from any state. The playlist context, if any, is kept. On error
    /// the engine state is unchanged.
    pub fn play(&self, id: &TrackId) -> Result<()> {
        let track = {
            let _control = self.inner.lock_control();
            self.inner.play_locked(id)?
        };
        self.inner.listeners.track_started(&track);
        Ok(())
    }

    /// Play entry `index` of `playlist` and bind it as the playlist context
    ///
    /// # Errors
    /// - `OutOfRange` when `index >= playlist.len()` (nothing is changed)
    /// - `LocalTrackUnsupported` when the entry is not a remote track URI
    /// - any error of [`PlaybackEngine::play`]
    pub fn play_playlist(&self, playlist: Arc<dyn Playlist>, index: usize) -> Result<()> {
        let track = {
            let mut control = self.inner.lock_control();
            let len = playlist.len();
            if index >= len {
                return Err(MinispotError::OutOfRange { index, len });
            }

            let track = self.inner.play_entry(playlist.as_ref(), index)?;
            debug!(playlist = %playlist.name(), index, "Bound playlist");
            control.playlist = Some(PlaylistContext {
                playlist,
                cursor: index,
            });
            track
        };
        self.inner.listeners.track_started(&track);
        Ok(())
    }

    /// Advance to the next playlist entry
    ///
    /// Returns [`NextTrack::EndOfPlaylist`] without changing anything when the
    /// cursor is on the last entry. The cursor only moves when the next entry
    /// actually started.
    ///
    /// # Errors
    /// - `NoPlaylist` when no playlist is bound
    /// - `LocalTrackUnsupported` when the next entry is a local file; the
    ///   cursor stays put and the entry is not skipped
    pub fn play_next(&self) -> Result<NextTrack> {
        let advance = {
            let mut control = self.inner.lock_control();
            self.inner.advance_locked(&mut control)?
        };

        match advance {
            Advance::Started(index, track) => {
                self.inner.listeners.track_started(&track);
                Ok(NextTrack::Started(index))
            }
            Advance::End => Ok(NextTrack::EndOfPlaylist),
        }
    }

    /// Pause (`true`) or resume (`false`)
    ///
    /// A no-op when idle or already in the requested state. The decode
    /// session and its position are kept.
    pub fn set_pause_state(&self, pause: bool) -> Result<()> {
        let track = {
            let _control = self.inner.lock_control();
            let state = self.inner.shared.state.load();

            match (state, pause) {
                (PlaybackState::Playing, true) => {
                    self.inner.backend.stop()?;
                    if !self
                        .inner
                        .shared
                        .state
                        .transition(PlaybackState::Playing, PlaybackState::Paused)
                    {
                        // The track ran out while stopping; the dispatcher
                        // owns what happens next.
                        return Ok(());
                    }
                }
                (PlaybackState::Paused, false) => {
                    self.inner.shared.state.store(PlaybackState::Playing);
                    if let Err(e) = self.inner.backend.start() {
                        self.inner.shared.state.store(PlaybackState::Paused);
                        return Err(e);
                    }
                }
                _ => return Ok(()),
            }

            debug!(paused = pause, "Pause state changed");
            self.inner.current_track()
        };

        if let Some(track) = track {
            self.inner.listeners.track_paused(&track, pause);
        }
        Ok(())
    }

    // ===== Queries =====

    /// `true` while a track is loaded and not exhausted, including when paused
    pub fn is_playing(&self) -> bool {
        self.inner.shared.state.load() != PlaybackState::Idle
    }

    /// `true` while paused
    pub fn pause_state(&self) -> bool {
        self.inner.shared.state.load() == PlaybackState::Paused
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.shared.state.load()
    }

    /// Metadata of the most recently started track
    pub fn track(&self) -> Option<Arc<TrackMetadata>> {
        self.inner.current_track()
    }

    /// Elapsed time of the current track in milliseconds
    pub fn play_progress(&self) -> u64 {
        self.inner.play_progress()
    }

    /// Index of the current playlist entry
    pub fn playlist_cursor(&self) -> Option<usize> {
        self.inner
            .lock_control()
            .playlist
            .as_ref()
            .map(|ctx| ctx.cursor)
    }

    /// Name and length of the bound playlist
    pub fn playlist_info(&self) -> Option<(String, usize)> {
        self.inner
            .lock_control()
            .playlist
            .as_ref()
            .map(|ctx| (ctx.playlist.name().to_string(), ctx.playlist.len()))
    }

    pub fn config(&self) -> AudioConfig {
        self.inner.shared.config
    }

    // ===== Listeners =====

    pub fn set_on_track_started(&self, listener: impl Fn(&TrackMetadata) + Send + Sync + 'static) {
        self.inner.listeners.set_on_track_started(listener);
    }

    pub fn set_on_track_paused(
        &self,
        listener: impl Fn(&TrackMetadata, bool) + Send + Sync + 'static,
    ) {
        self.inner.listeners.set_on_track_paused(listener);
    }

    pub fn set_on_track_finished(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.inner.listeners.set_on_track_finished(listener);
    }

    pub fn set_on_track_progress(&self, listener: impl Fn(u64) + Send + Sync + 'static) {
        self.inner.listeners.set_on_track_progress(listener);
    }

    /// Receive every event as a [`PlaybackEvent`]
    ///
    /// Replaces all four listeners. Events are dropped when `capacity`
    /// undelivered events are pending.
    pub fn subscribe(&self, capacity: usize) -> Receiver<PlaybackEvent> {
        let (tx, rx) = bounded(capacity);
        self.inner.listeners.forward_to(tx);
        rx
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        let released = {
            let _control = self.inner.lock_control();
            // Stop rendering before anything the callback touches goes away
            if let Err(e) = self.inner.backend.stop() {
                warn!(error = %e, "Failed to stop audio backend during teardown");
            }
            self.inner.shared.state.store(PlaybackState::Idle);
            self.inner.shared.slot.take()
        };
        drop(released);

        drop(self.shutdown_tx.take());
        if let Some(handle) = self.dispatcher.take() {
            // Dropped from a listener: the dispatcher exits on its own
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("Event dispatcher panicked");
            }
        }

        debug!("Playback engine released");
    }
}

impl EngineInner {
    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_track(&self) -> Option<Arc<TrackMetadata>> {
        self.current_track
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn play_progress(&self) -> u64 {
        self.shared.config.frames_to_ms(self.shared.slot.position())
    }

    /// Resolve, open and swap in `id`. Caller holds the control lock.
    fn play_locked(&self, id: &TrackId) -> Result<Arc<TrackMetadata>> {
        let resolved = self.resolver.resolve(id)?;
        let session = self.pipeline.open(&resolved.variant, &resolved.gid)?;

        if !self.backend.is_started() {
            self.backend.start()?;
        }

        let previous = {
            let mut slot = self.shared.slot.lock();
            let previous = slot.replace(session);
            self.shared.state.store(PlaybackState::Playing);
            previous
        };
        // Cancels the superseded stream outside the slot lock
        drop(previous);

        *self
            .current_track
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&resolved.metadata));

        info!(
            track = %id,
            name = %resolved.metadata.name,
            quality = ?resolved.variant.quality,
            "Track started"
        );
        Ok(resolved.metadata)
    }

    fn play_entry(&self, playlist: &dyn Playlist, index: usize) -> Result<Arc<TrackMetadata>> {
        let uri = playlist.track_at(index);
        let id = TrackId::from_uri(uri)
            .ok_or_else(|| MinispotError::LocalTrackUnsupported(uri.to_string()))?;
        self.play_locked(&id)
    }

    fn advance_locked(&self, control: &mut ControlState) -> Result<Advance> {
        let ctx = control.playlist.as_ref().ok_or(MinispotError::NoPlaylist)?;
        let next = ctx.cursor + 1;
        if next >= ctx.playlist.len() {
            return Ok(Advance::End);
        }

        let playlist = Arc::clone(&ctx.playlist);
        let track = self.play_entry(playlist.as_ref(), next)?;
        if let Some(ctx) = control.playlist.as_mut() {
            ctx.cursor = next;
        }
        Ok(Advance::Started(next, track))
    }

    fn go_idle(&self, control: &mut ControlState) {
        if let Err(e) = self.backend.stop() {
            warn!(error = %e, "Failed to stop audio backend");
        }
        self.shared.state.store(PlaybackState::Idle);
        control.playlist = None;
    }

    /// Session `generation` ran out of samples
    fn handle_exhaustion(&self, generation: u64) {
        if self.shared.slot.generation() != Some(generation) {
            debug!(generation, "Ignoring end of superseded session");
            return;
        }

        self.listeners.track_finished();

        let started = {
            let mut control = self.lock_control();

            // A control operation may have replaced the track while the
            // finished listener ran.
            if self.shared.slot.generation() != Some(generation)
                || self.shared.state.load() != PlaybackState::Idle
            {
                return;
            }

            match self.advance_locked(&mut control) {
                Ok(Advance::Started(index, track)) => {
                    debug!(index, "Advanced to next playlist entry");
                    Some(track)
                }
                Ok(Advance::End) => {
                    debug!("Playlist finished");
                    self.go_idle(&mut control);
                    None
                }
                Err(MinispotError::NoPlaylist) => {
                    debug!("Track finished without playlist");
                    self.go_idle(&mut control);
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Automatic advance failed, stopping playback");
                    self.go_idle(&mut control);
                    None
                }
            }
        };

        if let Some(track) = started {
            self.listeners.track_started(&track);
        }
    }
}

fn run_dispatcher(
    engine: &Weak<EngineInner>,
    exhausted_rx: &Receiver<u64>,
    progress_rx: &Receiver<()>,
    shutdown_rx: &Receiver<()>,
) {
    loop {
        select! {
            recv(shutdown_rx) -> _ => break,
            recv(exhausted_rx) -> msg => {
                let (Ok(generation), Some(inner)) = (msg, engine.upgrade()) else {
                    break;
                };
                inner.handle_exhaustion(generation);
            }
            recv(progress_rx) -> msg => {
                let (Ok(()), Some(inner)) = (msg, engine.upgrade()) else {
                    break;
                };
                inner.listeners.track_progress(inner.play_progress());
            }
        }
    }
    debug!("Event dispatcher stopped");
}
