//! Playback Events
//!
//! Notifications for the presentation layer. Listeners are emitted at:
//! - Track start (explicit play or automatic advance)
//! - Pause/resume
//! - Natural end of a track
//! - Progress (advisory, coalesced, at most once per audio callback)
//!
//! No listener is ever invoked on the real-time audio thread.

use minispot_core::TrackMetadata;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A track started playing
    TrackStarted {
        /// Metadata of the new track
        track: TrackMetadata,
    },

    /// Pause state changed
    TrackPaused {
        track: TrackMetadata,
        /// `true` when paused, `false` when resumed
        paused: bool,
    },

    /// The current track ran out of samples
    TrackFinished,

    /// Playback progressed
    Progress {
        /// Elapsed time of the current track
        position_ms: u64,
    },
}

pub type TrackStartedListener = dyn Fn(&TrackMetadata) + Send + Sync;
pub type TrackPausedListener = dyn Fn(&TrackMetadata, bool) + Send + Sync;
pub type TrackFinishedListener = dyn Fn() + Send + Sync;
pub type TrackProgressListener = dyn Fn(u64) + Send + Sync;

/// Registered listeners, one slot per event kind
///
/// Emitting clones the listener out of its slot before calling it, so a
/// listener may replace itself (or any other) without deadlocking.
#[derive(Default)]
pub struct EventListeners {
    started: RwLock<Option<Arc<TrackStartedListener>>>,
    paused: RwLock<Option<Arc<TrackPausedListener>>>,
    finished: RwLock<Option<Arc<TrackFinishedListener>>>,
    progress: RwLock<Option<Arc<TrackProgressListener>>>,
}

fn load<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>) -> Option<Arc<T>> {
    slot.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn replace<T: ?Sized>(slot: &RwLock<Option<Arc<T>>>, listener: Arc<T>) {
    *slot.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
}

impl EventListeners {
    pub fn set_on_track_started(&self, listener: impl Fn(&TrackMetadata) + Send + Sync + 'static) {
        replace(&self.started, Arc::new(listener) as Arc<TrackStartedListener>);
    }

    pub fn set_on_track_paused(
        &self,
        listener: impl Fn(&TrackMetadata, bool) + Send + Sync + 'static,
    ) {
        replace(&self.paused, Arc::new(listener) as Arc<TrackPausedListener>);
    }

    pub fn set_on_track_finished(&self, listener: impl Fn() + Send + Sync + 'static) {
        replace(&self.finished, Arc::new(listener) as Arc<TrackFinishedListener>);
    }

    pub fn set_on_track_progress(&self, listener: impl Fn(u64) + Send + Sync + 'static) {
        replace(&self.progress, Arc::new(listener) as Arc<TrackProgressListener>);
    }

    pub(crate) fn track_started(&self, track: &TrackMetadata) {
        if let Some(listener) = load(&self.started) {
            listener(track);
        }
    }

    pub(crate) fn track_paused(&self, track: &TrackMetadata, paused: bool) {
        if let Some(listener) = load(&self.paused) {
            listener(track, paused);
        }
    }

    pub(crate) fn track_finished(&self) {
        if let Some(listener) = load(&self.finished) {
            listener();
        }
    }

    pub(crate) fn track_progress(&self, position_ms: u64) {
        if let Some(listener) = load(&self.progress) {
            listener(position_ms);
        }
    }

    /// Install listeners on every slot that forward into `sender` as
    /// [`PlaybackEvent`]s. Events are dropped if the receiver is full or gone.
    pub fn forward_to(&self, sender: crossbeam_channel::Sender<PlaybackEvent>) {
        let tx = sender.clone();
        self.set_on_track_started(move |track| {
            let _ = tx.try_send(PlaybackEvent::TrackStarted {
                track: track.clone(),
            });
        });

        let tx = sender.clone();
        self.set_on_track_paused(move |track, paused| {
            let _ = tx.try_send(PlaybackEvent::TrackPaused {
                track: track.clone(),
                paused,
            });
        });

        let tx = sender.clone();
        self.set_on_track_finished(move || {
            let _ = tx.try_send(PlaybackEvent::TrackFinished);
        });

        self.set_on_track_progress(move |position_ms| {
            let _ = sender.try_send(PlaybackEvent::Progress { position_ms });
        });
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("started", &load(&self.started).is_some())
            .field("paused", &load(&self.paused).is_some())
            .field("finished", &load(&self.finished).is_some())
            .field("progress", &load(&self.progress).is_some())
            .finish()
    }
}
