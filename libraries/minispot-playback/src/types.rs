//! Core types for playback management

use minispot_core::Playlist;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Playback state
///
/// The audio backend is running exactly when the state is `Playing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing playing; initial state and the state after a playlist ran out
    Idle,

    /// Audio is being rendered
    Playing,

    /// Paused mid-track, session retained
    Paused,
}

impl PlaybackState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Playing => 1,
            Self::Paused => 2,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Paused,
            _ => Self::Idle,
        }
    }
}

/// `PlaybackState` readable from the audio thread without locking
#[derive(Debug)]
pub(crate) struct AtomicPlaybackState(AtomicU8);

impl AtomicPlaybackState {
    pub(crate) fn new(state: PlaybackState) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn load(&self) -> PlaybackState {
        PlaybackState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: PlaybackState) {
        self.0.store(state.to_u8(), Ordering::Release);
    }

    /// Swap `current` for `new`; false if the state was something else
    pub(crate) fn transition(&self, current: PlaybackState, new: PlaybackState) -> bool {
        self.0
            .compare_exchange(
                current.to_u8(),
                new.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Outcome of advancing within a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextTrack {
    /// The entry at this index is now playing
    Started(usize),

    /// The cursor is on the last entry; nothing was changed
    EndOfPlaylist,
}

/// Playlist bound to the engine plus the index of the current entry
#[derive(Clone)]
pub(crate) struct PlaylistContext {
    pub(crate) playlist: Arc<dyn Playlist>,
    pub(crate) cursor: usize,
}

impl std::fmt::Debug for PlaylistContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistContext")
            .field("playlist", &self.playlist.name())
            .field("len", &self.playlist.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}
