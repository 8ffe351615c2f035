//! minispot - Playback Engine
//!
//! Platform-agnostic streaming playback for minispot.
//!
//! This crate provides:
//! - Track resolution with quality selection and alternative fallback
//! - Decode sessions over remote byte streams, swapped atomically between tracks
//! - A real-time render callback that never allocates or calls listeners
//! - A playback state machine (`Idle`, `Playing`, `Paused`) with playlist advance
//! - Event listeners for track start, pause, finish and progress
//!
//! # Architecture
//!
//! `minispot-playback` is completely platform-agnostic:
//! - No dependency on CPAL (audio output) or Symphonia (decoding)
//! - No dependency on the HTTP catalog client
//!
//! Those collaborators are provided through the traits in `minispot-core`:
//! [`Catalog`](minispot_core::Catalog), [`DecoderFactory`](minispot_core::DecoderFactory)
//! and [`AudioBackend`](minispot_core::AudioBackend).
//!
//! # Threading
//!
//! Control operations may be called from any thread and are serialised. The
//! audio backend calls the render callback on its own thread. Listeners run on
//! the caller's thread (explicit control operations) or on the engine's
//! dispatcher thread (automatic advance, finish, progress), never on the audio
//! thread.

pub mod engine;
pub mod events;
pub mod playlist;
mod render;
pub mod resolver;
pub mod session;
pub mod types;

pub use engine::PlaybackEngine;
pub use events::{EventListeners, PlaybackEvent};
pub use playlist::{RemotePlaylist, TrackListPlaylist};
pub use resolver::{select_variant, ResolvedTrack, TrackResolver};
pub use session::{DecodePipeline, DecodeSession, SessionSlot};
pub use types::{NextTrack, PlaybackState};
