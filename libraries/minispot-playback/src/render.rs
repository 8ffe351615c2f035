//! Real-time render path
//!
//! Runs on the audio backend's thread. Only copies samples the session's
//! decode worker already queued: no allocation, no I/O, and no lock but the
//! session slot (held by the control side only for O(1) handle swaps).
//! Listeners are never invoked here; end-of-stream and progress are
//! signalled over bounded channels and handled by the engine's dispatcher.

use crate::session::SessionSlot;
use crate::types::{AtomicPlaybackState, PlaybackState};
use crossbeam_channel::Sender;
use minispot_core::{AudioConfig, ReadStatus, RenderCallback};
use std::sync::Arc;

/// Capacity of the end-of-stream signal channel
pub(crate) const EXHAUSTED_CAPACITY: usize = 4;

/// A single pending progress tick; further ticks are dropped until the
/// dispatcher catches up
pub(crate) const PROGRESS_CAPACITY: usize = 1;

/// State shared between the control side and the render path
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) slot: SessionSlot,
    pub(crate) state: AtomicPlaybackState,
    pub(crate) config: AudioConfig,
}

impl Shared {
    pub(crate) fn new(config: AudioConfig) -> Self {
        Self {
            slot: SessionSlot::new(),
            state: AtomicPlaybackState::new(PlaybackState::Idle),
            config,
        }
    }
}

/// Render callback handed to the audio backend
pub(crate) struct Renderer {
    shared: Arc<Shared>,
    exhausted_tx: Sender<u64>,
    progress_tx: Sender<()>,
}

impl Renderer {
    pub(crate) fn new(
        shared: Arc<Shared>,
        exhausted_tx: Sender<u64>,
        progress_tx: Sender<()>,
    ) -> Self {
        Self {
            shared,
            exhausted_tx,
            progress_tx,
        }
    }
}

impl RenderCallback for Renderer {
    fn render(&self, out: &mut [f32]) -> usize {
        if self.shared.state.load() != PlaybackState::Playing {
            return 0;
        }

        let mut written = 0;
        {
            let mut slot = self.shared.slot.lock();
            let Some(session) = slot.as_mut() else {
                return 0;
            };

            while written < out.len() {
                let (count, status) = session.read(&mut out[written..]);
                written += count;

                if status == ReadStatus::EndOfStream {
                    // Must happen under the slot lock: a swap stores Playing
                    // while holding it.
                    if self
                        .shared
                        .state
                        .transition(PlaybackState::Playing, PlaybackState::Idle)
                    {
                        let _ = self.exhausted_tx.try_send(session.generation());
                    }
                    break;
                }

                if count == 0 {
                    break;
                }
            }
        }

        let _ = self.progress_tx.try_send(());

        written / usize::from(self.shared.config.channels().max(1))
    }
}
