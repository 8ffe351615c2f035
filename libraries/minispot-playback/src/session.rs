//! Decode sessions
//!
//! A [`DecodeSession`] pairs one byte stream with one decoder. Decoding runs
//! on a per-session worker thread that fills a bounded queue of sample
//! chunks; the render path only copies out of that queue, so it never waits
//! on the network and never allocates. Spent chunks travel back to the worker
//! for reuse.
//!
//! The engine keeps at most one active session in a [`SessionSlot`]; the
//! slot's mutex is the only lock shared with the real-time callback and is
//! held by the control side just long enough to exchange the handle.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use minispot_core::{
    AudioConfig, Catalog, DecoderFactory, EncodedVariant, Gid, ReadStatus, Result,
    SampleDecoder, StreamCanceller,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Decoded chunks buffered ahead of the render path
const QUEUE_CHUNKS: usize = 16;

/// How long opening waits for the first decoded chunk
const PREBUFFER_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between decoder reads that produced nothing
const IDLE_BACKOFF: Duration = Duration::from_millis(10);

/// Samples handed from the decode worker to the render path
struct Chunk {
    samples: Vec<f32>,
    /// Set on the final chunk of the stream
    last: bool,
}

/// An open byte stream plus decoder for one track
///
/// Dropping a session stops its worker and cancels its byte stream, which
/// unblocks a worker waiting on the network.
pub struct DecodeSession {
    generation: u64,
    queue: Receiver<Chunk>,
    recycle_tx: Sender<Vec<f32>>,
    // Keeps the recycle channel connected after the worker exits
    _recycle_rx: Receiver<Vec<f32>>,
    current: Option<Chunk>,
    offset: usize,
    stop: Arc<AtomicBool>,
    canceller: Arc<dyn StreamCanceller>,
    channels: u16,
    samples_read: u64,
    finished: bool,
}

impl DecodeSession {
    /// Spawn the decode worker and wait for its first chunk
    ///
    /// Returns once the first samples are queued, the stream ended, or
    /// five seconds passed.
    pub fn start(
        generation: u64,
        decoder: Box<dyn SampleDecoder>,
        canceller: Arc<dyn StreamCanceller>,
        config: AudioConfig,
    ) -> Result<Self> {
        let chunk_samples =
            (config.buffer_frames() as usize * usize::from(config.channels())).max(1);
        let (queue_tx, queue) = bounded(QUEUE_CHUNKS);
        let (recycle_tx, recycle_rx) = bounded(QUEUE_CHUNKS + 2);
        let stop = Arc::new(AtomicBool::new(false));

        let worker = DecodeWorker {
            generation,
            decoder,
            queue: queue_tx,
            recycle: recycle_rx.clone(),
            stop: Arc::clone(&stop),
            chunk_samples,
        };
        thread::Builder::new()
            .name("minispot-decode".into())
            .spawn(move || worker.run())?;

        let mut session = Self {
            generation,
            queue,
            recycle_tx,
            _recycle_rx: recycle_rx,
            current: None,
            offset: 0,
            stop,
            canceller,
            channels: config.channels().max(1),
            samples_read: 0,
            finished: false,
        };

        match session.queue.recv_timeout(PREBUFFER_TIMEOUT) {
            Ok(chunk) => session.current = Some(chunk),
            Err(RecvTimeoutError::Timeout) => {
                warn!(generation, "No audio decoded yet, starting without prebuffer");
            }
            Err(RecvTimeoutError::Disconnected) => session.finished = true,
        }
        Ok(session)
    }

    /// Copy up to `out.len()` queued samples into `out`
    ///
    /// Never blocks: when the worker has not caught up, fewer samples are
    /// returned with `ReadStatus::Ok`. After `EndOfStream` every call returns
    /// `(0, EndOfStream)`.
    pub fn read(&mut self, out: &mut [f32]) -> (usize, ReadStatus) {
        let mut written = 0;

        while !self.finished {
            if let Some(chunk) = self.current.as_ref() {
                let available = &chunk.samples[self.offset..];
                let n = available.len().min(out.len() - written);
                out[written..written + n].copy_from_slice(&available[..n]);
                written += n;
                self.offset += n;
                if self.offset < chunk.samples.len() {
                    break;
                }

                let last = chunk.last;
                if let Some(spent) = self.current.take() {
                    // Sized so this never fails while the session lives
                    let _ = self.recycle_tx.try_send(spent.samples);
                }
                self.offset = 0;
                if last {
                    self.finished = true;
                    break;
                }
            }

            if written == out.len() {
                break;
            }
            match self.queue.try_recv() {
                Ok(chunk) => self.current = Some(chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.finished = true,
            }
        }

        self.samples_read += written as u64;
        let status = if self.finished {
            ReadStatus::EndOfStream
        } else {
            ReadStatus::Ok
        };
        (written, status)
    }

    /// Frames handed to the render path so far
    pub fn position(&self) -> u64 {
        self.samples_read / u64::from(self.channels)
    }

    /// Monotonic id distinguishing this session from the ones before it
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for DecodeSession {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.canceller.cancel();
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("generation", &self.generation)
            .field("samples_read", &self.samples_read)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Background half of a session: owns the decoder
struct DecodeWorker {
    generation: u64,
    decoder: Box<dyn SampleDecoder>,
    queue: Sender<Chunk>,
    recycle: Receiver<Vec<f32>>,
    stop: Arc<AtomicBool>,
    chunk_samples: usize,
}

impl DecodeWorker {
    fn run(mut self) {
        let mut buf = Vec::with_capacity(self.chunk_samples);

        while !self.stop.load(Ordering::Acquire) {
            buf.resize(self.chunk_samples, 0.0);
            let (count, status) = self.decoder.read(&mut buf);
            if self.stop.load(Ordering::Acquire) {
                break;
            }

            let last = status == ReadStatus::EndOfStream;
            if count == 0 && !last {
                thread::sleep(IDLE_BACKOFF);
                continue;
            }

            buf.truncate(count.min(self.chunk_samples));
            // Blocks while the queue is full; fails once the session is gone
            if self.queue.send(Chunk { samples: buf, last }).is_err() || last {
                break;
            }
            buf = self
                .recycle
                .try_recv()
                .unwrap_or_else(|_| Vec::with_capacity(self.chunk_samples));
        }

        debug!(generation = self.generation, "Decode worker stopped");
    }
}

/// Holder of the active session
#[derive(Debug, Default)]
pub struct SessionSlot {
    active: Mutex<Option<DecodeSession>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the slot (used by the render path)
    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<DecodeSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the active session and hand back the previous one
    ///
    /// The caller drops the returned session after this returns, so stream
    /// cancellation never happens while the lock is held.
    pub fn swap(&self, session: DecodeSession) -> Option<DecodeSession> {
        self.lock().replace(session)
    }

    /// Remove the active session
    pub fn take(&self) -> Option<DecodeSession> {
        self.lock().take()
    }

    /// Frames rendered from the active session
    pub fn position(&self) -> u64 {
        self.lock().as_ref().map_or(0, DecodeSession::position)
    }

    /// Generation of the active session
    pub fn generation(&self) -> Option<u64> {
        self.lock().as_ref().map(DecodeSession::generation)
    }
}

/// Opens decode sessions for resolved variants
pub struct DecodePipeline {
    catalog: Arc<dyn Catalog>,
    decoders: Arc<dyn DecoderFactory>,
    config: AudioConfig,
    next_generation: AtomicU64,
}

impl DecodePipeline {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        decoders: Arc<dyn DecoderFactory>,
        config: AudioConfig,
    ) -> Self {
        Self {
            catalog,
            decoders,
            config,
            next_generation: AtomicU64::new(1),
        }
    }

    /// Open a byte stream for `variant` and build a decoder over it
    ///
    /// Playback is not started.
    ///
    /// # Errors
    /// - `Transport` when the byte stream cannot be obtained
    /// - `UnsupportedFormat` when the decoder rejects the header; the stream
    ///   is cancelled before returning
    pub fn open(&self, variant: &EncodedVariant, gid: &Gid) -> Result<DecodeSession> {
        let stream = self.catalog.load_track(variant, gid)?;
        let canceller = stream.canceller();

        let decoder = match self.decoders.open(stream, self.config) {
            Ok(decoder) => decoder,
            Err(e) => {
                canceller.cancel();
                return Err(e);
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let session =
            match DecodeSession::start(generation, decoder, Arc::clone(&canceller), self.config) {
                Ok(session) => session,
                Err(e) => {
                    canceller.cancel();
                    return Err(e);
                }
            };
        debug!(gid = %gid, file_id = %variant.file_id, generation, "Opened decode session");

        Ok(session)
    }
}
