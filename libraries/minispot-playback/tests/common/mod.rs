//! Shared test doubles: an in-memory catalog, a header-driven decoder and a
//! backend whose render callback is driven by the test.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use minispot_core::{
    AudioBackend, AudioConfig, AudioFile, AudioFormat, ByteStream, Catalog, DecoderFactory,
    EncodedVariant, Gid, MinispotError, PlaylistContents, ReadStatus, RenderCallback, Result,
    SampleDecoder, StreamCanceller, TrackId, TrackMetadata,
};
use minispot_playback::{PlaybackEngine, PlaybackEvent};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Stream header magic that makes the decoder reject the stream
pub const BAD_HEADER: &[u8] = b"BAD!";

/// Stream header magic: the decoder emits the sample count that follows,
/// then blocks on the stream until it is cancelled
pub const HOLD_HEADER: &[u8] = b"HOLD";

/// Sample value produced by [`FakeDecoder`]
pub const SAMPLE_VALUE: f32 = 0.25;

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl CancelState {
    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap()
    }

    fn wait(&self) {
        let mut cancelled = self.cancelled.lock().unwrap();
        while !*cancelled {
            cancelled = self.wake.wait(cancelled).unwrap();
        }
    }
}

struct CancelFlag(Arc<CancelState>);

impl StreamCanceller for CancelFlag {
    fn cancel(&self) {
        *self.0.cancelled.lock().unwrap() = true;
        self.0.wake.notify_all();
    }
}

pub struct FakeStream {
    data: Cursor<Vec<u8>>,
    cancelled: Arc<CancelState>,
    /// Block at end of data until cancelled, like a stalled download
    hold_open: bool,
}

impl Read for FakeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancelled.is_cancelled() {
            return Ok(0);
        }
        let n = self.data.read(buf)?;
        if n == 0 && self.hold_open && !buf.is_empty() {
            self.cancelled.wait();
        }
        Ok(n)
    }
}

impl Seek for FakeStream {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.data.seek(pos)
    }
}

impl ByteStream for FakeStream {
    fn canceller(&self) -> Arc<dyn StreamCanceller> {
        Arc::new(CancelFlag(Arc::clone(&self.cancelled)))
    }
}

/// In-memory catalog keyed by gid
#[derive(Default)]
pub struct FakeCatalog {
    tracks: Mutex<HashMap<Gid, TrackMetadata>>,
    streams: Mutex<HashMap<String, Vec<u8>>>,
    held: Mutex<HashSet<String>>,
    opened: Mutex<Vec<(String, Arc<CancelState>)>>,
    loads: AtomicUsize,
}

pub fn gid(n: u128) -> Gid {
    Gid::new(n)
}

pub fn track_id(n: u128) -> TrackId {
    gid(n).to_track_id()
}

pub fn track_uri(n: u128) -> String {
    track_id(n).to_uri()
}

pub fn file_id(n: u128) -> String {
    format!("file-{n}")
}

/// Header understood by [`FakeDecoderFactory`]: sample count, little endian
pub fn samples_header(samples: u64) -> Vec<u8> {
    samples.to_le_bytes().to_vec()
}

/// Header for a stream that stalls after `samples` samples
pub fn hold_header(samples: u32) -> Vec<u8> {
    let mut header = HOLD_HEADER.to_vec();
    header.extend_from_slice(&samples.to_le_bytes());
    header
}

pub fn metadata(n: u128, name: &str, files: Vec<AudioFile>) -> TrackMetadata {
    TrackMetadata {
        gid: gid(n).to_hex(),
        name: name.to_string(),
        artists: vec![minispot_core::Artist {
            name: "Test Artist".into(),
        }],
        album: None,
        duration_ms: 10_000,
        files,
        alternatives: vec![],
    }
}

pub fn ogg_320(n: u128) -> AudioFile {
    AudioFile {
        file_id: file_id(n),
        format: AudioFormat::OggVorbis320,
    }
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a playable track producing `samples` interleaved samples
    pub fn add_track(&self, n: u128, name: &str, samples: u64) -> TrackId {
        self.insert(metadata(n, name, vec![ogg_320(n)]));
        self.set_stream(&file_id(n), samples_header(samples));
        track_id(n)
    }

    /// Register a track whose stream stalls after `samples` samples until
    /// it is cancelled
    pub fn add_stalling_track(&self, n: u128, name: &str, samples: u32) -> TrackId {
        self.insert(metadata(n, name, vec![ogg_320(n)]));
        self.set_stream(&file_id(n), hold_header(samples));
        self.held.lock().unwrap().insert(file_id(n));
        track_id(n)
    }

    pub fn insert(&self, metadata: TrackMetadata) {
        let key = Gid::from_hex(&metadata.gid).unwrap_or(Gid::new(0));
        self.tracks.lock().unwrap().insert(key, metadata);
    }

    pub fn insert_at(&self, n: u128, metadata: TrackMetadata) {
        self.tracks.lock().unwrap().insert(gid(n), metadata);
    }

    pub fn set_stream(&self, file_id: &str, bytes: Vec<u8>) {
        self.streams
            .lock()
            .unwrap()
            .insert(file_id.to_string(), bytes);
    }

    pub fn remove_stream(&self, file_id: &str) {
        self.streams.lock().unwrap().remove(file_id);
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// File ids of every stream handed out, in order
    pub fn loaded_files(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Streams handed out and not cancelled yet
    pub fn live_streams(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cancelled)| !cancelled.is_cancelled())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Catalog for FakeCatalog {
    fn resolve_track(&self, gid: &Gid) -> Result<TrackMetadata> {
        self.tracks
            .lock()
            .unwrap()
            .get(gid)
            .cloned()
            .ok_or_else(|| MinispotError::not_found(format!("track {gid}")))
    }

    fn load_track(&self, variant: &EncodedVariant, _gid: &Gid) -> Result<Box<dyn ByteStream>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .streams
            .lock()
            .unwrap()
            .get(&variant.file_id)
            .cloned()
            .ok_or_else(|| MinispotError::transport(format!("no stream for {}", variant.file_id)))?;

        let cancelled = Arc::new(CancelState::default());
        let hold_open = self.held.lock().unwrap().contains(&variant.file_id);
        self.opened
            .lock()
            .unwrap()
            .push((variant.file_id.clone(), Arc::clone(&cancelled)));

        Ok(Box::new(FakeStream {
            data: Cursor::new(bytes),
            cancelled,
            hold_open,
        }))
    }

    fn playlist(&self, path: &str) -> Result<PlaylistContents> {
        Err(MinispotError::not_found(format!("playlist {path}")))
    }

    fn root_playlists(&self, username: &str) -> Result<PlaylistContents> {
        Err(MinispotError::not_found(format!("rootlist {username}")))
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Emits a fixed number of samples, then end of stream
///
/// With a held stream, reads past the samples block on the stream instead
/// and end once it is cancelled.
pub struct FakeDecoder {
    remaining: u64,
    hold: Option<Box<dyn ByteStream>>,
}

impl SampleDecoder for FakeDecoder {
    fn read(&mut self, out: &mut [f32]) -> (usize, ReadStatus) {
        if self.remaining == 0 {
            if let Some(mut stream) = self.hold.take() {
                let _ = stream.read(&mut [0u8; 1]);
            }
            return (0, ReadStatus::EndOfStream);
        }

        let n = self.remaining.min(out.len() as u64) as usize;
        out[..n].fill(SAMPLE_VALUE);
        self.remaining -= n as u64;
        if self.remaining == 0 && self.hold.is_none() {
            (n, ReadStatus::EndOfStream)
        } else {
            (n, ReadStatus::Ok)
        }
    }
}

pub struct FakeDecoderFactory;

impl DecoderFactory for FakeDecoderFactory {
    fn open(
        &self,
        mut stream: Box<dyn ByteStream>,
        _config: AudioConfig,
    ) -> Result<Box<dyn SampleDecoder>> {
        let mut header = Vec::new();
        stream.by_ref().take(8).read_to_end(&mut header)?;

        if header.starts_with(BAD_HEADER) {
            return Err(MinispotError::unsupported_format("bad magic"));
        }

        let bytes: [u8; 8] = header
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| MinispotError::unsupported_format("short header"))?;

        if header.starts_with(HOLD_HEADER) {
            let count = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
            return Ok(Box::new(FakeDecoder {
                remaining: u64::from(count),
                hold: Some(stream),
            }));
        }

        Ok(Box::new(FakeDecoder {
            remaining: u64::from_le_bytes(bytes),
            hold: None,
        }))
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Test-side view of the backend
#[derive(Default)]
pub struct BackendControl {
    started: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    renderer: Mutex<Option<Arc<dyn RenderCallback>>>,
}

impl BackendControl {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    /// Run one device callback of `frames` frames (stereo)
    ///
    /// The buffer is pre-filled with `-1.0` so untouched samples are visible.
    /// Returns zero frames without calling the renderer when stopped.
    pub fn render(&self, frames: usize) -> (usize, Vec<f32>) {
        let mut buf = vec![-1.0f32; frames * 2];
        if !self.is_started() {
            return (0, buf);
        }
        let renderer = self.renderer.lock().unwrap().clone();
        let written = renderer.map_or(0, |r| r.render(&mut buf));
        (written, buf)
    }

    /// Keep running callbacks of at most 1024 frames until `frames` frames
    /// were produced, the stream ends, or two seconds pass
    ///
    /// Absorbs the decode worker running behind the device. Returns the
    /// frames produced.
    pub fn render_until(&self, frames: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut total = 0;
        while total < frames && Instant::now() < deadline {
            let (written, _) = self.render((frames - total).min(1024));
            if written == 0 {
                if !self.is_started() {
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            total += written;
        }
        total
    }
}

pub struct ManualBackend(Arc<BackendControl>);

impl AudioBackend for ManualBackend {
    fn start(&self) -> Result<()> {
        if self.0.fail_start.swap(false, Ordering::SeqCst) {
            return Err(MinispotError::backend("device unplugged"));
        }
        self.0.started.store(true, Ordering::SeqCst);
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.0.started.store(false, Ordering::SeqCst);
        self.0.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.0.is_started()
    }
}

/// Engine wired to `catalog`, the fake decoder and a manual backend
pub fn engine(catalog: &Arc<FakeCatalog>) -> (PlaybackEngine, Arc<BackendControl>) {
    let control = Arc::new(BackendControl::default());
    let backend_control = Arc::clone(&control);
    let engine = PlaybackEngine::new(
        Arc::clone(catalog) as Arc<dyn Catalog>,
        Arc::new(FakeDecoderFactory),
        AudioConfig::STANDARD,
        move |_config, renderer| {
            *backend_control.renderer.lock().unwrap() = Some(renderer);
            Ok(ManualBackend(backend_control))
        },
    )
    .expect("engine");
    (engine, control)
}

// ============================================================================
// Events
// ============================================================================

/// Wait for the first non-progress event
pub fn next_event(rx: &Receiver<PlaybackEvent>) -> Option<PlaybackEvent> {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        match rx.recv_timeout(remaining) {
            Ok(PlaybackEvent::Progress { .. }) => continue,
            Ok(event) => return Some(event),
            Err(_) => return None,
        }
    }
}

/// Wait until `condition` holds (polling) or two seconds pass
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
