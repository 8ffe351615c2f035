//! Streaming decoder over catalog byte streams using Symphonia
//!
//! Packets are decoded on demand from the playback engine's decode thread
//! and converted to interleaved `f32` at the configured channel count:
//!
//! - Float formats pass through (F32) or are cast (F64)
//! - Signed ints are divided by their MAX value
//! - Unsigned ints are normalized to [0,1] then scaled to [-1,1]
//! - Mono sources are duplicated across every output channel; extra source
//!   channels beyond the output count are dropped
//!
//! No resampling is performed. Sources at another rate play at the wrong
//! speed and a warning is logged when the decoder is opened.

use crate::error::AudioError;
use minispot_core::{AudioConfig, ByteStream, DecoderFactory, ReadStatus, SampleDecoder};
use std::io::{self, Read, Seek, SeekFrom};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Adapts a catalog byte stream to Symphonia's media source
struct StreamSource(Box<dyn ByteStream>);

impl Read for StreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for StreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

impl MediaSource for StreamSource {
    fn is_seekable(&self) -> bool {
        self.0.is_seekable()
    }

    fn byte_len(&self) -> Option<u64> {
        self.0.byte_len()
    }
}

/// Opens [`SymphoniaDecoder`]s; expects Ogg Vorbis but accepts anything
/// Symphonia can probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoderFactory;

impl SymphoniaDecoderFactory {
    pub fn new() -> Self {
        Self
    }
}

impl DecoderFactory for SymphoniaDecoderFactory {
    fn open(
        &self,
        stream: Box<dyn ByteStream>,
        config: AudioConfig,
    ) -> minispot_core::Result<Box<dyn SampleDecoder>> {
        Ok(Box::new(SymphoniaDecoder::open(stream, config)?))
    }
}

/// Streaming decoder producing interleaved `f32` samples
pub struct SymphoniaDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    channels: usize,

    // Decoded samples not handed out yet
    pending: Vec<f32>,
    pending_pos: usize,

    is_eof: bool,
}

impl SymphoniaDecoder {
    /// Probe the container and prepare the codec
    ///
    /// # Errors
    /// `AudioError::UnsupportedFormat` when the header cannot be parsed or
    /// the stream carries no decodable track.
    pub fn open(stream: Box<dyn ByteStream>, config: AudioConfig) -> Result<Self, AudioError> {
        let mss = MediaSourceStream::new(
            Box::new(StreamSource(stream)),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        hint.with_extension("ogg");

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format_reader = probed.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| AudioError::UnsupportedFormat("no audio track found".into()))?;

        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;

        let source_rate = track.codec_params.sample_rate;
        if let Some(rate) = source_rate {
            if rate != config.sample_rate() {
                warn!(
                    source = rate,
                    output = config.sample_rate(),
                    "Sample rate mismatch, playing without resampling"
                );
            }
        }

        debug!(
            codec = ?track.codec_params.codec,
            sample_rate = ?source_rate,
            channels = ?track.codec_params.channels.map(|c| c.count()),
            "Decoder opened"
        );

        let channels = usize::from(config.channels());
        Ok(Self {
            format_reader,
            decoder,
            track_id,
            channels,
            pending: Vec::with_capacity(config.samples_for_frames(config.buffer_frames() as usize)),
            pending_pos: 0,
            is_eof: false,
        })
    }

    /// Decode the next packet of our track into `pending`
    ///
    /// Returns `false` once no more packets can be decoded.
    fn decode_next_packet(&mut self) -> bool {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return false;
                }
                Err(e) => {
                    debug!(error = %e, "Stopping decode");
                    return false;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.pending.clear();
                    self.pending_pos = 0;
                    append_interleaved(decoded, &mut self.pending, self.channels);
                    return true;
                }
                // A corrupt packet is skipped, the stream may recover
                Err(SymphoniaError::DecodeError(_)) => {}
                Err(e) => {
                    debug!(error = %e, "Stopping decode");
                    return false;
                }
            }
        }
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn read(&mut self, out: &mut [f32]) -> (usize, ReadStatus) {
        let mut written = 0;

        while written < out.len() {
            let available = self.pending.len() - self.pending_pos;
            if available > 0 {
                let n = available.min(out.len() - written);
                out[written..written + n]
                    .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                written += n;
                continue;
            }

            if self.is_eof || !self.decode_next_packet() {
                self.is_eof = true;
                break;
            }
        }

        if self.is_eof && self.pending_pos >= self.pending.len() {
            (written, ReadStatus::EndOfStream)
        } else {
            (written, ReadStatus::Ok)
        }
    }
}

fn append_interleaved(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>, channels: usize) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(&buf, out, channels, |s| s),
        AudioBufferRef::F64(buf) => interleave(&buf, out, channels, |s| s as f32),

        AudioBufferRef::S8(buf) => interleave(&buf, out, channels, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S16(buf) => {
            interleave(&buf, out, channels, |s| s as f32 / i16::MAX as f32)
        }
        AudioBufferRef::S24(buf) => {
            interleave(&buf, out, channels, |s| s.inner() as f32 / 8_388_607.0)
        }
        AudioBufferRef::S32(buf) => {
            interleave(&buf, out, channels, |s| s as f32 / i32::MAX as f32)
        }

        AudioBufferRef::U8(buf) => interleave(&buf, out, channels, |s| {
            (s as f32 / u8::MAX as f32) * 2.0 - 1.0
        }),
        AudioBufferRef::U16(buf) => interleave(&buf, out, channels, |s| {
            (s as f32 / u16::MAX as f32) * 2.0 - 1.0
        }),
        AudioBufferRef::U24(buf) => interleave(&buf, out, channels, |s| {
            (s.inner() as f32 / 16_777_215.0) * 2.0 - 1.0
        }),
        AudioBufferRef::U32(buf) => interleave(&buf, out, channels, |s| {
            (s as f32 / u32::MAX as f32) * 2.0 - 1.0
        }),
    }
}

fn interleave<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, channels: usize, normalize: F)
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let source_channels = buf.spec().channels.count();
    if source_channels == 0 {
        return;
    }

    out.reserve(buf.frames() * channels);
    for frame in 0..buf.frames() {
        for ch in 0..channels {
            out.push(normalize(buf.chan(ch.min(source_channels - 1))[frame]));
        }
    }
}
