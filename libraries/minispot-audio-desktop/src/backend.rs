/// CPAL output backend driven by the playback engine's render callback
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use minispot_core::{AudioBackend, AudioConfig, RenderCallback};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Commands sent to the audio thread
enum AudioCommand {
    /// Resume invoking the render callback
    Start(Sender<Result<()>>),
    /// Pause the stream
    Stop(Sender<Result<()>>),
    /// Drop the stream and exit the thread
    Shutdown,
}

/// CPAL audio output
///
/// **Architecture**: a dedicated audio thread owns the CPAL `Stream`, which
/// is not `Send` on every platform. The engine talks to it through a command
/// channel and waits for each command to be acknowledged, so `stop` returns
/// only once the stream is paused.
pub struct CpalBackend {
    command_tx: Sender<AudioCommand>,
    started: Arc<AtomicBool>,
    device_name: String,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalBackend {
    /// Open the output device and build a paused stream
    ///
    /// `device_name` selects an output device by name; the host default is
    /// used when it is `None` or no device matches.
    ///
    /// # Errors
    /// Returns an error if no device is available or the stream cannot be
    /// built with `config`.
    pub fn open(
        device_name: Option<&str>,
        config: AudioConfig,
        renderer: Arc<dyn RenderCallback>,
    ) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<AudioCommand>(32);
        let (ready_tx, ready_rx) = bounded::<Result<String>>(1);
        let started = Arc::new(AtomicBool::new(false));
        let requested = device_name.map(str::to_string);

        let audio_thread = thread::Builder::new()
            .name("minispot-audio".into())
            .spawn(move || {
                let stream = match build_stream(requested.as_deref(), config, renderer) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                audio_thread_run(&stream, &command_rx);
            })
            .map_err(|e| AudioError::DeviceError(e.to_string()))?;

        let device_name = ready_rx.recv().map_err(|_| AudioError::ThreadGone)??;
        info!(device = %device_name, "Audio output opened");

        Ok(Self {
            command_tx,
            started,
            device_name,
            audio_thread: Some(audio_thread),
        })
    }

    /// Name of the device in use
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn request(&self, command: fn(Sender<Result<()>>) -> AudioCommand) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.command_tx
            .send(command(ack_tx))
            .map_err(|_| AudioError::ThreadGone)?;
        ack_rx.recv().map_err(|_| AudioError::ThreadGone)?
    }
}

impl AudioBackend for CpalBackend {
    fn start(&self) -> minispot_core::Result<()> {
        self.request(AudioCommand::Start)?;
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) -> minispot_core::Result<()> {
        self.request(AudioCommand::Stop)?;
        self.started.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}

/// Audio thread main loop; owns the stream until shutdown
fn audio_thread_run(stream: &Stream, command_rx: &Receiver<AudioCommand>) {
    while let Ok(cmd) = command_rx.recv() {
        match cmd {
            AudioCommand::Start(ack) => {
                let _ = ack.send(stream.play().map_err(AudioError::from));
            }
            AudioCommand::Stop(ack) => {
                let _ = ack.send(stream.pause().map_err(AudioError::from));
            }
            AudioCommand::Shutdown => break,
        }
    }
    debug!("Audio thread exiting");
}

fn build_stream(
    device_name: Option<&str>,
    config: AudioConfig,
    renderer: Arc<dyn RenderCallback>,
) -> Result<(Stream, String)> {
    let device = find_device(device_name)?;
    let name = device_label(&device);

    let stream_config = StreamConfig {
        channels: config.channels(),
        sample_rate: config.sample_rate(),
        buffer_size: BufferSize::Fixed(config.buffer_frames()),
    };
    let channels = usize::from(config.channels());

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            fill_output(renderer.as_ref(), data, channels);
        },
        |err| error!(error = %err, "Audio stream error"),
        None,
    )?;

    // Some hosts start streams on creation
    stream.pause()?;

    Ok((stream, name))
}

fn find_device(device_name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(wanted) = device_name {
        for device in host.output_devices()? {
            if device_label(&device) == wanted {
                return Ok(device);
            }
        }
        warn!(device = %wanted, "Output device not found, using default");
    }

    host.default_output_device()
        .ok_or(AudioError::DeviceNotFound)
}

#[allow(deprecated)]
fn device_label(device: &Device) -> String {
    device.name().unwrap_or_else(|_| "unknown".into())
}

/// Run the renderer over one device buffer and zero what it left unwritten
pub(crate) fn fill_output(renderer: &dyn RenderCallback, data: &mut [f32], channels: usize) {
    let frames = renderer.render(data);
    let written = frames.saturating_mul(channels).min(data.len());
    data[written..].fill(0.0);
}
