//! rodio-backed audio output.
//!
//! Buffers play through one [`Sink`] per voice: gain maps to the sink
//! volume, stereo position to an equal-power [`ChannelVolume`], and natural
//! completion to an [`EmptyCallback`] queued behind the sound. Streamed
//! layers decode straight from their source with [`Decoder::new_looped`].

use super::{
    AudioOutput, CompletionHook, OutputCapabilities, SampleBuffer, Voice, VoiceMix,
};
use crate::error::AudioError;
use crate::soundscape::AssetHandle;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::source::{ChannelVolume, EmptyCallback};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::{self, File};
use std::io::{BufReader, Cursor};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// A source type that can be queued on any sink.
type BoxedSource = Box<dyn Source<Item = f32> + Send>;

/// Plays a [`SampleBuffer`] straight from its shared samples.
///
/// Every voice of the same buffer reads the one decoded copy; a looped
/// source wraps back to the first sample instead of ending.
struct BufferSource {
    samples: Arc<[f32]>,
    channels: u16,
    sample_rate: u32,
    duration: Duration,
    position: usize,
    looped: bool,
}

impl BufferSource {
    fn new(buffer: &SampleBuffer, looped: bool) -> Self {
        Self {
            samples: Arc::clone(&buffer.samples),
            channels: buffer.channels,
            sample_rate: buffer.sample_rate,
            duration: buffer.duration(),
            position: 0,
            looped,
        }
    }
}

impl Iterator for BufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.samples.len() {
            if !self.looped || self.samples.is_empty() {
                return None;
            }
            self.position = 0;
        }
        let sample = self.samples[self.position];
        self.position += 1;
        Some(sample)
    }
}

impl Source for BufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        if self.looped {
            None
        } else {
            Some(self.samples.len() - self.position)
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        (!self.looped).then_some(self.duration)
    }
}

/// Keeps the output stream alive on its own thread.
///
/// `OutputStream` cannot leave the thread that created it, so it is parked
/// there until this guard is dropped.
struct DeviceGuard {
    handle: OutputStreamHandle,
    _shutdown: mpsc::Sender<()>,
}

/// Audio output using the system's default device.
pub struct RodioOutput {
    device: Mutex<Option<DeviceGuard>>,
}

impl RodioOutput {
    /// Creates an output. The device is opened lazily by [`AudioOutput::open`].
    pub fn new() -> Self {
        Self {
            device: Mutex::new(None),
        }
    }

    /// Returns the stream handle of the open device.
    fn handle(&self) -> Result<OutputStreamHandle, AudioError> {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|guard| guard.handle.clone())
            .ok_or(AudioError::NotOpen)
    }

    /// Creates a fresh sink on the open device.
    fn sink(&self) -> Result<Sink, AudioError> {
        Sink::try_new(&self.handle()?).map_err(|e| AudioError::Playback(e.to_string()))
    }

    /// Spawns the thread that owns the output stream and waits for it to
    /// report the stream handle.
    fn spawn_device_thread() -> Result<DeviceGuard, AudioError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("ambientui-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Returns once the guard's sender is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    debug!("Audio output closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .map_err(AudioError::DeviceUnavailable)?;

        Ok(DeviceGuard {
            handle,
            _shutdown: shutdown_tx,
        })
    }
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads an asset's encoded bytes.
fn read_asset(asset: &AssetHandle) -> Result<Arc<[u8]>, AudioError> {
    match asset {
        AssetHandle::Path(path) => fs::read(path).map(Arc::from).map_err(|source| {
            AudioError::Unreadable {
                asset: path.display().to_string(),
                source,
            }
        }),
        AssetHandle::Embedded(bytes) => Ok(Arc::clone(bytes)),
    }
}

fn decode_error(asset: &AssetHandle, e: impl std::fmt::Display) -> AudioError {
    AudioError::Decode {
        asset: asset.to_string(),
        reason: e.to_string(),
    }
}

impl AudioOutput for RodioOutput {
    fn open(&self) -> Result<(), AudioError> {
        let mut device = self.device.lock().unwrap_or_else(PoisonError::into_inner);
        if device.is_none() {
            *device = Some(Self::spawn_device_thread()?);
            info!("Opened default audio output");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn capabilities(&self) -> OutputCapabilities {
        let stereo_panning = rodio::cpal::default_host()
            .default_output_device()
            .and_then(|device| device.default_output_config().ok())
            .map(|config| config.channels() >= 2)
            .unwrap_or(false);
        OutputCapabilities { stereo_panning }
    }

    fn decode(&self, asset: &AssetHandle) -> Result<SampleBuffer, AudioError> {
        let bytes = read_asset(asset)?;
        let decoder = Decoder::new(Cursor::new(bytes)).map_err(|e| decode_error(asset, e))?;
        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        let samples: Vec<f32> = decoder.convert_samples().collect();
        Ok(SampleBuffer::new(channels, sample_rate, samples))
    }

    fn play_buffer(
        &self,
        buffer: &SampleBuffer,
        mix: VoiceMix,
        looped: bool,
        on_end: Option<CompletionHook>,
    ) -> Result<Box<dyn Voice>, AudioError> {
        let sink = self.sink()?;
        sink.set_volume(mix.gain);

        let mut source: BoxedSource = Box::new(BufferSource::new(buffer, looped));
        if mix.pan.is_some() {
            source = Box::new(ChannelVolume::new(source, mix.channel_gains().to_vec()));
        }

        sink.append(source);
        if let Some(hook) = on_end {
            sink.append(EmptyCallback::<f32>::new(hook));
        }

        Ok(Box::new(RodioVoice { sink }))
    }

    fn play_stream(&self, asset: &AssetHandle, volume: f32) -> Result<Box<dyn Voice>, AudioError> {
        let sink = self.sink()?;
        sink.set_volume(volume);

        match asset {
            AssetHandle::Path(path) => {
                let file = File::open(path).map_err(|source| AudioError::Unreadable {
                    asset: path.display().to_string(),
                    source,
                })?;
                let decoder = Decoder::new_looped(BufReader::new(file))
                    .map_err(|e| decode_error(asset, e))?;
                sink.append(decoder);
            }
            AssetHandle::Embedded(bytes) => {
                let decoder = Decoder::new_looped(Cursor::new(Arc::clone(bytes)))
                    .map_err(|e| decode_error(asset, e))?;
                sink.append(decoder);
            }
        }

        Ok(Box::new(RodioVoice { sink }))
    }
}

/// A voice backed by its own sink.
struct RodioVoice {
    sink: Sink,
}

impl Voice for RodioVoice {
    fn stop(&mut self) {
        self.sink.stop();
    }

    fn is_finished(&self) -> bool {
        self.sink.empty()
    }
}
