//! Audio backend primitives.
//!
//! The playback engines decide *when* and *with what parameters* to play;
//! an [`AudioOutput`] implementation does the decoding, device handling
//! and mixing. This module provides:
//! - The [`AudioOutput`] and [`Voice`] traits
//! - Decoded sample buffers and per-voice mix parameters
//! - A rodio-backed output for real devices

pub mod rodio_output;

#[cfg(test)]
pub(crate) mod fake;

pub use rodio_output::RodioOutput;

use crate::error::AudioError;
use crate::soundscape::AssetHandle;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Lowest randomized event gain.
pub const MIN_EVENT_GAIN: f32 = 0.4;

/// Highest randomized event gain.
pub const MAX_EVENT_GAIN: f32 = 0.8;

/// Callback invoked by the backend when a voice finishes naturally.
pub type CompletionHook = Box<dyn Fn() + Send + 'static>;

/// Decoded audio, shared between every voice that plays it.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Interleaved channel count.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved samples in `[-1.0, 1.0]`.
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(channels: u16, sample_rate: u32, samples: impl Into<Arc<[f32]>>) -> Self {
        Self {
            channels,
            sample_rate,
            samples: samples.into(),
        }
    }

    /// Playback length of the buffer.
    pub fn duration(&self) -> Duration {
        if self.channels == 0 || self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.samples.len() as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

/// Gain and optional stereo position for one voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceMix {
    /// Linear gain (0.0 to 1.0).
    pub gain: f32,
    /// Stereo position from -1.0 (left) to 1.0 (right); `None` plays unpanned.
    pub pan: Option<f32>,
}

impl VoiceMix {
    /// Fixed gain, no panning.
    pub fn fixed(gain: f32) -> Self {
        Self { gain, pan: None }
    }

    /// Draws a randomized event mix: gain uniform in
    /// `[MIN_EVENT_GAIN, MAX_EVENT_GAIN]`, pan uniform in `[-1, 1]` when
    /// `spatial` is set.
    pub fn randomized<R: Rng>(rng: &mut R, spatial: bool) -> Self {
        Self {
            gain: rng.gen_range(MIN_EVENT_GAIN..=MAX_EVENT_GAIN),
            pan: spatial.then(|| rng.gen_range(-1.0..=1.0)),
        }
    }

    /// Equal-power left/right channel gains for this mix.
    pub fn channel_gains(&self) -> [f32; 2] {
        match self.pan {
            None => [1.0, 1.0],
            Some(pan) => {
                let angle = (pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
                [angle.cos(), angle.sin()]
            }
        }
    }
}

/// What the output device can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputCapabilities {
    /// The device has at least two output channels, so per-voice stereo
    /// positioning is audible.
    pub stereo_panning: bool,
}

/// One playing sound owned by a playback engine.
pub trait Voice: Send {
    /// Stops playback. Must be harmless if the voice already finished.
    fn stop(&mut self);

    /// Returns true once the voice has nothing left to play.
    fn is_finished(&self) -> bool;
}

/// Platform audio capabilities used by the playback engines.
pub trait AudioOutput: Send + Sync + 'static {
    /// Opens the output device. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::DeviceUnavailable`] if no device can be opened.
    fn open(&self) -> Result<(), AudioError>;

    /// Returns true once `open` has succeeded.
    fn is_open(&self) -> bool;

    /// Reports device capabilities without opening a stream.
    fn capabilities(&self) -> OutputCapabilities;

    /// Reads and decodes an asset into a reusable buffer.
    fn decode(&self, asset: &AssetHandle) -> Result<SampleBuffer, AudioError>;

    /// Plays a decoded buffer.
    ///
    /// `on_end` is called once the buffer has played through, if the
    /// backend [signals completion](Self::signals_completion). Looped
    /// voices never complete on their own.
    fn play_buffer(
        &self,
        buffer: &SampleBuffer,
        mix: VoiceMix,
        looped: bool,
        on_end: Option<CompletionHook>,
    ) -> Result<Box<dyn Voice>, AudioError>;

    /// Streams an asset from its source, looping indefinitely.
    fn play_stream(&self, asset: &AssetHandle, volume: f32) -> Result<Box<dyn Voice>, AudioError>;

    /// Whether `play_buffer` delivers `on_end`. When it does not, engines
    /// release voices after a fixed timeout instead.
    fn signals_completion(&self) -> bool {
        true
    }
}
