//! Playback engines.
//!
//! A playback engine owns every physical audio resource of a running
//! soundscape: the looping base layers, the decoded buffers and the
//! transient event voices. It translates caller lifecycle calls and
//! scheduler firings into backend operations, and guarantees nothing keeps
//! playing after `stop`.
//!
//! Two backends implement [`PlaybackEngine`]:
//! - [`BufferGraphEngine`] decodes everything up front and plays base
//!   layers and events from buffers
//! - [`StreamingEngine`] streams base layers from their source and decodes
//!   only event sounds

mod buffer_graph;
mod shared;
mod streaming;
mod voices;

pub use buffer_graph::BufferGraphEngine;
pub use streaming::StreamingEngine;

use crate::error::EngineError;
use crate::soundscape::Soundscape;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Volume of base layers without their own `volume`.
pub const BASE_LAYER_VOLUME: f32 = 0.3;

/// Intensity an engine uses until `set_options` supplies one.
pub const DEFAULT_ENGINE_INTENSITY: f32 = 0.7;

/// Minimum time before an event voice is released when the backend does
/// not report completion.
pub const CLEANUP_FALLBACK: Duration = Duration::from_secs(3);

/// Which backend implementation an engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Everything decoded into buffers; per-voice gain and pan.
    BufferGraph,
    /// Base layers streamed from source; events from buffers.
    Streaming,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::BufferGraph => write!(f, "buffer graph"),
            BackendKind::Streaming => write!(f, "streaming"),
        }
    }
}

/// Runtime options accepted by [`PlaybackEngine::set_options`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineOptions {
    /// New intensity; the scheduler clamps it to `[0.1, 1.0]`.
    pub intensity: Option<f32>,
}

impl EngineOptions {
    /// Options that only change intensity.
    pub fn intensity(value: f32) -> Self {
        Self {
            intensity: Some(value),
        }
    }
}

/// Lifecycle contract shared by every backend and the facade.
#[async_trait]
pub trait PlaybackEngine: Send + Sync {
    /// The backend behind this engine.
    fn kind(&self) -> BackendKind;

    /// Prepares the backend: opens the output device and loads the current
    /// soundscape's assets if one is set. Idempotent; cached assets are not
    /// decoded again.
    ///
    /// # Errors
    ///
    /// Fails if the output device cannot be opened.
    async fn init(&self) -> Result<(), EngineError>;

    /// Starts base layers and the event scheduler. No-op while running.
    async fn start(&self);

    /// Stops the scheduler and releases every base layer and voice. No-op
    /// while stopped.
    async fn stop(&self);

    /// Applies options. Intensity takes effect at the next scheduled delay.
    fn set_options(&self, options: EngineOptions);

    /// Replaces the current soundscape and preloads its assets. Does not
    /// start or stop playback. Individual asset failures are logged and
    /// skipped.
    ///
    /// A running engine keeps playing the previous soundscape's base layers
    /// and schedule; the new one is heard after the next `stop` and `start`.
    ///
    /// # Errors
    ///
    /// Fails if the soundscape is malformed or loading cannot run at all.
    async fn set_soundscape(&self, soundscape: Soundscape) -> Result<(), EngineError>;

    /// Whether the engine is between a `start` and the next `stop`.
    fn is_running(&self) -> bool;

    /// Last intensity supplied through `set_options`.
    fn intensity(&self) -> f32;

    /// The current soundscape, if any.
    fn soundscape(&self) -> Option<Arc<Soundscape>>;

    /// Event voices currently tracked.
    fn active_voices(&self) -> usize;

    /// Base layers currently playing.
    fn active_base_layers(&self) -> usize;

    /// Events fired by the scheduler since the engine was created.
    fn events_fired(&self) -> u64;
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::soundscape::{AssetHandle, AssetMap, AudioEvent, BaseLayer, Soundscape};

    /// Two base layers and two short-delay events.
    pub fn soundscape() -> Soundscape {
        Soundscape::new("test", "Test")
            .with_base_layer(BaseLayer::new("wind", "Wind"))
            .with_base_layer(BaseLayer::new("water", "Water"))
            .with_event(AudioEvent::new("footsteps", "Footsteps", 0.7, 100, 200))
            .with_event(AudioEvent::new("bikes", "Bikes", 0.3, 100, 200))
    }

    /// Maps every asset id of `soundscape` to embedded bytes spelling the id,
    /// which the fake output uses as the asset's label.
    pub fn assets_for(soundscape: &Soundscape) -> AssetMap {
        soundscape
            .asset_ids()
            .map(|id| (id.to_string(), AssetHandle::from(id.as_bytes().to_vec())))
            .collect()
    }
}
