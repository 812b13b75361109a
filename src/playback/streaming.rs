//! Streaming playback backend.
//!
//! Base layers are long ambient beds, so they are streamed from their
//! source and looped by the decoder instead of held in memory. Only event
//! sounds are decoded ahead of time.

use super::shared::EngineCore;
use super::{BackendKind, EngineOptions, PlaybackEngine, BASE_LAYER_VOLUME};
use crate::audio::AudioOutput;
use crate::error::{AudioError, EngineError};
use crate::soundscape::{AssetMap, Soundscape};
use async_trait::async_trait;
use std::sync::Arc;

/// Playback engine that streams base layers.
pub struct StreamingEngine {
    core: Arc<EngineCore>,
}

impl StreamingEngine {
    /// Creates a stopped engine resolving assets through `assets`.
    pub fn new(output: Arc<dyn AudioOutput>, assets: AssetMap) -> Self {
        Self {
            core: Arc::new(EngineCore::new(output, assets)),
        }
    }

    /// Decodes the event sounds of `soundscape`.
    async fn load(&self, soundscape: &Soundscape) -> Result<(), EngineError> {
        self.core
            .load_buffers(soundscape.events.iter().map(|e| e.id.as_str()))
            .await
    }
}

fn start_base_layers(core: &EngineCore, soundscape: &Soundscape) {
    for layer in &soundscape.base_layers {
        let result = match core.asset(&layer.id) {
            Some(asset) => core
                .output
                .play_stream(asset, layer.volume_or(BASE_LAYER_VOLUME)),
            None => Err(AudioError::Playback("no asset registered".to_string())),
        };
        core.track_base_layer(&layer.id, result);
    }
}

#[async_trait]
impl PlaybackEngine for StreamingEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::Streaming
    }

    async fn init(&self) -> Result<(), EngineError> {
        self.core.open_output()?;
        if let Some(soundscape) = self.core.soundscape() {
            self.load(&soundscape).await?;
        }
        Ok(())
    }

    async fn start(&self) {
        self.core.start(start_base_layers);
    }

    async fn stop(&self) {
        self.core.stop();
    }

    fn set_options(&self, options: EngineOptions) {
        self.core.set_options(options);
    }

    async fn set_soundscape(&self, soundscape: Soundscape) -> Result<(), EngineError> {
        let soundscape = self.core.replace_soundscape(soundscape)?;
        self.load(&soundscape).await
    }

    fn is_running(&self) -> bool {
        self.core.is_running()
    }

    fn intensity(&self) -> f32 {
        self.core.intensity()
    }

    fn soundscape(&self) -> Option<Arc<Soundscape>> {
        self.core.soundscape()
    }

    fn active_voices(&self) -> usize {
        self.core.active_voices()
    }

    fn active_base_layers(&self) -> usize {
        self.core.base_layers.len()
    }

    fn events_fired(&self) -> u64 {
        self.core.firings()
    }
}
