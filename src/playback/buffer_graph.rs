//! Buffer-graph playback backend.
//!
//! Every asset of the current soundscape, base layers included, is decoded
//! into a [`SampleBuffer`](crate::audio::SampleBuffer) ahead of playback.
//! Base layers loop from their buffers at a fixed volume; events play as
//! one-shot voices with a random gain and stereo position.

use super::shared::EngineCore;
use super::{BackendKind, EngineOptions, PlaybackEngine, BASE_LAYER_VOLUME};
use crate::audio::{AudioOutput, VoiceMix};
use crate::error::{AudioError, EngineError};
use crate::soundscape::{AssetMap, Soundscape};
use async_trait::async_trait;
use std::sync::Arc;

/// Playback engine that decodes every asset into memory.
pub struct BufferGraphEngine {
    core: Arc<EngineCore>,
}

impl BufferGraphEngine {
    /// Creates a stopped engine resolving assets through `assets`.
    pub fn new(output: Arc<dyn AudioOutput>, assets: AssetMap) -> Self {
        Self {
            core: Arc::new(EngineCore::new(output, assets)),
        }
    }

    /// Loads every base layer and event of `soundscape`.
    async fn load(&self, soundscape: &Soundscape) -> Result<(), EngineError> {
        self.core.load_buffers(soundscape.asset_ids()).await
    }
}

/// Starts one looping voice per base layer from its decoded buffer.
fn start_base_layers(core: &EngineCore, soundscape: &Soundscape) {
    for layer in &soundscape.base_layers {
        let result = match core.buffer(&layer.id) {
            Some(buffer) => core.output.play_buffer(
                &buffer,
                VoiceMix::fixed(layer.volume_or(BASE_LAYER_VOLUME)),
                true,
                None,
            ),
            None => Err(AudioError::Playback("asset not loaded".to_string())),
        };
        core.track_base_layer(&layer.id, result);
    }
}

#[async_trait]
impl PlaybackEngine for BufferGraphEngine {
    fn kind(&self) -> BackendKind {
        BackendKind::BufferGraph
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
