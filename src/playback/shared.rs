//! State and operations shared by every playback backend.
//!
//! Backends differ only in how base layers are loaded and started; the
//! soundscape, decoded buffers, event voices, running flag and scheduler
//! wiring all live here.

use super::voices::VoiceSet;
use super::{EngineOptions, CLEANUP_FALLBACK, DEFAULT_ENGINE_INTENSITY};
use crate::audio::{AudioOutput, CompletionHook, SampleBuffer, Voice, VoiceMix};
use crate::error::{AudioError, EngineError};
use crate::scheduler::EventScheduler;
use crate::soundscape::{AssetHandle, AssetMap, AudioEvent, Soundscape};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub(crate) struct EngineCore {
    pub(crate) output: Arc<dyn AudioOutput>,
    assets: AssetMap,
    /// Whether event voices get a random stereo position.
    spatial: bool,
    running: AtomicBool,
    /// Held for the whole of `start` and `stop` so they never interleave.
    lifecycle: Mutex<()>,
    /// Caller-supplied intensity as `f32` bits (unclamped; the scheduler clamps).
    intensity: AtomicU32,
    soundscape: Mutex<Option<Arc<Soundscape>>>,
    buffers: Mutex<HashMap<String, SampleBuffer>>,
    voices: Arc<VoiceSet<Uuid>>,
    pub(crate) base_layers: VoiceSet<String>,
    scheduler: EventScheduler,
}

impl EngineCore {
    pub(crate) fn new(output: Arc<dyn AudioOutput>, assets: AssetMap) -> Self {
        let spatial = output.capabilities().stereo_panning;
        Self {
            output,
            assets,
            spatial,
            running: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            intensity: AtomicU32::new(DEFAULT_ENGINE_INTENSITY.to_bits()),
            soundscape: Mutex::new(None),
            buffers: Mutex::new(HashMap::new()),
            voices: Arc::new(VoiceSet::new()),
            base_layers: VoiceSet::new(),
            scheduler: EventScheduler::new(),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn intensity(&self) -> f32 {
        f32::from_bits(self.intensity.load(Ordering::Relaxed))
    }

    pub(crate) fn set_options(&self, options: EngineOptions) {
        if let Some(intensity) = options.intensity {
            self.intensity.store(intensity.to_bits(), Ordering::Relaxed);
            self.scheduler.set_intensity(intensity);
        }
    }

    pub(crate) fn soundscape(&self) -> Option<Arc<Soundscape>> {
        self.soundscape
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validates and stores a new current soundscape. Playback is untouched.
    pub(crate) fn replace_soundscape(
        &self,
        soundscape: Soundscape,
    ) -> Result<Arc<Soundscape>, EngineError> {
        soundscape.validate()?;
        let soundscape = Arc::new(soundscape);
        *self
            .soundscape
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&soundscape));
        info!(
            soundscape = %soundscape.id,
            layers = soundscape.base_layers.len(),
            events = soundscape.events.len(),
            "Soundscape set"
        );
        Ok(soundscape)
    }

    pub(crate) fn asset(&self, id: &str) -> Option<&AssetHandle> {
        self.assets.get(id)
    }

    pub(crate) fn buffer(&self, id: &str) -> Option<SampleBuffer> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Opens the output device, reporting failure to the caller.
    pub(crate) fn open_output(&self) -> Result<(), EngineError> {
        self.output.open().map_err(EngineError::from)
    }

    /// Opens the output device if needed; failure is logged, not returned.
    pub(crate) fn ensure_output(&self) {
        if let Err(e) = self.output.open() {
            warn!(error = %e, "Audio output unavailable; playback will be silent");
        }
    }

    /// Decodes every listed asset that is not cached yet.
    ///
    /// Decoding runs off the async runtime, in parallel. An id that does
    /// not resolve or fails to decode is logged and skipped.
    pub(crate) async fn load_buffers<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), EngineError> {
        let jobs: Vec<(String, AssetHandle)> = {
            let cached = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
            let mut jobs: Vec<(String, AssetHandle)> = Vec::new();
            for id in ids {
                if cached.contains_key(id) || jobs.iter().any(|(queued, _)| queued == id) {
                    continue;
                }
                match self.assets.get(id) {
                    Some(handle) => jobs.push((id.to_string(), handle.clone())),
                    None => warn!(asset = id, "No asset registered; skipping"),
                }
            }
            jobs
        };

        if jobs.is_empty() {
            return Ok(());
        }

        let output = Arc::clone(&self.output);
        let decoded = tokio::task::spawn_blocking(move || {
            jobs.into_par_iter()
                .map(|(id, handle)| {
                    let result = output.decode(&handle);
                    (id, result)
                })
                .collect::<Vec<(String, Result<SampleBuffer, AudioError>)>>()
        })
        .await
        .map_err(|e| EngineError::Task(e.to_string()))?;

        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, result) in decoded {
            match result {
                Ok(buffer) => {
                    debug!(asset = %id, duration_ms = buffer.duration().as_millis() as u64, "Decoded asset");
                    buffers.insert(id, buffer);
                }
                Err(e) => warn!(asset = %id, error = %e, "Failed to load audio"),
            }
        }
        Ok(())
    }

    /// Records a base layer whose playback was attempted.
    pub(crate) fn track_base_layer(&self, id: &str, result: Result<Box<dyn Voice>, AudioError>) {
        match result {
            Ok(voice) => {
                self.base_layers.insert(id.to_string(), voice);
                debug!(layer = id, "Base layer started");
            }
            Err(e) => warn!(layer = id, error = %e, "Failed to play base layer"),
        }
    }

    /// Starts playback of the current soundscape. No-op while running.
    ///
    /// `start_layers` starts and tracks the backend's base layers. A `stop`
    /// issued meanwhile waits for this to return, so it always sees every
    /// layer started here.
    pub(crate) fn start(self: &Arc<Self>, start_layers: impl FnOnce(&Self, &Soundscape)) {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("Already running");
            return;
        }
        self.ensure_output();

        let Some(soundscape) = self.soundscape() else {
            info!("Started without a soundscape");
            return;
        };

        // Drop anything a previous run might have left behind.
        self.base_layers.stop_all();
        start_layers(self.as_ref(), &soundscape);
        self.start_scheduler(soundscape.events.clone());
        info!(
            soundscape = %soundscape.id,
            layers = self.base_layers.len(),
            "Playback started"
        );
    }

    /// Points the scheduler at this engine and starts it over `events`.
    fn start_scheduler(self: &Arc<Self>, events: Vec<AudioEvent>) {
        self.scheduler.set_intensity(self.intensity());

        let core = Arc::downgrade(self);
        self.scheduler.set_event_callback(move |event: AudioEvent| {
            let core = core.clone();
            async move {
                if let Some(core) = core.upgrade() {
                    core.play_event(&event.id);
                }
            }
        });
        self.scheduler.start(events);
    }

    /// Plays one event voice with a randomized mix.
    ///
    /// A missing buffer is not an error: the event is silently skipped.
    pub(crate) fn play_event(&self, id: &str) {
        if !self.is_running() {
            return;
        }
        let Some(buffer) = self.buffer(id) else {
            debug!(event = id, "No buffer for event; skipping");
            return;
        };

        let voice_id = Uuid::new_v4();
        let mix = VoiceMix::randomized(&mut rand::thread_rng(), self.spatial);
        let hook = completion_hook(Arc::downgrade(&self.voices), voice_id);

        let voice = match self.output.play_buffer(&buffer, mix, false, Some(hook)) {
            Ok(voice) => voice,
            Err(e) => {
                warn!(event = id, error = %e, "Failed to play event");
                return;
            }
        };

        if !self.voices.insert(voice_id, voice) {
            return;
        }
        // Lost a race with stop(): nothing may stay tracked after it.
        if !self.is_running() {
            self.voices.release(&voice_id);
            return;
        }

        debug!(event = id, %voice_id, gain = mix.gain, pan = ?mix.pan, "Event voice started");

        if !self.output.signals_completion() {
            let wait = buffer.duration().max(CLEANUP_FALLBACK);
            release_after(Arc::downgrade(&self.voices), voice_id, wait);
        }
    }

    /// Stops the scheduler and every base layer and event voice.
    pub(crate) fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.scheduler.stop();
        let layers = self.base_layers.stop_all();
        let voices = self.voices.stop_all();
        if was_running {
            info!(layers, voices, "Playback stopped");
        }
    }

    pub(crate) fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub(crate) fn firings(&self) -> u64 {
        self.scheduler.firings()
    }
}

impl Drop for EngineCore {
    fn drop(&mut self) {
        // The schedule loop only holds a weak reference to us.
        self.scheduler.stop();
    }
}

/// Builds the hook that untracks a voice when the backend reports its end.
fn completion_hook(voices: Weak<VoiceSet<Uuid>>, voice_id: Uuid) -> CompletionHook {
    Box::new(move || {
        if let Some(voices) = voices.upgrade() {
            if voices.release(&voice_id) {
                debug!(%voice_id, "Event voice finished");
            }
        }
    })
}

/// Untracks a voice after `wait`, for backends without completion signals.
fn release_after(voices: Weak<VoiceSet<Uuid>>, voice_id: Uuid, wait: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        if let Some(voices) = voices.upgrade() {
            if voices.release(&voice_id) {
                debug!(%voice_id, "Event voice released after timeout");
            }
        }
    });
}
