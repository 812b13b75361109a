//! Engine facade.
//!
//! Chooses a playback backend once, from what the audio output can do, and
//! hands every caller the same instance afterwards. The factory is an
//! explicit value rather than a global: whoever owns it owns the engine.

use crate::audio::{AudioOutput, OutputCapabilities, RodioOutput};
use crate::playback::{BufferGraphEngine, PlaybackEngine, StreamingEngine};
use crate::soundscape::AssetMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

pub use crate::playback::BackendKind;

/// Shared handle to the selected engine.
pub type SharedEngine = Arc<dyn PlaybackEngine>;

/// Which backend the caller wants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    /// Buffer graph if the output can position voices in stereo,
    /// streaming otherwise.
    #[default]
    Auto,
    #[serde(alias = "buffer")]
    BufferGraph,
    #[serde(alias = "stream")]
    Streaming,
}

impl BackendPreference {
    /// Resolves the preference against the output's capabilities.
    pub fn resolve(self, capabilities: OutputCapabilities) -> BackendKind {
        match self {
            BackendPreference::BufferGraph => BackendKind::BufferGraph,
            BackendPreference::Streaming => BackendKind::Streaming,
            BackendPreference::Auto if capabilities.stereo_panning => BackendKind::BufferGraph,
            BackendPreference::Auto => BackendKind::Streaming,
        }
    }
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "buffer" | "buffer-graph" => Ok(BackendPreference::BufferGraph),
            "stream" | "streaming" => Ok(BackendPreference::Streaming),
            other => Err(format!(
                "unknown backend '{}' (expected auto, buffer or streaming)",
                other
            )),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::BufferGraph => write!(f, "buffer"),
            BackendPreference::Streaming => write!(f, "streaming"),
        }
    }
}

/// Creates and memoizes the playback engine.
pub struct EngineFactory {
    output: Arc<dyn AudioOutput>,
    assets: AssetMap,
    preference: BackendPreference,
    instance: Mutex<Option<SharedEngine>>,
}

impl EngineFactory {
    /// Creates a factory over the given output. No engine exists until
    /// [`engine`](Self::engine) is first called.
    pub fn new(output: Arc<dyn AudioOutput>, assets: AssetMap, preference: BackendPreference) -> Self {
        Self {
            output,
            assets,
            preference,
            instance: Mutex::new(None),
        }
    }

    /// Creates a factory over the system's default audio device.
    pub fn with_default_output(assets: AssetMap, preference: BackendPreference) -> Self {
        Self::new(Arc::new(RodioOutput::new()), assets, preference)
    }

    /// Returns the engine, creating it on first use.
    ///
    /// Backend selection happens exactly once; later calls return the same
    /// instance until [`reset`](Self::reset).
    pub fn engine(&self) -> SharedEngine {
        let mut instance = self.instance.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = instance.as_ref() {
            return Arc::clone(engine);
        }

        let capabilities = self.output.capabilities();
        let kind = self.preference.resolve(capabilities);
        let engine: SharedEngine = match kind {
            BackendKind::BufferGraph => Arc::new(BufferGraphEngine::new(
                Arc::clone(&self.output),
                self.assets.clone(),
            )),
            BackendKind::Streaming => Arc::new(StreamingEngine::new(
                Arc::clone(&self.output),
                self.assets.clone(),
            )),
        };
        info!(
            backend = %kind,
            preference = %self.preference,
            stereo = capabilities.stereo_panning,
            assets = self.assets.len(),
            "Selected playback backend"
        );
        if self.assets.is_empty() {
            warn!("No assets registered; playback will be silent");
        }

        *instance = Some(Arc::clone(&engine));
        engine
    }

    /// Returns the engine if one was created.
    pub fn current(&self) -> Option<SharedEngine> {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forgets the current engine so the next [`engine`](Self::engine) call
    /// selects again. The caller stops the returned engine if it still
    /// plays.
    pub fn reset(&self) -> Option<SharedEngine> {
        self.instance
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Replaces the asset map used by engines created from now on.
    pub fn set_assets(&mut self, assets: AssetMap) {
        self.assets = assets;
    }

    /// The configured backend preference.
    pub fn preference(&self) -> BackendPreference {
        self.preference
    }
}
