//! Application configuration.
//!
//! A config file is optional. Without one the built-in South Lake Union
//! soundscape plays from `assets/<id>.mp3`.
//!
//! ```json
//! {
//!   "soundscape": { "id": "night", "name": "Night", "baseLayers": [...], "events": [...] },
//!   "assets": { "owl": "sounds/owl.ogg" },
//!   "assetDir": "sounds",
//!   "intensity": 0.5,
//!   "backend": "streaming"
//! }
//! ```

use crate::engine::BackendPreference;
use crate::playback::DEFAULT_ENGINE_INTENSITY;
use crate::soundscape::{south_lake_union, AssetMap, Soundscape, PRESET_ASSET_EXTENSION};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory searched for `<id>.<ext>` assets when nothing else is set.
pub const DEFAULT_ASSET_DIR: &str = "assets";

fn default_intensity() -> f32 {
    DEFAULT_ENGINE_INTENSITY
}

/// Everything needed to build and drive the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Soundscape to play; the built-in preset when absent.
    #[serde(default)]
    pub soundscape: Option<Soundscape>,
    /// Explicit asset paths by base-layer/event id.
    #[serde(default)]
    pub assets: BTreeMap<String, PathBuf>,
    /// Directory holding `<id>.mp3` files for ids without an explicit path.
    #[serde(default)]
    pub asset_dir: Option<PathBuf>,
    #[serde(default = "default_intensity")]
    pub intensity: f32,
    #[serde(default)]
    pub backend: BackendPreference,
    /// Directory relative paths resolve against (the config file's).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            soundscape: None,
            assets: BTreeMap::new(),
            asset_dir: None,
            intensity: default_intensity(),
            backend: BackendPreference::default(),
            base_dir: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Parses a config from JSON. Relative paths resolve against the
    /// working directory.
    ///
    /// # Errors
    ///
    /// Returns error if parsing fails
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a config file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or if its
    /// soundscape is malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::from_json(&json)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        if let Some(soundscape) = &config.soundscape {
            soundscape
                .validate()
                .with_context(|| format!("Invalid soundscape in {}", path.display()))?;
        }
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// The soundscape to play.
    pub fn soundscape(&self) -> Soundscape {
        self.soundscape.clone().unwrap_or_else(south_lake_union)
    }

    /// Resolves every asset of the configured soundscape.
    ///
    /// Ids listed in `assets` use that path; all others fall back to
    /// `<asset_dir>/<id>.mp3`.
    pub fn asset_map(&self) -> AssetMap {
        let soundscape = self.soundscape();
        let dir = self.resolve(
            self.asset_dir
                .as_deref()
                .unwrap_or_else(|| Path::new(DEFAULT_ASSET_DIR)),
        );
        let mut map = AssetMap::from_directory(&dir, soundscape.asset_ids(), PRESET_ASSET_EXTENSION);
        for (id, path) in &self.assets {
            map.insert(id.as_str(), self.resolve(path));
        }
        map
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
