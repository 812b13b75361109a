//! Soundscape data model.
//!
//! Field names serialize in camelCase (`baseLayers`, `minDelay`, ...) so that
//! soundscape definitions written for other front ends load unchanged.

use crate::error::SoundscapeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A candidate transient sound.
///
/// `weight` is an unnormalized relative likelihood. `min_delay`/`max_delay`
/// (milliseconds) bound the wait before this event fires once chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioEvent {
    /// Identifier, also the asset key.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Relative selection weight (>= 0).
    pub weight: f64,

    /// Lower bound of the pre-fire delay in milliseconds.
    pub min_delay: u64,

    /// Upper bound of the pre-fire delay in milliseconds.
    pub max_delay: u64,

    /// Carried for compatibility with existing definitions; playback ignores it.
    #[serde(default, rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looped: Option<bool>,
}

impl AudioEvent {
    /// Creates an event with the given weight and delay range (milliseconds).
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        weight: f64,
        min_delay: u64,
        max_delay: u64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weight,
            min_delay,
            max_delay,
            looped: None,
        }
    }
}

/// A continuously looping background layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLayer {
    /// Identifier, also the asset key.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Optional per-layer volume (0.0 to 1.0). The engine's ambient-bed
    /// level is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
}

impl BaseLayer {
    /// Creates a base layer using the default ambient-bed volume.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            volume: None,
        }
    }

    /// Returns this layer's playback volume, falling back to `default`.
    pub fn volume_or(&self, default: f32) -> f32 {
        self.volume.map(|v| v.clamp(0.0, 1.0)).unwrap_or(default)
    }
}

/// An ambient scene: base layers plus candidate events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Soundscape {
    /// Identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Continuously looping layers.
    #[serde(default)]
    pub base_layers: Vec<BaseLayer>,

    /// Candidate foreground events.
    #[serde(default)]
    pub events: Vec<AudioEvent>,
}

impl Soundscape {
    /// Creates an empty soundscape.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_layers: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Adds a base layer (builder style).
    pub fn with_base_layer(mut self, layer: BaseLayer) -> Self {
        self.base_layers.push(layer);
        self
    }

    /// Adds an event (builder style).
    pub fn with_event(mut self, event: AudioEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Sum of all event weights.
    pub fn total_weight(&self) -> f64 {
        self.events.iter().map(|e| e.weight).sum()
    }

    /// Ids of every asset this soundscape references (base layers first).
    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.base_layers
            .iter()
            .map(|l| l.id.as_str())
            .chain(self.events.iter().map(|e| e.id.as_str()))
    }

    /// Checks the structural invariants of the soundscape.
    ///
    /// Base-layer ids and event ids must each be unique (the two sets are
    /// not cross-checked). Weights must be finite and non-negative, and each
    /// delay range must satisfy `min_delay <= max_delay`.
    ///
    /// A zero total weight or an empty event list is accepted: scheduling
    /// simply never fires.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), SoundscapeError> {
        let mut seen = HashSet::new();
        for layer in &self.base_layers {
            if !seen.insert(layer.id.as_str()) {
                return Err(SoundscapeError::DuplicateBaseLayer(layer.id.clone()));
            }
        }

        let mut seen = HashSet::new();
        for event in &self.events {
            if !seen.insert(event.id.as_str()) {
                return Err(SoundscapeError::DuplicateEvent(event.id.clone()));
            }
            if !event.weight.is_finite() || event.weight < 0.0 {
                return Err(SoundscapeError::InvalidWeight {
                    id: event.id.clone(),
                    weight: event.weight,
                });
            }
            if event.min_delay > event.max_delay {
                return Err(SoundscapeError::InvalidDelayRange {
                    id: event.id.clone(),
                    min: event.min_delay,
                    max: event.max_delay,
                });
            }
        }

        Ok(())
    }
}
