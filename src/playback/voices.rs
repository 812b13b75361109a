//! Tracking of playing voices.
//!
//! Every voice an engine starts lives in exactly one [`VoiceSet`] until it
//! finishes naturally or the engine stops it.

use crate::audio::Voice;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

/// Voices keyed by `K`, owned by a playback engine.
pub(crate) struct VoiceSet<K> {
    voices: Mutex<HashMap<K, Box<dyn Voice>>>,
}

impl<K: Eq + Hash> VoiceSet<K> {
    pub(crate) fn new() -> Self {
        Self {
            voices: Mutex::new(HashMap::new()),
        }
    }

    /// Starts tracking `voice`, stopping any voice already held under `key`.
    ///
    /// Voices that already finished are swept out first; a voice that
    /// finished before it could be registered is dropped instead of tracked.
    /// Returns whether the voice is now tracked.
    pub(crate) fn insert(&self, key: K, mut voice: Box<dyn Voice>) -> bool {
        let mut voices = self.voices.lock().unwrap_or_else(PoisonError::into_inner);
        voices.retain(|_, v| !v.is_finished());
        if voice.is_finished() {
            voice.stop();
            return false;
        }
        if let Some(mut previous) = voices.insert(key, voice) {
            previous.stop();
        }
        true
    }

    /// Stops and forgets the voice under `key`. Returns false if it was not
    /// tracked (already released or stopped).
    pub(crate) fn release(&self, key: &K) -> bool {
        let removed = self
            .voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(mut voice) => {
                voice.stop();
                true
            }
            None => false,
        }
    }

    /// Stops every tracked voice and clears the set. Returns how many were
    /// stopped.
    pub(crate) fn stop_all(&self) -> usize {
        let drained: Vec<Box<dyn Voice>> = self
            .voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, voice)| voice)
            .collect();
        let count = drained.len();
        for mut voice in drained {
            voice.stop();
        }
        count
    }

    /// Number of tracked voices.
    pub(crate) fn len(&self) -> usize {
        self.voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
