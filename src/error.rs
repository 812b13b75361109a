//! Error types.
//!
//! Per-asset and per-voice failures are absorbed inside the playback
//! engines and only logged. The variants here cover what may still reach a
//! caller: device setup in `init` and soundscape validation in
//! `set_soundscape`.

use thiserror::Error;

/// Failures reported by an audio backend.
#[derive(Debug, Error)]
pub enum AudioError {
    /// No output device could be opened.
    #[error("audio output unavailable: {0}")]
    DeviceUnavailable(String),

    /// An operation needed the output device before `open` succeeded.
    #[error("audio output is not open")]
    NotOpen,

    /// The asset could not be read.
    #[error("failed to read asset {asset}: {source}")]
    Unreadable {
        asset: String,
        #[source]
        source: std::io::Error,
    },

    /// The asset was read but could not be decoded.
    #[error("failed to decode asset {asset}: {reason}")]
    Decode { asset: String, reason: String },

    /// The backend refused to start a voice.
    #[error("playback rejected: {0}")]
    Playback(String),
}

/// Structural problems in a soundscape definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoundscapeError {
    #[error("duplicate base layer id: {0}")]
    DuplicateBaseLayer(String),

    #[error("duplicate event id: {0}")]
    DuplicateEvent(String),

    #[error("event {id} has invalid weight {weight}")]
    InvalidWeight { id: String, weight: f64 },

    #[error("event {id} has minDelay {min} greater than maxDelay {max}")]
    InvalidDelayRange { id: String, min: u64, max: u64 },
}

/// Errors surfaced by the engine facade.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Device setup failed; the engine cannot play anything.
    #[error(transparent)]
    Audio(#[from] AudioError),

    /// The supplied soundscape is malformed.
    #[error("invalid soundscape: {0}")]
    Soundscape(#[from] SoundscapeError),

    /// A background loading task failed to complete.
    #[error("background task failed: {0}")]
    Task(String),
}
