//! ambientui - procedurally varying ambient soundscapes in the terminal.
//!
//! A soundscape is a set of continuously looping base layers plus
//! candidate foreground events. The [`EventScheduler`] picks events by
//! weight and fires them after random, intensity-scaled delays; a
//! [`PlaybackEngine`] turns those firings into short-lived voices on top of
//! the looping bed. [`EngineFactory`] selects the backend once from what
//! the audio output supports.

pub mod app;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod scheduler;
pub mod soundscape;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::{AudioOutput, RodioOutput};
pub use config::AppConfig;
pub use engine::{BackendKind, BackendPreference, EngineFactory, SharedEngine};
pub use error::{AudioError, EngineError, SoundscapeError};
pub use playback::{EngineOptions, PlaybackEngine};
pub use scheduler::EventScheduler;
pub use soundscape::{AssetHandle, AssetMap, AudioEvent, BaseLayer, Soundscape};
