//! Application state for the terminal front end.
//!
//! Holds the engine handle, the soundscape being played, the intensity
//! slider and the transient status line. Key handling in `main` calls the
//! methods here; rendering reads the public fields.

use crate::engine::SharedEngine;
use crate::error::EngineError;
use crate::playback::EngineOptions;
use crate::scheduler::{clamp_intensity, MAX_INTENSITY, MIN_INTENSITY};
use crate::soundscape::Soundscape;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Change applied by one intensity key press.
pub const INTENSITY_STEP: f32 = 0.1;

/// How long a status message stays visible.
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Main application state.
pub struct App {
    engine: SharedEngine,
    soundscape: Soundscape,
    /// Slider value in `[0.1, 1.0]`.
    pub intensity: f32,
    /// Whether `init` and `set_soundscape` have completed.
    initialized: bool,
    /// Temporary status message with timestamp.
    pub status_message: Option<(String, Instant)>,
    /// The last failure reported by the engine; cleared by a successful start.
    pub last_error: Option<String>,
    pub should_quit: bool,
}

impl App {
    /// Creates the app. Nothing is loaded until the first start.
    pub fn new(engine: SharedEngine, soundscape: Soundscape, intensity: f32) -> Self {
        Self {
            engine,
            soundscape,
            intensity: round_step(clamp_intensity(intensity)),
            initialized: false,
            status_message: None,
            last_error: None,
            should_quit: false,
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn soundscape(&self) -> &Soundscape {
        &self.soundscape
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Starts playback, preparing the engine on first use.
    pub async fn start(&mut self) {
        if self.engine.is_running() {
            return;
        }
        if !self.initialized {
            if let Err(e) = self.prepare().await {
                error!(error = %e, "Failed to prepare playback");
                self.last_error = Some(e.to_string());
                self.set_status("Could not start playback");
                return;
            }
            self.initialized = true;
        }

        self.engine.set_options(EngineOptions::intensity(self.intensity));
        self.engine.start().await;
        self.last_error = None;
        self.set_status(format!("Playing {}", self.soundscape.name));
    }

    async fn prepare(&self) -> Result<(), EngineError> {
        self.engine.init().await?;
        self.engine.set_soundscape(self.soundscape.clone()).await?;
        info!(soundscape = %self.soundscape.id, backend = %self.engine.kind(), "Engine ready");
        Ok(())
    }

    /// Stops playback.
    pub async fn stop(&mut self) {
        if !self.engine.is_running() {
            return;
        }
        self.engine.stop().await;
        self.set_status("Stopped");
    }

    /// Starts if stopped, stops if running.
    pub async fn toggle(&mut self) {
        if self.engine.is_running() {
            self.stop().await;
        } else {
            self.start().await;
        }
    }

    /// Moves the intensity slider by `steps` increments.
    ///
    /// The new value is forwarded to the engine right away while playing;
    /// otherwise it is applied on the next start.
    pub fn adjust_intensity(&mut self, steps: i32) {
        let target = self.intensity + steps as f32 * INTENSITY_STEP;
        let intensity = round_step(target.clamp(MIN_INTENSITY, MAX_INTENSITY));
        if intensity == self.intensity {
            return;
        }
        self.intensity = intensity;
        if self.engine.is_running() {
            self.engine.set_options(EngineOptions::intensity(intensity));
        }
        self.set_status(format!("Intensity {:.0}%", intensity * 100.0));
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
            }
        }
    }
}

/// Snaps to the slider's 0.1 grid.
fn round_step(value: f32) -> f32 {
    (value / INTENSITY_STEP).round() * INTENSITY_STEP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::fake::FakeOutput;
    use crate::engine::{BackendPreference, EngineFactory};
    use crate::playback::test_support::{assets_for, soundscape};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn app_with(output: Arc<FakeOutput>) -> App {
        let scape = soundscape();
        let factory = EngineFactory::new(output, assets_for(&scape), BackendPreference::Auto);
        App::new(factory.engine(), scape, 0.7)
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_start_prepares_once() {
        let output = Arc::new(FakeOutput::new());
        let mut app = app_with(Arc::clone(&output));
        assert_eq!(output.decode_count(), 0);

        app.toggle().await;
        assert!(app.is_running());
        assert_eq!(output.decode_count(), 4);
        assert_eq!(app.engine().soundscape().unwrap().id, "test");

        app.toggle().await;
        assert!(!app.is_running());
        app.toggle().await;
        assert!(app.is_running());
        assert_eq!(output.decode_count(), 4);
        assert_eq!(output.open_calls.load(Ordering::SeqCst), 3);

        app.stop().await;
        assert_eq!(app.status_message.as_ref().unwrap().0, "Stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_applies_intensity() {
        let output = Arc::new(FakeOutput::new());
        let mut app = app_with(output);
        app.adjust_intensity(-3);
        assert!(approx(app.intensity, 0.4));

        app.start().await;
        assert!(approx(app.engine().intensity(), 0.4));

        app.adjust_intensity(2);
        assert!(approx(app.engine().intensity(), 0.6));
        app.stop().await;
    }

    #[test]
    fn test_intensity_clamps_to_slider_range() {
        let mut app = app_with(Arc::new(FakeOutput::new()));
        app.adjust_intensity(20);
        assert!(approx(app.intensity, 1.0));
        app.adjust_intensity(-20);
        assert!(approx(app.intensity, 0.1));
        assert_eq!(app.status_message.as_ref().unwrap().0, "Intensity 10%");

        let app = App::new(app.engine().clone(), soundscape(), 7.0);
        assert!(approx(app.intensity, 1.0));
    }

    #[tokio::test]
    async fn test_failed_init_is_reported() {
        let output = Arc::new(FakeOutput::new());
        output.fail_open.store(true, Ordering::SeqCst);
        let mut app = app_with(Arc::clone(&output));

        app.start().await;
        assert!(!app.is_running());
        assert!(app.last_error.as_ref().unwrap().contains("unavailable"));

        output.fail_open.store(false, Ordering::SeqCst);
        app.start().await;
        assert!(app.is_running());
        assert!(app.last_error.is_none());
        app.stop().await;
    }
}
