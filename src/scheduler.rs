//! Event scheduler.
//!
//! Repeatedly picks an event by weight, waits an intensity-scaled random
//! delay, fires the registered callback and waits for it to resolve before
//! scheduling the next cycle. Firings are strictly sequential; the callback
//! itself decides what "playing" an event means.
//!
//! Stopping is cooperative: the loop re-checks its liveness after every
//! timer wake, so an in-flight callback always completes but no further
//! cycle is scheduled.

use crate::soundscape::AudioEvent;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Lowest accepted intensity.
pub const MIN_INTENSITY: f32 = 0.1;

/// Highest accepted intensity.
pub const MAX_INTENSITY: f32 = 1.0;

/// Intensity used until `set_intensity` is called.
pub const DEFAULT_INTENSITY: f32 = 0.5;

/// Pause between selection attempts when no event can be chosen
/// (empty list or all weights zero). Keeps a degenerate soundscape idle
/// instead of spinning.
const IDLE_RETRY: Duration = Duration::from_millis(100);

/// Handler invoked for each firing. The scheduler awaits the returned
/// future before computing the next delay.
pub type EventCallback = Arc<dyn Fn(AudioEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Clamps an intensity into `[MIN_INTENSITY, MAX_INTENSITY]`.
///
/// NaN maps to the minimum.
pub fn clamp_intensity(value: f32) -> f32 {
    if value.is_nan() {
        MIN_INTENSITY
    } else {
        value.clamp(MIN_INTENSITY, MAX_INTENSITY)
    }
}

/// Delay divisor for an intensity: `0.5 + intensity * 1.5`.
///
/// Ranges from 0.65 at minimum intensity to 2.0 at maximum.
pub fn intensity_factor(intensity: f32) -> f64 {
    0.5 + clamp_intensity(intensity) as f64 * 1.5
}

/// Picks an event with probability proportional to its weight.
///
/// Draws a uniform value in `[0, total)` and walks the list subtracting
/// weights. Events with a non-positive weight are never chosen. Returns
/// `None` when no event has positive weight.
pub fn pick_weighted_event<'a, R: Rng>(
    events: &'a [AudioEvent],
    rng: &mut R,
) -> Option<&'a AudioEvent> {
    let total: f64 = events.iter().map(|e| e.weight.max(0.0)).sum();
    // Also rejects a NaN total.
    if !(total > 0.0) {
        return None;
    }

    let mut remaining = rng.gen::<f64>() * total;
    for event in events.iter().filter(|e| e.weight > 0.0) {
        remaining -= event.weight;
        if remaining <= 0.0 {
            return Some(event);
        }
    }

    // Rounding left a remainder.
    events.iter().rev().find(|e| e.weight > 0.0)
}

/// Scales a base delay (milliseconds) by intensity.
pub fn scaled_delay(base_ms: f64, intensity: f32) -> Duration {
    let ms = base_ms / intensity_factor(intensity);
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::ZERO)
}

/// Draws the wait before `event` fires: uniform in
/// `[min_delay, max_delay]`, divided by the intensity factor.
pub fn compute_delay<R: Rng>(event: &AudioEvent, intensity: f32, rng: &mut R) -> Duration {
    let lo = event.min_delay.min(event.max_delay) as f64;
    let hi = event.min_delay.max(event.max_delay) as f64;
    let base = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
    scaled_delay(base, intensity)
}

/// State shared between the scheduler handle and its loop task.
struct SchedulerShared {
    running: AtomicBool,
    /// Bumped on every `start`; a loop exits once its generation is stale.
    generation: AtomicU64,
    /// Intensity stored as `f32` bits.
    intensity: AtomicU32,
    callback: Mutex<Option<EventCallback>>,
    rng: Mutex<StdRng>,
    firings: AtomicU64,
}

impl SchedulerShared {
    fn is_live(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn intensity(&self) -> f32 {
        f32::from_bits(self.intensity.load(Ordering::Relaxed))
    }

    fn callback(&self) -> Option<EventCallback> {
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Picks the next event and its delay.
    fn next_firing(&self, events: &[AudioEvent]) -> Option<(AudioEvent, Duration)> {
        let intensity = self.intensity();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let event = pick_weighted_event(events, &mut *rng)?;
        let delay = compute_delay(event, intensity, &mut *rng);
        Some((event.clone(), delay))
    }
}

/// Timer-driven event scheduler.
///
/// `start` must be called from within a tokio runtime; the schedule runs
/// as a spawned task.
pub struct EventScheduler {
    shared: Arc<SchedulerShared>,
}

impl EventScheduler {
    /// Creates a stopped scheduler with an entropy-seeded RNG.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a stopped scheduler drawing from the given RNG.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            shared: Arc::new(SchedulerShared {
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                intensity: AtomicU32::new(DEFAULT_INTENSITY.to_bits()),
                callback: Mutex::new(None),
                rng: Mutex::new(rng),
                firings: AtomicU64::new(0),
            }),
        }
    }

    /// Stores a clamped intensity. Takes effect at the next delay
    /// computation; a wait already in progress is not shortened.
    pub fn set_intensity(&self, value: f32) {
        self.shared
            .intensity
            .store(clamp_intensity(value).to_bits(), Ordering::Relaxed);
    }

    /// Returns the stored (clamped) intensity.
    pub fn intensity(&self) -> f32 {
        self.shared.intensity()
    }

    /// Replaces the handler invoked per firing.
    pub fn set_callback(&self, callback: EventCallback) {
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Convenience wrapper around [`set_callback`](Self::set_callback) for
    /// async closures.
    pub fn set_event_callback<F, Fut>(&self, callback: F)
    where
        F: Fn(AudioEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.set_callback(Arc::new(move |event| {
            Box::pin(callback(event)) as BoxFuture<'static, ()>
        }));
    }

    /// Marks the scheduler running and begins the schedule loop over
    /// `events`.
    ///
    /// Calling `start` again restarts against the new list: the previous
    /// loop exits at its next liveness check. An empty list leaves the
    /// scheduler running but idle.
    pub fn start(&self, events: Vec<AudioEvent>) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.running.store(true, Ordering::SeqCst);

        if events.is_empty() {
            debug!("Scheduler started with no events; idle");
            return;
        }

        debug!(generation, events = events.len(), "Scheduler started");
        tokio::spawn(run_schedule(Arc::clone(&self.shared), generation, events));
    }

    /// Prevents any further firing. Does not interrupt a callback that is
    /// already executing.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Returns whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Total number of callback invocations since creation.
    pub fn firings(&self) -> u64 {
        self.shared.firings.load(Ordering::Relaxed)
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// The schedule loop. Exactly one timer is pending per live generation.
async fn run_schedule(shared: Arc<SchedulerShared>, generation: u64, events: Vec<AudioEvent>) {
    loop {
        if !shared.is_live(generation) || shared.callback().is_none() {
            break;
        }

        let Some((event, delay)) = shared.next_firing(&events) else {
            tokio::time::sleep(IDLE_RETRY).await;
            continue;
        };

        debug!(event = %event.id, delay_ms = delay.as_millis() as u64, "Next event scheduled");
        tokio::time::sleep(delay).await;

        if !shared.is_live(generation) {
            break;
        }
        let Some(callback) = shared.callback() else {
            break;
        };

        shared.firings.fetch_add(1, Ordering::Relaxed);
        callback(event).await;
    }

    debug!(generation, "Schedule loop ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn event(id: &str, weight: f64, min: u64, max: u64) -> AudioEvent {
        AudioEvent::new(id, id, weight, min, max)
    }

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    /// Counts firings per event id.
    fn counting_callback(scheduler: &EventScheduler) -> Arc<Mutex<Vec<String>>> {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        scheduler.set_event_callback(move |event: AudioEvent| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(event.id);
            }
        });
        fired
    }

    #[test]
    fn test_intensity_clamp() {
        let scheduler = EventScheduler::new();
        scheduler.set_intensity(-5.0);
        assert_eq!(scheduler.intensity(), 0.1);
        scheduler.set_intensity(50.0);
        assert_eq!(scheduler.intensity(), 1.0);
        scheduler.set_intensity(0.5);
        assert_eq!(scheduler.intensity(), 0.5);
        scheduler.set_intensity(f32::NAN);
        assert_eq!(scheduler.intensity(), 0.1);
    }

    #[test]
    fn test_intensity_factor_range() {
        assert!((intensity_factor(0.1) - 0.65).abs() < 1e-6);
        assert!((intensity_factor(1.0) - 2.0).abs() < 1e-9);
        assert!((intensity_factor(0.0) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_weighted_distribution() {
        let events = vec![event("a", 0.3, 0, 0), event("b", 0.7, 0, 0)];
        let mut rng = seeded();
        let draws = 10_000;
        let a = (0..draws)
            .filter(|_| pick_weighted_event(&events, &mut rng).unwrap().id == "a")
            .count();
        let share = a as f64 / draws as f64;
        assert!((share - 0.3).abs() < 0.02, "share of a was {}", share);
    }

    #[test]
    fn test_distribution_follows_weights() {
        let events = vec![
            event("a", 1.0, 0, 0),
            event("b", 2.0, 0, 0),
            event("c", 5.0, 0, 0),
        ];
        let mut rng = seeded();
        let mut counts = [0usize; 3];
        for _ in 0..40_000 {
            match pick_weighted_event(&events, &mut rng).unwrap().id.as_str() {
                "a" => counts[0] += 1,
                "b" => counts[1] += 1,
                _ => counts[2] += 1,
            }
        }
        for (count, expected) in counts.iter().zip([1.0 / 8.0, 2.0 / 8.0, 5.0 / 8.0]) {
            let share = *count as f64 / 40_000.0;
            assert!((share - expected).abs() < 0.02);
        }
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let events = vec![
            event("silent", 0.0, 0, 0),
            event("a", 1.0, 0, 0),
            event("tail", 0.0, 0, 0),
        ];
        let mut rng = seeded();
        for _ in 0..5_000 {
            assert_eq!(pick_weighted_event(&events, &mut rng).unwrap().id, "a");
        }
    }

    #[test]
    fn test_degenerate_weights_select_nothing() {
        let mut rng = seeded();
        let zeros = vec![event("a", 0.0, 0, 0), event("b", 0.0, 0, 0)];
        assert!(pick_weighted_event(&zeros, &mut rng).is_none());
        assert!(pick_weighted_event(&[], &mut rng).is_none());
    }

    #[test]
    fn test_delay_decreases_with_intensity() {
        let e = event("footsteps", 1.0, 5_000, 15_000);
        let mut rng = seeded();
        let trials = 2_000;
        let mean = |intensity: f32, rng: &mut StdRng| {
            (0..trials)
                .map(|_| compute_delay(&e, intensity, rng).as_secs_f64() * 1000.0)
                .sum::<f64>()
                / trials as f64
        };

        let high = mean(1.0, &mut rng);
        let low = mean(0.1, &mut rng);
        assert!(high < low);
        // Base delay averages 10s.
        assert!((high - 10_000.0 / 2.0).abs() < 250.0, "high mean {}", high);
        assert!((low - 10_000.0 / 0.65).abs() < 700.0, "low mean {}", low);
    }

    #[test]
    fn test_fixed_delay_is_deterministic() {
        let e = event("a", 1.0, 1_000, 1_000);
        let mut rng = seeded();
        assert_eq!(compute_delay(&e, 1.0, &mut rng), Duration::from_millis(500));
        assert_eq!(scaled_delay(1_000.0, 0.5), Duration::from_millis(800));
        assert!(scaled_delay(1_000.0, 0.8) < scaled_delay(1_000.0, 0.7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_zero_delay_event_fires_repeatedly() {
        let scheduler = EventScheduler::with_rng(seeded());
        scheduler.set_intensity(1.0);

        let count = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        {
            let count = Arc::clone(&count);
            let done = Arc::clone(&done);
            scheduler.set_event_callback(move |event: AudioEvent| {
                assert_eq!(event.id, "a");
                if count.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
                    done.notify_one();
                }
                async {}
            });
        }

        scheduler.start(vec![event("a", 1.0, 0, 0)]);
        tokio::time::timeout(Duration::from_millis(10), done.notified())
            .await
            .expect("event should fire immediately and repeatedly");
        scheduler.stop();
        assert!(count.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_further_firings() {
        let scheduler = EventScheduler::with_rng(seeded());
        scheduler.set_intensity(1.0);
        let fired = counting_callback(&scheduler);

        // 1000ms base at intensity 1.0 fires every 500ms.
        scheduler.start(vec![event("a", 1.0, 1_000, 1_000)]);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        assert_eq!(fired.lock().unwrap().len(), 2);

        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.lock().unwrap().len(), 2);
        assert_eq!(scheduler.firings(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_callback_completes_after_stop() {
        let scheduler = Arc::new(EventScheduler::with_rng(seeded()));
        scheduler.set_intensity(1.0);

        let completed = Arc::new(AtomicUsize::new(0));
        {
            let completed = Arc::clone(&completed);
            scheduler.set_event_callback(move |_event: AudioEvent| {
                let completed = Arc::clone(&completed);
                async move {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        scheduler.start(vec![event("a", 1.0, 0, 0)]);
        tokio::time::sleep(Duration::from_millis(500)).await;
        scheduler.stop();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.firings(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_switches_event_list() {
        let scheduler = EventScheduler::with_rng(seeded());
        scheduler.set_intensity(1.0);
        let fired = counting_callback(&scheduler);

        scheduler.start(vec![event("old", 1.0, 1_000, 1_000)]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.start(vec![event("new", 1.0, 1_000, 1_000)]);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        scheduler.stop();

        let fired = fired.lock().unwrap();
        assert!(!fired.is_empty());
        assert!(fired.iter().all(|id| id == "new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_intensity_change_applies_to_next_delay() {
        let scheduler = EventScheduler::with_rng(seeded());
        scheduler.set_intensity(0.1);
        let fired = counting_callback(&scheduler);

        // At 0.1 the first wait is 1300 / 0.65 = 2000ms.
        scheduler.start(vec![event("a", 1.0, 1_300, 1_300)]);
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.set_intensity(1.0);

        tokio::time::sleep(Duration::from_millis(1_800)).await;
        assert!(fired.lock().unwrap().is_empty());

        // First firing at 2000ms, next 650ms later.
        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(fired.lock().unwrap().len(), 2);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_degenerate_lists_stay_idle() {
        let scheduler = EventScheduler::with_rng(seeded());
        let fired = counting_callback(&scheduler);

        scheduler.start(Vec::new());
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(1)).await;

        scheduler.start(vec![event("a", 0.0, 0, 0), event("b", 0.0, 0, 0)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.is_running());
        scheduler.stop();

        assert!(fired.lock().unwrap().is_empty());
        assert_eq!(scheduler.firings(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_callback_means_no_loop() {
        let scheduler = EventScheduler::with_rng(seeded());
        scheduler.start(vec![event("a", 1.0, 0, 0)]);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(scheduler.firings(), 0);
    }
}
