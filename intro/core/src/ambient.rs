//! Ambient Timer Service
//!
//! Recurring probabilistic trigger behind the site's decorative effects
//! (footer micro-flicker, navbar glitch, title burst, countdown digit
//! glitches). Every check waits a random interval in
//! `[min_interval, max_interval]`, then with `probability` runs `on_trigger`
//! and schedules `on_revert` after `pulse_duration`.
//!
//! # Teardown policy: flush
//!
//! Stopping the service mid-pulse runs the pending `on_revert` immediately,
//! inside [`AmbientTimerService::stop`], and the scheduled revert is
//! cancelled. Each trigger therefore gets exactly one revert, never later
//! than `pulse_duration` after it, and a stopped effect is always left in
//! its resting state.
//!
//! Callbacks run without any service lock the handle needs, so they may read
//! [`AmbientTimerService::stats`] or stop their own service.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Configuration for one ambient effect
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmbientConfig {
    /// Effect name (for logs)
    pub name: String,
    /// Shortest wait between checks
    pub min_interval: Duration,
    /// Longest wait between checks
    pub max_interval: Duration,
    /// Chance that a check triggers (0.0 - 1.0)
    pub probability: f64,
    /// How long a triggered pulse lasts
    pub pulse_duration: Duration,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl AmbientConfig {
    /// Create a config with a fixed check interval
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        probability: f64,
        pulse_duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            min_interval: interval,
            max_interval: interval,
            probability,
            pulse_duration,
            seed: None,
        }
    }

    /// Set a randomised check interval
    #[must_use]
    pub fn with_interval_range(mut self, min: Duration, max: Duration) -> Self {
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    /// Seed the RNG
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Footer micro-flicker: 5% chance every 45s, 80ms pulse
    #[must_use]
    pub fn footer_flicker() -> Self {
        Self::new(
            "footer-flicker",
            Duration::from_secs(45),
            0.05,
            Duration::from_millis(80),
        )
    }

    /// Navbar item glitch every 45s, 200ms pulse
    #[must_use]
    pub fn nav_glitch() -> Self {
        Self::new(
            "nav-glitch",
            Duration::from_secs(45),
            1.0,
            Duration::from_millis(200),
        )
    }

    /// Title burst glitch every 3-6s, 200ms pulse
    #[must_use]
    pub fn title_burst() -> Self {
        Self::new(
            "title-burst",
            Duration::from_secs(3),
            1.0,
            Duration::from_millis(200),
        )
        .with_interval_range(Duration::from_secs(3), Duration::from_secs(6))
    }

    /// Countdown digit glitch: 20% chance per second, 350ms pulse
    #[must_use]
    pub fn countdown_glitch() -> Self {
        Self::new(
            "countdown-glitch",
            Duration::from_secs(1),
            0.2,
            Duration::from_millis(350),
        )
    }

    /// Countdown digit flicker: 30% chance per second, 200ms pulse
    #[must_use]
    pub fn countdown_flicker() -> Self {
        Self::new(
            "countdown-flicker",
            Duration::from_secs(1),
            0.3,
            Duration::from_millis(200),
        )
    }

    /// Event category flicker every 3-8s, 3s pulse
    #[must_use]
    pub fn category_flicker() -> Self {
        Self::new(
            "category-flicker",
            Duration::from_secs(3),
            1.0,
            Duration::from_secs(3),
        )
        .with_interval_range(Duration::from_secs(3), Duration::from_secs(8))
    }

    /// Bounds with `min <= max` and probability clamped to `[0, 1]`
    fn normalized(mut self) -> Self {
        if self.min_interval > self.max_interval {
            std::mem::swap(&mut self.min_interval, &mut self.max_interval);
        }
        self.probability = if self.probability.is_nan() {
            0.0
        } else {
            self.probability.clamp(0.0, 1.0)
        };
        self
    }
}

/// Counters for one ambient effect
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmbientStats {
    /// Checks performed
    pub checks: u64,
    /// `on_trigger` calls
    pub triggers: u64,
    /// `on_revert` calls
    pub reverts: u64,
}

type EffectCallback = Box<dyn FnMut() + Send + 'static>;

/// User callbacks
///
/// Held behind a re-entrant lock so a callback may query or stop its own
/// service. Each callback sits in its own cell, which lets `on_trigger`
/// stop the service (and so run `on_revert`) without aliasing itself.
struct Callbacks {
    on_trigger: RefCell<EffectCallback>,
    on_revert: RefCell<EffectCallback>,
}

impl Callbacks {
    fn trigger(&self) {
        if let Ok(mut on_trigger) = self.on_trigger.try_borrow_mut() {
            (*on_trigger)();
        }
    }

    fn revert(&self) {
        if let Ok(mut on_revert) = self.on_revert.try_borrow_mut() {
            (*on_revert)();
        }
    }
}

/// Pulse bookkeeping, never locked while a callback runs
#[derive(Debug, Default)]
struct PulseState {
    pulsing: bool,
    stopped: bool,
    stats: AmbientStats,
}

/// State shared between the check task and the service handle
///
/// Lock order is `callbacks` then `state`. Holding `callbacks` across the
/// state change and the callback keeps every revert after its trigger,
/// even when `stop()` races the task from another thread.
struct Shared {
    callbacks: ReentrantMutex<Callbacks>,
    state: Mutex<PulseState>,
}

impl Shared {
    /// Record one check; `None` once stopped, else whether it triggered
    fn check(&self, hit: bool) -> Option<bool> {
        let callbacks = self.callbacks.lock();
        {
            let mut state = self.state.lock();
            if state.stopped {
                return None;
            }
            state.stats.checks += 1;
            if !hit {
                return Some(false);
            }
            state.stats.triggers += 1;
            state.pulsing = true;
        }
        callbacks.trigger();
        Some(true)
    }

    /// Revert the pulse in progress, if any
    ///
    /// With `stop` set the effect is also retired. Returns `false` when it
    /// had already been stopped.
    fn end_pulse(&self, stop: bool) -> bool {
        let callbacks = self.callbacks.lock();
        let was_pulsing = {
            let mut state = self.state.lock();
            if state.stopped {
                return false;
            }
            state.stopped = stop;
            let was_pulsing = std::mem::take(&mut state.pulsing);
            if was_pulsing {
                state.stats.reverts += 1;
            }
            was_pulsing
        };
        if was_pulsing {
            callbacks.revert();
        }
        true
    }
}

/// Running ambient effect
///
/// Stops (flushing any pending revert) when dropped.
pub struct AmbientTimerService {
    name: String,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl AmbientTimerService {
    /// Start an ambient effect on the current tokio runtime
    ///
    /// Outside a runtime the effect never runs: the returned service is
    /// already stopped.
    pub fn spawn(
        config: AmbientConfig,
        on_trigger: impl FnMut() + Send + 'static,
        on_revert: impl FnMut() + Send + 'static,
    ) -> Self {
        let config = config.normalized();
        let shared = Arc::new(Shared {
            callbacks: ReentrantMutex::new(Callbacks {
                on_trigger: RefCell::new(Box::new(on_trigger)),
                on_revert: RefCell::new(Box::new(on_revert)),
            }),
            state: Mutex::new(PulseState::default()),
        });
        let name = config.name.clone();

        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(effect = %name, "No async runtime available, ambient effect disabled");
            shared.state.lock().stopped = true;
            return Self {
                name,
                shared,
                task: None,
            };
        };

        tracing::debug!(
            effect = %config.name,
            min_ms = config.min_interval.as_millis() as u64,
            max_ms = config.max_interval.as_millis() as u64,
            probability = config.probability,
            pulse_ms = config.pulse_duration.as_millis() as u64,
            "Starting ambient effect"
        );

        let task = runtime.spawn(run(config, Arc::clone(&shared)));

        Self {
            name,
            shared,
            task: Some(task),
        }
    }

    /// Stop the effect
    ///
    /// A pulse in progress is reverted before this returns. Idempotent, and
    /// safe to call from the effect's own callbacks.
    pub fn stop(&mut self) {
        if !self.shared.end_pulse(true) {
            return;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        tracing::debug!(effect = %self.name, "Ambient effect stopped");
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> AmbientStats {
        self.shared.state.lock().stats
    }

    /// Whether a pulse is in progress
    #[must_use]
    pub fn is_pulsing(&self) -> bool {
        self.shared.state.lock().pulsing
    }

    /// Whether `stop()` has run
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.state.lock().stopped
    }

    /// Effect name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for AmbientTimerService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AmbientTimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmbientTimerService")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Check loop for one effect
async fn run(config: AmbientConfig, shared: Arc<Shared>) {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    loop {
        let wait = if config.min_interval == config.max_interval {
            config.min_interval
        } else {
            rng.gen_range(config.min_interval..=config.max_interval)
        };
        tokio::time::sleep(wait).await;

        let hit = rng.gen_bool(config.probability);
        match shared.check(hit) {
            None => return,
            Some(false) => continue,
            Some(true) => {}
        }
        tracing::trace!(effect = %config.name, "Ambient pulse");

        tokio::time::sleep(config.pulse_duration).await;

        if !shared.end_pulse(false) {
            // stop() already flushed the revert
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn counters() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn test_presets() {
        let footer = AmbientConfig::footer_flicker();
        assert_eq!(footer.min_interval, Duration::from_secs(45));
        assert!((footer.probability - 0.05).abs() < f64::EPSILON);
        assert_eq!(footer.pulse_duration, Duration::from_millis(80));

        let burst = AmbientConfig::title_burst();
        assert_eq!(burst.min_interval, Duration::from_secs(3));
        assert_eq!(burst.max_interval, Duration::from_secs(6));
    }

    #[test]
    fn test_normalized_swaps_and_clamps() {
        let config = AmbientConfig::new("x", Duration::from_secs(1), 4.0, Duration::ZERO)
            .with_interval_range(Duration::from_secs(5), Duration::from_secs(2))
            .normalized();
        assert_eq!(config.min_interval, Duration::from_secs(2));
        assert_eq!(config.max_interval, Duration::from_secs(5));
        assert!((config.probability - 1.0).abs() < f64::EPSILON);

        let nan = AmbientConfig::new("y", Duration::from_secs(1), f64::NAN, Duration::ZERO)
            .normalized();
        assert!(nan.probability.abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_certain_trigger_pulses_and_reverts() {
        let (triggers, reverts) = counters();
        let (t, r) = (Arc::clone(&triggers), Arc::clone(&reverts));
        let service = AmbientTimerService::spawn(
            AmbientConfig::new("t", Duration::from_millis(100), 1.0, Duration::from_millis(20)),
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        );
        settle().await;

        tokio::time::advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(triggers.load(Ordering::SeqCst), 1);
        assert_eq!(reverts.load(Ordering::SeqCst), 0);
        assert!(service.is_pulsing());

        tokio::time::advance(Duration::from_millis(20)).await;
        settle().await;
        assert_eq!(reverts.load(Ordering::SeqCst), 1);
        assert!(!service.is_pulsing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_probability_never_triggers() {
        let (triggers, _) = counters();
        let t = Arc::clone(&triggers);
        let service = AmbientTimerService::spawn(
            AmbientConfig::new("z", Duration::from_millis(10), 0.0, Duration::from_millis(5)),
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );
        settle().await;

        for _ in 0..10 {
            tokio::time::advance(Duration::from_millis(10)).await;
            settle().await;
        }

        let stats = service.stats();
        assert_eq!(stats.checks, 10);
        assert_eq!(stats.triggers, 0);
        assert_eq!(triggers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_pulse_flushes_revert() {
        let (_, reverts) = counters();
        let r = Arc::clone(&reverts);
        let mut service = AmbientTimerService::spawn(
            AmbientConfig::new("s", Duration::from_millis(50), 1.0, Duration::from_millis(200)),
            || {},
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        );
        settle().await;

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert!(service.is_pulsing());

        service.stop();
        assert_eq!(reverts.load(Ordering::SeqCst), 1);
        assert!(!service.is_pulsing());

        // The cancelled revert never fires a second time
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(reverts.load(Ordering::SeqCst), 1);

        let stats = service.stats();
        assert_eq!(stats.triggers, stats.reverts);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_drop_safe() {
        let (_, reverts) = counters();
        let r = Arc::clone(&reverts);
        let mut service = AmbientTimerService::spawn(
            AmbientConfig::new("d", Duration::from_millis(10), 1.0, Duration::from_millis(100)),
            || {},
            move || {
                r.fetch_add(1, Ordering::SeqCst);
            },
        );
        settle().await;
        tokio::time::advance(Duration::from_millis(10)).await;
        settle().await;

        service.stop();
        service.stop();
        drop(service);
        assert_eq!(reverts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_spawn_outside_runtime_is_inert() {
        let (triggers, _) = counters();
        let t = Arc::clone(&triggers);
        let mut service = AmbientTimerService::spawn(
            AmbientConfig::footer_flicker(),
            move || {
                t.fetch_add(1, Ordering::SeqCst);
            },
            || {},
        );

        assert!(service.is_stopped());
        assert!(!service.is_pulsing());
        assert_eq!(service.stats(), AmbientStats::default());

        service.stop();
        assert_eq!(triggers.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_may_reenter_service() {
        type Slot = Arc<Mutex<Option<AmbientTimerService>>>;
        let slot: Slot = Arc::new(Mutex::new(None));
        let seen: Arc<Mutex<Vec<(bool, AmbientStats)>>> = Arc::new(Mutex::new(Vec::new()));
        let (_, reverts) = counters();

        let (slot_in_cb, seen_in_cb) = (Arc::clone(&slot), Arc::clone(&seen));
        let (seen_in_revert, r) = (Arc::clone(&seen), Arc::clone(&reverts));
        let service = AmbientTimerService::spawn(
            AmbientConfig::new("re", Duration::from_millis(10), 1.0, Duration::from_millis(50)),
            move || {
                if let Some(mut service) = slot_in_cb.lock().take() {
                    seen_in_cb
                        .lock()
                        .push((service.is_pulsing(), service.stats()));
                    service.stop();
                }
            },
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                seen_in_revert.lock().push((false, AmbientStats::default()));
            },
        );
        *slot.lock() = Some(service);
        settle().await;

        tokio::time::advance(Duration::from_millis(10)).await;
        settle().await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].0);
        assert_eq!(seen[0].1.triggers, 1);
        assert_eq!(reverts.load(Ordering::SeqCst), 1);
        drop(seen);

        // Stopped from inside its own trigger: nothing further runs
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(reverts.load(Ordering::SeqCst), 1);
        assert!(slot.lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_another_thread_keeps_pairs() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let (on, off) = (Arc::clone(&log), Arc::clone(&log));
        let service = AmbientTimerService::spawn(
            AmbientConfig::new("x", Duration::from_millis(10), 1.0, Duration::from_millis(100)),
            move || on.lock().push("trigger"),
            move || off.lock().push("revert"),
        );
        settle().await;
        tokio::time::advance(Duration::from_millis(10)).await;
        settle().await;

        std::thread::spawn(move || drop(service)).join().unwrap();

        assert_eq!(*log.lock(), vec!["trigger", "revert"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_seeded_runs_are_reproducible() {
        async fn run_once(seed: u64) -> AmbientStats {
            let service = AmbientTimerService::spawn(
                AmbientConfig::new("r", Duration::from_millis(10), 0.5, Duration::from_millis(1))
                    .with_interval_range(Duration::from_millis(10), Duration::from_millis(30))
                    .with_seed(seed),
                || {},
                || {},
            );
            settle().await;
            for _ in 0..100 {
                tokio::time::advance(Duration::from_millis(1)).await;
                settle().await;
            }
            service.stats()
        }

        assert_eq!(run_once(7).await, run_once(7).await);
    }
}
