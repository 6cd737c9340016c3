//! Scene Controller
//!
//! Owns the progress of one intro run and the timer of the active scene.
//!
//! # State machine
//!
//! ```text
//!            start()              advance() [last scene] / skip()
//!   Idle ─────────────▶ Playing ───────────────────────────────▶ Complete
//!     │                  │  ▲                                        │
//!     │                  └──┘ advance() [scenes remain]              │
//!     │                                                              │
//!     └──────────────────────┬───────────────────────────────────────┘
//!                            │ dispose() (from any state)
//!                            ▼
//!                         Disposed
//! ```
//!
//! An empty scene table makes `start()` go straight from `Idle` to
//! `Complete`.
//!
//! # Stale callbacks
//!
//! Every scheduled scene timer captures the controller's epoch at the time
//! it was scheduled. Activating a scene, skipping and disposing all bump the
//! epoch, so a timer that outlives its scene finds a different epoch and
//! returns without touching state. Timer tasks only hold a weak reference:
//! once the controller is dropped they cannot reach it at all.
//!
//! # Completion
//!
//! The host callback is wrapped in a [`CompletionLatch`] and signalled after
//! the internal lock is released, so the host may dispose the controller
//! from inside its completion callback.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::events::{SceneEndCause, SequenceEvent, Subscribers};
use crate::latch::CompletionLatch;
use crate::scene::{SceneDescriptor, SceneTable};

/// Default grace added to an animation-driven scene's duration before the
/// fallback timeout forces it to end
pub const DEFAULT_FALLBACK_GRACE_MS: u64 = 1000;

/// Longest timer the controller arms; anything later is treated as never
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Unique id of one controller instance (for logs)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub Uuid);

impl SequenceId {
    /// Generate a new random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of a sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SequenceStatus {
    /// Created, not started
    #[default]
    Idle,
    /// A scene is active
    Playing,
    /// All scenes played (or skipped); the host has been signalled
    Complete,
    /// Torn down; no further transitions are accepted
    Disposed,
}

impl SequenceStatus {
    /// Whether no further transitions can happen except `dispose()`
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Disposed)
    }
}

impl std::fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Complete => "complete",
            Self::Disposed => "disposed",
        };
        write!(f, "{label}")
    }
}

/// Snapshot of sequence progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct SequenceState {
    /// Index of the active scene (or of the next scene once past the end)
    pub current_index: usize,
    /// Lifecycle status
    pub status: SequenceStatus,
}

/// Controller behaviour knobs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Added to an animation-driven scene's duration to get its hard timeout
    pub fallback_grace: Duration,
    /// Whether `skip()` is honoured
    pub skip_enabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            fallback_grace: Duration::from_millis(DEFAULT_FALLBACK_GRACE_MS),
            skip_enabled: true,
        }
    }
}

impl ControllerConfig {
    /// Set the fallback grace period
    #[must_use]
    pub fn with_fallback_grace(mut self, grace: Duration) -> Self {
        self.fallback_grace = grace;
        self
    }

    /// Enable or disable `skip()`
    #[must_use]
    pub fn with_skip_enabled(mut self, enabled: bool) -> Self {
        self.skip_enabled = enabled;
        self
    }
}

/// Mutable sequence state, reachable only through the controller's lock
struct Inner {
    id: SequenceId,
    this: Weak<Mutex<Inner>>,
    table: SceneTable,
    config: ControllerConfig,
    state: SequenceState,
    /// Bumped on every activation, skip and dispose
    epoch: u64,
    /// Timer task of the active scene
    pending: Option<AbortHandle>,
    advances: usize,
    /// Runtime captured at construction, used when called from outside one
    runtime: Option<Handle>,
    latch: Arc<CompletionLatch>,
    subscribers: Subscribers,
}

impl Inner {
    fn emit(&mut self, event: SequenceEvent) {
        self.subscribers.emit(&event);
    }

    /// Abort the active scene's timer, if any
    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            tracing::debug!(
                sequence_id = %self.id,
                index = self.state.current_index,
                "Cancelled pending scene timer"
            );
        }
    }

    /// Enter `Complete`
    fn finish(&mut self) {
        self.cancel_pending();
        self.epoch += 1;
        self.state.status = SequenceStatus::Complete;
        tracing::info!(
            sequence_id = %self.id,
            advances = self.advances,
            "Intro sequence complete"
        );
        self.emit(SequenceEvent::Completed);
    }

    /// End the active scene and move to the next one
    ///
    /// Returns `true` when the sequence completed.
    fn advance(&mut self, cause: SceneEndCause) -> bool {
        let index = self.state.current_index;
        if let Some(scene) = self.table.get(index) {
            let event = SequenceEvent::SceneEnded {
                index,
                id: scene.id.clone(),
                cause,
                exit: scene.exit_transition,
            };
            tracing::debug!(
                sequence_id = %self.id,
                scene = %scene.id,
                index,
                %cause,
                "Scene ended"
            );
            self.emit(event);
        }

        self.advances += 1;
        self.state.current_index += 1;
        self.activate_current()
    }

    /// Activate the scene at `current_index`, completing when none is left
    ///
    /// Zero-length scenes end in place without a timer. Returns `true` when
    /// the sequence completed.
    fn activate_current(&mut self) -> bool {
        loop {
            let index = self.state.current_index;
            let Some(scene) = self.table.get(index).cloned() else {
                self.finish();
                return true;
            };

            self.epoch += 1;
            tracing::info!(
                sequence_id = %self.id,
                scene = %scene.id,
                index,
                duration_ms = scene.duration_ms,
                "Scene activated"
            );
            self.emit(SequenceEvent::SceneActivated {
                index,
                id: scene.id.clone(),
            });

            if scene.duration_ms == 0 {
                let event = SequenceEvent::SceneEnded {
                    index,
                    id: scene.id.clone(),
                    cause: SceneEndCause::Timer,
                    exit: scene.exit_transition,
                };
                self.emit(event);
                self.advances += 1;
                self.state.current_index += 1;
                continue;
            }

            let (delay, cause) = if scene.is_animation_driven() {
                (
                    scene.duration().saturating_add(self.config.fallback_grace),
                    SceneEndCause::FallbackTimeout,
                )
            } else {
                (scene.duration(), SceneEndCause::Timer)
            };

            match self.schedule(delay, cause) {
                Some(handle) => {
                    self.pending = Some(handle);
                    return false;
                }
                None => {
                    tracing::warn!(
                        sequence_id = %self.id,
                        scene = %scene.id,
                        "No async runtime available to time scene, completing intro"
                    );
                    self.finish();
                    return true;
                }
            }
        }
    }

    /// Spawn the end-of-scene timer for the current epoch
    fn schedule(&self, delay: Duration, cause: SceneEndCause) -> Option<AbortHandle> {
        let runtime = Handle::try_current().ok().or_else(|| self.runtime.clone())?;

        let deadline = tokio::time::Instant::now() + delay.min(FAR_FUTURE);
        let epoch = self.epoch;
        let this = self.this.clone();

        tracing::debug!(
            sequence_id = %self.id,
            index = self.state.current_index,
            delay_ms = delay.as_millis() as u64,
            %cause,
            "Scheduled scene end"
        );

        let task = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            SceneController::end_scene(&this, Some(epoch), None, cause);
        });
        Some(task.abort_handle())
    }
}

/// Drives an ordered list of scenes and signals the host once at the end
///
/// Dropping the controller disposes it.
pub struct SceneController {
    id: SequenceId,
    inner: Arc<Mutex<Inner>>,
}

impl SceneController {
    /// Create a controller with default settings
    ///
    /// `on_complete` runs at most once, when the sequence completes or is
    /// skipped. It never runs after `dispose()`.
    pub fn new(table: SceneTable, on_complete: impl FnOnce() + Send + 'static) -> Self {
        Self::with_config(table, ControllerConfig::default(), on_complete)
    }

    /// Create a controller with explicit settings
    ///
    /// A table that fails validation is replaced by an empty one, so the
    /// sequence completes as soon as it is started.
    pub fn with_config(
        table: SceneTable,
        config: ControllerConfig,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Self {
        let id = SequenceId::new();

        let table = match table.validate() {
            Ok(()) => table,
            Err(e) => {
                tracing::warn!(
                    sequence_id = %id,
                    error = %e,
                    "Malformed scene table, intro will complete immediately"
                );
                SceneTable::empty()
            }
        };

        let latch = Arc::new(CompletionLatch::new(on_complete));
        let inner = Arc::new_cyclic(|this| {
            Mutex::new(Inner {
                id,
                this: this.clone(),
                table,
                config,
                state: SequenceState::default(),
                epoch: 0,
                pending: None,
                advances: 0,
                runtime: Handle::try_current().ok(),
                latch,
                subscribers: Subscribers::default(),
            })
        });

        Self { id, inner }
    }

    /// Start playing from scene 0
    ///
    /// Only valid from `Idle`; returns `false` (and does nothing) otherwise.
    pub fn start(&self) -> bool {
        let latch = {
            let mut inner = self.inner.lock();
            if inner.state.status != SequenceStatus::Idle {
                tracing::debug!(
                    sequence_id = %self.id,
                    status = %inner.state.status,
                    "Ignoring start() outside Idle"
                );
                return false;
            }

            if inner.table.is_empty() {
                tracing::info!(sequence_id = %self.id, "Empty scene table, skipping intro");
                inner.finish();
                Some(Arc::clone(&inner.latch))
            } else {
                inner.state.status = SequenceStatus::Playing;
                let scene_count = inner.table.len();
                tracing::info!(sequence_id = %self.id, scene_count, "Intro sequence started");
                inner.emit(SequenceEvent::Started { scene_count });

                if inner.activate_current() {
                    Some(Arc::clone(&inner.latch))
                } else {
                    None
                }
            }
        };

        if let Some(latch) = latch {
            latch.signal();
        }
        true
    }

    /// Jump straight to `Complete`
    ///
    /// Cancels the active scene's timer first, so no later scene timer ever
    /// runs. Only valid while `Playing` (and when skipping is enabled).
    pub fn skip(&self) -> bool {
        let latch = {
            let mut inner = self.inner.lock();
            if inner.state.status != SequenceStatus::Playing {
                tracing::debug!(
                    sequence_id = %self.id,
                    status = %inner.state.status,
                    "Ignoring skip() outside Playing"
                );
                return false;
            }
            if !inner.config.skip_enabled {
                tracing::debug!(sequence_id = %self.id, "Skip disabled, ignoring");
                return false;
            }

            inner.cancel_pending();
            let index = inner.state.current_index;
            tracing::info!(sequence_id = %self.id, index, "Intro skipped");
            inner.emit(SequenceEvent::Skipped { index });
            inner.finish();
            Arc::clone(&inner.latch)
        };

        latch.signal();
        true
    }

    /// Cancel everything and enter `Disposed`
    ///
    /// Idempotent and valid from any state. Never signals the host.
    pub fn dispose(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.status == SequenceStatus::Disposed {
            return false;
        }

        inner.cancel_pending();
        inner.epoch += 1;
        let previous = inner.state.status;
        inner.state.status = SequenceStatus::Disposed;
        tracing::debug!(sequence_id = %self.id, from = %previous, "Intro sequence disposed");
        inner.emit(SequenceEvent::Disposed);
        inner.subscribers.close();
        true
    }

    /// Handle an animation-driven scene uses to report it has finished
    #[must_use]
    pub fn scene_signal(&self, index: usize) -> SceneSignal {
        SceneSignal {
            controller: Arc::downgrade(&self.inner),
            index,
        }
    }

    /// Subscribe to lifecycle events
    ///
    /// The stream ends when the controller is disposed.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SequenceEvent> {
        let mut inner = self.inner.lock();
        let rx = inner.subscribers.subscribe();
        if inner.state.status == SequenceStatus::Disposed {
            inner.subscribers.close();
        }
        rx
    }

    /// Controller instance id
    #[must_use]
    pub fn id(&self) -> SequenceId {
        self.id
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> SequenceStatus {
        self.inner.lock().state.status
    }

    /// Snapshot of sequence progress
    #[must_use]
    pub fn state(&self) -> SequenceState {
        self.inner.lock().state
    }

    /// Index of the active scene
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.inner.lock().state.current_index
    }

    /// The active scene while playing
    #[must_use]
    pub fn active_scene(&self) -> Option<SceneDescriptor> {
        let inner = self.inner.lock();
        if inner.state.status != SequenceStatus::Playing {
            return None;
        }
        inner.table.get(inner.state.current_index).cloned()
    }

    /// The `isActive` flag handed to the scene at `index`
    #[must_use]
    pub fn is_scene_active(&self, index: usize) -> bool {
        let inner = self.inner.lock();
        inner.state.status == SequenceStatus::Playing && inner.state.current_index == index
    }

    /// Number of scene ends processed so far
    #[must_use]
    pub fn advance_count(&self) -> usize {
        self.inner.lock().advances
    }

    /// Number of scenes that will be played
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.inner.lock().table.len()
    }

    /// Whether the host has been signalled
    #[must_use]
    pub fn is_completion_signalled(&self) -> bool {
        self.inner.lock().latch.is_fired()
    }

    /// Shared end-of-scene path for timers and scene signals
    ///
    /// Timers pass their epoch; scene signals pass the index they belong to.
    /// Anything that no longer matches the live run is dropped silently.
    fn end_scene(
        this: &Weak<Mutex<Inner>>,
        epoch: Option<u64>,
        index: Option<usize>,
        cause: SceneEndCause,
    ) {
        let Some(inner) = this.upgrade() else {
            tracing::trace!(%cause, "Scene end after controller dropped, ignoring");
            return;
        };

        let latch = {
            let mut inner = inner.lock();
            let stale_epoch = matches!(epoch, Some(e) if e != inner.epoch);
            let stale_index = matches!(index, Some(i) if i != inner.state.current_index);
            let live = inner.state.status == SequenceStatus::Playing && !stale_epoch && !stale_index;
            if !live {
                tracing::trace!(
                    sequence_id = %inner.id,
                    status = %inner.state.status,
                    %cause,
                    "Discarding stale scene end"
                );
                return;
            }

            if cause == SceneEndCause::Animation {
                // The fallback timer is still armed
                inner.cancel_pending();
            } else {
                // This callback is the pending timer itself
                inner.pending = None;
            }

            if inner.advance(cause) {
                Some(Arc::clone(&inner.latch))
            } else {
                None
            }
        };

        if let Some(latch) = latch {
            latch.signal();
        }
    }
}

impl Drop for SceneController {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for SceneController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SceneController")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("scene_count", &inner.table.len())
            .field("advances", &inner.advances)
            .finish()
    }
}

/// "Scene finished" handle for animation-driven scenes
///
/// Only ends the scene it was created for, and only while that scene is
/// the active scene of a live sequence. Timer-driven scenes ignore it.
#[derive(Clone, Debug)]
pub struct SceneSignal {
    controller: Weak<Mutex<Inner>>,
    index: usize,
}

impl SceneSignal {
    /// Report that the scene's animation has finished
    pub fn finish(&self) {
        let animation_driven = self.controller.upgrade().is_some_and(|inner| {
            let inner = inner.lock();
            inner
                .table
                .get(self.index)
                .is_some_and(SceneDescriptor::is_animation_driven)
        });

        if !animation_driven {
            tracing::trace!(index = self.index, "Ignoring finish() for timer-driven scene");
            return;
        }

        SceneController::end_scene(
            &self.controller,
            None,
            Some(self.index),
            SceneEndCause::Animation,
        );
    }

    /// Scene position this signal belongs to
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}
