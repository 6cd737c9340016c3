//! Scene Exit Transitions
//!
//! Describes how a scene hands over to the next one. The controller never
//! waits on a transition: it forwards the descriptor to observers, and each
//! presentation layer renders it with its own machinery (CSS keyframes,
//! terminal fades, ...).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Easing curves for exit transitions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    /// No easing (constant speed)
    #[default]
    Linear,

    /// Slow start, fast end
    EaseIn,

    /// Fast start, slow end
    EaseOut,

    /// Slow start and end
    EaseInOut,

    /// Cubic ease in and out
    EaseInOutCubic,
}

impl Easing {
    /// Apply the easing curve to a progress value (0.0 to 1.0)
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t).powi(2),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Self::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// Kind of hand-over between two scenes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    /// Immediate switch
    #[default]
    Cut,
    /// Crossfade into the next scene
    Crossfade,
    /// Fade to black, then fade in
    FadeThrough,
    /// Slide the next scene over this one
    Slide,
}

/// How a scene leaves the stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitTransition {
    /// Transition kind
    pub kind: TransitionKind,

    /// Transition duration in milliseconds
    pub duration_ms: u64,

    /// Easing curve
    pub easing: Easing,
}

impl ExitTransition {
    /// Immediate cut
    #[must_use]
    pub const fn cut() -> Self {
        Self {
            kind: TransitionKind::Cut,
            duration_ms: 0,
            easing: Easing::Linear,
        }
    }

    /// Crossfade over `duration_ms`
    #[must_use]
    pub const fn crossfade(duration_ms: u64) -> Self {
        Self {
            kind: TransitionKind::Crossfade,
            duration_ms,
            easing: Easing::EaseInOut,
        }
    }

    /// Fade to black and back over `duration_ms`
    #[must_use]
    pub const fn fade_through(duration_ms: u64) -> Self {
        Self {
            kind: TransitionKind::FadeThrough,
            duration_ms,
            easing: Easing::EaseInOutCubic,
        }
    }

    /// Set easing curve
    #[must_use]
    pub const fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    /// Transition duration
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Eased progress after `elapsed` of the transition has played
    ///
    /// A zero-length transition is always fully applied.
    #[must_use]
    pub fn progress_at(&self, elapsed: Duration) -> f32 {
        if self.duration_ms == 0 {
            return 1.0;
        }
        let t = elapsed.as_secs_f32() / self.duration().as_secs_f32();
        self.easing.apply(t)
    }
}

impl Default for ExitTransition {
    fn default() -> Self {
        Self::cut()
    }
}
