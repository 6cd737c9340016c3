//! Scene Definitions
//!
//! A scene is one timed visual segment of the intro. Descriptors are
//! immutable once built; the [`SceneTable`] keeps them sorted by `order`
//! and is validated before a controller will play it.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transition::ExitTransition;

/// Boot lines typed out during the `boot-log` scene
pub const BOOT_LINES: [&str; 5] = [
    "INITIALIZING PRISMA…",
    "Loading Archive Core…",
    "Verifying Structural Integrity…",
    "Architect Signature: AK-01",
    "System Status: STABLE",
];

/// Typewriter tick (one character per tick)
pub const TYPEWRITER_TICK_MS: u64 = 50;

/// Pause after a boot line is fully typed
pub const TYPEWRITER_HOLD_MS: u64 = 400;

/// Errors found while validating a scene table
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// A scene has an empty or whitespace-only id
    #[error("Scene at order {order} has an empty id")]
    EmptyId {
        /// Order of the offending scene
        order: u32,
    },

    /// Two scenes share an id
    #[error("Duplicate scene id '{0}'")]
    DuplicateId(String),

    /// Two scenes share an order value
    #[error("Duplicate scene order {order} ('{first}' and '{second}')")]
    DuplicateOrder {
        /// The shared order value
        order: u32,
        /// First scene with this order
        first: String,
        /// Second scene with this order
        second: String,
    },
}

/// What ends a scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SceneEnd {
    /// The scene ends when `duration_ms` has elapsed
    #[default]
    Timer,
    /// The scene's presentation reports when it is done; `duration_ms`
    /// plus the controller's grace period is the hard fallback
    Animation,
}

/// Immutable description of one scene
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Scene id (e.g. "darkness", "reveal")
    pub id: String,

    /// Position in the sequence (ascending)
    pub order: u32,

    /// Nominal scene length in milliseconds
    pub duration_ms: u64,

    /// How the scene hands over to the next one
    #[serde(default)]
    pub exit_transition: ExitTransition,

    /// What ends the scene
    #[serde(default)]
    pub end: SceneEnd,
}

impl SceneDescriptor {
    /// Create a timer-driven scene with a cut exit
    pub fn new(id: impl Into<String>, order: u32, duration_ms: u64) -> Self {
        Self {
            id: id.into(),
            order,
            duration_ms,
            exit_transition: ExitTransition::cut(),
            end: SceneEnd::Timer,
        }
    }

    /// Set the exit transition
    #[must_use]
    pub fn with_exit(mut self, exit_transition: ExitTransition) -> Self {
        self.exit_transition = exit_transition;
        self
    }

    /// Mark the scene as animation-driven
    #[must_use]
    pub fn animation_driven(mut self) -> Self {
        self.end = SceneEnd::Animation;
        self
    }

    /// Nominal scene length
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Whether the scene's end is reported by its presentation
    #[must_use]
    pub fn is_animation_driven(&self) -> bool {
        self.end == SceneEnd::Animation
    }
}

/// Total typing time for a set of typewriter lines
///
/// Each line types one character per tick, needs one more tick to clear the
/// typing interval, then holds before the next line starts.
#[must_use]
pub fn typewriter_duration(lines: &[&str], tick_ms: u64, hold_ms: u64) -> Duration {
    let total: u64 = lines
        .iter()
        .map(|line| (line.chars().count() as u64 + 2) * tick_ms + hold_ms)
        .sum();
    Duration::from_millis(total)
}

/// Ordered collection of scene descriptors
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneTable {
    scenes: Vec<SceneDescriptor>,
}

impl SceneTable {
    /// Build a table, sorting scenes by `order`
    ///
    /// The table is not validated here; see [`SceneTable::validate`].
    pub fn new(scenes: impl IntoIterator<Item = SceneDescriptor>) -> Self {
        let mut scenes: Vec<_> = scenes.into_iter().collect();
        scenes.sort_by_key(|s| s.order);
        Self { scenes }
    }

    /// Build and validate a table
    ///
    /// # Errors
    ///
    /// Returns the first [`SceneError`] found.
    pub fn try_new(scenes: impl IntoIterator<Item = SceneDescriptor>) -> Result<Self, SceneError> {
        let table = Self::new(scenes);
        table.validate()?;
        Ok(table)
    }

    /// An empty table (the sequence completes immediately)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The PRISMA intro: darkness, boot log, slash, title
    #[must_use]
    pub fn prisma_default() -> Self {
        let boot_ms = typewriter_duration(&BOOT_LINES, TYPEWRITER_TICK_MS, TYPEWRITER_HOLD_MS)
            .as_millis() as u64;

        Self::new([
            SceneDescriptor::new("darkness", 0, 2000).with_exit(ExitTransition::crossfade(400)),
            SceneDescriptor::new("boot-log", 1, boot_ms),
            SceneDescriptor::new("slash", 2, 1300),
            SceneDescriptor::new("title", 3, 300)
                .with_exit(ExitTransition::fade_through(500))
                .animation_driven(),
        ])
    }

    /// Check ids and orders
    ///
    /// # Errors
    ///
    /// - [`SceneError::EmptyId`] for a blank id
    /// - [`SceneError::DuplicateId`] when two scenes share an id
    /// - [`SceneError::DuplicateOrder`] when two scenes share an order
    pub fn validate(&self) -> Result<(), SceneError> {
        let mut seen = HashSet::new();
        for scene in &self.scenes {
            if scene.id.trim().is_empty() {
                return Err(SceneError::EmptyId { order: scene.order });
            }
            if !seen.insert(scene.id.as_str()) {
                return Err(SceneError::DuplicateId(scene.id.clone()));
            }
        }

        // Sorted, so equal orders are adjacent
        for pair in self.scenes.windows(2) {
            if pair[0].order == pair[1].order {
                return Err(SceneError::DuplicateOrder {
                    order: pair[0].order,
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Number of scenes
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Whether the table has no scenes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scene at a sequence position
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&SceneDescriptor> {
        self.scenes.get(index)
    }

    /// Iterate scenes in play order
    pub fn iter(&self) -> impl Iterator<Item = &SceneDescriptor> {
        self.scenes.iter()
    }

    /// Sum of nominal scene durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.scenes.iter().map(SceneDescriptor::duration).sum()
    }
}

impl FromIterator<SceneDescriptor> for SceneTable {
    fn from_iter<I: IntoIterator<Item = SceneDescriptor>>(iter: I) -> Self {
        Self::new(iter)
    }
}
