//! Intro Core - Headless Intro Sequencer for the PRISMA site
//!
//! Plays an ordered series of timed scenes before the main interface
//! mounts, then tells the host exactly once. Nothing in here renders: the
//! host and the scene presentations observe the controller and draw
//! whatever they like.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Host Shell                          │
//! │   renders loader while the gate is open, mounts main UI      │
//! └──────────────▲───────────────────────────────┬───────────────┘
//!                │ on_complete() (exactly once)  │ start / skip / dispose
//! ┌──────────────┴───────────────────────────────▼───────────────┐
//! │                        INTRO CORE                            │
//! │  ┌─────────────────┐   ┌─────────────────┐  ┌─────────────┐  │
//! │  │ CompletionLatch │◀──│ SceneController │──│ SceneTable  │  │
//! │  └─────────────────┘   └────────┬────────┘  └─────────────┘  │
//! │                                 │ SequenceEvent              │
//! │                                 ▼                            │
//! │                      scene presentations                     │
//! │                                                              │
//! │  ┌──────────────────────┐                                    │
//! │  │ AmbientTimerService  │  flicker / glitch pulses           │
//! │  └──────────────────────┘                                    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use intro_core::{SceneController, SceneTable};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (done_tx, done_rx) = tokio::sync::oneshot::channel();
//!     let controller = SceneController::new(SceneTable::prisma_default(), move || {
//!         let _ = done_tx.send(());
//!     });
//!
//!     controller.start();
//!     done_rx.await.ok();
//!     // mount the main interface
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`scene`]: Scene descriptors and the validated scene table
//! - [`transition`]: Exit transitions and easing curves
//! - [`controller`]: The scene controller state machine
//! - [`latch`]: Single-fire completion latch
//! - [`events`]: Observer events emitted by the controller
//! - [`ambient`]: Recurring probabilistic trigger for decorative effects
//! - [`config`]: TOML/env configuration loading

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod ambient;
pub mod config;
pub mod controller;
pub mod events;
pub mod latch;
pub mod scene;
pub mod transition;

// Re-exports for convenience
pub use ambient::{AmbientConfig, AmbientStats, AmbientTimerService};
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, IntroConfig, IntroToml,
};
pub use controller::{
    ControllerConfig, SceneController, SceneSignal, SequenceId, SequenceState, SequenceStatus,
};
pub use events::{SceneEndCause, SequenceEvent};
pub use latch::CompletionLatch;
pub use scene::{SceneDescriptor, SceneEnd, SceneError, SceneTable};
pub use transition::{Easing, ExitTransition, TransitionKind};
