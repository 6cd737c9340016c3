//! Host Shell
//!
//! Owns the intro lifecycle from the outside: shows the loader while the
//! sequence plays, waits for the single completion signal, lets the loader
//! fade out, then mounts the main interface.
//!
//! Rendering is plain log lines. Animation-driven scenes are played by a
//! small task that reports "scene finished" through the controller's
//! [`SceneSignal`], the same way a real presentation would.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};

use intro_core::{
    AmbientConfig, AmbientStats, AmbientTimerService, IntroConfig, SceneController, SceneSignal,
    SequenceEvent, SequenceId,
};

/// Where the host is in its own lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostPhase {
    /// Loader visible, intro playing
    Loading,
    /// Intro finished, loader fading out
    TearingDown,
    /// Main interface mounted
    Mounted,
}

impl std::fmt::Display for HostPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::TearingDown => write!(f, "tearing-down"),
            Self::Mounted => write!(f, "mounted"),
        }
    }
}

/// Summary of one intro run
#[derive(Clone, Debug)]
pub struct IntroReport {
    /// Sequence that played
    pub sequence_id: SequenceId,
    /// Scenes that ran to their end
    pub advances: usize,
    /// Whether the viewer skipped
    pub skipped: bool,
    /// Time from start until the main interface mounted
    pub elapsed: Duration,
    /// Lines the loader showed
    pub rendered: Vec<String>,
}

/// The outer application that gates on the intro
pub struct HostShell {
    config: IntroConfig,
    phase: HostPhase,
}

impl HostShell {
    /// Create a host for the given configuration
    pub fn new(config: IntroConfig) -> Self {
        Self {
            config,
            phase: HostPhase::Loading,
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> HostPhase {
        self.phase
    }

    /// Play the intro, then mount the main interface
    ///
    /// `interrupt` resolving while the intro plays asks the controller to
    /// skip. It is polled at most once to completion.
    pub async fn play_intro(&mut self, interrupt: impl Future<Output = ()>) -> IntroReport {
        let started = Instant::now();
        let (done_tx, mut done_rx) = oneshot::channel();

        let controller = SceneController::with_config(
            self.config.scenes.clone(),
            self.config.controller_config(),
            move || {
                let _ = done_tx.send(());
            },
        );
        let sequence_id = controller.id();
        let mut events = controller.subscribe();

        self.phase = HostPhase::Loading;
        info!(sequence_id = %sequence_id, phase = %self.phase, "Loader shown");
        controller.start();

        let mut rendered = Vec::new();
        let mut skipped = false;
        let mut interrupted = false;
        let mut interrupt = std::pin::pin!(interrupt);

        loop {
            tokio::select! {
                biased;

                _ = &mut done_rx => break,
                Some(event) = events.recv() => {
                    if let SequenceEvent::SceneActivated { index, .. } = &event {
                        self.play_scene(&controller, *index);
                    }
                    if let Some(line) = render_event(&event) {
                        println!("{line}");
                        rendered.push(line);
                    }
                }
                () = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    skipped = controller.skip();
                    info!(sequence_id = %sequence_id, skipped, "Interrupt during intro");
                }
            }
        }

        // Events emitted alongside completion
        while let Ok(event) = events.try_recv() {
            if let Some(line) = render_event(&event) {
                println!("{line}");
                rendered.push(line);
            }
        }

        let advances = controller.advance_count();
        drop(controller);

        self.phase = HostPhase::TearingDown;
        debug!(
            delay_ms = self.config.teardown_delay.as_millis() as u64,
            "Fading out loader"
        );
        tokio::time::sleep(self.config.teardown_delay).await;

        self.phase = HostPhase::Mounted;
        let elapsed = started.elapsed();
        info!(
            sequence_id = %sequence_id,
            advances,
            skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "Main interface mounted"
        );

        IntroReport {
            sequence_id,
            advances,
            skipped,
            elapsed,
            rendered,
        }
    }

    /// Run the mounted page's ambient effects until `stop` resolves
    pub async fn run_ambient(&self, stop: impl Future<Output = ()>) -> Vec<(String, AmbientStats)> {
        let presets = [
            AmbientConfig::footer_flicker(),
            AmbientConfig::nav_glitch(),
            AmbientConfig::title_burst(),
        ];

        let mut services: Vec<AmbientTimerService> = presets
            .into_iter()
            .enumerate()
            .map(|(i, preset)| {
                let preset = match self.config.ambient_seed {
                    Some(seed) => preset.with_seed(seed.wrapping_add(i as u64)),
                    None => preset,
                };
                let name = preset.name.clone();
                let revert_name = name.clone();
                AmbientTimerService::spawn(
                    preset,
                    move || info!(effect = %name, "Glitch on"),
                    move || info!(effect = %revert_name, "Glitch off"),
                )
            })
            .collect();

        stop.await;

        services
            .iter_mut()
            .map(|service| {
                service.stop();
                (service.name().to_string(), service.stats())
            })
            .collect()
    }

    /// Drive an animation-driven scene's presentation
    fn play_scene(&self, controller: &SceneController, index: usize) {
        let Some(scene) = self.config.scenes.get(index) else {
            return;
        };
        if !scene.is_animation_driven() {
            return;
        }

        let signal = controller.scene_signal(index);
        let length = scene.duration();
        tokio::spawn(play_animation(signal, length));
    }
}

impl std::fmt::Debug for HostShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostShell")
            .field("phase", &self.phase)
            .field("scenes", &self.config.scenes.len())
            .finish()
    }
}

/// Stand-in for a scene's animation: run for its length, then report
async fn play_animation(signal: SceneSignal, length: Duration) {
    tokio::time::sleep(length).await;
    debug!(index = signal.index(), "Scene animation finished");
    signal.finish();
}

/// Loader line for an event, if it shows anything
pub fn render_event(event: &SequenceEvent) -> Option<String> {
    match event {
        SequenceEvent::Started { scene_count } => Some(format!("[intro] {scene_count} scenes")),
        SequenceEvent::SceneActivated { index, id } => Some(format!("[intro] > {index}:{id}")),
        SequenceEvent::SceneEnded { id, cause, .. } => Some(format!("[intro] < {id} ({cause})")),
        SequenceEvent::Skipped { index } => Some(format!("[intro] skipped at {index}")),
        SequenceEvent::Completed => Some("[intro] complete".to_string()),
        SequenceEvent::Disposed => None,
    }
}
