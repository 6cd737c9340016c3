//! TOML Configuration File Support
//!
//! Loads intro settings from `~/.config/prisma/intro.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [sequence]
//! fallback_grace_ms = 1500
//! skip_enabled = true
//!
//! [host]
//! teardown_delay_ms = 500
//!
//! [ambient]
//! seed = 42
//!
//! [[scenes]]
//! id = "darkness"
//! order = 0
//! duration_ms = 500
//!
//! [[scenes]]
//! id = "reveal"
//! order = 1
//! duration_ms = 300
//! end = "animation"
//! exit_transition = { kind = "crossfade", duration_ms = 250 }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::{ControllerConfig, DEFAULT_FALLBACK_GRACE_MS};
use crate::scene::{SceneDescriptor, SceneError, SceneTable};

/// Delay between the completion signal and the main interface mounting
pub const DEFAULT_TEARDOWN_DELAY_MS: u64 = 500;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The configured scene table is malformed
    #[error("Invalid scene table: {0}")]
    InvalidScenes(#[from] SceneError),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Sequence section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceToml {
    /// Grace added to animation-driven scenes before the fallback fires
    pub fallback_grace_ms: Option<u64>,

    /// Whether the intro may be skipped
    pub skip_enabled: Option<bool>,
}

/// Host section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostToml {
    /// Delay between completion and mounting the main interface
    pub teardown_delay_ms: Option<u64>,
}

/// Ambient effects section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientToml {
    /// RNG seed shared by all ambient effects
    pub seed: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroToml {
    /// Sequence configuration section
    pub sequence: SequenceToml,

    /// Host configuration section
    pub host: HostToml,

    /// Ambient configuration section
    pub ambient: AmbientToml,

    /// Full scene table override
    pub scenes: Option<Vec<SceneDescriptor>>,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved intro configuration
#[derive(Clone, Debug)]
pub struct IntroConfig {
    /// Scenes to play
    pub scenes: SceneTable,

    /// Grace added to animation-driven scenes before the fallback fires
    pub fallback_grace: Duration,

    /// Whether the intro may be skipped
    pub skip_enabled: bool,

    /// Delay between completion and mounting the main interface
    pub teardown_delay: Duration,

    /// RNG seed for ambient effects
    pub ambient_seed: Option<u64>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for IntroConfig {
    fn default() -> Self {
        Self {
            scenes: SceneTable::prisma_default(),
            fallback_grace: Duration::from_millis(DEFAULT_FALLBACK_GRACE_MS),
            skip_enabled: true,
            teardown_delay: Duration::from_millis(DEFAULT_TEARDOWN_DELAY_MS),
            ambient_seed: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl IntroConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Controller settings derived from this configuration
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
            .with_fallback_grace(self.fallback_grace)
            .with_skip_enabled(self.skip_enabled)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/prisma/intro.toml` or
/// `~/.config/prisma/intro.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("prisma").join("intro.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// its scene table is malformed. A missing config file is not an error.
pub fn load_config() -> Result<IntroConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if its scene table is malformed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<IntroConfig, ConfigError> {
    let mut config = IntroConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: IntroToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                scenes = config.scenes.len(),
                "Loaded intro configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config);

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut IntroConfig, toml: IntroToml) -> Result<(), ConfigError> {
    if let Some(grace) = toml.sequence.fallback_grace_ms {
        config.fallback_grace = Duration::from_millis(grace);
    }
    if let Some(enabled) = toml.sequence.skip_enabled {
        config.skip_enabled = enabled;
    }
    if let Some(delay) = toml.host.teardown_delay_ms {
        config.teardown_delay = Duration::from_millis(delay);
    }
    if toml.ambient.seed.is_some() {
        config.ambient_seed = toml.ambient.seed;
    }
    if let Some(scenes) = toml.scenes {
        config.scenes = SceneTable::try_new(scenes)?;
    }
    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut IntroConfig) {
    if let Ok(grace) = std::env::var("PRISMA_INTRO_FALLBACK_GRACE_MS") {
        if let Ok(ms) = grace.parse::<u64>() {
            config.fallback_grace = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(delay) = std::env::var("PRISMA_INTRO_TEARDOWN_DELAY_MS") {
        if let Ok(ms) = delay.parse::<u64>() {
            config.teardown_delay = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(skip) = std::env::var("PRISMA_INTRO_SKIP") {
        config.skip_enabled = skip != "0" && skip.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Ok(seed) = std::env::var("PRISMA_INTRO_SEED") {
        if let Ok(s) = seed.parse::<u64>() {
            config.ambient_seed = Some(s);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Skip the intro entirely (plays an empty table)
    pub skip_intro: bool,

    /// Teardown delay override (milliseconds)
    pub teardown_delay_ms: Option<u64>,

    /// Ambient seed override
    pub ambient_seed: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the intro
    #[must_use]
    pub fn with_skip_intro(mut self, skip: bool) -> Self {
        self.skip_intro = skip;
        self
    }

    /// Set teardown delay override
    #[must_use]
    pub fn with_teardown_delay_ms(mut self, ms: u64) -> Self {
        self.teardown_delay_ms = Some(ms);
        self
    }

    /// Set ambient seed override
    #[must_use]
    pub fn with_ambient_seed(mut self, seed: u64) -> Self {
        self.ambient_seed = Some(seed);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.skip_intro && self.teardown_delay_ms.is_none() && self.ambient_seed.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut IntroConfig) {
        if self.is_empty() {
            return;
        }
        if self.skip_intro {
            config.scenes = SceneTable::empty();
        }
        if let Some(ms) = self.teardown_delay_ms {
            config.teardown_delay = Duration::from_millis(ms);
        }
        if let Some(seed) = self.ambient_seed {
            config.ambient_seed = Some(seed);
        }
        config.source = ConfigSource::Cli;
    }
}
