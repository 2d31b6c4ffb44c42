//! # Checkpoint Configuration
//!
//! Static settings for the checkpoint subsystem: where evicted iterators are
//! staged, which control-signal names the registries read, which ops opt
//! their random generators into checkpointing, and how logging is set up.
//!
//! Values come from defaults, an optional config file, and
//! `CHECKPOINT_CORE__*` environment overrides, in that order.
//!
//! ```rust,no_run
//! use checkpoint_core::config::CheckpointConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CheckpointConfig::load(None)?;
//! println!("staging evicted iterators under {}", config.staging_dir.display());
//! # Ok(())
//! # }
//! ```

use crate::constants::{self, signals};
use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Holding directory for state of iterators evicted before a save
    pub staging_dir: PathBuf,

    /// Names of the control signals read from the command source
    pub signals: SignalKeys,

    /// Which generators opt into checkpointing
    pub random: RandomTrackingConfig,

    pub logging: LoggingConfig,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from(constants::DEFAULT_STAGING_DIR),
            signals: SignalKeys::default(),
            random: RandomTrackingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalKeys {
    pub random_command: String,
    pub random_state_path: String,
    pub iteration_command: String,
    pub iteration_save_path: String,
    pub iterator_command: String,
    pub iterator_save_path: String,
}

impl Default for SignalKeys {
    fn default() -> Self {
        Self {
            random_command: signals::RANDOM_COMMAND.to_string(),
            random_state_path: signals::RANDOM_STATE_PATH.to_string(),
            iteration_command: signals::ITERATION_COMMAND.to_string(),
            iteration_save_path: signals::ITERATION_SAVE_PATH.to_string(),
            iterator_command: signals::ITERATOR_COMMAND.to_string(),
            iterator_save_path: signals::ITERATOR_SAVE_PATH.to_string(),
        }
    }
}

impl SignalKeys {
    fn all(&self) -> [&str; 6] {
        [
            &self.random_command,
            &self.random_state_path,
            &self.iteration_command,
            &self.iteration_save_path,
            &self.iterator_command,
            &self.iterator_save_path,
        ]
    }
}

/// Op-name policy deciding which generators are checkpointed.
///
/// An op qualifies when its name contains every one of
/// `required_op_substrings`. An empty list tracks every op.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RandomTrackingConfig {
    pub required_op_substrings: Vec<String>,
}

impl Default for RandomTrackingConfig {
    fn default() -> Self {
        Self {
            required_op_substrings: vec![
                "random_uniform/RandomUniform".to_string(),
                "dropout".to_string(),
            ],
        }
    }
}

impl RandomTrackingConfig {
    pub fn should_track(&self, op_name: &str) -> bool {
        self.required_op_substrings
            .iter()
            .all(|needle| op_name.contains(needle.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter level when `CHECKPOINT_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of the compact human format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl CheckpointConfig {
    /// Load defaults, then the optional file, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading checkpoint configuration file");
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(constants::CONFIG_ENV_PREFIX).separator("__"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.staging_dir.as_os_str().is_empty() {
            return Err(CheckpointError::InvalidConfiguration(
                "staging_dir cannot be empty".to_string(),
            ));
        }

        let keys = self.signals.all();
        if let Some(empty) = keys.iter().position(|key| key.trim().is_empty()) {
            return Err(CheckpointError::InvalidConfiguration(format!(
                "signal key #{empty} cannot be empty"
            )));
        }
        let distinct: HashSet<&str> = keys.iter().copied().collect();
        if distinct.len() != keys.len() {
            return Err(CheckpointError::InvalidConfiguration(
                "signal keys must be pairwise distinct".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            level => Err(CheckpointError::InvalidConfiguration(format!(
                "unknown log level: {level}"
            ))),
        }
    }
}
