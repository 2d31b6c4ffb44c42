//! # Iteration Counter Registry
//!
//! Named, monotonically increasing step counters. A value packs an epoch in
//! the high 32 bits and a position within the epoch in the low 32 bits:
//!
//! ```text
//! 0x00000001_0000000A   epoch 1, position 10
//!   reset_epoch ->
//! 0x00000002_00000000   epoch 2, position 0
//! ```
//!
//! Only [`IterationCounterRegistry::reset_epoch`] moves to a new epoch on
//! purpose. [`IterationCounterRegistry::advance`] is a plain 64-bit
//! increment, so a position of `0xFFFFFFFF` carries into the epoch bits; that
//! carry is logged as a warning rather than prevented.

use super::pass_guard::PassDepth;
use crate::constants::iteration::{position_of, EPOCH_UNIT, POSITION_MASK};
use crate::error::{CheckpointError, Result};
use crate::execution::{CommandChannel, CounterCommand};
use crate::logging::log_checkpoint_operation;
use crate::utils::fs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// What [`IterationCounterRegistry::save_or_load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFileAction {
    /// No counter command was pending
    Idle,
    Loaded(u64),
    Saved(u64),
}

#[derive(Debug)]
pub struct IterationCounterRegistry {
    commands: CommandChannel,
    pass: PassDepth,
    counters: Mutex<HashMap<String, u64>>,
}

impl IterationCounterRegistry {
    pub fn new(commands: CommandChannel, pass: PassDepth) -> Self {
        Self {
            commands,
            pass,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Return the current value, then increment it.
    pub fn advance(&self, name: &str) -> u64 {
        let mut counters = self.counters.lock();
        let value = counters.entry(name.to_string()).or_insert(0);
        let current = *value;
        if position_of(current) == POSITION_MASK as u32 {
            warn!(
                counter = name,
                value = %format!("{current:#018x}"),
                "Iteration position overflows into the epoch bits"
            );
        }
        *value = current.wrapping_add(1);
        current
    }

    /// Current value; creates the counter at zero on first use.
    pub fn peek(&self, name: &str) -> u64 {
        *self
            .counters
            .lock()
            .entry(name.to_string())
            .or_insert(0)
    }

    /// Move to the start of the next epoch, discarding in-epoch progress.
    ///
    /// Returns the new value, or `None` while a save/restore pass is running.
    pub fn reset_epoch(&self, name: &str) -> Option<u64> {
        if self.pass.is_active() {
            debug!(counter = name, "Epoch reset suppressed during checkpoint pass");
            return None;
        }

        let mut counters = self.counters.lock();
        let value = counters.entry(name.to_string()).or_insert(0);
        *value = (*value & !POSITION_MASK).wrapping_add(EPOCH_UNIT);
        debug!(
            counter = name,
            value = %format!("{:#018x}", *value),
            "Reset iteration counter to next epoch"
        );
        Some(*value)
    }

    /// Overwrite a counter.
    pub fn set(&self, name: &str, value: u64) {
        self.counters.lock().insert(name.to_string(), value);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.counters.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Apply a pending counter command to `name`.
    ///
    /// Load replaces the in-memory value from `<dir>/<name>`; save writes it
    /// there. Either way the command is reset to idle afterwards, even when
    /// the file operation failed.
    pub fn save_or_load(&self, name: &str) -> Result<CounterFileAction> {
        let result = match self.commands.counter_command() {
            CounterCommand::Idle => return Ok(CounterFileAction::Idle),
            CounterCommand::Load => self.load_counter(name).map(CounterFileAction::Loaded),
            CounterCommand::Save => self.save_counter(name).map(CounterFileAction::Saved),
        };
        self.commands.set_counter_command(CounterCommand::Idle);

        if let Err(err) = &result {
            error!(counter = name, %err, "Iteration counter file operation failed");
        }
        result
    }

    fn load_counter(&self, name: &str) -> Result<u64> {
        let path = self.counter_path(name)?;
        info!(counter = name, path = %path.display(), "Start to restore iteration counter");

        let text = fs::read_string(&path)?;
        let value = text.trim().parse::<u64>().map_err(|e| {
            CheckpointError::malformed(format!("counter file {}", path.display()), e.to_string())
        })?;

        self.counters.lock().insert(name.to_string(), value);
        log_checkpoint_operation("counter_registry", "load", Some(name), "completed", None);
        Ok(value)
    }

    fn save_counter(&self, name: &str) -> Result<u64> {
        let path = self.counter_path(name)?;
        info!(counter = name, path = %path.display(), "Start to save iteration counter");

        let mut counters = self.counters.lock();
        let value = *counters.entry(name.to_string()).or_insert(0);
        fs::write_atomic(&path, value.to_string().as_bytes())?;
        drop(counters);

        log_checkpoint_operation("counter_registry", "save", Some(name), "completed", None);
        Ok(value)
    }

    fn counter_path(&self, name: &str) -> Result<PathBuf> {
        let dir = self
            .commands
            .counter_dir()
            .ok_or_else(|| CheckpointError::MissingSignal {
                key: self.commands.keys().iteration_save_path.clone(),
            })?;
        Ok(fs::checkpoint_file(&dir, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalKeys;
    use crate::constants::iteration::compose;
    use crate::execution::InMemoryCommandSource;
    use std::sync::Arc;

    fn registry() -> IterationCounterRegistry {
        let channel = CommandChannel::new(
            Arc::new(InMemoryCommandSource::new()),
            SignalKeys::default(),
        );
        IterationCounterRegistry::new(channel, PassDepth::new())
    }

    #[test]
    fn test_advance_returns_then_increments() {
        let registry = registry();
        assert_eq!(registry.advance("step"), 0);
        assert_eq!(registry.advance("step"), 1);
        assert_eq!(registry.peek("step"), 2);
        assert_eq!(registry.peek("other"), 0);
        assert_eq!(registry.names(), vec!["other".to_string(), "step".to_string()]);
    }

    #[test]
    fn test_reset_epoch() {
        let registry = registry();
        registry.set("step", compose(1, 10));
        assert_eq!(registry.reset_epoch("step"), Some(0x0000_0002_0000_0000));
        assert_eq!(registry.reset_epoch("fresh"), Some(EPOCH_UNIT));
    }

    #[test]
    fn test_reset_epoch_suppressed_during_pass() {
        let registry = registry();
        registry.set("step", compose(1, 10));
        let _pass = registry.pass.enter();
        assert_eq!(registry.reset_epoch("step"), None);
        assert_eq!(registry.peek("step"), compose(1, 10));
    }

    #[test]
    fn test_position_carries_into_epoch() {
        let registry = registry();
        registry.set("step", compose(3, u32::MAX));
        assert_eq!(registry.advance("step"), compose(3, u32::MAX));
        assert_eq!(registry.peek("step"), compose(4, 0));
    }

    #[test]
    fn test_idle_command_touches_nothing() {
        let registry = registry();
        assert_eq!(registry.save_or_load("step").unwrap(), CounterFileAction::Idle);
    }
}
