//! Injectable source of process-wide control signals.
//!
//! Registries never read the environment directly. They hold a
//! [`CommandChannel`] wrapping some [`CommandSource`]: the process
//! environment in production, an in-memory map in tests or when several
//! logical processes share one binary.

use super::command::{CounterCommand, IteratorCommand, RandomCommand};
use crate::config::SignalKeys;
use dashmap::DashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{trace, warn};

/// Key/value store of string-valued control signals.
pub trait CommandSource: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str);
}

/// Signals carried in process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCommandSource;

impl CommandSource for EnvCommandSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set(&self, key: &str, value: &str) {
        std::env::set_var(key, value);
    }
}

/// Signals held in memory, isolated from the environment.
#[derive(Debug, Default)]
pub struct InMemoryCommandSource {
    values: DashMap<String, String>,
}

impl InMemoryCommandSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = Self::new();
        for (key, value) in values {
            source.values.insert(key.into(), value.into());
        }
        source
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, value)| value)
    }
}

impl CommandSource for InMemoryCommandSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| value.clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// Typed view over a [`CommandSource`] using the configured signal names.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    source: Arc<dyn CommandSource>,
    keys: SignalKeys,
}

impl CommandChannel {
    pub fn new(source: Arc<dyn CommandSource>, keys: SignalKeys) -> Self {
        Self { source, keys }
    }

    pub fn keys(&self) -> &SignalKeys {
        &self.keys
    }

    pub fn source(&self) -> &Arc<dyn CommandSource> {
        &self.source
    }

    pub fn random_command(&self) -> RandomCommand {
        self.read_command(&self.keys.random_command)
    }

    pub fn set_random_command(&self, command: RandomCommand) {
        self.write_command(&self.keys.random_command, command.as_signal());
    }

    pub fn counter_command(&self) -> CounterCommand {
        self.read_command(&self.keys.iteration_command)
    }

    pub fn set_counter_command(&self, command: CounterCommand) {
        self.write_command(&self.keys.iteration_command, command.as_signal());
    }

    pub fn iterator_command(&self) -> IteratorCommand {
        self.read_command(&self.keys.iterator_command)
    }

    pub fn set_iterator_command(&self, command: IteratorCommand) {
        self.write_command(&self.keys.iterator_command, command.as_signal());
    }

    /// History file for random generator state.
    pub fn random_state_path(&self) -> Option<PathBuf> {
        self.read_path(&self.keys.random_state_path)
    }

    /// Directory with one file per iteration counter.
    pub fn counter_dir(&self) -> Option<PathBuf> {
        self.read_path(&self.keys.iteration_save_path)
    }

    /// Directory with one file per iterator.
    pub fn iterator_dir(&self) -> Option<PathBuf> {
        self.read_path(&self.keys.iterator_save_path)
    }

    fn read_command<C>(&self, key: &str) -> C
    where
        C: FromStr<Err = String> + Default,
    {
        match self.source.get(key) {
            None => C::default(),
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(signal = key, value = %raw, "{err}");
                C::default()
            }),
        }
    }

    fn write_command(&self, key: &str, value: &str) {
        trace!(signal = key, value, "Advancing checkpoint signal");
        self.source.set(key, value);
    }

    fn read_path(&self, key: &str) -> Option<PathBuf> {
        self.source
            .get(key)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}
