//! # Checkpoint Context
//!
//! Owns one instance of every registry plus the command channel they share.
//! Hosts create a context once at startup and pass it (or the `Arc`s it hands
//! out) to the code that reserves random blocks, advances counters, or
//! creates iterators.
//!
//! ```rust
//! use checkpoint_core::config::CheckpointConfig;
//! use checkpoint_core::execution::{InMemoryCommandSource, RandomCommand};
//! use checkpoint_core::CheckpointContext;
//! use std::sync::Arc;
//!
//! let commands = Arc::new(InMemoryCommandSource::new());
//! let context = CheckpointContext::new(CheckpointConfig::default(), commands);
//!
//! assert_eq!(context.commands().random_command(), RandomCommand::Idle);
//! assert_eq!(context.counters().advance("global_step"), 0);
//! ```

use crate::config::CheckpointConfig;
use crate::execution::{CommandChannel, CommandSource, EnvCommandSource, InMemoryCommandSource};
use crate::logging::init_structured_logging;
use crate::random::{CounterRng, GuardedRandomSource, PhiloxRandom};
use crate::registry::{
    IterationCounterRegistry, IteratorCheckpointRegistry, PassDepth, RandomCheckpointRegistry,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug)]
pub struct CheckpointContext {
    config: CheckpointConfig,
    commands: CommandChannel,
    random: Arc<RandomCheckpointRegistry>,
    counters: Arc<IterationCounterRegistry>,
    iterators: Arc<IteratorCheckpointRegistry>,
}

impl CheckpointContext {
    pub fn new(config: CheckpointConfig, source: Arc<dyn CommandSource>) -> Self {
        let commands = CommandChannel::new(source, config.signals.clone());
        let pass = PassDepth::new();

        let random = Arc::new(RandomCheckpointRegistry::new(commands.clone()));
        let counters = Arc::new(IterationCounterRegistry::new(commands.clone(), pass.clone()));
        let iterators = Arc::new(IteratorCheckpointRegistry::new(
            commands.clone(),
            pass,
            config.staging_dir.clone(),
        ));

        info!(
            staging_dir = %config.staging_dir.display(),
            random_signal = %config.signals.random_command,
            "Checkpoint context created"
        );

        Self {
            config,
            commands,
            random,
            counters,
            iterators,
        }
    }

    /// Context whose control signals are process environment variables.
    /// Also initializes logging from `config.logging`.
    pub fn from_env(config: CheckpointConfig) -> Self {
        init_structured_logging(&config.logging);
        Self::new(config, Arc::new(EnvCommandSource))
    }

    /// Context backed by a private in-memory command source.
    pub fn in_memory(config: CheckpointConfig) -> Self {
        Self::new(config, Arc::new(InMemoryCommandSource::new()))
    }

    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    pub fn commands(&self) -> &CommandChannel {
        &self.commands
    }

    pub fn random(&self) -> &Arc<RandomCheckpointRegistry> {
        &self.random
    }

    pub fn counters(&self) -> &Arc<IterationCounterRegistry> {
        &self.counters
    }

    pub fn iterators(&self) -> &Arc<IteratorCheckpointRegistry> {
        &self.iterators
    }

    /// A fresh, uninitialized source bound to this context's random registry.
    pub fn guarded_random_source(&self) -> GuardedRandomSource {
        self.guarded_random_source_with::<PhiloxRandom>()
    }

    pub fn guarded_random_source_with<G: CounterRng>(&self) -> GuardedRandomSource<G> {
        GuardedRandomSource::new(Arc::clone(&self.random))
    }

    /// Log what is still tracked and drop the context's registry handles.
    ///
    /// Registries stay alive while guarded sources or other `Arc` holders
    /// still reference them.
    pub fn teardown(self) {
        info!(
            generators = self.random.len(),
            pending_history = self.random.pending_history(),
            counters = self.counters.names().len(),
            iterators = self.iterators.names().len(),
            evicted_iterators = self.iterators.evicted().len(),
            "Checkpoint context torn down"
        );
    }
}
