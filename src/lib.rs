#![allow(clippy::doc_markdown)] // Allow technical terms like Philox in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Checkpoint Core Rust
//!
//! Checkpoint and restore coordination for a running dataflow engine.
//!
//! ## Overview
//!
//! A training or data-processing job carries three kinds of hidden progress
//! that must survive a restart for the job to resume exactly where it
//! stopped: the state of its random generators, its named step counters,
//! and the position of its input iterators. This crate tracks all three and
//! saves or restores them when an out-of-band control signal asks for it.
//!
//! ## Architecture
//!
//! Every registry is driven from *touch points*: ordinary calls the engine
//! makes anyway (reserving random blocks, advancing a counter, creating an
//! iterator). Each touch point reads the pending command and, if one is set,
//! performs the save or restore and moves the signal to its next value.
//!
//! ## Module Organization
//!
//! - [`execution`] - Command codes and the command channel
//! - [`random`] - Counter-based generator, fingerprints, guarded sources
//! - [`registry`] - Random, counter, and iterator checkpoint registries
//! - [`context`] - Process-scoped owner of the registries
//! - [`variant`] - Self-describing records iterators save into
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use checkpoint_core::config::CheckpointConfig;
//! use checkpoint_core::CheckpointContext;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let context = CheckpointContext::from_env(CheckpointConfig::load(None)?);
//!
//! let dropout = context.guarded_random_source();
//! dropout.initialize_for_op(
//!     "model/dropout/random_uniform/RandomUniform",
//!     42,
//!     7,
//!     &context.config().random,
//! );
//! let _block = dropout.reserve(256);
//!
//! let step = context.counters().advance("global_step");
//! println!("step {step}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod execution;
pub mod logging;
pub mod random;
pub mod registry;
pub mod utils;
pub mod variant;

pub use config::{CheckpointConfig, LoggingConfig, RandomTrackingConfig, SignalKeys};
pub use context::CheckpointContext;
pub use error::{CheckpointError, Result};
pub use execution::{
    CommandChannel, CommandSource, CounterCommand, EnvCommandSource, InMemoryCommandSource,
    IteratorCommand, RandomCommand,
};
pub use random::{CounterRng, Fingerprint, GeneratorState, GuardedRandomSource, PhiloxRandom};
pub use registry::{
    CheckpointIterator, CounterFileAction, DispatchResult, IterationCounterRegistry,
    IteratorCheckpointRegistry, RandomCheckpointRegistry, RestoreContext, RestoreOutcome,
    SaveSummary,
};
pub use variant::{VariantReader, VariantRecord, VariantWriter};
