//! # Checkpoint Registries
//!
//! Process-wide registries of stateful objects whose state is saved to, and
//! restored from, disk when the command channel asks for it.
//!
//! ## Available Registries
//!
//! - **RandomCheckpointRegistry**: Live generators, keyed by fingerprint
//! - **IterationCounterRegistry**: Named epoch/position step counters
//! - **IteratorCheckpointRegistry**: Live iterators, keyed by name
//!
//! ## Architecture
//!
//! ```text
//! Checkpoint Registries
//! ├── RandomCheckpointRegistry    (history file, one line per generator)
//! ├── IterationCounterRegistry    (one decimal file per counter)
//! └── IteratorCheckpointRegistry  (one variant record file per iterator)
//!        │
//!        └── PassDepth  (shared with the counter registry; suppresses
//!                        re-entrant calls while a pass is running)
//! ```
//!
//! None of the registries is a global. A [`crate::CheckpointContext`] owns
//! one of each and hands out shared references.

pub mod counter_registry;
pub mod iterator_registry;
pub mod pass_guard;
pub mod random_registry;

pub use counter_registry::{CounterFileAction, IterationCounterRegistry};
pub use iterator_registry::{
    CheckpointIterator, DispatchResult, IteratorCheckpointRegistry, RestoreContext,
    RestoreOutcome, SaveSummary, SerializationContext,
};
pub use pass_guard::{PassDepth, PassGuard};
pub use random_registry::{
    parse_history, GeneratorId, History, RandomCheckpointRegistry, RegisteredGenerator,
};
