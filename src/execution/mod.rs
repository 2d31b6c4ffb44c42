//! # Command Protocol
//!
//! Out-of-band control signals that tell the registries what to do at their
//! next touch point. A signal is read on every touch point and overwritten
//! when the requested transition completes:
//!
//! ```text
//! random:    idle ──"1"──> load+restore ──load──> "3" restore-only ... "0"
//!            idle ──"2"──> save ──saved──> "0"
//! counter:   "1" load / "2" save ──done──> "0"
//! iterator:  "1" restore (left in place) / "2" save ──saved──> "0"
//! ```

pub mod command;
pub mod command_channel;

pub use command::{CounterCommand, IteratorCommand, RandomCommand};
pub use command_channel::{CommandChannel, CommandSource, EnvCommandSource, InMemoryCommandSource};
