//! # Random Generators
//!
//! The counter-based generator primitive, the fingerprint that identifies a
//! generator across restarts, and the guarded per-call-site source that ops
//! reserve random output from.

pub mod fingerprint;
pub mod guarded_random;
pub mod philox;

pub use fingerprint::Fingerprint;
pub use guarded_random::{GuardedRandomSource, SeedPair};
pub use philox::{Counter, CounterRng, GeneratorState, Key, PhiloxRandom};
