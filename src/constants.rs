//! # System Constants
//!
//! Signal names, file-format constants and counter layout shared by the
//! registries.

/// Default names of the process-wide control signals.
pub mod signals {
    /// Random generator command: "1" load+restore, "2" save, "3" restore only.
    pub const RANDOM_COMMAND: &str = "CHECKPOINT_RNG_CMD";
    /// Path of the random generator history file.
    pub const RANDOM_STATE_PATH: &str = "CHECKPOINT_RNG_STATE";
    /// Iteration counter command: "0" idle, "1" load, "2" save.
    pub const ITERATION_COMMAND: &str = "CHECKPOINT_ITERATION_CMD";
    /// Directory holding one file per iteration counter.
    pub const ITERATION_SAVE_PATH: &str = "CHECKPOINT_ITERATION_SAVEPATH";
    /// Iterator command: "0" idle, "1" restore, "2" save.
    pub const ITERATOR_COMMAND: &str = "CHECKPOINT_ITER_CMD";
    /// Directory holding one file per iterator.
    pub const ITERATOR_SAVE_PATH: &str = "CHECKPOINT_ITER_SAVEPATH";
}

/// Iteration counter layout: epoch in the high 32 bits, position in the low.
pub mod iteration {
    pub const EPOCH_UNIT: u64 = 1 << 32;
    pub const POSITION_MASK: u64 = EPOCH_UNIT - 1;

    pub fn epoch_of(value: u64) -> u32 {
        (value >> 32) as u32
    }

    pub fn position_of(value: u64) -> u32 {
        (value & POSITION_MASK) as u32
    }

    pub fn compose(epoch: u32, position: u32) -> u64 {
        (u64::from(epoch) << 32) | u64::from(position)
    }
}

/// Number of 32-bit words persisted per generator: 2 key words + 4 counter words.
pub const GENERATOR_STATE_WORDS: usize = 6;

/// Default holding directory for evicted iterators.
pub const DEFAULT_STAGING_DIR: &str = "./temp";

/// Environment variable consulted for a log filter override.
pub const LOG_FILTER_ENV: &str = "CHECKPOINT_LOG";

/// Environment prefix for configuration overrides.
pub const CONFIG_ENV_PREFIX: &str = "CHECKPOINT_CORE";
