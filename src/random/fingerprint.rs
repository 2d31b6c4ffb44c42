//! Stable identity for a generator across process restarts.

use super::philox::GeneratorState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `key0_key1_counter2_counter3`, captured when a generator registers.
///
/// The low counter words are left out because they move with every
/// reservation; the seed-derived words do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(state: &GeneratorState) -> Self {
        Self(format!(
            "{}_{}_{}_{}",
            state.key[0], state.key[1], state.counter[2], state.counter[3]
        ))
    }

    /// Wrap a token read back from a history file.
    pub fn from_token(token: &str) -> Self {
        Self(token.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
