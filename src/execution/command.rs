//! Typed control commands read from the out-of-band signal channel.
//!
//! Signals travel as small decimal strings. Each registry family has its own
//! command vocabulary; an absent signal is always the idle command.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command consumed by the random generator registry's touch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RandomCommand {
    /// Nothing requested ("0" or no signal)
    #[default]
    Idle,
    /// Load the history file, then restore generators as they are touched ("1")
    LoadAndRestore,
    /// Save every live generator ("2")
    Save,
    /// History already loaded; keep restoring generators as they are touched ("3")
    RestoreOnly,
}

impl RandomCommand {
    pub fn as_signal(&self) -> &'static str {
        match self {
            Self::Idle => "0",
            Self::LoadAndRestore => "1",
            Self::Save => "2",
            Self::RestoreOnly => "3",
        }
    }
}

impl fmt::Display for RandomCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LoadAndRestore => write!(f, "load_and_restore"),
            Self::Save => write!(f, "save"),
            Self::RestoreOnly => write!(f, "restore_only"),
        }
    }
}

impl std::str::FromStr for RandomCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_code(s)? {
            0 => Ok(Self::Idle),
            1 => Ok(Self::LoadAndRestore),
            2 => Ok(Self::Save),
            3 => Ok(Self::RestoreOnly),
            code => Err(format!("Random command {code} can not be handled")),
        }
    }
}

/// Command consumed by the iteration counter registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CounterCommand {
    #[default]
    Idle,
    Load,
    Save,
}

impl CounterCommand {
    pub fn as_signal(&self) -> &'static str {
        match self {
            Self::Idle => "0",
            Self::Load => "1",
            Self::Save => "2",
        }
    }
}

impl fmt::Display for CounterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Load => write!(f, "load"),
            Self::Save => write!(f, "save"),
        }
    }
}

impl std::str::FromStr for CounterCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_code(s)? {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Load),
            2 => Ok(Self::Save),
            code => Err(format!("Iteration cmd {code} can not be handled")),
        }
    }
}

/// Command consumed by the iterator registry.
///
/// `Restore` is left in place by the registry so that repeated touch points
/// keep restoring newly reached iterators; the environment clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IteratorCommand {
    #[default]
    Idle,
    Restore,
    Save,
}

impl IteratorCommand {
    pub fn as_signal(&self) -> &'static str {
        match self {
            Self::Idle => "0",
            Self::Restore => "1",
            Self::Save => "2",
        }
    }
}

impl fmt::Display for IteratorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Restore => write!(f, "restore"),
            Self::Save => write!(f, "save"),
        }
    }
}

impl std::str::FromStr for IteratorCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_code(s)? {
            0 => Ok(Self::Idle),
            1 => Ok(Self::Restore),
            2 => Ok(Self::Save),
            code => Err(format!("Iterator cmd {code} can not be handled")),
        }
    }
}

fn parse_code(s: &str) -> Result<i64, String> {
    s.trim()
        .parse::<i64>()
        .map_err(|_| format!("Invalid command signal: {s:?}"))
}
