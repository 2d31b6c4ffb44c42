//! # Random Checkpoint Registry
//!
//! Tracks generators that opted into checkpointing and replays their state
//! after a restart.
//!
//! ## Identity
//!
//! A generator is identified across restarts by its [`Fingerprint`], derived
//! from the seed-determined part of its state at registration time. No caller
//! supplies an id; two processes started with the same seeds produce the same
//! fingerprints.
//!
//! ## Protocol
//!
//! [`RandomCheckpointRegistry::monitor`] is the touch point called before
//! every reservation:
//!
//! - `"1"` load the history file (once per request), restore this generator,
//!   advance the signal to `"3"`
//! - `"3"` restore this generator if it still has an unconsumed entry
//! - `"2"` write every live generator to the history file, reset to `"0"`
//!
//! History entries are consumed on restore, so each fingerprint is restored
//! at most once per load no matter how many reservations race.
//!
//! ## History file
//!
//! One line per generator: `fingerprint key0 key1 counter0 counter1 counter2 counter3`.

use crate::constants::GENERATOR_STATE_WORDS;
use crate::error::{CheckpointError, Result};
use crate::execution::{CommandChannel, RandomCommand};
use crate::logging::log_checkpoint_operation;
use crate::random::{CounterRng, Fingerprint, GeneratorState};
use crate::utils::fs;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Process-local handle for one registered generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratorId(u64);

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rng#{}", self.0)
    }
}

/// Returned by [`RandomCheckpointRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredGenerator {
    id: GeneratorId,
    fingerprint: Fingerprint,
}

impl RegisteredGenerator {
    pub fn id(&self) -> GeneratorId {
        self.id
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

#[derive(Debug)]
struct TrackedGenerator {
    fingerprint: Fingerprint,
    /// Mirror of the live state, refreshed after every reservation
    state: GeneratorState,
}

/// Parsed history: fingerprint to persisted words.
pub type History = HashMap<Fingerprint, Vec<u32>>;

#[derive(Debug)]
pub struct RandomCheckpointRegistry {
    commands: CommandChannel,
    next_id: AtomicU64,
    live: DashMap<GeneratorId, TrackedGenerator>,
    /// Loaded-but-unconsumed entries; the lock also serializes command transitions
    history: Mutex<History>,
}

impl RandomCheckpointRegistry {
    pub fn new(commands: CommandChannel) -> Self {
        Self {
            commands,
            next_id: AtomicU64::new(1),
            live: DashMap::new(),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Make a generator eligible for checkpointing.
    ///
    /// Call once per generator, before its first reservation.
    pub fn register(&self, state: GeneratorState) -> RegisteredGenerator {
        let fingerprint = Fingerprint::of(&state);

        if self
            .live
            .iter()
            .any(|entry| entry.value().fingerprint == fingerprint)
        {
            warn!(
                fingerprint = %fingerprint,
                "Fingerprint collision between live generators; their checkpoints will overwrite each other"
            );
        }

        let id = GeneratorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live.insert(
            id,
            TrackedGenerator {
                fingerprint: fingerprint.clone(),
                state,
            },
        );
        debug!(generator = %id, fingerprint = %fingerprint, "Registered generator for checkpointing");

        RegisteredGenerator { id, fingerprint }
    }

    pub fn deregister(&self, id: GeneratorId) -> bool {
        let removed = self.live.remove(&id).is_some();
        if removed {
            debug!(generator = %id, "Deregistered generator");
        }
        removed
    }

    pub fn fingerprint(&self, id: GeneratorId) -> Option<Fingerprint> {
        self.live.get(&id).map(|entry| entry.fingerprint.clone())
    }

    /// Number of live registered generators.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of loaded history entries not yet consumed by a restore.
    pub fn pending_history(&self) -> usize {
        self.history.lock().len()
    }

    /// Refresh the mirrored state of a registered generator.
    pub(crate) fn track(&self, id: GeneratorId, state: GeneratorState) {
        if let Some(mut entry) = self.live.get_mut(&id) {
            entry.state = state;
        }
    }

    /// Touch point run before every reservation.
    ///
    /// `registration` is `None` for generators that did not opt in; they can
    /// still trigger a save of the others but are never restored.
    pub fn monitor<G: CounterRng>(&self, registration: Option<&RegisteredGenerator>, rng: &mut G) {
        match self.commands.random_command() {
            RandomCommand::Idle => {}
            RandomCommand::LoadAndRestore => {
                self.load_requested_history();
                if let Some(registration) = registration {
                    self.restore(registration, rng);
                }
            }
            RandomCommand::RestoreOnly => {
                if let Some(registration) = registration {
                    self.restore(registration, rng);
                }
            }
            RandomCommand::Save => {
                if let Some(registration) = registration {
                    self.track(registration.id, rng.state());
                }
                self.save_requested();
            }
        }
    }

    /// Restore `rng` from its history entry and consume the entry.
    ///
    /// Returns false when there is nothing to restore: no entry, an entry
    /// already consumed, or an entry without exactly six words.
    pub fn restore<G: CounterRng>(&self, registration: &RegisteredGenerator, rng: &mut G) -> bool {
        let state = {
            let mut history = self.history.lock();
            match history.get(&registration.fingerprint) {
                None => return false,
                Some(words) if words.len() != GENERATOR_STATE_WORDS => {
                    debug!(
                        fingerprint = %registration.fingerprint,
                        words = words.len(),
                        "Skipping restore of malformed history entry"
                    );
                    return false;
                }
                Some(_) => {}
            }
            match history
                .remove(&registration.fingerprint)
                .and_then(|words| GeneratorState::from_words(&words))
            {
                Some(state) => state,
                None => return false,
            }
        };

        rng.reset_state(state.key, state.counter);
        self.track(registration.id, state);
        info!(
            generator = %registration.id,
            fingerprint = %registration.fingerprint,
            "Restored generator state"
        );
        true
    }

    /// Load the history file into memory, replacing entries with the same
    /// fingerprint. Returns the number of entries read.
    pub fn load_history(&self) -> Result<usize> {
        let path = self.state_path()?;
        let entries = read_history(&path)?;
        let count = entries.len();
        self.history.lock().extend(entries);
        Ok(count)
    }

    /// Write every live registered generator to the history file.
    /// Returns the number of generators written.
    pub fn save_all(&self) -> Result<usize> {
        let path = self.state_path()?;

        let mut snapshot: Vec<(Fingerprint, GeneratorState)> = self
            .live
            .iter()
            .map(|entry| (entry.fingerprint.clone(), entry.state))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        fs::write_atomic(&path, format_history(&snapshot).as_bytes())?;

        log_checkpoint_operation(
            "random_registry",
            "save",
            None,
            "completed",
            Some(&format!("{} generators to {}", snapshot.len(), path.display())),
        );
        Ok(snapshot.len())
    }

    fn load_requested_history(&self) {
        let mut history = self.history.lock();
        // A racing reservation may have served this request already
        if self.commands.random_command() != RandomCommand::LoadAndRestore {
            return;
        }

        match self.state_path().and_then(|path| read_history(&path)) {
            Ok(entries) => {
                let count = entries.len();
                history.extend(entries);
                log_checkpoint_operation(
                    "random_registry",
                    "load",
                    None,
                    "completed",
                    Some(&format!("{count} history entries")),
                );
            }
            Err(err) if err.is_not_found() => {
                debug!(%err, "No random history to load");
            }
            Err(err) => {
                warn!(%err, "Skipping random history load");
            }
        }

        self.commands.set_random_command(RandomCommand::RestoreOnly);
    }

    fn save_requested(&self) {
        let _transition = self.history.lock();
        if self.commands.random_command() != RandomCommand::Save {
            return;
        }

        if let Err(err) = self.save_all() {
            error!(%err, "Failed to save random generator state");
        }
        self.commands.set_random_command(RandomCommand::Idle);
    }

    fn state_path(&self) -> Result<std::path::PathBuf> {
        self.commands
            .random_state_path()
            .ok_or_else(|| CheckpointError::MissingSignal {
                key: self.commands.keys().random_state_path.clone(),
            })
    }
}

fn format_history(entries: &[(Fingerprint, GeneratorState)]) -> String {
    let mut out = String::new();
    for (fingerprint, state) in entries {
        let [k0, k1, c0, c1, c2, c3] = state.to_words();
        out.push_str(&format!("{fingerprint} {k0} {k1} {c0} {c1} {c2} {c3}\n"));
    }
    out
}

fn read_history(path: &Path) -> Result<History> {
    let text = fs::read_string(path)?;
    Ok(parse_history(&text))
}

/// Parse history text. Lines with non-numeric words are skipped; lines with
/// the wrong number of words are kept and rejected later at restore time.
pub fn parse_history(text: &str) -> History {
    let mut history = HashMap::new();
    for (index, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(fingerprint) = tokens.next() else {
            continue;
        };
        match tokens.map(str::parse::<u32>).collect::<std::result::Result<Vec<_>, _>>() {
            Ok(words) => {
                history.insert(Fingerprint::from_token(fingerprint), words);
            }
            Err(err) => {
                warn!(line = index + 1, fingerprint, %err, "Skipping malformed random history line");
            }
        }
    }
    history
}
