//! # Iterator Checkpoint Registry
//!
//! Name-keyed registry of live stateful iterators owned by the execution
//! engine. The registry keeps only [`Weak`] handles: it never extends an
//! iterator's life and tolerates an iterator vanishing before its
//! bookkeeping catches up.
//!
//! ## Lifecycle
//!
//! ```text
//! add_iterator ──> live ──remove_iterator──> evicted (state staged to a temp file)
//!                   │                           │
//!                   └─────── save_all ──────────┘──> <checkpoint_dir>/<name>
//! ```
//!
//! ## Restore passes
//!
//! A restore pass offers each name at most one restore attempt. Names are
//! marked as attempted before the attempt runs, so an iterator whose restore
//! re-enters the registry is not restored again. Every attempt reports an
//! explicit [`RestoreOutcome`]; attempted names stay marked until
//! [`IteratorCheckpointRegistry::clear_restore_guard`] is called, which means
//! failed restores are not retried within a pass.
//!
//! While a save or restore pass runs, mutation and dispatch entry points are
//! no-ops (see [`PassDepth`]).
//!
//! Iterator restores never touch the random generator command; hosts that
//! want generators reloaded alongside iterators set that signal themselves.

use super::pass_guard::PassDepth;
use crate::error::{CheckpointError, Result};
use crate::execution::{CommandChannel, IteratorCommand};
use crate::logging::log_checkpoint_operation;
use crate::utils::fs;
use crate::variant::{VariantReader, VariantRecord, VariantWriter};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Context passed to an iterator's save.
#[derive(Debug, Clone)]
pub struct SerializationContext {
    iterator_name: String,
}

impl SerializationContext {
    pub fn new(iterator_name: impl Into<String>) -> Self {
        Self {
            iterator_name: iterator_name.into(),
        }
    }

    pub fn iterator_name(&self) -> &str {
        &self.iterator_name
    }
}

/// Engine-supplied context passed through to an iterator's restore.
#[derive(Clone, Default)]
pub struct RestoreContext {
    engine: Option<Arc<dyn Any + Send + Sync>>,
}

impl RestoreContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine<T: Any + Send + Sync>(engine: Arc<T>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    pub fn engine<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.engine.as_deref().and_then(|engine| engine.downcast_ref())
    }
}

impl std::fmt::Debug for RestoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreContext")
            .field("has_engine", &self.engine.is_some())
            .finish()
    }
}

/// A stateful iterator whose progress can be checkpointed.
///
/// Both methods take `&self`; implementors use interior mutability for
/// restore, since the engine keeps using the iterator concurrently.
pub trait CheckpointIterator: Send + Sync {
    fn save(&self, ctx: &SerializationContext, writer: &mut VariantWriter<'_>) -> Result<()>;

    fn restore(&self, ctx: &RestoreContext, reader: &VariantReader<'_>) -> Result<()>;
}

/// Result of one restore attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The name was already offered a restore in this pass
    AlreadyAttempted,
    /// No live iterator under that name
    NotRegistered,
    /// The iterator was dropped by its owner before it could be restored
    Released,
    /// No checkpoint file for the name, or no checkpoint directory configured
    MissingCheckpoint,
    /// The checkpoint file did not parse as a variant record
    Malformed,
    /// The iterator rejected the checkpointed state
    Failed(String),
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, Self::Restored)
    }
}

/// Counts from one [`IteratorCheckpointRegistry::save_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub live_saved: usize,
    pub evicted_copied: usize,
    pub failures: usize,
}

/// What [`IteratorCheckpointRegistry::save_or_restore`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    /// No iterator command pending
    Idle,
    /// Called from inside a running pass
    Suppressed,
    Restored(Vec<(String, RestoreOutcome)>),
    Saved(SaveSummary),
}

#[derive(Default)]
struct IteratorTable {
    live: HashMap<String, Weak<dyn CheckpointIterator>>,
    /// Evicted iterators: name to staged state file
    evicted: BTreeMap<String, PathBuf>,
}

pub struct IteratorCheckpointRegistry {
    commands: CommandChannel,
    pass: PassDepth,
    staging_dir: PathBuf,
    table: Mutex<IteratorTable>,
    /// Names already offered a restore
    restore_guard: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for IteratorCheckpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        f.debug_struct("IteratorCheckpointRegistry")
            .field("staging_dir", &self.staging_dir)
            .field("live", &table.live.len())
            .field("evicted", &table.evicted.len())
            .field("pass_depth", &self.pass.depth())
            .finish()
    }
}

impl IteratorCheckpointRegistry {
    pub fn new(commands: CommandChannel, pass: PassDepth, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            commands,
            pass,
            staging_dir: staging_dir.into(),
            table: Mutex::new(IteratorTable::default()),
            restore_guard: Mutex::new(HashSet::new()),
        }
    }

    /// Track a live iterator under `name`.
    ///
    /// Returns false when a live iterator already holds the name (its handle
    /// is kept) or when a pass is running. A handle whose iterator was
    /// released is replaced, and any state staged for the name is discarded.
    pub fn add_iterator(&self, name: &str, iterator: &Arc<dyn CheckpointIterator>) -> bool {
        if self.pass.is_active() {
            return false;
        }

        let mut table = self.table.lock();
        match table.live.get(name).map(Weak::strong_count) {
            Some(0) => debug!(iterator = name, "Replacing stale handle of a released iterator"),
            Some(_) => {
                warn!(iterator = name, "Duplicated iterator key; keeping the existing iterator");
                return false;
            }
            None => {}
        }
        table.live.insert(name.to_string(), Arc::downgrade(iterator));
        // The new iterator's state supersedes anything staged under this name
        if let Some(staged) = table.evicted.remove(name) {
            debug!(iterator = name, staged = %staged.display(), "Dropped staged state of re-added iterator");
        }
        debug!(iterator = name, "New iterator registered");
        true
    }

    /// Stop tracking `name`, staging its final state for the next save.
    ///
    /// Must run before (or while) the owner disposes of the iterator.
    /// Returns the staged file, or `None` if nothing was staged.
    pub fn remove_iterator(&self, name: &str) -> Option<PathBuf> {
        if self.pass.is_active() {
            return None;
        }

        let handle = self.table.lock().live.get(name).cloned()?;
        let staged = match handle.upgrade() {
            Some(iterator) => {
                let path = fs::checkpoint_file(&self.staging_dir, name);
                match write_iterator_state(name, iterator.as_ref(), &path) {
                    Ok(()) => Some(path),
                    Err(err) => {
                        error!(iterator = name, %err, "Failed to stage evicted iterator");
                        None
                    }
                }
            }
            None => {
                warn!(iterator = name, "Iterator released before removal; nothing staged");
                None
            }
        };

        let mut table = self.table.lock();
        if table.live.get(name).is_some_and(|current| current.ptr_eq(&handle)) {
            table.live.remove(name);
        }
        if let Some(path) = &staged {
            table.evicted.insert(name.to_string(), path.clone());
        }
        debug!(iterator = name, staged = staged.is_some(), "Removed iterator");
        staged
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.lock().live.contains_key(name)
    }

    /// Live iterator names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.lock().live.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evicted names and their staged files.
    pub fn evicted(&self) -> Vec<(String, PathBuf)> {
        self.table
            .lock()
            .evicted
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect()
    }

    /// The live handle for `name`, if its iterator still exists.
    pub fn handle(&self, name: &str) -> Option<Arc<dyn CheckpointIterator>> {
        self.table.lock().live.get(name).and_then(Weak::upgrade)
    }

    pub fn was_restore_attempted(&self, name: &str) -> bool {
        self.restore_guard.lock().contains(name)
    }

    /// Forget which names were offered a restore, allowing a new pass.
    pub fn clear_restore_guard(&self) {
        self.restore_guard.lock().clear();
    }

    /// Read the iterator command and act on it.
    ///
    /// Restore targets `name`, or every live iterator when `all` is set. The
    /// restore command is left in place so later touch points keep
    /// restoring iterators created after this one.
    pub fn save_or_restore(&self, name: &str, ctx: &RestoreContext, all: bool) -> DispatchResult {
        if self.pass.is_active() {
            return DispatchResult::Suppressed;
        }

        match self.commands.iterator_command() {
            IteratorCommand::Idle => DispatchResult::Idle,
            IteratorCommand::Restore => DispatchResult::Restored(self.restore_dispatch(name, ctx, all)),
            IteratorCommand::Save => DispatchResult::Saved(self.save_all()),
        }
    }

    /// Restore `name`, or every live iterator when `all` is set.
    pub fn restore_dispatch(
        &self,
        name: &str,
        ctx: &RestoreContext,
        all: bool,
    ) -> Vec<(String, RestoreOutcome)> {
        let _pass = self.pass.enter();

        let targets = if all {
            self.names()
        } else {
            vec![name.to_string()]
        };
        let outcomes: Vec<(String, RestoreOutcome)> = targets
            .into_iter()
            .map(|target| {
                let outcome = self.restore_one(&target, ctx);
                (target, outcome)
            })
            .collect();

        let restored = outcomes.iter().filter(|(_, o)| o.is_restored()).count();
        log_checkpoint_operation(
            "iterator_registry",
            "restore",
            (!all).then_some(name),
            "completed",
            Some(&format!("{restored}/{} restored", outcomes.len())),
        );
        outcomes
    }

    /// Offer `name` its one restore attempt.
    pub fn restore_one(&self, name: &str, ctx: &RestoreContext) -> RestoreOutcome {
        let Some(handle) = self.table.lock().live.get(name).cloned() else {
            debug!(iterator = name, "No live iterator to restore");
            return RestoreOutcome::NotRegistered;
        };

        if !self.restore_guard.lock().insert(name.to_string()) {
            return RestoreOutcome::AlreadyAttempted;
        }

        let Some(iterator) = handle.upgrade() else {
            warn!(iterator = name, "Iterator released before restore");
            return RestoreOutcome::Released;
        };

        let Some(dir) = self.commands.iterator_dir() else {
            warn!(
                iterator = name,
                signal = %self.commands.keys().iterator_save_path,
                "No iterator checkpoint directory configured"
            );
            return RestoreOutcome::MissingCheckpoint;
        };
        let path = fs::checkpoint_file(&dir, name);
        info!(iterator = name, path = %path.display(), "Start to restore iterator");

        let bytes = match fs::read_bytes(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(iterator = name, %err, "Fail to open iterator checkpoint");
                return RestoreOutcome::MissingCheckpoint;
            }
        };

        let mut record = VariantRecord::new();
        if !record.parse_from_bytes(&bytes) {
            warn!(iterator = name, path = %path.display(), "Fail to parse iterator checkpoint");
            return RestoreOutcome::Malformed;
        }

        match iterator.restore(ctx, &VariantReader::new(&record)) {
            Ok(()) => {
                info!(iterator = name, "Restored iterator");
                RestoreOutcome::Restored
            }
            Err(err) => {
                warn!(iterator = name, %err, "Restore iterator failed");
                RestoreOutcome::Failed(err.to_string())
            }
        }
    }

    /// Write every live iterator, and copy every evicted iterator's staged
    /// file, into the checkpoint directory.
    ///
    /// Only acts when the iterator command is save, and resets it to idle
    /// afterwards.
    pub fn save_all(&self) -> SaveSummary {
        let _pass = self.pass.enter();

        if self.commands.iterator_command() != IteratorCommand::Save {
            return SaveSummary::default();
        }
        let Some(dir) = self.commands.iterator_dir() else {
            warn!(
                signal = %self.commands.keys().iterator_save_path,
                "No iterator checkpoint directory configured; nothing saved"
            );
            return SaveSummary::default();
        };

        let (live, evicted) = {
            let table = self.table.lock();
            let live: Vec<(String, Weak<dyn CheckpointIterator>)> = table
                .live
                .iter()
                .map(|(name, handle)| (name.clone(), handle.clone()))
                .collect();
            (live, table.evicted.clone())
        };

        let mut summary = SaveSummary::default();
        for (name, handle) in live {
            let Some(iterator) = handle.upgrade() else {
                warn!(iterator = %name, "Iterator released before save; skipping");
                continue;
            };
            debug!(iterator = %name, dir = %dir.display(), "Save iterator");
            match write_iterator_state(&name, iterator.as_ref(), &fs::checkpoint_file(&dir, &name)) {
                Ok(()) => summary.live_saved += 1,
                Err(err) => {
                    error!(iterator = %name, %err, "Failed to save iterator");
                    summary.failures += 1;
                }
            }
        }
        for (name, staged) in evicted {
            match fs::copy_atomic(&staged, &fs::checkpoint_file(&dir, &name)) {
                Ok(()) => summary.evicted_copied += 1,
                Err(err) => {
                    error!(iterator = %name, %err, "Failed to copy staged iterator");
                    summary.failures += 1;
                }
            }
        }

        self.commands.set_iterator_command(IteratorCommand::Idle);
        log_checkpoint_operation(
            "iterator_registry",
            "save",
            None,
            if summary.failures == 0 { "completed" } else { "partial" },
            Some(&format!(
                "{} live, {} evicted, {} failed to {}",
                summary.live_saved,
                summary.evicted_copied,
                summary.failures,
                dir.display()
            )),
        );
        summary
    }
}

/// Serialize an iterator into a named variant record and write it to `path`.
fn write_iterator_state(name: &str, iterator: &dyn CheckpointIterator, path: &Path) -> Result<()> {
    let mut record = VariantRecord::new();
    record.set_name(name);
    iterator
        .save(&SerializationContext::new(name), &mut VariantWriter::new(&mut record))
        .map_err(|err| CheckpointError::iterator(name, err.to_string()))?;
    fs::write_atomic(path, &record.serialize_to_bytes()?)
}
