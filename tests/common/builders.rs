use checkpoint_core::config::CheckpointConfig;
use checkpoint_core::execution::{CommandSource, InMemoryCommandSource};
use checkpoint_core::CheckpointContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A context wired to an in-memory command source and private directories.
///
/// The temp directory lives as long as the harness.
pub struct TestHarness {
    pub context: CheckpointContext,
    pub source: Arc<InMemoryCommandSource>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = CheckpointConfig {
            staging_dir: dir.path().join("staging"),
            ..CheckpointConfig::default()
        };
        let source = Arc::new(InMemoryCommandSource::new());
        let context = CheckpointContext::new(config, source.clone());
        Self {
            context,
            source,
            dir,
        }
    }

    /// A second context sharing this harness's directories, as a restarted
    /// process would.
    pub fn restarted(&self) -> (CheckpointContext, Arc<InMemoryCommandSource>) {
        let source = Arc::new(InMemoryCommandSource::new());
        let context = CheckpointContext::new(self.context.config().clone(), source.clone());
        (context, source)
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn signal(&self, key: &str, value: &str) {
        self.source.set(key, value);
    }
}

pub fn signal_dir(source: &InMemoryCommandSource, key: &str, dir: &Path) {
    std::fs::create_dir_all(dir).expect("create checkpoint dir");
    source.set(key, &dir.display().to_string());
}
