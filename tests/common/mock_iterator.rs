use checkpoint_core::error::{CheckpointError, Result};
use checkpoint_core::registry::{CheckpointIterator, RestoreContext, SerializationContext};
use checkpoint_core::variant::{VariantReader, VariantWriter};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Range iterator that checkpoints its next position.
#[derive(Debug, Default)]
pub struct MockIterator {
    pub position: AtomicU64,
    pub restores: AtomicUsize,
    pub fail_restore: AtomicBool,
}

impl MockIterator {
    pub fn at(position: u64) -> Arc<Self> {
        Arc::new(Self {
            position: AtomicU64::new(position),
            ..Self::default()
        })
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restores.load(Ordering::SeqCst)
    }
}

impl CheckpointIterator for MockIterator {
    fn save(&self, ctx: &SerializationContext, writer: &mut VariantWriter<'_>) -> Result<()> {
        writer.write_scalar("iterator", ctx.iterator_name())?;
        writer.write_scalar("position", &self.position())
    }

    fn restore(&self, _ctx: &RestoreContext, reader: &VariantReader<'_>) -> Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        if self.fail_restore.load(Ordering::SeqCst) {
            return Err(CheckpointError::iterator(reader.name(), "rejected state"));
        }
        self.position
            .store(reader.read_scalar("position")?, Ordering::SeqCst);
        Ok(())
    }
}

pub fn as_checkpoint(iterator: &Arc<MockIterator>) -> Arc<dyn CheckpointIterator> {
    iterator.clone()
}
