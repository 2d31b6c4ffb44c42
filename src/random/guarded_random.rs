//! Per-call-site guarded generator.
//!
//! Ops never touch the shared generator directly. They reserve a block of
//! output and receive a private copy positioned at the start of that block,
//! while the shared generator moves past it:
//!
//! ```rust
//! use checkpoint_core::random::{CounterRng, GuardedRandomSource};
//! use checkpoint_core::CheckpointContext;
//!
//! let context = CheckpointContext::in_memory(Default::default());
//! let source = context.guarded_random_source();
//! source.initialize(7, 9);
//!
//! let first = source.reserve(16);
//! let second = source.reserve(16);
//! assert_eq!(second.state().counter_value(), first.state().counter_value() + 16);
//! ```

use super::philox::{Counter, CounterRng, Key, PhiloxRandom};
use super::Fingerprint;
use crate::config::RandomTrackingConfig;
use crate::registry::random_registry::{RandomCheckpointRegistry, RegisteredGenerator};
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Seeds as supplied by the op; zero means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPair {
    pub seed: i64,
    pub seed2: i64,
}

#[derive(Debug)]
struct PrimaryGenerator<G> {
    rng: Option<G>,
    registration: Option<RegisteredGenerator>,
}

#[derive(Debug)]
pub struct GuardedRandomSource<G: CounterRng = PhiloxRandom> {
    registry: Arc<RandomCheckpointRegistry>,
    seeds: OnceLock<SeedPair>,
    primary: Mutex<PrimaryGenerator<G>>,
    /// Per-call generator of the keyed path
    keyed: Mutex<Option<G>>,
}

impl<G: CounterRng> GuardedRandomSource<G> {
    pub fn new(registry: Arc<RandomCheckpointRegistry>) -> Self {
        Self {
            registry,
            seeds: OnceLock::new(),
            primary: Mutex::new(PrimaryGenerator {
                rng: None,
                registration: None,
            }),
            keyed: Mutex::new(None),
        }
    }

    /// Seed the generator. Both seeds zero draws fresh random seeds instead.
    ///
    /// # Panics
    ///
    /// When the source was already initialized.
    pub fn initialize(&self, seed: i64, seed2: i64) {
        self.mark_initialized(SeedPair { seed, seed2 });

        let (seed, seed2) = if seed == 0 && seed2 == 0 {
            (rand::random::<u64>(), rand::random::<u64>())
        } else {
            (seed as u64, seed2 as u64)
        };

        self.primary.lock().rng = Some(G::from_seeds(seed, seed2));
    }

    /// Seed directly from algorithm state, e.g. state handed over by another
    /// process. The keyed path then behaves as if no seed was given.
    ///
    /// # Panics
    ///
    /// When the source was already initialized.
    pub fn initialize_from_state(&self, counter: Counter, key: Key) {
        self.mark_initialized(SeedPair { seed: 0, seed2: 0 });
        self.primary.lock().rng = Some(G::from_state(counter, key));
    }

    /// Initialize, and opt into checkpointing when `op_name` matches `policy`.
    /// Returns whether the generator is now tracked.
    pub fn initialize_for_op(
        &self,
        op_name: &str,
        seed: i64,
        seed2: i64,
        policy: &RandomTrackingConfig,
    ) -> bool {
        self.initialize(seed, seed2);
        if policy.should_track(op_name) {
            debug!(op = op_name, "Op generator opted into checkpointing");
            self.enable_checkpointing().is_some()
        } else {
            false
        }
    }

    /// Register the current generator with the checkpoint registry.
    ///
    /// Returns the fingerprint, or `None` before initialization. Calling it
    /// again returns the existing fingerprint.
    pub fn enable_checkpointing(&self) -> Option<Fingerprint> {
        let mut primary = self.primary.lock();
        let state = primary.rng.as_ref()?.state();
        if let Some(existing) = &primary.registration {
            warn!(fingerprint = %existing.fingerprint(), "Generator already registered for checkpointing");
            return Some(existing.fingerprint().clone());
        }
        let registration = self.registry.register(state);
        let fingerprint = registration.fingerprint().clone();
        primary.registration = Some(registration);
        Some(fingerprint)
    }

    pub fn is_initialized(&self) -> bool {
        self.seeds.get().is_some()
    }

    pub fn seeds(&self) -> Option<SeedPair> {
        self.seeds.get().copied()
    }

    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.primary
            .lock()
            .registration
            .as_ref()
            .map(|registration| registration.fingerprint().clone())
    }

    /// Reserve `samples` output blocks from the shared generator.
    ///
    /// Runs the checkpoint touch point first, so a pending restore or save is
    /// applied before the reservation.
    ///
    /// # Panics
    ///
    /// When called before initialization.
    pub fn reserve(&self, samples: u64) -> G {
        let mut guard = self.primary.lock();
        let PrimaryGenerator { rng, registration } = &mut *guard;
        let Some(rng) = rng.as_mut() else {
            panic!("GuardedRandomSource::reserve called before initialize");
        };

        self.registry.monitor(registration.as_ref(), rng);

        let local = rng.clone();
        rng.skip(samples);
        if let Some(registration) = registration {
            self.registry.track(registration.id(), rng.state());
        }
        local
    }

    /// Reserve for a stateless op keyed by `local_seed`.
    ///
    /// Without a primary seed this is a plain reservation from the shared
    /// generator, minus the checkpoint touch point. Otherwise a fresh
    /// generator seeded from `(seed2, local_seed)` serves the call and the
    /// shared generator is left untouched.
    pub fn reserve_keyed(&self, samples: u64, local_seed: i64) -> G {
        let Some(seeds) = self.seeds() else {
            panic!("GuardedRandomSource::reserve_keyed called before initialize");
        };

        if seeds.seed == 0 {
            return self.reserve_unmonitored(samples);
        }

        let mut keyed = self.keyed.lock();
        let rng = keyed.insert(G::from_seeds(seeds.seed2 as u64, local_seed as u64));
        let local = rng.clone();
        rng.skip(samples);
        local
    }

    fn reserve_unmonitored(&self, samples: u64) -> G {
        let mut guard = self.primary.lock();
        let PrimaryGenerator { rng, registration } = &mut *guard;
        let Some(rng) = rng.as_mut() else {
            panic!("GuardedRandomSource::reserve_keyed called before initialize");
        };

        let local = rng.clone();
        rng.skip(samples);
        if let Some(registration) = registration {
            self.registry.track(registration.id(), rng.state());
        }
        local
    }

    fn mark_initialized(&self, seeds: SeedPair) {
        assert!(
            self.seeds.set(seeds).is_ok(),
            "GuardedRandomSource initialized twice"
        );
    }
}

impl<G: CounterRng> Drop for GuardedRandomSource<G> {
    fn drop(&mut self) {
        if let Some(registration) = self.primary.get_mut().registration.take() {
            self.registry.deregister(registration.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SignalKeys;
    use crate::execution::{CommandChannel, InMemoryCommandSource};

    fn source() -> GuardedRandomSource {
        let channel = CommandChannel::new(
            Arc::new(InMemoryCommandSource::new()),
            SignalKeys::default(),
        );
        GuardedRandomSource::new(Arc::new(RandomCheckpointRegistry::new(channel)))
    }

    #[test]
    #[should_panic(expected = "initialized twice")]
    fn test_double_initialize_panics() {
        let source = source();
        source.initialize(1, 2);
        source.initialize(1, 2);
    }

    #[test]
    #[should_panic(expected = "before initialize")]
    fn test_reserve_before_initialize_panics() {
        source().reserve(1);
    }

    #[test]
    fn test_zero_seeds_draw_fresh_entropy() {
        let a = source();
        let b = source();
        a.initialize(0, 0);
        b.initialize(0, 0);
        assert_eq!(a.seeds(), Some(SeedPair { seed: 0, seed2: 0 }));
        assert_ne!(a.reserve(1).state(), b.reserve(1).state());
    }

    #[test]
    fn test_initialize_from_state() {
        let source = source();
        assert!(!source.is_initialized());
        source.initialize_from_state([4, 0, 11, 22], [7, 9]);
        assert!(source.is_initialized());
        let local = source.reserve(3);
        assert_eq!(local.key(), [7, 9]);
        assert_eq!(local.counter(), [4, 0, 11, 22]);
        assert_eq!(source.reserve(1).counter(), [7, 0, 11, 22]);
    }

    #[test]
    fn test_tracking_policy_controls_registration() {
        let policy = RandomTrackingConfig::default();

        let tracked = source();
        assert!(tracked.initialize_for_op(
            "layer/dropout/random_uniform/RandomUniform",
            1,
            2,
            &policy
        ));
        assert!(tracked.fingerprint().is_some());

        let untracked = source();
        assert!(!untracked.initialize_for_op("layer/dense/MatMul", 1, 2, &policy));
        assert!(untracked.fingerprint().is_none());
    }

    #[test]
    fn test_drop_deregisters() {
        let channel = CommandChannel::new(
            Arc::new(InMemoryCommandSource::new()),
            SignalKeys::default(),
        );
        let registry = Arc::new(RandomCheckpointRegistry::new(channel));
        {
            let source: GuardedRandomSource = GuardedRandomSource::new(Arc::clone(&registry));
            source.initialize(1, 2);
            source.enable_checkpointing();
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
    }
}
