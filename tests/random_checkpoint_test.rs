//! Save and restore of guarded random generators across a simulated restart.

mod common;

use checkpoint_core::execution::{CommandSource, RandomCommand};
use checkpoint_core::random::{CounterRng, GuardedRandomSource};
use checkpoint_core::CheckpointContext;
use common::{reservation_strategy, seed_pair_strategy, TestHarness};
use proptest::prelude::*;
use std::sync::Arc;

/// Seeds that produce key `[7, 9]` and counter `[0, 0, 11, 22]`.
const SEED: i64 = 7 | (9 << 32);
const SEED2: i64 = 11 | (22 << 32);

fn tracked_source(context: &CheckpointContext, seed: i64, seed2: i64) -> GuardedRandomSource {
    let source = context.guarded_random_source();
    source.initialize(seed, seed2);
    source.enable_checkpointing();
    source
}

#[test]
fn test_save_then_restore_reproduces_next_reservation() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    let state_path = harness.path("rng_state");

    let before = tracked_source(&harness.context, SEED, SEED2);
    assert_eq!(before.fingerprint().unwrap().as_str(), "7_9_11_22");
    before.reserve(100);

    harness.signal(&keys.random_state_path, &state_path.display().to_string());
    harness.signal(&keys.random_command, "2");
    let mut expected = before.reserve(5);

    assert_eq!(harness.context.commands().random_command(), RandomCommand::Idle);
    let saved = std::fs::read_to_string(&state_path).unwrap();
    assert_eq!(saved, "7_9_11_22 7 9 100 0 11 22\n");

    let (restarted, source) = harness.restarted();
    source.set(&keys.random_state_path, &state_path.display().to_string());
    source.set(&keys.random_command, "1");

    let after = tracked_source(&restarted, SEED, SEED2);
    let mut actual = after.reserve(5);

    assert_eq!(actual.counter(), [100, 0, 11, 22]);
    assert_eq!(actual.next_block(), expected.next_block());
    assert_eq!(restarted.commands().random_command(), RandomCommand::RestoreOnly);
}

#[test]
fn test_history_entry_is_consumed_once() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    let state_path = harness.path("rng_state");
    std::fs::write(&state_path, "7_9_11_22 7 9 500 0 11 22\n").unwrap();

    harness.signal(&keys.random_state_path, &state_path.display().to_string());
    harness.signal(&keys.random_command, "1");

    let source = tracked_source(&harness.context, SEED, SEED2);
    assert_eq!(source.reserve(10).counter(), [500, 0, 11, 22]);
    assert_eq!(harness.context.random().pending_history(), 0);

    // Still in restore-only mode, but nothing left to apply
    assert_eq!(source.reserve(1).counter(), [510, 0, 11, 22]);

    let twin = tracked_source(&harness.context, SEED, SEED2);
    assert_eq!(twin.reserve(1).counter(), [0, 0, 11, 22]);
}

#[test]
fn test_missing_history_file_still_advances_signal() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    harness.signal(
        &keys.random_state_path,
        &harness.path("never_written").display().to_string(),
    );
    harness.signal(&keys.random_command, "1");

    let source = tracked_source(&harness.context, SEED, SEED2);
    assert_eq!(source.reserve(4).counter(), [0, 0, 11, 22]);
    assert_eq!(
        harness.context.commands().random_command(),
        RandomCommand::RestoreOnly
    );
}

#[test]
fn test_malformed_entry_skipped_without_affecting_others() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    let state_path = harness.path("rng_state");
    std::fs::write(
        &state_path,
        "7_9_11_22 7 9 1\n1_0_2_0 1 0 40 0 2 0\nnot numbers at all x y\n",
    )
    .unwrap();
    harness.signal(&keys.random_state_path, &state_path.display().to_string());
    harness.signal(&keys.random_command, "1");

    let malformed = tracked_source(&harness.context, SEED, SEED2);
    let healthy = tracked_source(&harness.context, 1, 2);

    assert_eq!(malformed.reserve(1).counter(), [0, 0, 11, 22]);
    assert_eq!(healthy.reserve(1).counter(), [40, 0, 2, 0]);
}

#[test]
fn test_untracked_generator_can_trigger_save() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    let state_path = harness.path("rng_state");

    let tracked = tracked_source(&harness.context, 1, 2);
    tracked.reserve(3);

    let untracked = harness.context.guarded_random_source();
    untracked.initialize(SEED, SEED2);

    harness.signal(&keys.random_state_path, &state_path.display().to_string());
    harness.signal(&keys.random_command, "2");
    untracked.reserve(1);

    assert_eq!(
        std::fs::read_to_string(&state_path).unwrap(),
        "1_0_2_0 1 0 3 0 2 0\n"
    );
    assert_eq!(harness.context.commands().random_command(), RandomCommand::Idle);
}

#[test]
fn test_keyed_reservation_leaves_shared_generator_alone() {
    let harness = TestHarness::new();
    let source = tracked_source(&harness.context, SEED, SEED2);

    let keyed = source.reserve_keyed(64, 5);
    assert_eq!(keyed.key(), [11, 22]);
    assert_eq!(keyed.counter(), [0, 0, 5, 0]);
    assert_eq!(source.reserve_keyed(64, 5).counter(), [0, 0, 5, 0]);

    assert_eq!(source.reserve(1).counter(), [0, 0, 11, 22]);
}

#[test]
fn test_keyed_reservation_without_seed_uses_shared_generator() {
    let harness = TestHarness::new();
    let source = harness.context.guarded_random_source();
    source.initialize_from_state([8, 0, 11, 22], [7, 9]);

    assert_eq!(source.reserve_keyed(2, 99).counter(), [8, 0, 11, 22]);
    assert_eq!(source.reserve(1).counter(), [10, 0, 11, 22]);
}

#[test]
fn test_concurrent_reservations_load_history_once() {
    let harness = TestHarness::new();
    let keys = harness.context.config().signals.clone();
    let state_path = harness.path("rng_state");

    let seeds: Vec<i64> = (1..=8).collect();
    let history: String = seeds
        .iter()
        .map(|seed| format!("{seed}_0_3_0 {seed} 0 {} 0 3 0\n", seed * 1000))
        .collect();
    std::fs::write(&state_path, history).unwrap();
    harness.signal(&keys.random_state_path, &state_path.display().to_string());
    harness.signal(&keys.random_command, "1");

    let sources: Vec<Arc<GuardedRandomSource>> = seeds
        .iter()
        .map(|seed| Arc::new(tracked_source(&harness.context, *seed, 3)))
        .collect();

    std::thread::scope(|scope| {
        for (seed, source) in seeds.iter().zip(&sources) {
            scope.spawn(move || {
                let first = source.reserve(7);
                assert_eq!(first.counter(), [(*seed as u32) * 1000, 0, 3, 0]);
                let second = source.reserve(1);
                assert_eq!(second.counter(), [(*seed as u32) * 1000 + 7, 0, 3, 0]);
            });
        }
    });

    assert_eq!(harness.context.random().pending_history(), 0);
    assert_eq!(
        harness.context.commands().random_command(),
        RandomCommand::RestoreOnly
    );
}

proptest! {
    /// Property: each reservation starts exactly where the previous one ended
    #[test]
    fn reservations_are_contiguous(sizes in reservation_strategy(), (seed, seed2) in seed_pair_strategy()) {
        let context = CheckpointContext::in_memory(Default::default());
        let source = context.guarded_random_source();
        source.initialize(seed, seed2);

        let mut expected = source.reserve(0).state().counter_value();
        for size in sizes {
            let local = source.reserve(size);
            prop_assert_eq!(local.state().counter_value(), expected);
            expected = expected.wrapping_add(u128::from(size));
        }
    }
}

proptest! {
    /// Property: the same seeds always produce the same fingerprint
    #[test]
    fn fingerprint_is_stable_across_contexts((seed, seed2) in seed_pair_strategy()) {
        let first = CheckpointContext::in_memory(Default::default());
        let second = CheckpointContext::in_memory(Default::default());

        let a = tracked_source(&first, seed, seed2);
        let b = tracked_source(&second, seed, seed2);
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
        prop_assert!(a.fingerprint().is_some());
    }
}
