//! Counter-based generator primitive.
//!
//! The checkpoint machinery only needs a generator's `(key, counter)` state,
//! a way to skip ahead, and a way to reset; [`CounterRng`] is that seam.
//! [`PhiloxRandom`] is the Philox4x32-10 generator implementing it.

use crate::constants::GENERATOR_STATE_WORDS;
use serde::{Deserialize, Serialize};

pub type Key = [u32; 2];
pub type Counter = [u32; 4];

/// Full addressable state of one counter-based generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GeneratorState {
    pub key: Key,
    pub counter: Counter,
}

impl GeneratorState {
    pub fn new(key: Key, counter: Counter) -> Self {
        Self { key, counter }
    }

    /// Persisted word order: key0 key1 counter0 counter1 counter2 counter3.
    pub fn to_words(&self) -> [u32; GENERATOR_STATE_WORDS] {
        [
            self.key[0],
            self.key[1],
            self.counter[0],
            self.counter[1],
            self.counter[2],
            self.counter[3],
        ]
    }

    /// Rebuild from persisted words; `None` unless exactly six are given.
    pub fn from_words(words: &[u32]) -> Option<Self> {
        match words {
            &[k0, k1, c0, c1, c2, c3] => Some(Self::new([k0, k1], [c0, c1, c2, c3])),
            _ => None,
        }
    }

    /// Counter as a single 128-bit value, word 0 least significant.
    pub fn counter_value(&self) -> u128 {
        counter_to_u128(&self.counter)
    }
}

/// Generator whose whole state is a small `(key, counter)` pair.
pub trait CounterRng: Clone + Send + 'static {
    /// Build from a seed pair.
    fn from_seeds(seed: u64, seed2: u64) -> Self;

    /// Build directly from algorithm state.
    fn from_state(counter: Counter, key: Key) -> Self;

    fn key(&self) -> Key;

    fn counter(&self) -> Counter;

    /// Advance by `count` output blocks.
    fn skip(&mut self, count: u64);

    fn reset_state(&mut self, key: Key, counter: Counter);

    fn state(&self) -> GeneratorState {
        GeneratorState::new(self.key(), self.counter())
    }
}

const PHILOX_M4X32_0: u32 = 0xD251_1F53;
const PHILOX_M4X32_1: u32 = 0xCD9E_8D57;
const PHILOX_W32_0: u32 = 0x9E37_79B9;
const PHILOX_W32_1: u32 = 0xBB67_AE85;
const PHILOX_ROUNDS: usize = 10;

/// Philox4x32-10: each counter value yields one block of four `u32` outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiloxRandom {
    counter: Counter,
    key: Key,
}

impl PhiloxRandom {
    /// Seed layout: `seed` fills the key, `seed2` the high counter words.
    pub fn new(seed: u64, seed2: u64) -> Self {
        Self {
            key: [seed as u32, (seed >> 32) as u32],
            counter: [0, 0, seed2 as u32, (seed2 >> 32) as u32],
        }
    }

    /// Compute the block for the current counter and advance by one.
    pub fn next_block(&mut self) -> [u32; 4] {
        let mut counter = self.counter;
        let mut key = self.key;
        for round in 0..PHILOX_ROUNDS {
            counter = compute_single_round(&counter, &key);
            if round + 1 < PHILOX_ROUNDS {
                key[0] = key[0].wrapping_add(PHILOX_W32_0);
                key[1] = key[1].wrapping_add(PHILOX_W32_1);
            }
        }
        self.skip(1);
        counter
    }
}

impl CounterRng for PhiloxRandom {
    fn from_seeds(seed: u64, seed2: u64) -> Self {
        Self::new(seed, seed2)
    }

    fn from_state(counter: Counter, key: Key) -> Self {
        Self { counter, key }
    }

    fn key(&self) -> Key {
        self.key
    }

    fn counter(&self) -> Counter {
        self.counter
    }

    fn skip(&mut self, count: u64) {
        let advanced = counter_to_u128(&self.counter).wrapping_add(u128::from(count));
        self.counter = u128_to_counter(advanced);
    }

    fn reset_state(&mut self, key: Key, counter: Counter) {
        self.key = key;
        self.counter = counter;
    }
}

fn compute_single_round(counter: &Counter, key: &Key) -> Counter {
    let product0 = u64::from(PHILOX_M4X32_0) * u64::from(counter[0]);
    let (hi0, lo0) = ((product0 >> 32) as u32, product0 as u32);
    let product1 = u64::from(PHILOX_M4X32_1) * u64::from(counter[2]);
    let (hi1, lo1) = ((product1 >> 32) as u32, product1 as u32);

    [
        hi1 ^ counter[1] ^ key[0],
        lo1,
        hi0 ^ counter[3] ^ key[1],
        lo0,
    ]
}

fn counter_to_u128(counter: &Counter) -> u128 {
    counter
        .iter()
        .rev()
        .fold(0u128, |acc, word| (acc << 32) | u128::from(*word))
}

fn u128_to_counter(value: u128) -> Counter {
    [
        value as u32,
        (value >> 32) as u32,
        (value >> 64) as u32,
        (value >> 96) as u32,
    ]
}
