use proptest::prelude::*;

/// Strategy for generating reservation sizes, including zero
pub fn reservation_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..100_000, 1..32)
}

/// Strategy for generating non-zero seed pairs
pub fn seed_pair_strategy() -> impl Strategy<Value = (i64, i64)> {
    (1i64..i64::MAX, any::<i64>())
}

/// Strategy for generating iterator names the way engines build them
pub fn iterator_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_]{0,15}(::[A-Za-z][A-Za-z0-9_]{0,15}){0,2}"
}
