//! Property-based test generators using proptest.
//!
//! Provides strategies for keys and for mixed insert/delete workloads
//! against a tree.

use proptest::prelude::*;
use types::Value;

/// One mutation in a generated workload.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeOp {
    Insert(i64, i64),
    Delete(i64),
}

/// Integer keys drawn from a narrow range so workloads revisit keys.
pub fn arb_int_key() -> impl Strategy<Value = i64> {
    -200i64..200
}

/// Any 64-bit key, including the extremes.
pub fn arb_wide_int_key() -> impl Strategy<Value = i64> {
    prop_oneof![
        Just(i64::MIN),
        Just(i64::MAX),
        Just(0i64),
        Just(-1i64),
        any::<i64>(),
    ]
}

/// Printable text without zero bytes, at most `max_len` bytes long.
pub fn arb_text(max_len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(0x20u8..0x7f, 0..=max_len)
        .prop_map(|bytes| bytes.into_iter().map(char::from).collect())
}

/// A logical key value of either type.
pub fn arb_key_value(text_width: usize) -> impl Strategy<Value = Value> {
    prop_oneof![
        arb_wide_int_key().prop_map(Value::Int),
        arb_text(text_width).prop_map(Value::Text),
    ]
}

/// A workload of inserts and deletes, weighted toward inserts.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::{arb_ops, TreeOp};
///
/// proptest! {
///     #[test]
///     fn workload_is_bounded(ops in arb_ops(50)) {
///         prop_assert!(ops.len() <= 50);
///     }
/// }
/// ```
pub fn arb_ops(max_len: usize) -> impl Strategy<Value = Vec<TreeOp>> {
    let op = prop_oneof![
        3 => (arb_int_key(), any::<i64>()).prop_map(|(k, v)| TreeOp::Insert(k, v)),
        2 => arb_int_key().prop_map(TreeOp::Delete),
    ];
    prop::collection::vec(op, 0..=max_len)
}

/// Distinct keys in random order.
pub fn arb_distinct_keys(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::hash_set(arb_int_key(), 0..=max_len)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_text_has_no_zero_bytes(text in arb_text(12)) {
            prop_assert!(text.len() <= 12);
            prop_assert!(!text.as_bytes().contains(&0));
        }

        #[test]
        fn prop_distinct_keys_are_distinct(keys in arb_distinct_keys(40)) {
            let mut sorted = keys.clone();
            sorted.sort_unstable();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), keys.len());
        }
    }
}
