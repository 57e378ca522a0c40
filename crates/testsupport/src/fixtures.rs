//! Common key and row fixtures.

use codec::Codec;
use types::{FieldDescriptor, Value};

/// Integer keys for the given numbers.
///
/// # Example
///
/// ```
/// use testsupport::prelude::*;
/// use types::Value;
///
/// assert_eq!(int_keys(1..=3), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
/// ```
pub fn int_keys(range: impl IntoIterator<Item = i64>) -> Vec<Value> {
    range.into_iter().map(Value::Int).collect()
}

/// Text keys for the given strings.
pub fn text_keys(values: &[&str]) -> Vec<Value> {
    values.iter().map(|&v| Value::Text(v.to_string())).collect()
}

/// Zero-padded text key of the form `key-0042`, ordered like `n`.
pub fn padded_text_key(n: u32) -> Value {
    Value::Text(format!("key-{n:04}"))
}

/// Codec for 8-byte integer keys.
pub fn int_codec() -> Codec {
    Codec::int()
}

/// Codec for text keys up to `width` bytes.
pub fn text_codec(width: usize) -> Codec {
    Codec::text(width).unwrap_or_else(|e| panic!("invalid text width {width}: {e}"))
}

/// A small `(id INT, name TEXT(16), age INT)` row layout.
pub fn people_fields() -> Vec<FieldDescriptor> {
    vec![
        FieldDescriptor::int("id"),
        FieldDescriptor::text("name", 16),
        FieldDescriptor::int("age").with_default("0"),
    ]
}

/// Row values matching [`people_fields`].
pub fn person(id: i64, name: &str, age: i64) -> Vec<Value> {
    vec![Value::Int(id), Value::Text(name.to_string()), Value::Int(age)]
}
