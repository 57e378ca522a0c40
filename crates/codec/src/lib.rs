//! Fixed-width binary encodings for keys and record fields.
//!
//! Every supported [`FieldType`] maps to a byte layout of a declared width:
//!
//! - `Int`: 8 bytes, big-endian two's complement
//! - `Text`: raw bytes right-padded with zeros; the first zero byte ends the value
//!
//! A [`Codec`] bundles one type with one width and exposes the whole
//! capability set the tree and node pages need, so neither has to know
//! which type it is handling.

mod record;

pub use record::RecordCodec;

use std::cmp::Ordering;

use common::{DbError, DbResult, Module};
use types::{FieldDescriptor, FieldType, Value};

/// Width of an encoded integer.
pub const INT_WIDTH: usize = 8;

/// Largest text field width; node pages store widths as u16.
pub const MAX_TEXT_WIDTH: usize = u16::MAX as usize;

/// Resolve a schema type name to a [`FieldType`].
pub fn parse_field_type(name: &str) -> DbResult<FieldType> {
    FieldType::from_name(name).ok_or_else(|| {
        DbError::type_error(Module::Codec, format!("unsupported field type '{name}'"))
    })
}

/// Encoder, decoder and comparator for one fixed-width field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Codec {
    field_type: FieldType,
    width: usize,
}

impl Codec {
    pub fn new(field_type: FieldType, width: usize) -> DbResult<Self> {
        match field_type {
            FieldType::Int if width != INT_WIDTH => Err(DbError::input(
                Module::Codec,
                format!("int fields are {INT_WIDTH} bytes wide, got {width}"),
            )),
            FieldType::Text if width == 0 || width > MAX_TEXT_WIDTH => Err(DbError::input(
                Module::Codec,
                format!("text width {width} outside [1, {MAX_TEXT_WIDTH}]"),
            )),
            _ => Ok(Self { field_type, width }),
        }
    }

    pub fn int() -> Self {
        Self {
            field_type: FieldType::Int,
            width: INT_WIDTH,
        }
    }

    pub fn text(width: usize) -> DbResult<Self> {
        Self::new(FieldType::Text, width)
    }

    pub fn for_field(field: &FieldDescriptor) -> DbResult<Self> {
        Self::new(field.field_type, field.byte_length)
    }

    pub fn get_type(&self) -> FieldType {
        self.field_type
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Reject buffers that are not exactly one field wide.
    pub fn check_width(&self, raw: &[u8]) -> DbResult<()> {
        if raw.len() != self.width {
            return Err(DbError::input(
                Module::Codec,
                format!(
                    "{} field expects {} bytes, got {}",
                    self.field_type,
                    self.width,
                    raw.len()
                ),
            ));
        }
        Ok(())
    }

    /// Encode a logical value into exactly `width` bytes.
    pub fn encode(&self, value: &Value) -> DbResult<Vec<u8>> {
        match (self.field_type, value) {
            (FieldType::Int, Value::Int(v)) => Ok(v.to_be_bytes().to_vec()),
            (FieldType::Text, Value::Text(s)) => self.encode_text(s),
            (expected, other) => Err(DbError::type_error(
                Module::Codec,
                format!("expected {expected} value, got {}", other.field_type()),
            )),
        }
    }

    /// Decode `width` bytes back into a logical value.
    pub fn decode(&self, raw: &[u8]) -> DbResult<Value> {
        self.check_width(raw)?;
        match self.field_type {
            FieldType::Int => {
                let mut buf = [0u8; INT_WIDTH];
                buf.copy_from_slice(raw);
                Ok(Value::Int(i64::from_be_bytes(buf)))
            }
            FieldType::Text => {
                let text = std::str::from_utf8(self.trim_raw(raw)).map_err(|e| {
                    DbError::type_error(Module::Codec, format!("text field is not utf-8: {e}"))
                })?;
                Ok(Value::Text(text.to_string()))
            }
        }
    }

    /// Human-readable rendering of an encoded field.
    pub fn string_value(&self, raw: &[u8]) -> DbResult<String> {
        Ok(self.decode(raw)?.to_string())
    }

    /// Parse text input (e.g. a default value) and encode it.
    pub fn string_to_bytes(&self, text: &str) -> DbResult<Vec<u8>> {
        match self.field_type {
            FieldType::Int => {
                let v: i64 = text.trim().parse().map_err(|_| {
                    DbError::type_error(Module::Codec, format!("'{text}' is not an integer"))
                })?;
                Ok(v.to_be_bytes().to_vec())
            }
            FieldType::Text => self.encode_text(text),
        }
    }

    /// Right-pad `raw` with zeros to the field width.
    pub fn length_padding(&self, raw: &[u8]) -> DbResult<Vec<u8>> {
        if raw.len() > self.width {
            return Err(DbError::input(
                Module::Codec,
                format!("{} bytes do not fit a {}-byte field", raw.len(), self.width),
            ));
        }
        let mut padded = Vec::with_capacity(self.width);
        padded.extend_from_slice(raw);
        padded.resize(self.width, 0);
        Ok(padded)
    }

    /// Strip padding: text stops at the first zero byte, integers are untouched.
    pub fn trim_raw<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        match self.field_type {
            FieldType::Int => raw,
            FieldType::Text => match raw.iter().position(|&b| b == 0) {
                Some(end) => &raw[..end],
                None => raw,
            },
        }
    }

    /// Total order over encoded fields.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.field_type {
            FieldType::Int => sign_normalized(a).cmp(&sign_normalized(b)),
            FieldType::Text => self.trim_raw(a).cmp(self.trim_raw(b)),
        }
    }

    pub fn greater(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    pub fn equal(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    pub fn less(&self, a: &[u8], b: &[u8]) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    fn encode_text(&self, text: &str) -> DbResult<Vec<u8>> {
        let bytes = text.as_bytes();
        if bytes.contains(&0) {
            return Err(DbError::input(
                Module::Codec,
                "text values may not contain a zero byte",
            ));
        }
        self.length_padding(bytes)
    }
}

/// Flip the sign bit so byte order matches signed order.
fn sign_normalized(raw: &[u8]) -> [u8; INT_WIDTH] {
    let mut buf = [0u8; INT_WIDTH];
    let n = raw.len().min(INT_WIDTH);
    buf[..n].copy_from_slice(&raw[..n]);
    buf[0] ^= 0x80;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ErrorCategory;
    use proptest::prelude::*;

    #[test]
    fn int_width_is_enforced() {
        assert!(Codec::new(FieldType::Int, 4).is_err());
        assert!(Codec::new(FieldType::Int, 8).is_ok());
        assert!(Codec::new(FieldType::Text, 0).is_err());
    }

    #[test]
    fn ints_are_big_endian() {
        let codec = Codec::int();
        assert_eq!(
            codec.encode(&Value::Int(1)).unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 1]
        );
        assert_eq!(codec.encode(&Value::Int(-1)).unwrap(), vec![0xff; 8]);
    }

    #[test]
    fn negative_ints_sort_first() {
        let codec = Codec::int();
        let neg = codec.encode(&Value::Int(-5)).unwrap();
        let pos = codec.encode(&Value::Int(3)).unwrap();
        assert!(codec.less(&neg, &pos));
        assert!(codec.greater(&pos, &neg));
        assert!(codec.equal(&neg, &neg));
    }

    #[test]
    fn text_is_padded_and_trimmed() {
        let codec = Codec::text(8).unwrap();
        let raw = codec.encode(&Value::Text("abc".into())).unwrap();
        assert_eq!(raw, b"abc\0\0\0\0\0");
        assert_eq!(codec.trim_raw(&raw), b"abc");
        assert_eq!(codec.string_value(&raw).unwrap(), "abc");
    }

    #[test]
    fn text_too_long_is_input_error() {
        let codec = Codec::text(2).unwrap();
        let err = codec.encode(&Value::Text("abc".into())).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.module(), Module::Codec);
    }

    #[test]
    fn embedded_zero_byte_is_rejected() {
        let codec = Codec::text(8).unwrap();
        assert!(codec.encode(&Value::Text("a\0b".into())).is_err());
    }

    #[test]
    fn mismatched_value_type_is_type_error() {
        let err = Codec::int().encode(&Value::Text("1".into())).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Type);
    }

    #[test]
    fn decode_checks_width() {
        let err = Codec::int().decode(&[1, 2, 3]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);
    }

    #[test]
    fn string_to_bytes_parses_ints() {
        let codec = Codec::int();
        assert_eq!(
            codec.string_to_bytes(" -42 ").unwrap(),
            (-42i64).to_be_bytes().to_vec()
        );
        assert!(codec.string_to_bytes("forty").is_err());
    }

    #[test]
    fn text_compares_unpadded_bytes() {
        let codec = Codec::text(6).unwrap();
        let ab = codec.encode(&Value::Text("ab".into())).unwrap();
        let abc = codec.encode(&Value::Text("abc".into())).unwrap();
        let b = codec.encode(&Value::Text("b".into())).unwrap();
        assert!(codec.less(&ab, &abc));
        assert!(codec.less(&abc, &b));
    }

    #[test]
    fn unknown_type_names_fail() {
        assert_eq!(parse_field_type("Int").unwrap(), FieldType::Int);
        let err = parse_field_type("blob").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Type);
    }

    proptest! {
        #[test]
        fn int_round_trip(v in any::<i64>()) {
            let codec = Codec::int();
            let raw = codec.encode(&Value::Int(v)).unwrap();
            prop_assert_eq!(codec.decode(&raw).unwrap(), Value::Int(v));
        }

        #[test]
        fn int_order_matches_numeric_order(a in any::<i64>(), b in any::<i64>()) {
            let codec = Codec::int();
            let ra = codec.encode(&Value::Int(a)).unwrap();
            let rb = codec.encode(&Value::Int(b)).unwrap();
            prop_assert_eq!(codec.compare(&ra, &rb), a.cmp(&b));
        }

        #[test]
        fn text_pad_then_trim_is_identity(s in "[a-zA-Z0-9 ]{0,16}") {
            let codec = Codec::text(16).unwrap();
            let padded = codec.length_padding(s.as_bytes()).unwrap();
            prop_assert_eq!(padded.len(), 16);
            prop_assert_eq!(codec.trim_raw(&padded), s.as_bytes());
            prop_assert_eq!(codec.decode(&padded).unwrap(), Value::Text(s));
        }

        #[test]
        fn text_order_matches_byte_order(a in "[a-z]{0,8}", b in "[a-z]{0,8}") {
            let codec = Codec::text(8).unwrap();
            let ra = codec.encode(&Value::Text(a.clone())).unwrap();
            let rb = codec.encode(&Value::Text(b.clone())).unwrap();
            prop_assert_eq!(codec.compare(&ra, &rb), a.as_bytes().cmp(b.as_bytes()));
        }
    }
}
