//! Fixed-width leaf values for persisted trees.

use common::{DbError, DbResult, Module};

/// A leaf value that can be written into a fixed number of bytes.
pub trait LeafPayload: Clone {
    /// Encode into exactly `width` bytes.
    fn encode_payload(&self, width: usize) -> DbResult<Vec<u8>>;

    /// Decode from a `width`-byte slot.
    fn decode_payload(raw: &[u8]) -> DbResult<Self>;
}

/// Raw record bytes, exactly one slot wide. Rows from `RecordCodec` already
/// have the layout's value width.
impl LeafPayload for Vec<u8> {
    fn encode_payload(&self, width: usize) -> DbResult<Vec<u8>> {
        if self.len() != width {
            return Err(DbError::input(
                Module::Node,
                format!("value is {} bytes, slot holds {width}", self.len()),
            ));
        }
        Ok(self.clone())
    }

    fn decode_payload(raw: &[u8]) -> DbResult<Self> {
        Ok(raw.to_vec())
    }
}

/// Big-endian integer, typically a row offset.
impl LeafPayload for i64 {
    fn encode_payload(&self, width: usize) -> DbResult<Vec<u8>> {
        if width < 8 {
            return Err(DbError::input(
                Module::Node,
                format!("i64 values need 8 bytes, slot holds {width}"),
            ));
        }
        let mut out = self.to_be_bytes().to_vec();
        out.resize(width, 0);
        Ok(out)
    }

    fn decode_payload(raw: &[u8]) -> DbResult<Self> {
        let bytes: [u8; 8] = raw
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| DbError::corruption(Module::Node, "i64 value slot shorter than 8 bytes"))?;
        Ok(i64::from_be_bytes(bytes))
    }
}
