//! Row encoding: a sequence of fields laid out back to back.

use common::{DbError, DbResult, Module};
use types::{FieldDescriptor, Value};

use crate::Codec;

/// Encodes rows described by a list of field descriptors into one
/// fixed-width byte string, the leaf value of a persisted tree.
#[derive(Clone, Debug)]
pub struct RecordCodec {
    fields: Vec<(FieldDescriptor, Codec)>,
    width: usize,
}

impl RecordCodec {
    pub fn new(fields: &[FieldDescriptor]) -> DbResult<Self> {
        if fields.is_empty() {
            return Err(DbError::input(
                Module::Codec,
                "record needs at least one field",
            ));
        }
        let mut resolved = Vec::with_capacity(fields.len());
        let mut width = 0usize;
        for field in fields {
            let codec = Codec::for_field(field).map_err(|e| {
                DbError::input(Module::Codec, format!("field '{}': {e}", field.name))
            })?;
            width += codec.width();
            resolved.push((field.clone(), codec));
        }
        Ok(Self {
            fields: resolved,
            width,
        })
    }

    /// Total encoded width of one row.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().map(|(field, _)| field)
    }

    /// Encode a row; trailing fields left out take their default value.
    pub fn encode_row(&self, values: &[Value]) -> DbResult<Vec<u8>> {
        if values.len() > self.fields.len() {
            return Err(DbError::input(
                Module::Codec,
                format!(
                    "row has {} values but the record has {} fields",
                    values.len(),
                    self.fields.len()
                ),
            ));
        }
        let mut out = Vec::with_capacity(self.width);
        for (idx, (field, codec)) in self.fields.iter().enumerate() {
            let encoded = match values.get(idx) {
                Some(value) => codec.encode(value)?,
                None => match &field.default_value {
                    Some(default) => codec.string_to_bytes(default)?,
                    None => {
                        return Err(DbError::input(
                            Module::Codec,
                            format!("missing value for field '{}' without default", field.name),
                        ));
                    }
                },
            };
            out.extend_from_slice(&encoded);
        }
        Ok(out)
    }

    pub fn decode_row(&self, raw: &[u8]) -> DbResult<Vec<Value>> {
        if raw.len() != self.width {
            return Err(DbError::input(
                Module::Codec,
                format!("record expects {} bytes, got {}", self.width, raw.len()),
            ));
        }
        let mut values = Vec::with_capacity(self.fields.len());
        let mut pos = 0;
        for (_, codec) in &self.fields {
            let end = pos + codec.width();
            values.push(codec.decode(&raw[pos..end])?);
            pos = end;
        }
        Ok(values)
    }
}
