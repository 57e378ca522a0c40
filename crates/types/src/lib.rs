use std::fmt;

use serde::{Deserialize, Serialize};

/// Physical encodings a field can use inside a page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Signed 64-bit integer stored big-endian in 8 bytes.
    Int,
    /// Raw bytes right-padded with zeros to the field width.
    Text,
}

impl FieldType {
    /// Resolve a schema type name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "int64" => Some(Self::Int),
            "text" | "string" | "varchar" | "char" => Some(Self::Text),
            _ => None,
        }
    }

    /// Stable single-byte tag used by persisted metadata.
    pub fn tag(self) -> u8 {
        match self {
            Self::Int => 1,
            Self::Text => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Int),
            2 => Some(Self::Text),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("int"),
            Self::Text => f.write_str("text"),
        }
    }
}

/// A logical key or column value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Int(_) => FieldType::Int,
            Value::Text(_) => FieldType::Text,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Int(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Column description handed over by the schema layer.
///
/// Only `field_type` and `byte_length` matter for encoding; `default_value`
/// fills trailing columns a caller leaves out of a row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub byte_length: usize,
    pub field_type: FieldType,
    #[serde(default)]
    pub default_value: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, byte_length: usize) -> Self {
        Self {
            name: name.into(),
            byte_length,
            field_type,
            default_value: None,
        }
    }

    /// An 8-byte integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int, 8)
    }

    /// A text field padded to `byte_length` bytes.
    pub fn text(name: impl Into<String>, byte_length: usize) -> Self {
        Self::new(name, FieldType::Text, byte_length)
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_resolve() {
        assert_eq!(FieldType::from_name("INTEGER"), Some(FieldType::Int));
        assert_eq!(FieldType::from_name(" varchar "), Some(FieldType::Text));
        assert_eq!(FieldType::from_name("float"), None);
    }

    #[test]
    fn tags_round_trip() {
        for ty in [FieldType::Int, FieldType::Text] {
            assert_eq!(FieldType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(FieldType::from_tag(0), None);
    }

    #[test]
    fn values_serialize_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(3), Value::Text("a".into())]).unwrap();
        assert_eq!(json, r#"[3,"a"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Value::Int(3), Value::Text("a".into())]);
    }

    #[test]
    fn descriptor_deserializes_without_default() {
        let desc: FieldDescriptor =
            serde_json::from_str(r#"{"name":"id","byte_length":8,"field_type":"int"}"#).unwrap();
        assert_eq!(desc, FieldDescriptor::int("id"));
    }
}
