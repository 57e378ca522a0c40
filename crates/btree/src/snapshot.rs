//! Human-readable tree interchange format.
//!
//! A snapshot is a nested record per node. It does not carry the tree's
//! order, so it is meant for inspection and test fixtures rather than
//! persistence.

use common::{DbError, DbResult, Module};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use types::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot<V> {
    pub is_leaf: bool,
    pub keys: Vec<Value>,
    /// Leaf values, one per key. Empty for internal nodes.
    #[serde(default = "Vec::new")]
    pub values: Vec<V>,
    /// Children in order. Empty for leaves.
    #[serde(default = "Vec::new")]
    pub child: Vec<NodeSnapshot<V>>,
}

impl<V> NodeSnapshot<V> {
    pub fn leaf(entries: Vec<(Value, V)>) -> Self {
        let (keys, values) = entries.into_iter().unzip();
        Self {
            is_leaf: true,
            keys,
            values,
            child: Vec::new(),
        }
    }

    pub fn internal(keys: Vec<Value>, child: Vec<NodeSnapshot<V>>) -> Self {
        Self {
            is_leaf: false,
            keys,
            values: Vec::new(),
            child,
        }
    }

    /// Convert every leaf value, keeping the shape.
    pub fn map_values<W>(self, f: &impl Fn(V) -> W) -> NodeSnapshot<W> {
        NodeSnapshot {
            is_leaf: self.is_leaf,
            keys: self.keys,
            values: self.values.into_iter().map(f).collect(),
            child: self.child.into_iter().map(|c| c.map_values(f)).collect(),
        }
    }

    /// Number of levels below and including this node.
    pub fn depth(&self) -> usize {
        1 + self.child.first().map_or(0, NodeSnapshot::depth)
    }
}

impl<V: Serialize> NodeSnapshot<V> {
    pub fn to_json(&self) -> DbResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DbError::input(Module::BTree, format!("failed to serialize snapshot: {e}")))
    }
}

impl<V: DeserializeOwned> NodeSnapshot<V> {
    pub fn from_json(json: &str) -> DbResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DbError::input(Module::BTree, format!("invalid snapshot: {e}")))
    }
}
