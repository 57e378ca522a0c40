//! B+Tree node definitions.

use common::Offset;

/// A key already encoded by the tree's key codec.
pub type Key = Vec<u8>;

/// A B+Tree node, either internal or leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Node<V> {
    /// Internal node with separator keys and child references.
    Internal {
        /// Separator keys (n keys for n+1 children). `keys[i]` is the
        /// smallest key reachable through `children[i + 1]`.
        keys: Vec<Key>,
        /// Child node ids (arena index or page offset).
        children: Vec<Offset>,
    },
    /// Leaf node with key-value entries.
    Leaf {
        /// Key-value pairs stored in sorted order.
        entries: Vec<(Key, V)>,
    },
}

impl<V> Node<V> {
    /// Create a new empty leaf node.
    pub fn new_leaf() -> Self {
        Self::Leaf {
            entries: Vec::new(),
        }
    }

    /// Create a new internal node.
    pub fn new_internal(keys: Vec<Key>, children: Vec<Offset>) -> Self {
        Self::Internal { keys, children }
    }

    /// Returns true if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Returns the number of keys in this node.
    pub fn len(&self) -> usize {
        match self {
            Self::Internal { keys, .. } => keys.len(),
            Self::Leaf { entries } => entries.len(),
        }
    }

    /// Returns true if the node holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the node's keys in order.
    pub fn keys(&self) -> Vec<&[u8]> {
        match self {
            Self::Internal { keys, .. } => keys.iter().map(Vec::as_slice).collect(),
            Self::Leaf { entries } => entries.iter().map(|(k, _)| k.as_slice()).collect(),
        }
    }

    /// Child ids of an internal node; empty for leaves.
    pub fn children(&self) -> &[Offset] {
        match self {
            Self::Internal { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }
}
