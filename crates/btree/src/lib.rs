//! B+Tree index over typed fixed-width keys.
//!
//! One algorithm serves two node stores: an in-memory arena
//! ([`MemoryTree`]) and a page store persisted through the node page
//! layout ([`PagedTree`]). Nodes link to children by id only; rebalancing
//! walks back up the descent path instead of following parent pointers.

mod node;
mod page;
mod payload;
mod snapshot;
mod store;

pub use node::{Key, Node};
pub use page::{CHECKSUM_SIZE, MAX_ORDER, MIN_ORDER, MetaPage, NODE_HEADER_SIZE, NodeLayout};
pub use payload::LeafPayload;
pub use snapshot::NodeSnapshot;
pub use store::{ArenaStore, NodeStore, PagedStore};

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::marker::PhantomData;

use codec::Codec;
use common::{DbError, DbResult, Module, NULL_OFFSET, Offset};
use serde::Serialize;
use storage::PageStore;
use tracing::{debug, trace};
use types::Value;

/// Tree over the in-memory arena.
pub type MemoryTree<V> = BPlusTree<V, ArenaStore<V>>;

/// Tree persisted in a page store.
pub type PagedTree<S, V> = BPlusTree<V, PagedStore<S, V>>;

/// One level of a root-to-leaf descent: the internal node visited and the
/// child position taken.
#[derive(Clone, Copy, Debug)]
struct Step {
    id: Offset,
    child: usize,
}

/// A B+Tree mapping unique keys to values.
///
/// Callers serialize access; splits and merges touch several nodes with
/// no intermediate consistency.
#[derive(Debug)]
pub struct BPlusTree<V, S> {
    store: S,
    key: Codec,
    _values: PhantomData<fn() -> V>,
}

impl<V: Clone> MemoryTree<V> {
    /// Create an empty in-memory tree.
    pub fn in_memory(key: Codec, order: usize) -> DbResult<Self> {
        Self::new(ArenaStore::new(order)?, key)
    }
}

impl<S: PageStore, V: LeafPayload> PagedTree<S, V> {
    /// Create a new tree in an empty page store.
    pub fn create(pages: S, layout: NodeLayout) -> DbResult<Self> {
        let key = layout.key_codec();
        Self::new(PagedStore::create(pages, layout)?, key)
    }

    /// Reopen a tree previously written to `pages`.
    pub fn open(pages: S, key: Codec, value_width: usize) -> DbResult<Self> {
        Self::new(PagedStore::open(pages, key, value_width)?, key)
    }

    pub fn close(self) -> DbResult<()> {
        self.store.close()
    }
}

impl<V: Clone, S: NodeStore<V>> BPlusTree<V, S> {
    /// Wrap a node store. A store without a root gets an empty leaf root.
    pub fn new(mut store: S, key: Codec) -> DbResult<Self> {
        if store.root() == NULL_OFFSET {
            let root = store.allocate_node()?;
            store.write_node(root, &Node::new_leaf())?;
            store.set_root(root)?;
        }
        Ok(Self {
            store,
            key,
            _values: PhantomData,
        })
    }

    /// Build a tree in an empty store from a snapshot.
    ///
    /// The snapshot must describe a valid tree for the store's order.
    pub fn from_snapshot(mut store: S, key: Codec, snapshot: &NodeSnapshot<V>) -> DbResult<Self> {
        if store.root() != NULL_OFFSET {
            return Err(DbError::input(
                Module::BTree,
                "snapshot can only be loaded into an empty store",
            ));
        }
        let root = write_snapshot(&mut store, &key, snapshot)?;
        store.set_root(root)?;
        let tree = Self {
            store,
            key,
            _values: PhantomData,
        };
        tree.verify()?;
        Ok(tree)
    }

    pub fn key_codec(&self) -> Codec {
        self.key
    }

    pub fn order(&self) -> usize {
        self.store.order()
    }

    pub fn root(&self) -> Offset {
        self.store.root()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn flush(&mut self) -> DbResult<()> {
        self.store.flush()
    }

    /// Look up the value stored under `key`.
    pub fn search(&self, key: &Value) -> DbResult<Option<V>> {
        let raw = self.key.encode(key)?;
        let (leaf, _) = self.descend(&raw)?;
        let entries = self.read_leaf(leaf)?;
        Ok(self
            .find_entry(&entries, &raw)
            .ok()
            .map(|pos| entries[pos].1.clone()))
    }

    /// Insert or overwrite `key`. Returns the previous value on overwrite.
    pub fn insert(&mut self, key: &Value, value: V) -> DbResult<Option<V>> {
        let raw = self.key.encode(key)?;
        self.store.check_value(&value)?;
        let (leaf, path) = self.descend(&raw)?;
        let mut entries = self.read_leaf(leaf)?;

        let pos = match self.find_entry(&entries, &raw) {
            Ok(pos) => {
                let previous = std::mem::replace(&mut entries[pos].1, value);
                self.store.write_node(leaf, &Node::Leaf { entries })?;
                trace!(%key, "overwrote existing key");
                return Ok(Some(previous));
            }
            Err(pos) => pos,
        };
        entries.insert(pos, (raw, value));

        let order = self.order();
        if entries.len() < order {
            self.store.write_node(leaf, &Node::Leaf { entries })?;
            return Ok(None);
        }

        let right = entries.split_off(order / 2);
        let separator = right[0].0.clone();
        self.store.write_node(leaf, &Node::Leaf { entries })?;
        let right_id = self.store.allocate_node()?;
        self.store
            .write_node(right_id, &Node::Leaf { entries: right })?;
        debug!(left = leaf, right = right_id, "split leaf");

        self.insert_into_parent(path, leaf, separator, right_id)?;
        Ok(None)
    }

    /// Remove `key`. Returns the removed value, or `None` if it was absent.
    pub fn delete(&mut self, key: &Value) -> DbResult<Option<V>> {
        let raw = self.key.encode(key)?;
        let (leaf, path) = self.descend(&raw)?;
        let mut entries = self.read_leaf(leaf)?;

        let Ok(pos) = self.find_entry(&entries, &raw) else {
            trace!(%key, "delete of absent key");
            return Ok(None);
        };
        let (_, removed) = entries.remove(pos);
        self.store.write_node(leaf, &Node::Leaf { entries })?;

        self.rebalance(leaf, path)?;
        if pos == 0 {
            self.refresh_separator(&raw)?;
        }
        Ok(Some(removed))
    }

    /// Entries with `low <= key <= high`, in key order. Either bound may be
    /// omitted.
    pub fn range_scan(&self, low: Option<&Value>, high: Option<&Value>) -> DbResult<Vec<(Value, V)>> {
        let low = low.map(|v| self.key.encode(v)).transpose()?;
        let high = high.map(|v| self.key.encode(v)).transpose()?;
        let mut out = Vec::new();
        self.collect_range(self.root(), low.as_deref(), high.as_deref(), &mut out)?;
        Ok(out)
    }

    /// Every entry in key order.
    pub fn scan_all(&self) -> DbResult<Vec<(Value, V)>> {
        self.range_scan(None, None)
    }

    /// Number of entries.
    pub fn len(&self) -> DbResult<usize> {
        let mut count = 0;
        let mut pending = vec![self.root()];
        while let Some(id) = pending.pop() {
            match self.store.read_node(id)? {
                Node::Leaf { entries } => count += entries.len(),
                Node::Internal { children, .. } => pending.extend(children),
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> DbResult<bool> {
        let root = self.read_root()?;
        Ok(root.is_leaf() && root.is_empty())
    }

    /// Number of levels; a lone leaf root has height 1.
    pub fn height(&self) -> DbResult<usize> {
        let mut height = 1;
        let mut id = self.root();
        while let Node::Internal { children, .. } = self.store.read_node(id)? {
            id = first_child(&children, id)?;
            height += 1;
        }
        Ok(height)
    }

    /// Nodes grouped by depth, root first, each level left to right.
    pub fn level_order(&self) -> DbResult<Vec<Vec<(Offset, Node<V>)>>> {
        let mut levels: Vec<Vec<(Offset, Node<V>)>> = Vec::new();
        let mut queue = VecDeque::from([(self.root(), 0usize)]);
        while let Some((id, depth)) = queue.pop_front() {
            let node = self.store.read_node(id)?;
            queue.extend(node.children().iter().map(|&child| (child, depth + 1)));
            if levels.len() == depth {
                levels.push(Vec::new());
            }
            levels[depth].push((id, node));
        }
        Ok(levels)
    }

    /// Check every structural invariant, reporting the first violation as a
    /// logic error.
    pub fn verify(&self) -> DbResult<()> {
        self.check_subtree(self.root(), true, None, None)?;
        Ok(())
    }

    /// Nested copy of the tree with decoded keys.
    pub fn snapshot(&self) -> DbResult<NodeSnapshot<V>> {
        self.snapshot_node(self.root())
    }

    fn snapshot_node(&self, id: Offset) -> DbResult<NodeSnapshot<V>> {
        match self.store.read_node(id)? {
            Node::Leaf { entries } => {
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| Ok((self.key.decode(&k)?, v)))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(NodeSnapshot::leaf(entries))
            }
            Node::Internal { keys, children } => {
                let keys = keys
                    .iter()
                    .map(|k| self.key.decode(k))
                    .collect::<DbResult<Vec<_>>>()?;
                let child = children
                    .iter()
                    .map(|&c| self.snapshot_node(c))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(NodeSnapshot::internal(keys, child))
            }
        }
    }

    // ---- descent ----

    fn child_index(&self, keys: &[Key], raw: &[u8]) -> usize {
        keys.partition_point(|k| self.key.compare(k, raw) != Ordering::Greater)
    }

    fn find_entry(&self, entries: &[(Key, V)], raw: &[u8]) -> Result<usize, usize> {
        entries.binary_search_by(|(k, _)| self.key.compare(k, raw))
    }

    /// Walk from the root to the leaf responsible for `raw`.
    fn descend(&self, raw: &[u8]) -> DbResult<(Offset, Vec<Step>)> {
        let mut path = Vec::new();
        let mut id = self.root();
        loop {
            match self.store.read_node(id)? {
                Node::Leaf { .. } => return Ok((id, path)),
                Node::Internal { keys, children } => {
                    let child = self.child_index(&keys, raw);
                    path.push(Step { id, child });
                    id = children[child];
                }
            }
        }
    }

    fn read_root(&self) -> DbResult<Node<V>> {
        self.store.read_node(self.root())
    }

    fn read_leaf(&self, id: Offset) -> DbResult<Vec<(Key, V)>> {
        match self.store.read_node(id)? {
            Node::Leaf { entries } => Ok(entries),
            Node::Internal { .. } => Err(DbError::logic(
                Module::BTree,
                format!("node {id} is internal, expected a leaf"),
            )),
        }
    }

    fn read_internal(&self, id: Offset) -> DbResult<(Vec<Key>, Vec<Offset>)> {
        match self.store.read_node(id)? {
            Node::Internal { keys, children } => Ok((keys, children)),
            Node::Leaf { .. } => Err(DbError::logic(
                Module::BTree,
                format!("node {id} is a leaf, expected an internal node"),
            )),
        }
    }

    // ---- insert ----

    /// Hang `right` next to `left` in the parent, splitting upward as
    /// needed. An empty path means `left` was the root.
    fn insert_into_parent(
        &mut self,
        mut path: Vec<Step>,
        mut left: Offset,
        mut separator: Key,
        mut right: Offset,
    ) -> DbResult<()> {
        let order = self.order();
        while let Some(step) = path.pop() {
            let (mut keys, mut children) = self.read_internal(step.id)?;
            keys.insert(step.child, separator);
            children.insert(step.child + 1, right);

            if keys.len() < order {
                self.store
                    .write_node(step.id, &Node::new_internal(keys, children))?;
                return Ok(());
            }

            let mid = order / 2;
            let right_keys = keys.split_off(mid + 1);
            let right_children = children.split_off(mid + 1);
            separator = keys.pop().ok_or_else(|| {
                DbError::logic(Module::BTree, "internal split produced no separator")
            })?;
            self.store
                .write_node(step.id, &Node::new_internal(keys, children))?;
            let right_id = self.store.allocate_node()?;
            self.store
                .write_node(right_id, &Node::new_internal(right_keys, right_children))?;
            debug!(left = step.id, right = right_id, "split internal node");

            left = step.id;
            right = right_id;
        }

        let root = self.store.allocate_node()?;
        self.store
            .write_node(root, &Node::new_internal(vec![separator], vec![left, right]))?;
        self.store.set_root(root)?;
        debug!(root, "root split, tree grew a level");
        Ok(())
    }

    // ---- delete ----

    fn underflows(&self, node: &Node<V>) -> bool {
        let order = self.order();
        match node {
            Node::Leaf { entries } => entries.len() < order / 2,
            Node::Internal { children, .. } => children.len() < order.div_ceil(2),
        }
    }

    fn can_lend(&self, node: &Node<V>) -> bool {
        let order = self.order();
        match node {
            Node::Leaf { entries } => entries.len() > order / 2,
            Node::Internal { children, .. } => children.len() > order.div_ceil(2),
        }
    }

    /// Restore occupancy from `id` upward along `path`, collapsing the root
    /// when it is left with a single child.
    fn rebalance(&mut self, mut id: Offset, mut path: Vec<Step>) -> DbResult<()> {
        loop {
            let node = self.store.read_node(id)?;
            let Some(step) = path.pop() else {
                if let Node::Internal { keys, children } = &node {
                    if keys.is_empty() && children.len() == 1 {
                        self.store.set_root(children[0])?;
                        self.store.release_node(id)?;
                        debug!(old = id, new = children[0], "collapsed root");
                    }
                }
                return Ok(());
            };
            if !self.underflows(&node) {
                return Ok(());
            }

            let (mut keys, mut children) = self.read_internal(step.id)?;
            let idx = step.child;

            let left = match idx.checked_sub(1) {
                Some(l) => Some((children[l], self.store.read_node(children[l])?)),
                None => None,
            };
            if let Some((left_id, left_node)) = &left {
                if self.can_lend(left_node) {
                    let (left_node, node) =
                        borrow_from_left(left_node.clone(), node, &mut keys[idx - 1])?;
                    self.store.write_node(*left_id, &left_node)?;
                    self.store.write_node(id, &node)?;
                    self.store
                        .write_node(step.id, &Node::new_internal(keys, children))?;
                    trace!(node = id, sibling = left_id, "borrowed from left sibling");
                    return Ok(());
                }
            }

            let right = match children.get(idx + 1) {
                Some(&r) => Some((r, self.store.read_node(r)?)),
                None => None,
            };
            if let Some((right_id, right_node)) = &right {
                if self.can_lend(right_node) {
                    let (node, right_node) =
                        borrow_from_right(node, right_node.clone(), &mut keys[idx])?;
                    self.store.write_node(id, &node)?;
                    self.store.write_node(*right_id, &right_node)?;
                    self.store
                        .write_node(step.id, &Node::new_internal(keys, children))?;
                    trace!(node = id, sibling = right_id, "borrowed from right sibling");
                    return Ok(());
                }
            }

            match (left, right) {
                (Some((left_id, left_node)), _) => {
                    let separator = keys.remove(idx - 1);
                    children.remove(idx);
                    let merged = merge_nodes(left_node, node, separator)?;
                    self.store.write_node(left_id, &merged)?;
                    self.store.release_node(id)?;
                    debug!(into = left_id, released = id, "merged into left sibling");
                }
                (None, Some((right_id, right_node))) => {
                    let separator = keys.remove(idx);
                    children.remove(idx + 1);
                    let merged = merge_nodes(node, right_node, separator)?;
                    self.store.write_node(id, &merged)?;
                    self.store.release_node(right_id)?;
                    debug!(into = id, released = right_id, "merged right sibling");
                }
                (None, None) => {
                    return Err(DbError::logic(
                        Module::BTree,
                        format!("node {id} has no siblings under {}", step.id),
                    ));
                }
            }
            self.store
                .write_node(step.id, &Node::new_internal(keys, children))?;
            id = step.id;
        }
    }

    /// Replace a separator equal to the deleted key `raw` with the current
    /// minimum of the subtree to its right.
    fn refresh_separator(&mut self, raw: &[u8]) -> DbResult<()> {
        let mut id = self.root();
        while let Node::Internal { mut keys, children } = self.store.read_node(id)? {
            let idx = self.child_index(&keys, raw);
            if idx > 0 && self.key.equal(&keys[idx - 1], raw) {
                keys[idx - 1] = self.leftmost_key(children[idx])?;
                trace!(node = id, "refreshed stale separator");
                self.store
                    .write_node(id, &Node::new_internal(keys, children.clone()))?;
            }
            id = children[idx];
        }
        Ok(())
    }

    fn leftmost_key(&self, mut id: Offset) -> DbResult<Key> {
        loop {
            match self.store.read_node(id)? {
                Node::Internal { children, .. } => id = first_child(&children, id)?,
                Node::Leaf { entries } => {
                    return entries.into_iter().next().map(|(k, _)| k).ok_or_else(|| {
                        DbError::logic(Module::BTree, format!("leaf {id} is empty"))
                    });
                }
            }
        }
    }

    // ---- scans and checks ----

    fn collect_range(
        &self,
        id: Offset,
        low: Option<&[u8]>,
        high: Option<&[u8]>,
        out: &mut Vec<(Value, V)>,
    ) -> DbResult<()> {
        match self.store.read_node(id)? {
            Node::Leaf { entries } => {
                for (k, v) in entries {
                    if low.is_some_and(|lo| self.key.less(&k, lo)) {
                        continue;
                    }
                    if high.is_some_and(|hi| self.key.greater(&k, hi)) {
                        break;
                    }
                    out.push((self.key.decode(&k)?, v));
                }
            }
            Node::Internal { keys, children } => {
                let start = low.map_or(0, |lo| self.child_index(&keys, lo));
                let end = high.map_or(children.len() - 1, |hi| self.child_index(&keys, hi));
                for &child in children.iter().take(end + 1).skip(start) {
                    self.collect_range(child, low, high, out)?;
                }
            }
        }
        Ok(())
    }

    /// Check the subtree at `id` against `[lower, upper)`. Returns its
    /// depth and minimum key.
    fn check_subtree(
        &self,
        id: Offset,
        is_root: bool,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
    ) -> DbResult<(usize, Option<Key>)> {
        let node = self.store.read_node(id)?;
        let order = self.order();
        let violation = |msg: String| DbError::logic(Module::BTree, format!("node {id}: {msg}"));

        let keys = node.keys();
        if keys.len() > order - 1 {
            return Err(violation(format!("{} keys exceed order {order}", keys.len())));
        }
        if !is_root && self.underflows(&node) {
            return Err(violation(format!("underfull with {} keys", keys.len())));
        }
        for pair in keys.windows(2) {
            if self.key.compare(pair[0], pair[1]) != Ordering::Less {
                return Err(violation("keys are not strictly increasing".into()));
            }
        }
        for key in &keys {
            if lower.is_some_and(|lo| self.key.less(key, lo))
                || upper.is_some_and(|hi| !self.key.less(key, hi))
            {
                return Err(violation("key outside the range set by its ancestors".into()));
            }
        }

        match &node {
            Node::Leaf { entries } => Ok((1, entries.first().map(|(k, _)| k.clone()))),
            Node::Internal { keys, children } => {
                if children.len() != keys.len() + 1 {
                    return Err(violation(format!(
                        "{} keys with {} children",
                        keys.len(),
                        children.len()
                    )));
                }
                if is_root && children.len() < 2 {
                    return Err(violation("internal root with a single child".into()));
                }
                let mut depth = None;
                let mut min = None;
                for (i, &child) in children.iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(keys[i - 1].as_slice()) };
                    let hi = keys.get(i).map(Vec::as_slice).or(upper);
                    let (child_depth, child_min) = self.check_subtree(child, false, lo, hi)?;
                    if *depth.get_or_insert(child_depth) != child_depth {
                        return Err(violation("leaves at different depths".into()));
                    }
                    if i == 0 {
                        min = child_min;
                    } else if !child_min
                        .as_deref()
                        .is_some_and(|m| self.key.equal(m, &keys[i - 1]))
                    {
                        return Err(violation(format!(
                            "separator {} is not the minimum of child {i}",
                            i - 1
                        )));
                    }
                }
                Ok((depth.unwrap_or(0) + 1, min))
            }
        }
    }
}

impl<V: Clone + Serialize, S: NodeStore<V>> BPlusTree<V, S> {
    pub fn to_json(&self) -> DbResult<String> {
        self.snapshot()?.to_json()
    }
}

fn first_child(children: &[Offset], id: Offset) -> DbResult<Offset> {
    children
        .first()
        .copied()
        .ok_or_else(|| DbError::logic(Module::BTree, format!("internal node {id} has no children")))
}

/// Rotate the last entry of `left` into the front of `node` through the
/// parent separator.
fn borrow_from_left<V>(
    left: Node<V>,
    node: Node<V>,
    separator: &mut Key,
) -> DbResult<(Node<V>, Node<V>)> {
    match (left, node) {
        (Node::Leaf { entries: mut from }, Node::Leaf { entries: mut to }) => {
            let moved = from.pop().ok_or_else(empty_sibling)?;
            *separator = moved.0.clone();
            to.insert(0, moved);
            Ok((Node::Leaf { entries: from }, Node::Leaf { entries: to }))
        }
        (
            Node::Internal {
                keys: mut from_keys,
                children: mut from_children,
            },
            Node::Internal {
                mut keys,
                mut children,
            },
        ) => {
            let child = from_children.pop().ok_or_else(empty_sibling)?;
            let up = from_keys.pop().ok_or_else(empty_sibling)?;
            keys.insert(0, std::mem::replace(separator, up));
            children.insert(0, child);
            Ok((
                Node::new_internal(from_keys, from_children),
                Node::new_internal(keys, children),
            ))
        }
        _ => Err(mixed_siblings()),
    }
}

/// Rotate the first entry of `right` onto the back of `node` through the
/// parent separator.
fn borrow_from_right<V>(
    node: Node<V>,
    right: Node<V>,
    separator: &mut Key,
) -> DbResult<(Node<V>, Node<V>)> {
    match (node, right) {
        (Node::Leaf { entries: mut to }, Node::Leaf { entries: mut from }) => {
            if from.len() < 2 {
                return Err(empty_sibling());
            }
            to.push(from.remove(0));
            *separator = from[0].0.clone();
            Ok((Node::Leaf { entries: to }, Node::Leaf { entries: from }))
        }
        (
            Node::Internal {
                mut keys,
                mut children,
            },
            Node::Internal {
                keys: mut from_keys,
                children: mut from_children,
            },
        ) => {
            if from_keys.is_empty() {
                return Err(empty_sibling());
            }
            let up = from_keys.remove(0);
            keys.push(std::mem::replace(separator, up));
            children.push(from_children.remove(0));
            Ok((
                Node::new_internal(keys, children),
                Node::new_internal(from_keys, from_children),
            ))
        }
        _ => Err(mixed_siblings()),
    }
}

/// Concatenate `right` onto `left`. Internal merges pull the parent
/// separator down between the two key lists.
fn merge_nodes<V>(left: Node<V>, right: Node<V>, separator: Key) -> DbResult<Node<V>> {
    match (left, right) {
        (Node::Leaf { mut entries }, Node::Leaf { entries: rest }) => {
            entries.extend(rest);
            Ok(Node::Leaf { entries })
        }
        (
            Node::Internal {
                mut keys,
                mut children,
            },
            Node::Internal {
                keys: rest_keys,
                children: rest_children,
            },
        ) => {
            keys.push(separator);
            keys.extend(rest_keys);
            children.extend(rest_children);
            Ok(Node::new_internal(keys, children))
        }
        _ => Err(mixed_siblings()),
    }
}

fn empty_sibling() -> DbError {
    DbError::logic(Module::BTree, "sibling has nothing to lend")
}

fn mixed_siblings() -> DbError {
    DbError::logic(Module::BTree, "siblings differ in node type")
}

/// Write `snapshot` bottom-up into `store`, returning the id of its root.
fn write_snapshot<V: Clone, S: NodeStore<V>>(
    store: &mut S,
    key: &Codec,
    snapshot: &NodeSnapshot<V>,
) -> DbResult<Offset> {
    let keys = snapshot
        .keys
        .iter()
        .map(|k| key.encode(k))
        .collect::<DbResult<Vec<_>>>()?;

    let node = if snapshot.is_leaf {
        if !snapshot.child.is_empty() || snapshot.values.len() != keys.len() {
            return Err(DbError::input(
                Module::BTree,
                format!(
                    "leaf snapshot has {} keys, {} values and {} children",
                    keys.len(),
                    snapshot.values.len(),
                    snapshot.child.len()
                ),
            ));
        }
        Node::Leaf {
            entries: keys.into_iter().zip(snapshot.values.iter().cloned()).collect(),
        }
    } else {
        if snapshot.child.len() != keys.len() + 1 || !snapshot.values.is_empty() {
            return Err(DbError::input(
                Module::BTree,
                format!(
                    "internal snapshot has {} keys and {} children",
                    keys.len(),
                    snapshot.child.len()
                ),
            ));
        }
        let children = snapshot
            .child
            .iter()
            .map(|c| write_snapshot(store, key, c))
            .collect::<DbResult<Vec<_>>>()?;
        Node::new_internal(keys, children)
    };

    let id = store.allocate_node()?;
    store.write_node(id, &node)?;
    Ok(id)
}
