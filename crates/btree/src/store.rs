//! Where nodes live: an in-memory arena or a page store.
//!
//! The tree algorithm only sees [`NodeStore`]: nodes are addressed by an
//! integer id, which is an arena slot index for [`ArenaStore`] and a page
//! offset for [`PagedStore`]. Links between nodes are plain ids in both
//! cases, so no node ever owns another.

use std::marker::PhantomData;

use codec::Codec;
use common::{DbError, DbResult, Module, NULL_OFFSET, Offset};
use storage::PageStore;
use tracing::debug;

use crate::node::Node;
use crate::page::{MIN_ORDER, MetaPage, NodeLayout};
use crate::payload::LeafPayload;

/// Storage for tree nodes addressed by id.
pub trait NodeStore<V> {
    /// Maximum fan-out of internal nodes.
    fn order(&self) -> usize;

    /// Id of the root node, or `NULL_OFFSET` for a store with no tree yet.
    fn root(&self) -> Offset;

    fn set_root(&mut self, root: Offset) -> DbResult<()>;

    fn read_node(&self, id: Offset) -> DbResult<Node<V>>;

    fn write_node(&mut self, id: Offset, node: &Node<V>) -> DbResult<()>;

    /// Reject a value this store cannot hold, before any node is touched.
    fn check_value(&self, _value: &V) -> DbResult<()> {
        Ok(())
    }

    /// Reserve an id for a node that will be written next.
    fn allocate_node(&mut self) -> DbResult<Offset>;

    /// Drop the node at `id`; reading it afterwards is an error.
    fn release_node(&mut self, id: Offset) -> DbResult<()>;

    fn flush(&mut self) -> DbResult<()>;
}

/// In-memory node arena. Released slots are reused by later allocations.
#[derive(Debug)]
pub struct ArenaStore<V> {
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    root: Offset,
    order: usize,
}

impl<V> ArenaStore<V> {
    pub fn new(order: usize) -> DbResult<Self> {
        if order < MIN_ORDER {
            return Err(DbError::input(
                Module::BTree,
                format!("order {order} is below the minimum of {MIN_ORDER}"),
            ));
        }
        Ok(Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NULL_OFFSET,
            order,
        })
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    fn slot(&self, id: Offset) -> DbResult<usize> {
        usize::try_from(id)
            .ok()
            .filter(|&idx| idx < self.slots.len())
            .ok_or_else(|| DbError::logic(Module::BTree, format!("node {id} does not exist")))
    }
}

impl<V: Clone> NodeStore<V> for ArenaStore<V> {
    fn order(&self) -> usize {
        self.order
    }

    fn root(&self) -> Offset {
        self.root
    }

    fn set_root(&mut self, root: Offset) -> DbResult<()> {
        self.slot(root)?;
        self.root = root;
        Ok(())
    }

    fn read_node(&self, id: Offset) -> DbResult<Node<V>> {
        let idx = self.slot(id)?;
        self.slots[idx]
            .clone()
            .ok_or_else(|| DbError::logic(Module::BTree, format!("node {id} was released")))
    }

    fn write_node(&mut self, id: Offset, node: &Node<V>) -> DbResult<()> {
        let idx = self.slot(id)?;
        if self.slots[idx].is_none() {
            return Err(DbError::logic(
                Module::BTree,
                format!("node {id} was released"),
            ));
        }
        self.slots[idx] = Some(node.clone());
        Ok(())
    }

    fn allocate_node(&mut self) -> DbResult<Offset> {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(Node::new_leaf());
                idx
            }
            None => {
                self.slots.push(Some(Node::new_leaf()));
                self.slots.len() - 1
            }
        };
        Ok(idx as Offset)
    }

    fn release_node(&mut self, id: Offset) -> DbResult<()> {
        let idx = self.slot(id)?;
        if self.slots[idx].take().is_none() {
            return Err(DbError::logic(
                Module::BTree,
                format!("node {id} released twice"),
            ));
        }
        self.free.push(idx);
        Ok(())
    }

    fn flush(&mut self) -> DbResult<()> {
        Ok(())
    }
}

/// Nodes persisted one per page through a [`NodeLayout`].
///
/// The first page of the store holds the [`MetaPage`]; every other page is
/// a node page addressed by its offset.
#[derive(Debug)]
pub struct PagedStore<S, V> {
    pages: S,
    layout: NodeLayout,
    meta_offset: Offset,
    root: Offset,
    _values: PhantomData<fn() -> V>,
}

impl<S: PageStore, V: LeafPayload> PagedStore<S, V> {
    /// Initialize an empty page store for a new tree.
    pub fn create(mut pages: S, layout: NodeLayout) -> DbResult<Self> {
        if pages.page_size() != layout.page_size() {
            return Err(DbError::input(
                Module::BTree,
                format!(
                    "store pages are {} bytes, layout expects {}",
                    pages.page_size(),
                    layout.page_size()
                ),
            ));
        }
        if pages.page_count()? != 0 {
            return Err(DbError::input(
                Module::BTree,
                "page store already holds pages; open it instead",
            ));
        }
        let meta_offset = pages.assign_empty_page()?;
        let mut store = Self {
            pages,
            layout,
            meta_offset,
            root: NULL_OFFSET,
            _values: PhantomData,
        };
        store.write_meta()?;
        debug!(order = layout.order(), page_size = layout.page_size(), "created paged tree store");
        Ok(store)
    }

    /// Rehydrate from the meta page at offset 0.
    pub fn open(pages: S, key: Codec, value_width: usize) -> DbResult<Self> {
        let meta_offset = 0;
        let meta = MetaPage::decode(&pages.reader(meta_offset)?)?;
        if meta.key_type != key.get_type()
            || meta.key_width != key.width()
            || meta.value_width != value_width
        {
            return Err(DbError::input(
                Module::BTree,
                format!(
                    "store holds {} keys of {} bytes with {}-byte values, caller expects {} keys of {} bytes with {}-byte values",
                    meta.key_type,
                    meta.key_width,
                    meta.value_width,
                    key.get_type(),
                    key.width(),
                    value_width
                ),
            ));
        }
        let layout = NodeLayout::new(pages.page_size(), key, value_width)?.with_order(meta.order)?;
        debug!(root = meta.root, order = meta.order, "opened paged tree store");
        Ok(Self {
            pages,
            layout,
            meta_offset,
            root: meta.root,
            _values: PhantomData,
        })
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    pub fn pages(&self) -> &S {
        &self.pages
    }

    pub fn into_pages(self) -> S {
        self.pages
    }

    /// Flush and close the underlying page store.
    pub fn close(mut self) -> DbResult<()> {
        self.pages.sync()?;
        self.pages.close()
    }

    fn write_meta(&mut self) -> DbResult<()> {
        let page = MetaPage::for_layout(&self.layout, self.root).encode(self.layout.page_size())?;
        self.pages.writer(self.meta_offset, &page)
    }

    fn check_node_id(&self, id: Offset) -> DbResult<()> {
        if id == self.meta_offset || id < 0 {
            return Err(DbError::logic(
                Module::BTree,
                format!("offset {id} does not address a node page"),
            ));
        }
        Ok(())
    }
}

impl<S: PageStore, V: LeafPayload> NodeStore<V> for PagedStore<S, V> {
    fn order(&self) -> usize {
        self.layout.order()
    }

    fn root(&self) -> Offset {
        self.root
    }

    fn set_root(&mut self, root: Offset) -> DbResult<()> {
        self.check_node_id(root)?;
        self.root = root;
        self.write_meta()
    }

    fn read_node(&self, id: Offset) -> DbResult<Node<V>> {
        self.check_node_id(id)?;
        let page = self.pages.reader(id)?;
        self.layout.decode_node(&page).map_err(|err| match err {
            DbError::Corruption { module, message } => DbError::Corruption {
                module,
                message: format!("page {id}: {message}"),
            },
            other => other,
        })
    }

    fn write_node(&mut self, id: Offset, node: &Node<V>) -> DbResult<()> {
        self.check_node_id(id)?;
        let page = self.layout.encode_node(node)?;
        self.pages.writer(id, &page)
    }

    fn check_value(&self, value: &V) -> DbResult<()> {
        value.encode_payload(self.layout.value_width()).map(|_| ())
    }

    fn allocate_node(&mut self) -> DbResult<Offset> {
        self.pages.assign_empty_page()
    }

    fn release_node(&mut self, id: Offset) -> DbResult<()> {
        self.check_node_id(id)?;
        self.pages.delete(id)
    }

    fn flush(&mut self) -> DbResult<()> {
        self.pages.sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::MemoryPageStore;
    use types::Value;

    #[test]
    fn arena_reuses_released_slots() {
        let mut arena = ArenaStore::<i64>::new(4).unwrap();
        let a = arena.allocate_node().unwrap();
        let b = arena.allocate_node().unwrap();
        assert_eq!((a, b), (0, 1));
        arena.release_node(a).unwrap();
        assert!(arena.read_node(a).is_err());
        assert!(arena.release_node(a).is_err());
        assert_eq!(arena.allocate_node().unwrap(), a);
        assert_eq!(arena.node_count(), 2);
    }

    #[test]
    fn arena_rejects_tiny_order() {
        assert!(ArenaStore::<i64>::new(2).is_err());
    }

    #[test]
    fn paged_store_round_trips_nodes_and_root() {
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap();
        let pages = MemoryPageStore::new(128).unwrap();
        let mut store = PagedStore::<_, i64>::create(pages, layout).unwrap();
        assert_eq!(store.root(), NULL_OFFSET);

        let id = store.allocate_node().unwrap();
        assert_eq!(id, 128);
        let key = Codec::int().encode(&Value::Int(3)).unwrap();
        let node = Node::Leaf {
            entries: vec![(key, 30i64)],
        };
        store.write_node(id, &node).unwrap();
        store.set_root(id).unwrap();

        let pages = store.into_pages();
        let reopened = PagedStore::<_, i64>::open(pages, Codec::int(), 8).unwrap();
        assert_eq!(reopened.root(), id);
        assert_eq!(reopened.read_node(id).unwrap(), node);
    }

    #[test]
    fn paged_store_refuses_layout_mismatch() {
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap();
        let store = PagedStore::<_, i64>::create(MemoryPageStore::new(128).unwrap(), layout).unwrap();
        let pages = store.into_pages();
        let err = PagedStore::<_, i64>::open(pages, Codec::text(8).unwrap(), 8).unwrap_err();
        assert!(matches!(err, DbError::Input { .. }));
    }

    #[test]
    fn paged_store_refuses_non_empty_pages() {
        let mut pages = MemoryPageStore::new(128).unwrap();
        pages.assign_empty_page().unwrap();
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap();
        assert!(PagedStore::<_, i64>::create(pages, layout).is_err());
    }

    #[test]
    fn paged_store_checks_value_width() {
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap();
        let store =
            PagedStore::<_, Vec<u8>>::create(MemoryPageStore::new(128).unwrap(), layout).unwrap();
        assert!(store.check_value(&vec![7u8; 8]).is_ok());
        assert!(matches!(store.check_value(&vec![7u8; 9]), Err(DbError::Input { .. })));
        assert!(ArenaStore::<Vec<u8>>::new(4).unwrap().check_value(&vec![7u8; 9]).is_ok());
    }

    #[test]
    fn meta_page_is_not_a_node() {
        let layout = NodeLayout::new(128, Codec::int(), 8).unwrap();
        let store = PagedStore::<_, i64>::create(MemoryPageStore::new(128).unwrap(), layout).unwrap();
        assert!(store.read_node(0).is_err());
    }
}
