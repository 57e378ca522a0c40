//! B+Tree page layout and serialization.
//!
//! Node page, all integers big-endian:
//!
//! ```text
//! +--------+-----------+------------------+--------------------------------+------+----------+
//! | leaf:1 | count: u16| key_0 .. key_n-1 | leaf:  value_0 .. value_n-1    | zero | crc32: 4 |
//! |        |           | (key width each) | inner: child_0 .. child_n (i64)| fill |          |
//! +--------+-----------+------------------+--------------------------------+------+----------+
//! ```
//!
//! The checksum covers every byte before it, zero fill included, so any
//! flipped byte in the page is caught on read.
//!
//! Meta page (offset 0 of a persisted tree):
//!
//! ```text
//! magic "BPT1" | version: u8 | key type: u8 | key width: u16 | value width: u32
//! | order: u32 | root: i64 | zero fill | crc32: 4
//! ```

use codec::Codec;
use common::{DbError, DbResult, Module, NULL_OFFSET, Offset};
use tracing::warn;
use types::FieldType;

use crate::node::{Key, Node};
use crate::payload::LeafPayload;

/// Leaf flag plus the u16 entry count.
pub const NODE_HEADER_SIZE: usize = 3;

/// Trailing CRC32.
pub const CHECKSUM_SIZE: usize = 4;

/// Encoded child offset.
pub const CHILD_SIZE: usize = 8;

/// Smallest fan-out the balancing rules work with.
pub const MIN_ORDER: usize = 3;

/// Counts are u16, so a node holds at most `u16::MAX` keys.
pub const MAX_ORDER: usize = u16::MAX as usize + 1;

const LEAF_FLAG: u8 = 1;
const INTERNAL_FLAG: u8 = 0;

const META_MAGIC: &[u8; 4] = b"BPT1";
const META_VERSION: u8 = 1;
const META_SIZE: usize = 4 + 1 + 1 + 2 + 4 + 4 + 8;

/// Page geometry of one tree: page size, key codec, value width and the
/// order derived from them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeLayout {
    page_size: usize,
    key: Codec,
    value_width: usize,
    order: usize,
}

impl NodeLayout {
    /// Layout with the largest order that fits one node per page.
    pub fn new(page_size: usize, key: Codec, value_width: usize) -> DbResult<Self> {
        if page_size < META_SIZE + CHECKSUM_SIZE {
            return Err(DbError::input(
                Module::Node,
                format!("page size {page_size} cannot hold a meta page"),
            ));
        }
        let order = Self::max_order(page_size, key.width(), value_width);
        if order < MIN_ORDER {
            return Err(DbError::input(
                Module::Node,
                format!(
                    "page size {page_size} fits order {order}; need at least {MIN_ORDER} \
                     for {}-byte keys and {value_width}-byte values",
                    key.width()
                ),
            ));
        }
        Ok(Self {
            page_size,
            key,
            value_width,
            order,
        })
    }

    /// Lower the order below the page maximum (useful to force deep trees).
    pub fn with_order(mut self, order: usize) -> DbResult<Self> {
        let max = Self::max_order(self.page_size, self.key.width(), self.value_width);
        if !(MIN_ORDER..=max).contains(&order) {
            return Err(DbError::input(
                Module::Node,
                format!("order {order} outside [{MIN_ORDER}, {max}] for this page layout"),
            ));
        }
        self.order = order;
        Ok(self)
    }

    /// Largest order whose fullest leaf and fullest internal node both fit.
    pub fn max_order(page_size: usize, key_width: usize, value_width: usize) -> usize {
        let usable = page_size.saturating_sub(NODE_HEADER_SIZE + CHECKSUM_SIZE);
        let leaf = usable / (key_width + value_width).max(1) + 1;
        let internal = (usable + key_width) / (key_width + CHILD_SIZE);
        leaf.min(internal).min(MAX_ORDER)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn key_codec(&self) -> Codec {
        self.key
    }

    pub fn value_width(&self) -> usize {
        self.value_width
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Serialize `node` into exactly one page.
    pub fn encode_node<V: LeafPayload>(&self, node: &Node<V>) -> DbResult<Vec<u8>> {
        let count = node.len();
        if count > self.max_keys() {
            return Err(DbError::input(
                Module::Node,
                format!(
                    "node holds {count} keys, order {} allows {}",
                    self.order,
                    self.max_keys()
                ),
            ));
        }

        let mut page = vec![0u8; self.page_size];
        page[1..3].copy_from_slice(&(count as u16).to_be_bytes());
        let mut pos = NODE_HEADER_SIZE;
        let key_width = self.key.width();

        match node {
            Node::Leaf { entries } => {
                page[0] = LEAF_FLAG;
                for (key, _) in entries {
                    self.key.check_width(key)?;
                    page[pos..pos + key_width].copy_from_slice(key);
                    pos += key_width;
                }
                for (_, value) in entries {
                    let raw = value.encode_payload(self.value_width)?;
                    if raw.len() != self.value_width {
                        return Err(DbError::input(
                            Module::Node,
                            format!(
                                "value encoded to {} bytes, slot is {}",
                                raw.len(),
                                self.value_width
                            ),
                        ));
                    }
                    page[pos..pos + self.value_width].copy_from_slice(&raw);
                    pos += self.value_width;
                }
            }
            Node::Internal { keys, children } => {
                page[0] = INTERNAL_FLAG;
                if children.len() != keys.len() + 1 {
                    return Err(DbError::logic(
                        Module::Node,
                        format!(
                            "internal node has {} keys but {} children",
                            keys.len(),
                            children.len()
                        ),
                    ));
                }
                for key in keys {
                    self.key.check_width(key)?;
                    page[pos..pos + key_width].copy_from_slice(key);
                    pos += key_width;
                }
                for child in children {
                    page[pos..pos + CHILD_SIZE].copy_from_slice(&child.to_be_bytes());
                    pos += CHILD_SIZE;
                }
            }
        }

        seal(&mut page);
        Ok(page)
    }

    /// Parse a page written by [`encode_node`](Self::encode_node).
    pub fn decode_node<V: LeafPayload>(&self, page: &[u8]) -> DbResult<Node<V>> {
        if page.len() != self.page_size {
            return Err(DbError::input(
                Module::Node,
                format!("page is {} bytes, expected {}", page.len(), self.page_size),
            ));
        }
        if page.iter().all(|&b| b == 0) {
            return Err(DbError::logic(
                Module::Node,
                "page is zeroed; the node was released or never written",
            ));
        }
        verify_checksum(page)?;

        let flag = page[0];
        let count = usize::from(u16::from_be_bytes([page[1], page[2]]));
        if count > self.max_keys() {
            return Err(corrupt(format!(
                "count {count} exceeds order {} limit",
                self.order
            )));
        }

        let key_width = self.key.width();
        let body_end = self.page_size - CHECKSUM_SIZE;
        let needed = match flag {
            LEAF_FLAG => NODE_HEADER_SIZE + count * (key_width + self.value_width),
            INTERNAL_FLAG => NODE_HEADER_SIZE + count * key_width + (count + 1) * CHILD_SIZE,
            other => return Err(corrupt(format!("unknown node flag {other}"))),
        };
        if needed > body_end {
            return Err(corrupt(format!(
                "{count} entries need {needed} bytes, page body has {body_end}"
            )));
        }

        let mut pos = NODE_HEADER_SIZE;
        let mut keys: Vec<Key> = Vec::with_capacity(count);
        for _ in 0..count {
            keys.push(page[pos..pos + key_width].to_vec());
            pos += key_width;
        }

        if flag == LEAF_FLAG {
            let mut entries = Vec::with_capacity(count);
            for key in keys {
                let value = V::decode_payload(&page[pos..pos + self.value_width])?;
                pos += self.value_width;
                entries.push((key, value));
            }
            Ok(Node::Leaf { entries })
        } else {
            let mut children = Vec::with_capacity(count + 1);
            for _ in 0..=count {
                let child = read_i64(&page[pos..pos + CHILD_SIZE]);
                if child < 0 {
                    return Err(corrupt(format!("child offset {child} is negative")));
                }
                children.push(child);
                pos += CHILD_SIZE;
            }
            Ok(Node::Internal { keys, children })
        }
    }
}

/// Tree-level metadata stored in the first page of a persisted tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetaPage {
    pub key_type: FieldType,
    pub key_width: usize,
    pub value_width: usize,
    pub order: usize,
    pub root: Offset,
}

impl MetaPage {
    pub fn for_layout(layout: &NodeLayout, root: Offset) -> Self {
        Self {
            key_type: layout.key.get_type(),
            key_width: layout.key.width(),
            value_width: layout.value_width,
            order: layout.order,
            root,
        }
    }

    pub fn encode(&self, page_size: usize) -> DbResult<Vec<u8>> {
        if page_size < META_SIZE + CHECKSUM_SIZE {
            return Err(DbError::input(
                Module::Node,
                format!("page size {page_size} cannot hold a meta page"),
            ));
        }
        let key_width = u16::try_from(self.key_width)
            .map_err(|_| DbError::input(Module::Node, "key width exceeds u16"))?;
        let value_width = u32::try_from(self.value_width)
            .map_err(|_| DbError::input(Module::Node, "value width exceeds u32"))?;
        let order = u32::try_from(self.order)
            .map_err(|_| DbError::input(Module::Node, "order exceeds u32"))?;

        let mut page = vec![0u8; page_size];
        page[0..4].copy_from_slice(META_MAGIC);
        page[4] = META_VERSION;
        page[5] = self.key_type.tag();
        page[6..8].copy_from_slice(&key_width.to_be_bytes());
        page[8..12].copy_from_slice(&value_width.to_be_bytes());
        page[12..16].copy_from_slice(&order.to_be_bytes());
        page[16..24].copy_from_slice(&self.root.to_be_bytes());
        seal(&mut page);
        Ok(page)
    }

    pub fn decode(page: &[u8]) -> DbResult<Self> {
        if page.len() < META_SIZE + CHECKSUM_SIZE {
            return Err(DbError::input(
                Module::Node,
                format!("meta page is only {} bytes", page.len()),
            ));
        }
        if &page[0..4] != META_MAGIC {
            return Err(corrupt("meta page magic mismatch".to_string()));
        }
        verify_checksum(page)?;
        if page[4] != META_VERSION {
            return Err(corrupt(format!("unsupported meta version {}", page[4])));
        }
        let key_type = FieldType::from_tag(page[5])
            .ok_or_else(|| corrupt(format!("unknown key type tag {}", page[5])))?;
        let key_width = usize::from(u16::from_be_bytes([page[6], page[7]]));
        let value_width = u32::from_be_bytes([page[8], page[9], page[10], page[11]]) as usize;
        let order = u32::from_be_bytes([page[12], page[13], page[14], page[15]]) as usize;
        let root = read_i64(&page[16..24]);
        if root < NULL_OFFSET {
            return Err(corrupt(format!("root offset {root} is invalid")));
        }
        Ok(Self {
            key_type,
            key_width,
            value_width,
            order,
            root,
        })
    }
}

fn read_i64(raw: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[..8]);
    i64::from_be_bytes(buf)
}

/// Write the CRC32 of everything before the trailer into the trailer.
fn seal(page: &mut [u8]) {
    let body_end = page.len() - CHECKSUM_SIZE;
    let crc = crc32fast::hash(&page[..body_end]);
    page[body_end..].copy_from_slice(&crc.to_be_bytes());
}

fn verify_checksum(page: &[u8]) -> DbResult<()> {
    let body_end = page.len() - CHECKSUM_SIZE;
    let stored = u32::from_be_bytes([
        page[body_end],
        page[body_end + 1],
        page[body_end + 2],
        page[body_end + 3],
    ]);
    let computed = crc32fast::hash(&page[..body_end]);
    if stored != computed {
        warn!(stored, computed, "page checksum mismatch");
        return Err(corrupt(format!(
            "checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
        )));
    }
    Ok(())
}

fn corrupt(message: String) -> DbError {
    DbError::corruption(Module::Node, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use types::Value;

    fn int_layout(page_size: usize) -> NodeLayout {
        NodeLayout::new(page_size, Codec::int(), 8).unwrap()
    }

    fn key(v: i64) -> Key {
        Codec::int().encode(&Value::Int(v)).unwrap()
    }

    #[test]
    fn order_is_derived_from_page_size() {
        // 128 - 7 = 121 usable bytes: leaf 121 / 16 + 1 = 8, internal 129 / 16 = 8.
        assert_eq!(int_layout(128).order(), 8);
        // Text keys of 24 bytes, 8-byte values: leaf 121 / 32 + 1 = 4, internal 145 / 32 = 4.
        let layout = NodeLayout::new(128, Codec::text(24).unwrap(), 8).unwrap();
        assert_eq!(layout.order(), 4);
    }

    #[test]
    fn full_nodes_fit_their_page() {
        let layout = int_layout(128);
        let max = layout.order() - 1;
        let leaf: Node<i64> = Node::Leaf {
            entries: (0..max as i64).map(|i| (key(i), i * 10)).collect(),
        };
        let internal: Node<i64> = Node::Internal {
            keys: (0..max as i64).map(key).collect(),
            children: (0..=max as i64).map(|i| (i + 1) * 128).collect(),
        };
        assert_eq!(layout.encode_node(&leaf).unwrap().len(), 128);
        assert_eq!(layout.encode_node(&internal).unwrap().len(), 128);
    }

    #[test]
    fn too_small_page_is_rejected() {
        assert!(NodeLayout::new(64, Codec::text(40).unwrap(), 16).is_err());
    }

    #[test]
    fn explicit_order_must_fit() {
        let layout = int_layout(128);
        assert_eq!(layout.with_order(4).unwrap().order(), 4);
        assert!(layout.with_order(2).is_err());
        assert!(layout.with_order(9).is_err());
    }

    #[test]
    fn leaf_page_layout_is_exact() {
        let layout = int_layout(128);
        let node: Node<i64> = Node::Leaf {
            entries: vec![(key(1), 100), (key(2), 200)],
        };
        let page = layout.encode_node(&node).unwrap();
        assert_eq!(page[0], 1);
        assert_eq!(&page[1..3], &[0, 2]);
        assert_eq!(&page[3..11], key(1).as_slice());
        assert_eq!(&page[11..19], key(2).as_slice());
        assert_eq!(&page[19..27], 100i64.to_be_bytes().as_slice());
        assert_eq!(&page[27..35], 200i64.to_be_bytes().as_slice());
        assert!(page[35..124].iter().all(|&b| b == 0));
        let crc = crc32fast::hash(&page[..124]);
        assert_eq!(&page[124..], crc.to_be_bytes().as_slice());
        assert_eq!(layout.decode_node::<i64>(&page).unwrap(), node);
    }

    #[test]
    fn internal_page_round_trip() {
        let layout = int_layout(128);
        let node: Node<i64> = Node::Internal {
            keys: vec![key(10), key(20)],
            children: vec![128, 256, 384],
        };
        let page = layout.encode_node(&node).unwrap();
        assert_eq!(page[0], 0);
        assert_eq!(&page[19..27], 128i64.to_be_bytes().as_slice());
        assert_eq!(layout.decode_node::<i64>(&page).unwrap(), node);
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        let layout = int_layout(128);
        let node: Node<i64> = Node::Leaf {
            entries: vec![(key(5), 50)],
        };
        let page = layout.encode_node(&node).unwrap();
        for idx in 0..page.len() {
            let mut damaged = page.clone();
            damaged[idx] ^= 0x01;
            let err = layout.decode_node::<i64>(&damaged).unwrap_err();
            assert!(err.is_corruption(), "byte {idx} flip not detected: {err}");
        }
    }

    #[test]
    fn zeroed_page_is_logic_error() {
        let layout = int_layout(128);
        let err = layout.decode_node::<i64>(&[0u8; 128]).unwrap_err();
        assert!(matches!(err, DbError::Logic { .. }));
    }

    #[test]
    fn wrong_page_length_is_input_error() {
        let layout = int_layout(128);
        assert!(matches!(
            layout.decode_node::<i64>(&[1u8; 64]).unwrap_err(),
            DbError::Input { .. }
        ));
    }

    #[test]
    fn overfull_node_is_rejected() {
        let layout = int_layout(128).with_order(3).unwrap();
        let node: Node<i64> = Node::Leaf {
            entries: (0..3).map(|i| (key(i), i)).collect(),
        };
        assert!(layout.encode_node(&node).is_err());
    }

    #[test]
    fn inconsistent_count_is_corruption() {
        let layout = int_layout(128);
        let node: Node<i64> = Node::Leaf {
            entries: vec![(key(1), 1)],
        };
        let mut page = layout.encode_node(&node).unwrap();
        page[1..3].copy_from_slice(&200u16.to_be_bytes());
        seal(&mut page);
        assert!(layout.decode_node::<i64>(&page).unwrap_err().is_corruption());
    }

    #[test]
    fn meta_page_round_trip() {
        let layout = int_layout(256);
        let meta = MetaPage::for_layout(&layout, 512);
        let page = meta.encode(256).unwrap();
        assert_eq!(&page[0..4], b"BPT1");
        assert_eq!(MetaPage::decode(&page).unwrap(), meta);

        let mut damaged = page.clone();
        damaged[20] ^= 0xff;
        assert!(MetaPage::decode(&damaged).unwrap_err().is_corruption());
    }
}
