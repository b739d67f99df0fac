//! Store-backed doubly linked list
//!
//! Nodes are addressed by a per-key sequence number; every link is a lookup
//! key, never a reference. Traversal walks from whichever end is closer.
//!
//! # Invariants
//!
//! - following `next` from `head_seq` visits exactly `length` nodes and ends at `tail_seq`
//! - `a.next == Some(b.seq)` iff `b.prev == Some(a.seq)`
//! - a list of length 0 has no metadata record

use super::error::{CommandError, CommandResult};
use super::meta::{KeyMeta, KeyType, ListNode, MetaStore, NodeStore};
use crate::store::{KvStore, WriteBatch};
use bytes::Bytes;

/// Traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From head, following `next`
    Ascending,
    /// From tail, following `prev`
    Descending,
}

impl Direction {
    fn flip(self) -> Self {
        match self {
            Direction::Ascending => Direction::Descending,
            Direction::Descending => Direction::Ascending,
        }
    }
}

/// Slack for lookups (`lindex`, `lset`, removal)
pub const LOOKUP_SLACK: u64 = 0;
/// Slack for inserts, which may target one past the end
pub const INSERT_SLACK: u64 = 1;

/// Convert a signed index into a direction and a step count from that end.
///
/// Non-negative indices must be `< length + slack`, negative ones `>= -(length + slack)`.
pub fn format_index(length: u64, index: i64, slack: u64) -> CommandResult<(Direction, u64)> {
    let limit = length + slack;
    let out_of_range = || CommandError::IndexOutOfRange { index, length };
    if index >= 0 {
        let steps = index as u64;
        if steps >= limit {
            return Err(out_of_range());
        }
        Ok((Direction::Ascending, steps))
    } else {
        let back = index.unsigned_abs();
        if back > limit {
            return Err(out_of_range());
        }
        Ok((Direction::Descending, back - 1))
    }
}

/// Walk from the closer end: past the middle, flip and count from the other side
pub fn fast_direction(direction: Direction, length: u64, steps: u64) -> (Direction, u64) {
    if steps > length / 2 && steps < length {
        (direction.flip(), length - steps - 1)
    } else {
        (direction, steps)
    }
}

pub struct LinkedList<'a, S: KvStore> {
    metas: MetaStore<'a, S>,
    nodes: NodeStore<'a, S>,
    key: &'a [u8],
}

impl<'a, S: KvStore> LinkedList<'a, S> {
    pub fn new(metas: MetaStore<'a, S>, nodes: NodeStore<'a, S>, key: &'a [u8]) -> Self {
        LinkedList { metas, nodes, key }
    }

    fn key_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.key)
    }

    /// Build a one-element list
    pub fn create(&self, value: Bytes, batch: &mut WriteBatch) -> CommandResult<KeyMeta> {
        let mut meta = KeyMeta::new(KeyType::List);
        let node = ListNode::new(meta.increase_seq());
        meta.length = 1;
        meta.head_seq = Some(node.seq);
        meta.tail_seq = Some(node.seq);

        self.metas.save(self.key, &meta, batch)?;
        self.nodes.put_list_node(self.key, &node, batch)?;
        self.nodes.put_list_data(self.key, node.seq, value, batch);
        Ok(meta)
    }

    async fn load_opt(&self, seq: Option<u64>) -> CommandResult<Option<ListNode>> {
        match seq {
            Some(seq) => Ok(Some(self.nodes.list_node(self.key, seq).await?)),
            None => Ok(None),
        }
    }

    /// Node `steps` hops away from the end named by `direction`
    async fn walk(&self, meta: &KeyMeta, direction: Direction, steps: u64) -> CommandResult<ListNode> {
        let start = match direction {
            Direction::Ascending => meta.head_seq,
            Direction::Descending => meta.tail_seq,
        };
        let start = start.ok_or_else(|| {
            CommandError::consistency(format!(
                "list '{}' of length {} has no {:?} end",
                self.key_str(),
                meta.length,
                direction
            ))
        })?;

        let mut node = self.nodes.list_node(self.key, start).await?;
        for taken in 0..steps {
            let hop = match direction {
                Direction::Ascending => node.next,
                Direction::Descending => node.prev,
            };
            let seq = hop.ok_or_else(|| {
                CommandError::consistency(format!(
                    "list '{}' chain ends after {} nodes, length is {}",
                    self.key_str(),
                    taken + 1,
                    meta.length
                ))
            })?;
            node = self.nodes.list_node(self.key, seq).await?;
        }
        tracing::trace!(key = %self.key_str(), ?direction, steps, seq = node.seq, "list walk");
        Ok(node)
    }

    /// Node at zero-based `position` from the head, walking from the closer end
    async fn node_at(&self, meta: &KeyMeta, position: u64) -> CommandResult<ListNode> {
        let (direction, steps) = fast_direction(Direction::Ascending, meta.length, position);
        self.walk(meta, direction, steps).await
    }

    /// Node at a signed lookup index
    pub async fn locate(&self, meta: &KeyMeta, index: i64) -> CommandResult<ListNode> {
        let (direction, steps) = format_index(meta.length, index, LOOKUP_SLACK)?;
        let (direction, steps) = fast_direction(direction, meta.length, steps);
        self.walk(meta, direction, steps).await
    }

    /// Insert so the new element ends up at `index`; returns the new length.
    ///
    /// `0` prepends and `-1` appends. The target gap is fixed before walking,
    /// so the direction chosen for the walk never changes the result.
    pub async fn insert(
        &self,
        meta: &mut KeyMeta,
        index: i64,
        value: Bytes,
        batch: &mut WriteBatch,
    ) -> CommandResult<u64> {
        let (direction, steps) = format_index(meta.length, index, INSERT_SLACK)?;
        let gap = match direction {
            Direction::Ascending => steps,
            Direction::Descending => meta.length - steps,
        };

        let (left, right) = if gap == meta.length {
            (self.load_opt(meta.tail_seq).await?, None)
        } else {
            let right = self.node_at(meta, gap).await?;
            (self.load_opt(right.prev).await?, Some(right))
        };

        let mut node = ListNode::new(meta.increase_seq());
        let pre_length = meta.length;
        meta.length += 1;

        match left {
            Some(mut left) => {
                node.prev = Some(left.seq);
                left.next = Some(node.seq);
                self.nodes.put_list_node(self.key, &left, batch)?;
            }
            None => meta.head_seq = Some(node.seq),
        }
        match right {
            Some(mut right) => {
                node.next = Some(right.seq);
                right.prev = Some(node.seq);
                self.nodes.put_list_node(self.key, &right, batch)?;
            }
            None => meta.tail_seq = Some(node.seq),
        }

        self.nodes.put_list_node(self.key, &node, batch)?;
        self.nodes.put_list_data(self.key, node.seq, value, batch);
        self.metas.save(self.key, meta, batch)?;

        debug_assert_eq!(meta.length, pre_length + 1);
        tracing::trace!(key = %self.key_str(), index, gap, seq = node.seq, "list insert");
        Ok(meta.length)
    }

    /// Unlink the element at `index`; deletes the metadata once empty
    pub async fn remove(
        &self,
        meta: &mut KeyMeta,
        index: i64,
        batch: &mut WriteBatch,
    ) -> CommandResult<Bytes> {
        let target = self.locate(meta, index).await?;
        let left = self.load_opt(target.prev).await?;
        let right = self.load_opt(target.next).await?;

        if let Some(left) = &left {
            if left.next != Some(target.seq) {
                return Err(self.asymmetric(left.seq, target.seq));
            }
        }
        if let Some(right) = &right {
            if right.prev != Some(target.seq) {
                return Err(self.asymmetric(target.seq, right.seq));
            }
        }

        let value = self.nodes.list_data(self.key, target.seq).await?;

        match (left, right) {
            (Some(mut left), Some(mut right)) => {
                left.next = Some(right.seq);
                right.prev = Some(left.seq);
                self.nodes.put_list_node(self.key, &left, batch)?;
                self.nodes.put_list_node(self.key, &right, batch)?;
            }
            (Some(mut left), None) => {
                left.next = None;
                meta.tail_seq = Some(left.seq);
                self.nodes.put_list_node(self.key, &left, batch)?;
            }
            (None, Some(mut right)) => {
                right.prev = None;
                meta.head_seq = Some(right.seq);
                self.nodes.put_list_node(self.key, &right, batch)?;
            }
            (None, None) => {
                meta.head_seq = None;
                meta.tail_seq = None;
            }
        }

        meta.length -= 1;
        self.nodes.delete_list_node(self.key, target.seq, batch);
        self.metas.save_or_remove(self.key, meta, batch)?;
        tracing::trace!(key = %self.key_str(), index, seq = target.seq, "list remove");
        Ok(value)
    }

    fn asymmetric(&self, left: u64, right: u64) -> CommandError {
        CommandError::consistency(format!(
            "list '{}' links between {} and {} are asymmetric",
            self.key_str(),
            left,
            right
        ))
    }

    pub async fn get(&self, meta: &KeyMeta, index: i64) -> CommandResult<Bytes> {
        let node = self.locate(meta, index).await?;
        self.nodes.list_data(self.key, node.seq).await
    }

    /// Overwrite the payload at `index`; topology and metadata are untouched
    pub async fn set(
        &self,
        meta: &KeyMeta,
        index: i64,
        value: Bytes,
        batch: &mut WriteBatch,
    ) -> CommandResult<()> {
        let node = self.locate(meta, index).await?;
        self.nodes.put_list_data(self.key, node.seq, value, batch);
        Ok(())
    }

    /// Values between `start` and `stop` inclusive, with Redis clamping
    pub async fn range(&self, meta: &KeyMeta, start: i64, stop: i64) -> CommandResult<Vec<Bytes>> {
        let length = meta.length as i64;
        let start = if start < 0 { (length + start).max(0) } else { start };
        let stop = if stop < 0 { length + stop } else { stop.min(length - 1) };
        if length == 0 || start > stop || start >= length {
            return Ok(Vec::new());
        }

        let mut node = self.node_at(meta, start as u64).await?;
        let mut values = Vec::with_capacity((stop - start + 1) as usize);
        for position in start..=stop {
            values.push(self.nodes.list_data(self.key, node.seq).await?);
            if position == stop {
                break;
            }
            match node.next {
                Some(next) => node = self.nodes.list_node(self.key, next).await?,
                None => {
                    return Err(CommandError::consistency(format!(
                        "list '{}' chain ends at position {}, length is {}",
                        self.key_str(),
                        position,
                        meta.length
                    )))
                }
            }
        }
        Ok(values)
    }

    /// Forward walk checking link symmetry and the reported length.
    ///
    /// Returns the sequences in head-to-tail order.
    pub async fn verify(&self, meta: &KeyMeta) -> CommandResult<Vec<u64>> {
        let mut seqs = Vec::with_capacity(meta.length as usize);
        let mut prev: Option<u64> = None;
        let mut cursor = meta.head_seq;

        while let Some(seq) = cursor {
            if seqs.len() as u64 >= meta.length {
                return Err(CommandError::consistency(format!(
                    "list '{}' chain is longer than its length {}",
                    self.key_str(),
                    meta.length
                )));
            }
            let node = self.nodes.list_node(self.key, seq).await?;
            if node.seq != seq || node.prev != prev {
                return Err(self.asymmetric(prev.unwrap_or(0), seq));
            }
            if seq > meta.seq {
                return Err(CommandError::consistency(format!(
                    "list '{}' node {} exceeds the issued sequence {}",
                    self.key_str(),
                    seq,
                    meta.seq
                )));
            }
            seqs.push(seq);
            prev = Some(seq);
            cursor = node.next;
        }

        if seqs.len() as u64 != meta.length || prev != meta.tail_seq {
            return Err(CommandError::consistency(format!(
                "list '{}' chain has {} nodes ending at {:?}, metadata says {} ending at {:?}",
                self.key_str(),
                seqs.len(),
                prev,
                meta.length,
                meta.tail_seq
            )));
        }
        Ok(seqs)
    }

    /// Stage deletion of every node, payload and the metadata record
    pub async fn deconstruct(&self, meta: &KeyMeta, batch: &mut WriteBatch) -> CommandResult<u64> {
        let seqs = self.verify(meta).await?;
        for seq in &seqs {
            self.nodes.delete_list_node(self.key, *seq, batch);
        }
        self.metas.remove(self.key, batch);
        Ok(seqs.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::keys::KeyEncoder;
    use crate::store::InMemoryKvStore;

    #[test]
    fn test_format_index_lookup_bounds() {
        assert_eq!(format_index(3, 0, LOOKUP_SLACK).unwrap(), (Direction::Ascending, 0));
        assert_eq!(format_index(3, 2, LOOKUP_SLACK).unwrap(), (Direction::Ascending, 2));
        assert_eq!(format_index(3, -1, LOOKUP_SLACK).unwrap(), (Direction::Descending, 0));
        assert_eq!(format_index(3, -3, LOOKUP_SLACK).unwrap(), (Direction::Descending, 2));
        assert!(format_index(3, 3, LOOKUP_SLACK).unwrap_err().is_validation());
        assert!(format_index(3, -4, LOOKUP_SLACK).unwrap_err().is_validation());
        assert!(format_index(0, 0, LOOKUP_SLACK).is_err());
    }

    #[test]
    fn test_format_index_insert_bounds() {
        assert_eq!(format_index(3, 3, INSERT_SLACK).unwrap(), (Direction::Ascending, 3));
        assert_eq!(format_index(3, -4, INSERT_SLACK).unwrap(), (Direction::Descending, 3));
        assert!(format_index(3, 4, INSERT_SLACK).is_err());
        assert!(format_index(3, -5, INSERT_SLACK).is_err());
        assert!(format_index(0, 0, INSERT_SLACK).is_ok());
        assert!(format_index(0, -1, INSERT_SLACK).is_ok());
    }

    #[test]
    fn test_fast_direction_flips_past_middle() {
        assert_eq!(fast_direction(Direction::Ascending, 10, 3), (Direction::Ascending, 3));
        assert_eq!(fast_direction(Direction::Ascending, 10, 5), (Direction::Ascending, 5));
        assert_eq!(fast_direction(Direction::Ascending, 10, 8), (Direction::Descending, 1));
        assert_eq!(fast_direction(Direction::Descending, 10, 9), (Direction::Ascending, 0));
    }

    async fn commit(store: &InMemoryKvStore, batch: WriteBatch) {
        store.write(batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_positions() {
        let store = InMemoryKvStore::new();
        let keys = KeyEncoder::new("t");
        let list = LinkedList::new(MetaStore::new(&store, &keys), NodeStore::new(&store, &keys), b"l");

        let mut batch = WriteBatch::new();
        let mut meta = list.create(Bytes::from_static(b"b"), &mut batch).unwrap();
        commit(&store, batch).await;

        // [b] -> [a, b] -> [a, b, d] -> [a, b, c, d]
        for (index, value) in [(0, "a"), (-1, "d"), (-2, "c")] {
            let mut batch = WriteBatch::new();
            list.insert(&mut meta, index, Bytes::from(value), &mut batch)
                .await
                .unwrap();
            commit(&store, batch).await;
        }

        let values = list.range(&meta, 0, -1).await.unwrap();
        assert_eq!(values, vec!["a", "b", "c", "d"]);
        assert_eq!(list.verify(&meta).await.unwrap(), vec![2, 1, 4, 3]);
    }

    #[tokio::test]
    async fn test_remove_middle_returns_value_and_relinks() {
        let store = InMemoryKvStore::new();
        let keys = KeyEncoder::new("t");
        let list = LinkedList::new(MetaStore::new(&store, &keys), NodeStore::new(&store, &keys), b"l");

        let mut batch = WriteBatch::new();
        let mut meta = list.create(Bytes::from_static(b"a"), &mut batch).unwrap();
        commit(&store, batch).await;
        for value in ["b", "c"] {
            let mut batch = WriteBatch::new();
            let end = meta.length as i64;
            list.insert(&mut meta, end, Bytes::from(value), &mut batch)
                .await
                .unwrap();
            commit(&store, batch).await;
        }

        let mut batch = WriteBatch::new();
        let value = list.remove(&mut meta, -2, &mut batch).await.unwrap();
        commit(&store, batch).await;

        assert_eq!(value, Bytes::from_static(b"b"));
        assert_eq!(meta.length, 2);
        assert_eq!(list.range(&meta, 0, -1).await.unwrap(), vec!["a", "c"]);
        assert_eq!(list.verify(&meta).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_last_deletes_everything() {
        let store = InMemoryKvStore::new();
        let keys = KeyEncoder::new("t");
        let metas = MetaStore::new(&store, &keys);
        let list = LinkedList::new(metas, NodeStore::new(&store, &keys), b"l");

        let mut batch = WriteBatch::new();
        let mut meta = list.create(Bytes::from_static(b"only"), &mut batch).unwrap();
        commit(&store, batch).await;

        let mut batch = WriteBatch::new();
        let value = list.remove(&mut meta, 0, &mut batch).await.unwrap();
        commit(&store, batch).await;

        assert_eq!(value, Bytes::from_static(b"only"));
        assert_eq!(meta.length, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_broken_chain_is_fatal() {
        let store = InMemoryKvStore::new();
        let keys = KeyEncoder::new("t");
        let list = LinkedList::new(MetaStore::new(&store, &keys), NodeStore::new(&store, &keys), b"l");

        let mut batch = WriteBatch::new();
        let mut meta = list.create(Bytes::from_static(b"x"), &mut batch).unwrap();
        commit(&store, batch).await;

        // Metadata claims more elements than the chain holds
        meta.length = 3;
        let err = list.get(&meta, 1).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(list.verify(&meta).await.unwrap_err().is_fatal());
    }
}
