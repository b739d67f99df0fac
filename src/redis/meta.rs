//! Structural records and their stores
//!
//! - `KeyMeta`: one per logical key (type tag, length, head/tail, sequence counter)
//! - `ListNode`: prev/next sequence links of one list element
//! - `SkipListNode`: per-level prev/next score links of one skip-list element
//!
//! Records are serialized with bincode. `MetaStore` and `NodeStore` only read
//! from the store; every mutation is staged into a caller-owned `WriteBatch`.

use super::error::{CommandError, CommandResult};
use super::keys::{score_hex, sequence_identifier, KeyEncoder, Role};
use crate::store::{KvStore, ScanDirection, WriteBatch};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Type tag of a logical key; immutable once the key exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    String,
    List,
    /// Skip list keyed by plain numeric score
    OrderedSet,
    /// Skip list keyed by the member itself (plain sets)
    OrderedSetUnique,
    /// Skip list keyed by (score, member)
    SortedSet,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::OrderedSet => "ordered_set",
            KeyType::OrderedSetUnique => "ordered_set_unique",
            KeyType::SortedSet => "sorted_set",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering key and identity of a skip-list node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Score {
    Number(f64),
    Member(Vec<u8>),
    Pair(f64, Vec<u8>),
}

impl Score {
    /// Reject NaN and fold `-0.0` into `0.0`
    pub fn checked(value: f64) -> CommandResult<f64> {
        if value.is_nan() {
            return Err(CommandError::InvalidScore(value));
        }
        Ok(if value == 0.0 { 0.0 } else { value })
    }

    fn rank(&self) -> u8 {
        match self {
            Score::Number(_) => 0,
            Score::Member(_) => 1,
            Score::Pair(..) => 2,
        }
    }

    /// Identifier of the node record
    pub fn identifier(&self) -> Vec<u8> {
        match self {
            Score::Number(n) => score_hex(*n).to_vec(),
            Score::Member(m) => m.clone(),
            Score::Pair(n, m) => {
                let mut out = Vec::with_capacity(17 + m.len());
                out.extend_from_slice(&score_hex(*n));
                out.push(b':');
                out.extend_from_slice(m);
                out
            }
        }
    }

    /// Identifier of the data record; sorted-set payloads are keyed by member
    pub fn data_identifier(&self) -> Vec<u8> {
        match self {
            Score::Pair(_, m) => m.clone(),
            other => other.identifier(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            Score::Number(n) | Score::Pair(n, _) => Some(*n),
            Score::Member(_) => None,
        }
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Score::Number(a), Score::Number(b)) => a.total_cmp(b),
            (Score::Member(a), Score::Member(b)) => a.cmp(b),
            (Score::Pair(a, am), Score::Pair(b, bm)) => a.total_cmp(b).then_with(|| am.cmp(bm)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{}", n),
            Score::Member(m) => write!(f, "{}", String::from_utf8_lossy(m)),
            Score::Pair(n, m) => write!(f, "({}, {})", n, String::from_utf8_lossy(m)),
        }
    }
}

/// Structural metadata of one logical key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMeta {
    pub key_type: KeyType,
    pub length: u64,
    /// Last issued node sequence; the first node receives 1
    pub seq: u64,
    pub head_seq: Option<u64>,
    pub tail_seq: Option<u64>,
    /// First node per skip-list level (index 0 is the full chain)
    pub head_levels: Vec<Score>,
    /// Last node per skip-list level
    pub tail_levels: Vec<Score>,
    /// Greatest score present; inserts above it skip traversal
    pub max_score: Option<Score>,
}

impl KeyMeta {
    pub fn new(key_type: KeyType) -> Self {
        KeyMeta {
            key_type,
            length: 0,
            seq: 0,
            head_seq: None,
            tail_seq: None,
            head_levels: Vec::new(),
            tail_levels: Vec::new(),
            max_score: None,
        }
    }

    /// Issue the next node sequence number
    pub fn increase_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Level cap for a new skip-list node: `max(min_height, floor(log2(length)))`
    pub fn height(&self, min_height: usize) -> usize {
        let length = self.length.max(1);
        let log2 = (63 - length.leading_zeros()) as usize;
        log2.max(min_height)
    }

    pub fn levels(&self) -> usize {
        self.head_levels.len()
    }
}

/// Links of one list element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListNode {
    pub seq: u64,
    pub prev: Option<u64>,
    pub next: Option<u64>,
}

impl ListNode {
    pub fn new(seq: u64) -> Self {
        ListNode {
            seq,
            prev: None,
            next: None,
        }
    }
}

/// Per-level links of one skip-list element.
///
/// Trailing `None`s are trimmed, so a node that is alone on its top levels
/// stores shorter vectors than its height; those levels are recovered from the
/// head pointers (see `SkipListNode::height`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipListNode {
    pub score: Score,
    pub prev: Vec<Option<Score>>,
    pub next: Vec<Option<Score>>,
}

impl SkipListNode {
    pub fn new(score: Score) -> Self {
        SkipListNode {
            score,
            prev: Vec::new(),
            next: Vec::new(),
        }
    }

    pub fn prev_at(&self, level: usize) -> Option<&Score> {
        self.prev.get(level).and_then(|s| s.as_ref())
    }

    pub fn next_at(&self, level: usize) -> Option<&Score> {
        self.next.get(level).and_then(|s| s.as_ref())
    }

    pub fn set_prev(&mut self, level: usize, score: Option<Score>) {
        set_slot(&mut self.prev, level, score);
    }

    pub fn set_next(&mut self, level: usize, score: Option<Score>) {
        set_slot(&mut self.next, level, score);
    }

    /// Number of levels this node takes part in
    pub fn height(&self, meta: &KeyMeta) -> usize {
        let mut height = self.prev.len().max(self.next.len());
        while meta.head_levels.get(height) == Some(&self.score) {
            height += 1;
        }
        height
    }
}

fn set_slot(slots: &mut Vec<Option<Score>>, level: usize, score: Option<Score>) {
    if slots.len() <= level {
        slots.resize(level + 1, None);
    }
    slots[level] = score;
    while matches!(slots.last(), Some(None)) {
        slots.pop();
    }
}

pub fn encode_record<T: Serialize>(record: &T) -> CommandResult<Bytes> {
    bincode::serialize(record)
        .map(Bytes::from)
        .map_err(|e| CommandError::consistency(format!("record encode failed: {}", e)))
}

pub fn decode_record<T: DeserializeOwned>(raw: &[u8], what: &str) -> CommandResult<T> {
    bincode::deserialize(raw)
        .map_err(|e| CommandError::consistency(format!("undecodable {} record: {}", what, e)))
}

/// Loads and stages `KeyMeta` records
pub struct MetaStore<'a, S: KvStore> {
    store: &'a S,
    keys: &'a KeyEncoder,
}

impl<'a, S: KvStore> Clone for MetaStore<'a, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, S: KvStore> Copy for MetaStore<'a, S> {}

impl<'a, S: KvStore> MetaStore<'a, S> {
    pub fn new(store: &'a S, keys: &'a KeyEncoder) -> Self {
        MetaStore { store, keys }
    }

    /// `None` means the key does not exist
    pub async fn load(&self, key: &[u8]) -> CommandResult<Option<KeyMeta>> {
        let raw = self.store.get(&self.keys.meta_key(key)).await?;
        raw.map(|raw| decode_record(&raw, "meta")).transpose()
    }

    pub fn save(&self, key: &[u8], meta: &KeyMeta, batch: &mut WriteBatch) -> CommandResult<()> {
        batch.put(self.keys.meta_key(key), encode_record(meta)?);
        Ok(())
    }

    pub fn remove(&self, key: &[u8], batch: &mut WriteBatch) {
        batch.delete(self.keys.meta_key(key));
    }

    /// Save while non-empty, delete once the last element is gone
    pub fn save_or_remove(
        &self,
        key: &[u8],
        meta: &KeyMeta,
        batch: &mut WriteBatch,
    ) -> CommandResult<()> {
        if meta.length == 0 {
            self.remove(key, batch);
            Ok(())
        } else {
            self.save(key, meta, batch)
        }
    }
}

/// Loads and stages node and data records
pub struct NodeStore<'a, S: KvStore> {
    store: &'a S,
    keys: &'a KeyEncoder,
}

impl<'a, S: KvStore> Clone for NodeStore<'a, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, S: KvStore> Copy for NodeStore<'a, S> {}

impl<'a, S: KvStore> NodeStore<'a, S> {
    pub fn new(store: &'a S, keys: &'a KeyEncoder) -> Self {
        NodeStore { store, keys }
    }

    pub fn keys(&self) -> &'a KeyEncoder {
        self.keys
    }

    /// A list node the structure points at; absence is a consistency fault
    pub async fn list_node(&self, key: &[u8], seq: u64) -> CommandResult<ListNode> {
        let raw = self
            .store
            .get(&self.keys.node_key(key, &sequence_identifier(seq)))
            .await?;
        match raw {
            Some(raw) => decode_record(&raw, "list node"),
            None => Err(CommandError::consistency(format!(
                "list node {} of '{}' is missing",
                seq,
                String::from_utf8_lossy(key)
            ))),
        }
    }

    pub fn put_list_node(
        &self,
        key: &[u8],
        node: &ListNode,
        batch: &mut WriteBatch,
    ) -> CommandResult<()> {
        batch.put(
            self.keys.node_key(key, &sequence_identifier(node.seq)),
            encode_record(node)?,
        );
        Ok(())
    }

    pub fn delete_list_node(&self, key: &[u8], seq: u64, batch: &mut WriteBatch) {
        let id = sequence_identifier(seq);
        batch.delete(self.keys.node_key(key, &id));
        batch.delete(self.keys.data_key(key, &id));
    }

    pub async fn list_data(&self, key: &[u8], seq: u64) -> CommandResult<Bytes> {
        let raw = self
            .store
            .get(&self.keys.data_key(key, &sequence_identifier(seq)))
            .await?;
        raw.ok_or_else(|| {
            CommandError::consistency(format!(
                "data of list node {} of '{}' is missing",
                seq,
                String::from_utf8_lossy(key)
            ))
        })
    }

    pub fn put_list_data(&self, key: &[u8], seq: u64, value: Bytes, batch: &mut WriteBatch) {
        batch.put(self.keys.data_key(key, &sequence_identifier(seq)), value);
    }

    /// `None` when no node carries this exact score
    pub async fn skip_node(&self, key: &[u8], score: &Score) -> CommandResult<Option<SkipListNode>> {
        let raw = self
            .store
            .get(&self.keys.node_key(key, &score.identifier()))
            .await?;
        let node: Option<SkipListNode> = raw
            .map(|raw| decode_record(&raw, "skip list node"))
            .transpose()?;
        match node {
            Some(node) if node.score != *score => Err(CommandError::consistency(format!(
                "node record for {} carries score {}",
                score, node.score
            ))),
            other => Ok(other),
        }
    }

    pub fn put_skip_node(
        &self,
        key: &[u8],
        node: &SkipListNode,
        batch: &mut WriteBatch,
    ) -> CommandResult<()> {
        batch.put(
            self.keys.node_key(key, &node.score.identifier()),
            encode_record(node)?,
        );
        Ok(())
    }

    pub fn delete_skip_node(&self, key: &[u8], score: &Score, batch: &mut WriteBatch) {
        batch.delete(self.keys.node_key(key, &score.identifier()));
    }

    pub async fn skip_data(&self, key: &[u8], score: &Score) -> CommandResult<Option<Bytes>> {
        Ok(self
            .store
            .get(&self.keys.data_key(key, &score.data_identifier()))
            .await?)
    }

    /// Sorted-set payload, which is keyed by member rather than by node
    pub async fn member_data(&self, key: &[u8], member: &[u8]) -> CommandResult<Option<Bytes>> {
        Ok(self.store.get(&self.keys.data_key(key, member)).await?)
    }

    pub fn put_skip_data(&self, key: &[u8], score: &Score, value: Bytes, batch: &mut WriteBatch) {
        batch.put(self.keys.data_key(key, &score.data_identifier()), value);
    }

    pub fn delete_skip_data(&self, key: &[u8], score: &Score, batch: &mut WriteBatch) {
        batch.delete(self.keys.data_key(key, &score.data_identifier()));
    }

    /// Every persisted record of `role` under `key`, by prefix scan
    pub async fn scan_records(&self, key: &[u8], role: Role) -> CommandResult<Vec<Vec<u8>>> {
        let prefix = self.keys.prefix(role, key);
        let records = self
            .store
            .scan_prefix(&prefix, ScanDirection::Ascending)
            .await?;
        Ok(records.into_iter().map(|(k, _)| k).collect())
    }
}
