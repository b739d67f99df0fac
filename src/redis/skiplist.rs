//! Store-backed skip list
//!
//! Nodes are identified by their score and linked per level through score
//! pointers. A `SkipListSession` serves one command: nodes read during the
//! call are cached, mutated nodes are tracked, and everything is staged into a
//! single `WriteBatch` returned by `finish`. Several operations may share a
//! session (remove-then-insert for a changed sorted-set score).
//!
//! # Invariants
//!
//! - every level chain is strictly increasing and a subsequence of level 0
//! - `head_levels[L]` / `tail_levels[L]` are the first / last node on level L
//! - `max_score == tail_levels[0]`
//! - a skip list of length 0 has no metadata record

use super::error::{CommandError, CommandResult};
use super::meta::{KeyMeta, MetaStore, NodeStore, Score, SkipListNode};
use crate::io::Rng;
use crate::store::{KvStore, WriteBatch};
use bytes::Bytes;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Draws node heights from a shared `Rng`
pub struct LevelGenerator {
    rng: Mutex<Box<dyn Rng>>,
    min_height: usize,
}

impl LevelGenerator {
    pub fn new(rng: impl Rng + 'static, min_height: usize) -> Self {
        LevelGenerator {
            rng: Mutex::new(Box::new(rng)),
            min_height: min_height.max(1),
        }
    }

    pub fn min_height(&self) -> usize {
        self.min_height
    }

    /// Start at one level and add one per heads, stopping at tails or `max_height`
    pub fn generate_mask(&self, max_height: usize) -> usize {
        let mut rng = self.rng.lock();
        let mut height = 1;
        while height < max_height && rng.coin() {
            height += 1;
        }
        height
    }
}

fn set_level(levels: &mut Vec<Score>, level: usize, score: Score) {
    debug_assert!(level <= levels.len(), "skip list levels must stay contiguous");
    if level < levels.len() {
        levels[level] = score;
    } else {
        levels.push(score);
    }
}

pub struct SkipListSession<'a, S: KvStore> {
    metas: MetaStore<'a, S>,
    nodes: NodeStore<'a, S>,
    key: &'a [u8],
    levels: &'a LevelGenerator,
    meta: KeyMeta,
    /// `None` marks a node deleted in this session
    cache: BTreeMap<Score, Option<SkipListNode>>,
    dirty: BTreeSet<Score>,
    batch: WriteBatch,
}

impl<'a, S: KvStore> SkipListSession<'a, S> {
    pub fn new(
        metas: MetaStore<'a, S>,
        nodes: NodeStore<'a, S>,
        key: &'a [u8],
        levels: &'a LevelGenerator,
        meta: KeyMeta,
    ) -> Self {
        SkipListSession {
            metas,
            nodes,
            key,
            levels,
            meta,
            cache: BTreeMap::new(),
            dirty: BTreeSet::new(),
            batch: WriteBatch::new(),
        }
    }

    pub fn meta(&self) -> &KeyMeta {
        &self.meta
    }

    fn key_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.key)
    }

    async fn fetch(&mut self, score: &Score) -> CommandResult<Option<SkipListNode>> {
        if let Some(cached) = self.cache.get(score) {
            return Ok(cached.clone());
        }
        let node = self.nodes.skip_node(self.key, score).await?;
        self.cache.insert(score.clone(), node.clone());
        Ok(node)
    }

    /// A node some pointer refers to; absence is a consistency fault
    async fn node(&mut self, score: &Score) -> CommandResult<SkipListNode> {
        match self.fetch(score).await? {
            Some(node) => Ok(node),
            None => Err(CommandError::consistency(format!(
                "skip list '{}' points at missing node {}",
                self.key_str(),
                score
            ))),
        }
    }

    fn store_node(&mut self, node: SkipListNode) {
        self.dirty.insert(node.score.clone());
        self.cache.insert(node.score.clone(), Some(node));
    }

    fn drop_node(&mut self, score: &Score) {
        self.dirty.insert(score.clone());
        self.cache.insert(score.clone(), None);
        self.nodes.delete_skip_data(self.key, score, &mut self.batch);
    }

    fn misordered(&self, level: usize, left: &Score, right: &Score) -> CommandError {
        CommandError::consistency(format!(
            "skip list '{}' level {}: {} is not before {}",
            self.key_str(),
            level,
            left,
            right
        ))
    }

    pub async fn contains(&mut self, score: &Score) -> CommandResult<bool> {
        Ok(self.fetch(score).await?.is_some())
    }

    /// Payload of the node with exactly this score
    pub async fn find_value_by_score(&mut self, score: &Score) -> CommandResult<Option<Bytes>> {
        if !self.contains(score).await? {
            return Ok(None);
        }
        match self.nodes.skip_data(self.key, score).await? {
            Some(value) => Ok(Some(value)),
            None => Err(CommandError::consistency(format!(
                "skip list '{}' node {} has no data record",
                self.key_str(),
                score
            ))),
        }
    }

    /// Rightmost node below `score` on every level, searching top-down
    async fn predecessors(&mut self, score: &Score, levels: usize) -> CommandResult<Vec<Option<Score>>> {
        let top = self.meta.levels();
        let mut preds = vec![None; levels.max(top)];

        let beyond_max = self.meta.max_score.as_ref().map_or(true, |max| score > max);
        if beyond_max {
            for (level, tail) in self.meta.tail_levels.iter().enumerate() {
                preds[level] = Some(tail.clone());
            }
            return Ok(preds);
        }

        let mut current: Option<Score> = None;
        for level in (0..top).rev() {
            let mut next = match &current {
                None => Some(self.meta.head_levels[level].clone()),
                Some(c) => self.node(c).await?.next_at(level).cloned(),
            };
            while let Some(candidate) = next {
                match candidate.cmp(score) {
                    Ordering::Less => {
                        next = self.node(&candidate).await?.next_at(level).cloned();
                        current = Some(candidate);
                    }
                    Ordering::Equal => {
                        return Err(CommandError::consistency(format!(
                            "skip list '{}' links to {} but its record is gone",
                            self.key_str(),
                            score
                        )))
                    }
                    Ordering::Greater => break,
                }
            }
            preds[level] = current.clone();
        }
        tracing::trace!(key = %self.key_str(), %score, "skip list search");
        Ok(preds)
    }

    /// Insert a new node, or overwrite the payload when the score exists.
    ///
    /// Returns `true` when a node was created.
    pub async fn insert(&mut self, score: Score, value: Bytes) -> CommandResult<bool> {
        if self.contains(&score).await? {
            self.nodes.put_skip_data(self.key, &score, value, &mut self.batch);
            return Ok(false);
        }

        let max_height = self.meta.height(self.levels.min_height());
        let height = self.levels.generate_mask(max_height);
        let beyond_max = self.meta.max_score.as_ref().map_or(true, |max| score > *max);
        let preds = self.predecessors(&score, height).await?;

        let mut node = SkipListNode::new(score.clone());
        for (level, pred) in preds.into_iter().take(height).enumerate() {
            let succ = match &pred {
                Some(p) => self.node(p).await?.next_at(level).cloned(),
                None => self.meta.head_levels.get(level).cloned(),
            };
            if let Some(p) = &pred {
                if *p >= score {
                    return Err(self.misordered(level, p, &score));
                }
            }
            if let Some(s) = &succ {
                if *s <= score {
                    return Err(self.misordered(level, &score, s));
                }
            }

            node.set_prev(level, pred.clone());
            node.set_next(level, succ.clone());

            match pred {
                Some(p) => {
                    let mut left = self.node(&p).await?;
                    left.set_next(level, Some(score.clone()));
                    self.store_node(left);
                }
                None => set_level(&mut self.meta.head_levels, level, score.clone()),
            }
            match succ {
                Some(s) => {
                    let mut right = self.node(&s).await?;
                    right.set_prev(level, Some(score.clone()));
                    self.store_node(right);
                }
                None => set_level(&mut self.meta.tail_levels, level, score.clone()),
            }
        }

        self.store_node(node);
        self.nodes.put_skip_data(self.key, &score, value, &mut self.batch);
        self.meta.length += 1;
        if beyond_max {
            self.meta.max_score = Some(score.clone());
        }
        tracing::trace!(key = %self.key_str(), %score, height, "skip list insert");
        Ok(true)
    }

    /// Unlink the node with exactly this score; `false` when absent
    pub async fn remove_by_score(&mut self, score: &Score) -> CommandResult<bool> {
        let node = match self.fetch(score).await? {
            Some(node) => node,
            None => {
                tracing::warn!(key = %self.key_str(), %score, "remove of absent score");
                return Ok(false);
            }
        };

        let height = node.height(&self.meta);
        let mut emptied_from: Option<usize> = None;
        for level in 0..height {
            let prev = node.prev_at(level).cloned();
            let next = node.next_at(level).cloned();

            match &prev {
                Some(p) => {
                    let mut left = self.node(p).await?;
                    if left.next_at(level) != Some(score) {
                        return Err(self.misordered(level, p, score));
                    }
                    left.set_next(level, next.clone());
                    self.store_node(left);
                }
                None => {
                    if self.meta.head_levels.get(level) != Some(score) {
                        return Err(CommandError::consistency(format!(
                            "skip list '{}' level {} head is not {}",
                            self.key_str(),
                            level,
                            score
                        )));
                    }
                    match &next {
                        Some(n) => self.meta.head_levels[level] = n.clone(),
                        None if emptied_from.is_none() => emptied_from = Some(level),
                        None => {}
                    }
                }
            }

            match &next {
                Some(n) => {
                    let mut right = self.node(n).await?;
                    if right.prev_at(level) != Some(score) {
                        return Err(self.misordered(level, score, n));
                    }
                    right.set_prev(level, prev.clone());
                    self.store_node(right);
                }
                None => {
                    if self.meta.tail_levels.get(level) != Some(score) {
                        return Err(CommandError::consistency(format!(
                            "skip list '{}' level {} tail is not {}",
                            self.key_str(),
                            level,
                            score
                        )));
                    }
                    if let Some(p) = &prev {
                        self.meta.tail_levels[level] = p.clone();
                    }
                }
            }
        }

        if let Some(level) = emptied_from {
            self.meta.head_levels.truncate(level);
            self.meta.tail_levels.truncate(level);
        }
        if self.meta.max_score.as_ref() == Some(score) {
            self.meta.max_score = node.prev_at(0).cloned();
        }
        self.meta.length -= 1;
        self.drop_node(score);
        tracing::trace!(key = %self.key_str(), %score, height, "skip list remove");
        Ok(true)
    }

    /// Every score in ascending order, following level 0
    pub async fn all_scores(&mut self) -> CommandResult<Vec<Score>> {
        let mut scores = Vec::with_capacity(self.meta.length as usize);
        let mut cursor = self.meta.head_levels.first().cloned();
        while let Some(score) = cursor {
            if scores.len() as u64 >= self.meta.length {
                return Err(CommandError::consistency(format!(
                    "skip list '{}' chain is longer than its length {}",
                    self.key_str(),
                    self.meta.length
                )));
            }
            cursor = self.node(&score).await?.next_at(0).cloned();
            scores.push(score);
        }
        if scores.len() as u64 != self.meta.length {
            return Err(CommandError::consistency(format!(
                "skip list '{}' chain has {} nodes, length is {}",
                self.key_str(),
                scores.len(),
                self.meta.length
            )));
        }
        Ok(scores)
    }

    /// Walk every level checking order, link symmetry and head/tail pointers.
    ///
    /// Returns the number of levels.
    pub async fn verify(&mut self) -> CommandResult<usize> {
        let levels = self.meta.levels();
        if self.meta.tail_levels.len() != levels {
            return Err(CommandError::consistency(format!(
                "skip list '{}' has {} heads but {} tails",
                self.key_str(),
                levels,
                self.meta.tail_levels.len()
            )));
        }
        if self.meta.max_score.as_ref() != self.meta.tail_levels.first() {
            return Err(CommandError::consistency(format!(
                "skip list '{}' max score does not match its level 0 tail",
                self.key_str()
            )));
        }

        let mut below: HashSet<Vec<u8>> = HashSet::new();
        for level in 0..levels {
            let mut seen: HashSet<Vec<u8>> = HashSet::new();
            let mut prev: Option<Score> = None;
            let mut cursor = self.meta.head_levels.get(level).cloned();

            while let Some(score) = cursor {
                if seen.len() as u64 >= self.meta.length {
                    return Err(CommandError::consistency(format!(
                        "skip list '{}' level {} is longer than the list",
                        self.key_str(),
                        level
                    )));
                }
                if let Some(p) = &prev {
                    if *p >= score {
                        return Err(self.misordered(level, p, &score));
                    }
                }
                if level > 0 && !below.contains(&score.identifier()) {
                    return Err(CommandError::consistency(format!(
                        "skip list '{}' node {} is on level {} but not below it",
                        self.key_str(),
                        score,
                        level
                    )));
                }
                let node = self.node(&score).await?;
                if node.prev_at(level) != prev.as_ref() {
                    return Err(self.misordered(level, prev.as_ref().unwrap_or(&score), &score));
                }
                seen.insert(score.identifier());
                cursor = node.next_at(level).cloned();
                prev = Some(score);
            }

            if prev.as_ref() != self.meta.tail_levels.get(level) {
                return Err(CommandError::consistency(format!(
                    "skip list '{}' level {} tail pointer is stale",
                    self.key_str(),
                    level
                )));
            }
            if level == 0 && seen.len() as u64 != self.meta.length {
                return Err(CommandError::consistency(format!(
                    "skip list '{}' level 0 has {} nodes, length is {}",
                    self.key_str(),
                    seen.len(),
                    self.meta.length
                )));
            }
            below = seen;
        }
        Ok(levels)
    }

    /// Stage deletion of every node, payload and the metadata record
    pub async fn deconstruct(&mut self) -> CommandResult<u64> {
        let scores = self.all_scores().await?;
        for score in &scores {
            self.drop_node(score);
        }
        self.meta.length = 0;
        self.meta.head_levels.clear();
        self.meta.tail_levels.clear();
        self.meta.max_score = None;
        Ok(scores.len() as u64)
    }

    /// Stage touched nodes and the metadata; the caller commits the batch
    pub fn finish(mut self) -> CommandResult<(KeyMeta, WriteBatch)> {
        for score in &self.dirty {
            match self.cache.get(score) {
                Some(Some(node)) => self.nodes.put_skip_node(self.key, node, &mut self.batch)?,
                _ => self.nodes.delete_skip_node(self.key, score, &mut self.batch),
            }
        }
        self.metas.save_or_remove(self.key, &self.meta, &mut self.batch)?;
        Ok((self.meta, self.batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::SimulatedRng;
    use crate::redis::keys::KeyEncoder;
    use crate::redis::meta::KeyType;
    use crate::store::InMemoryKvStore;

    struct Fixture {
        store: InMemoryKvStore,
        keys: KeyEncoder,
        levels: LevelGenerator,
    }

    impl Fixture {
        fn new(seed: u64) -> Self {
            Fixture {
                store: InMemoryKvStore::new(),
                keys: KeyEncoder::new("t"),
                levels: LevelGenerator::new(SimulatedRng::new(seed), 4),
            }
        }

        async fn session(&self) -> SkipListSession<'_, InMemoryKvStore> {
            let metas = MetaStore::new(&self.store, &self.keys);
            let meta = metas
                .load(b"z")
                .await
                .unwrap()
                .unwrap_or_else(|| KeyMeta::new(KeyType::OrderedSet));
            SkipListSession::new(metas, NodeStore::new(&self.store, &self.keys), b"z", &self.levels, meta)
        }

        async fn commit(&self, session: SkipListSession<'_, InMemoryKvStore>) -> KeyMeta {
            let (meta, batch) = session.finish().unwrap();
            self.store.write(batch).await.unwrap();
            meta
        }
    }

    #[test]
    fn test_generate_mask_respects_cap() {
        let levels = LevelGenerator::new(SimulatedRng::new(3), 4);
        for _ in 0..1000 {
            let h = levels.generate_mask(4);
            assert!((1..=4).contains(&h));
        }
        assert_eq!(levels.generate_mask(1), 1);
    }

    #[tokio::test]
    async fn test_insert_keeps_order_and_levels() {
        let fx = Fixture::new(11);
        let input = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0, 0.0];
        for score in input {
            let mut session = fx.session().await;
            assert!(session
                .insert(Score::Number(score), Bytes::from(score.to_string()))
                .await
                .unwrap());
            fx.commit(session).await;
        }

        let mut session = fx.session().await;
        let scores: Vec<f64> = session
            .all_scores()
            .await
            .unwrap()
            .iter()
            .filter_map(|s| s.number())
            .collect();
        assert_eq!(scores, (0..10).map(|i| i as f64).collect::<Vec<_>>());
        assert!(session.verify().await.unwrap() >= 1);
        assert_eq!(session.meta().max_score, Some(Score::Number(9.0)));
    }

    #[tokio::test]
    async fn test_existing_score_overwrites_payload() {
        let fx = Fixture::new(1);
        let mut session = fx.session().await;
        assert!(session.insert(Score::Number(1.0), Bytes::from_static(b"a")).await.unwrap());
        assert!(!session.insert(Score::Number(1.0), Bytes::from_static(b"b")).await.unwrap());
        let meta = fx.commit(session).await;
        assert_eq!(meta.length, 1);

        let mut session = fx.session().await;
        let value = session.find_value_by_score(&Score::Number(1.0)).await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"b")));
    }

    #[tokio::test]
    async fn test_remove_everything_leaves_no_records() {
        let fx = Fixture::new(5);
        for i in 0..20 {
            let mut session = fx.session().await;
            session.insert(Score::Number(i as f64), Bytes::new()).await.unwrap();
            fx.commit(session).await;
        }

        for i in (0..20).rev().step_by(2).chain((0..20).step_by(2)) {
            let mut session = fx.session().await;
            assert!(session.remove_by_score(&Score::Number(i as f64)).await.unwrap());
            session.verify().await.unwrap();
            fx.commit(session).await;
        }

        assert!(fx.store.is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_is_soft() {
        let fx = Fixture::new(2);
        let mut session = fx.session().await;
        assert!(!session.remove_by_score(&Score::Number(1.0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_max_score_moves_back_on_removal() {
        let fx = Fixture::new(9);
        let mut session = fx.session().await;
        for i in 0..3 {
            session.insert(Score::Number(i as f64), Bytes::new()).await.unwrap();
        }
        session.remove_by_score(&Score::Number(2.0)).await.unwrap();
        assert_eq!(session.meta().max_score, Some(Score::Number(1.0)));
        session.verify().await.unwrap();

        // Below the max again: goes through the top-down search
        session.insert(Score::Number(0.5), Bytes::new()).await.unwrap();
        session.verify().await.unwrap();
        let meta = fx.commit(session).await;
        assert_eq!(meta.length, 3);
    }

    #[tokio::test]
    async fn test_deconstruct_removes_all_records() {
        let fx = Fixture::new(4);
        let mut session = fx.session().await;
        for i in 0..8 {
            session.insert(Score::Number(i as f64), Bytes::from_static(b"v")).await.unwrap();
        }
        fx.commit(session).await;
        assert!(!fx.store.is_empty());

        let mut session = fx.session().await;
        assert_eq!(session.deconstruct().await.unwrap(), 8);
        fx.commit(session).await;
        assert!(fx.store.is_empty());
    }
}
