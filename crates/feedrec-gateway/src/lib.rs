//! An in-memory stand-in for the relational store `DataGateway` abstracts
//! over (spec.md §1 explicitly puts the real store out of scope). Used by
//! the façade's own tests, the node library's integration tests, and the
//! demo CLI. Grounded on the teacher's `FaissVectorStore`-style shape:
//! plain `HashMap` fixtures behind `parking_lot::RwLock`, one lock per
//! logical table rather than one lock for the whole store.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedrec_core::error::{FeedRecError, Result};
use feedrec_core::traits::{DataGateway, EventWeights, HopWeights, ScoredItem, SimilarityMetric};
use feedrec_core::types::{Candidate, ItemKind, UserProfile};
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

/// One user-item interaction: `(impression|click|like|comment|share|favorite|pv)`.
/// Doubles as the edge list `multi_hop_items` walks, since "did user U emit
/// event E on item I" is exactly a user-item graph edge.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub user_id: i64,
    pub item_id: i64,
    pub event_type: String,
    pub at: DateTime<Utc>,
}

/// A user→item relation with an on/off status, used for the block list.
#[derive(Debug, Clone)]
pub struct RelationRecord {
    pub user_id: i64,
    pub item_id: i64,
    pub relation_type: String,
    pub active: bool,
}

#[derive(Default)]
struct Tables {
    items: HashMap<i64, Candidate>,
    users: HashMap<i64, UserProfile>,
    user_embeddings: HashMap<i64, Vec<f32>>,
    item_embeddings: HashMap<i64, Vec<f32>>,
    events: Vec<EventRecord>,
    relations: Vec<RelationRecord>,
}

/// Transaction lifecycle is modeled with an `AtomicBool` "poisoned" flag
/// rather than a real connection handle: `begin` opens the window,
/// `rollback` (called by `safe_process` on any node failure) poisons it,
/// and `commit` refuses to clear a poisoned transaction — mirroring
/// "a transaction is never reused across a rollback" (spec.md §5).
pub struct InMemoryGateway {
    tables: RwLock<Tables>,
    transaction_open: AtomicBool,
    poisoned: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            transaction_open: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        }
    }

    pub fn seed_item(&self, item: Candidate) {
        self.tables.write().items.insert(item.id, item);
    }

    pub fn seed_user(&self, user: UserProfile) {
        self.tables.write().users.insert(user.id, user);
    }

    pub fn seed_user_embedding(&self, user_id: i64, vector: Vec<f32>) {
        self.tables.write().user_embeddings.insert(user_id, vector);
    }

    pub fn seed_item_embedding(&self, item_id: i64, vector: Vec<f32>) {
        self.tables.write().item_embeddings.insert(item_id, vector);
    }

    pub fn seed_event(&self, event: EventRecord) {
        self.tables.write().events.push(event);
    }

    pub fn seed_block(&self, user_id: i64, item_id: i64) {
        self.tables.write().relations.push(RelationRecord {
            user_id,
            item_id,
            relation_type: "block".to_string(),
            active: true,
        });
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    fn similarity(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> f64 {
        match metric {
            SimilarityMetric::Cosine => {
                let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
                let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
                let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    0.0
                } else {
                    1.0 - (dot / (norm_a * norm_b)) as f64
                }
            }
            SimilarityMetric::Euclidean => {
                a.iter().zip(b).map(|(x, y)| ((x - y) * (x - y)) as f64).sum::<f64>().sqrt()
            }
            SimilarityMetric::Dot => a.iter().zip(b).map(|(x, y)| (x * y) as f64).sum(),
        }
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataGateway for InMemoryGateway {
    async fn sample_items(&self, kinds: &[ItemKind], limit: usize, seed: Option<u64>) -> Result<Vec<Candidate>> {
        let tables = self.tables.read();
        let mut matching: Vec<&Candidate> = tables.items.values().filter(|c| kinds.contains(&c.kind)).collect();

        match seed {
            Some(seed) => {
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                matching.shuffle(&mut rng);
            }
            None => {
                let mut rng = rand::rng();
                matching.shuffle(&mut rng);
            }
        }

        Ok(matching.into_iter().take(limit).cloned().collect())
    }

    async fn load_user(&self, id: i64) -> Result<Option<UserProfile>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn query_items_by_tag_overlap(
        &self,
        tags: &[String],
        kinds: &[ItemKind],
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let tables = self.tables.read();
        let matched: Vec<Candidate> = tables
            .items
            .values()
            .filter(|c| kinds.contains(&c.kind) && c.tags.iter().any(|t| tags.contains(t)))
            .take(limit)
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn popularity_by_window(
        &self,
        event_types: &EventWeights,
        window_start: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        let tables = self.tables.read();

        let mut weight_by_item: HashMap<i64, f64> = HashMap::new();
        for event in &tables.events {
            if event.at < window_start {
                continue;
            }
            if let Some(weight) = event_types.weights.get(&event.event_type) {
                *weight_by_item.entry(event.item_id).or_insert(0.0) += weight;
            }
        }

        let mut ranked: Vec<(i64, f64)> = weight_by_item
            .into_iter()
            .filter(|(id, _)| tables.items.get(id).is_some_and(|c| c.kind == ItemKind::Content))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);

        let candidates = ranked
            .into_iter()
            .filter_map(|(id, weight)| {
                tables.items.get(&id).cloned().map(|mut c| {
                    c.popularity = weight;
                    c
                })
            })
            .collect();

        Ok(candidates)
    }

    async fn load_user_embedding(&self, id: i64) -> Result<Option<Vec<f32>>> {
        Ok(self.tables.read().user_embeddings.get(&id).cloned())
    }

    async fn nearest_items(
        &self,
        vector: &[f32],
        metric: SimilarityMetric,
        limit: usize,
    ) -> Result<Vec<ScoredItem>> {
        let tables = self.tables.read();
        let mut scored: Vec<ScoredItem> = tables
            .item_embeddings
            .iter()
            .map(|(id, emb)| (*id, Self::similarity(metric, vector, emb)))
            .collect();

        match metric {
            SimilarityMetric::Dot => scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)),
            _ => scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal)),
        }
        scored.truncate(limit);
        Ok(scored)
    }

    async fn multi_hop_items(&self, user_id: i64, hops: &HopWeights, limit: usize) -> Result<Vec<ScoredItem>> {
        let tables = self.tables.read();

        let edges: Vec<(i64, i64)> = tables
            .events
            .iter()
            .filter(|e| hops.relation_types.contains(&e.event_type))
            .map(|e| (e.user_id, e.item_id))
            .collect();

        let origin_items: HashSet<i64> =
            edges.iter().filter(|(u, _)| *u == user_id).map(|(_, i)| *i).collect();

        if origin_items.is_empty() {
            return Ok(Vec::new());
        }

        let mut visited_users: HashSet<i64> = HashSet::from([user_id]);
        let mut frontier_users: HashSet<i64> = HashSet::from([user_id]);
        let mut weight_by_item: HashMap<i64, f64> = HashMap::new();
        let mut current_weight = 1.0;

        for _ in 0..hops.max_hops {
            current_weight *= hops.decay;

            let touched_items: HashSet<i64> =
                edges.iter().filter(|(u, _)| frontier_users.contains(u)).map(|(_, i)| *i).collect();

            let co_users: HashSet<i64> = edges
                .iter()
                .filter(|(_, i)| touched_items.contains(i))
                .map(|(u, _)| *u)
                .filter(|u| !visited_users.contains(u))
                .collect();

            if co_users.is_empty() {
                break;
            }

            for (u, i) in &edges {
                if co_users.contains(u) && !origin_items.contains(i) {
                    *weight_by_item.entry(*i).or_insert(0.0) += current_weight;
                }
            }

            visited_users.extend(&co_users);
            frontier_users = co_users;
        }

        let mut ranked: Vec<ScoredItem> = weight_by_item.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn query_items_by_kind(&self, kind: ItemKind, limit: usize) -> Result<Vec<Candidate>> {
        Ok(self.tables.read().items.values().filter(|c| c.kind == kind).take(limit).cloned().collect())
    }

    async fn user_blocked_items(&self, user_id: i64) -> Result<HashSet<i64>> {
        Ok(self
            .tables
            .read()
            .relations
            .iter()
            .filter(|r| r.user_id == user_id && r.relation_type == "block" && r.active)
            .map(|r| r.item_id)
            .collect())
    }

    async fn user_history_items(
        &self,
        user_id: i64,
        event_types: &[String],
        since: DateTime<Utc>,
    ) -> Result<HashSet<i64>> {
        Ok(self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.user_id == user_id && e.at >= since && event_types.iter().any(|t| t == &e.event_type))
            .map(|e| e.item_id)
            .collect())
    }

    async fn fetch_items(&self, ids: &[i64]) -> Result<Vec<Candidate>> {
        let tables = self.tables.read();
        Ok(ids.iter().filter_map(|id| tables.items.get(id).cloned()).collect())
    }

    async fn begin(&self) -> Result<()> {
        if self.transaction_open.swap(true, Ordering::SeqCst) {
            return Err(FeedRecError::Gateway("transaction already open".to_string()));
        }
        self.poisoned.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(FeedRecError::Gateway("cannot commit a poisoned transaction".to_string()));
        }
        self.transaction_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.poisoned.store(true, Ordering::SeqCst);
        self.transaction_open.store(false, Ordering::SeqCst);
        debug!("transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway_with_two_content_items() -> InMemoryGateway {
        let gw = InMemoryGateway::new();
        gw.seed_item(Candidate::new(1, ItemKind::Content));
        gw.seed_item(Candidate::new(2, ItemKind::Content));
        gw
    }

    #[tokio::test]
    async fn sample_items_respects_limit_and_kind() {
        let gw = gateway_with_two_content_items();
        gw.seed_item(Candidate::new(3, ItemKind::Ad));
        let sampled = gw.sample_items(&[ItemKind::Content], 10, Some(7)).await.unwrap();
        assert_eq!(sampled.len(), 2);
        assert!(sampled.iter().all(|c| c.kind == ItemKind::Content));
    }

    #[tokio::test]
    async fn seeded_sample_is_deterministic() {
        let gw = gateway_with_two_content_items();
        let a = gw.sample_items(&[ItemKind::Content], 2, Some(42)).await.unwrap();
        let b = gw.sample_items(&[ItemKind::Content], 2, Some(42)).await.unwrap();
        assert_eq!(a.iter().map(|c| c.id).collect::<Vec<_>>(), b.iter().map(|c| c.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn rollback_poisons_the_transaction() {
        let gw = InMemoryGateway::new();
        gw.begin().await.unwrap();
        gw.rollback().await.unwrap();
        assert!(gw.is_poisoned());
        assert!(gw.commit().await.is_err());
    }

    #[tokio::test]
    async fn multi_hop_excludes_origin_users_own_items() {
        let gw = InMemoryGateway::new();
        let now = Utc::now();
        gw.seed_item(Candidate::new(10, ItemKind::Content));
        gw.seed_item(Candidate::new(20, ItemKind::Content));
        // user 1 liked item 10; user 2 also liked item 10 and item 20.
        gw.seed_event(EventRecord { user_id: 1, item_id: 10, event_type: "like".to_string(), at: now });
        gw.seed_event(EventRecord { user_id: 2, item_id: 10, event_type: "like".to_string(), at: now });
        gw.seed_event(EventRecord { user_id: 2, item_id: 20, event_type: "like".to_string(), at: now });

        let hops = HopWeights { relation_types: vec!["like".to_string()], max_hops: 2, decay: 0.5 };
        let result = gw.multi_hop_items(1, &hops, 10).await.unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 20);
    }
}
