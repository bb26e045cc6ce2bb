use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Candidate, ItemKind, UserProfile};

/// A similarity metric `nearest_items` is asked to rank by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityMetric {
    Cosine,
    Dot,
    Euclidean,
}

/// `(item_id, similarity_or_distance)` as returned by a vector search.
pub type ScoredItem = (i64, f64);

/// Per-relation-type decay weights consumed by `multi_hop_items`.
#[derive(Debug, Clone)]
pub struct HopWeights {
    pub relation_types: Vec<String>,
    pub max_hops: u32,
    pub decay: f64,
}

/// Weighted event-type counts consumed by `popularity_by_window`.
#[derive(Debug, Clone)]
pub struct EventWeights {
    pub weights: std::collections::HashMap<String, f64>,
}

/// The narrow capability set the engine consumes from the outside world.
/// Every operation is async and expected to respect task cancellation
/// (callers race it against the request's `CancellationToken`).
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Random sample of items of the given kinds. `seed` makes repeated
    /// calls with the same seed return the same sample, for cursor paging.
    async fn sample_items(
        &self,
        kinds: &[ItemKind],
        limit: usize,
        seed: Option<u64>,
    ) -> Result<Vec<Candidate>>;

    async fn load_user(&self, id: i64) -> Result<Option<UserProfile>>;

    async fn query_items_by_tag_overlap(
        &self,
        tags: &[String],
        kinds: &[ItemKind],
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    async fn popularity_by_window(
        &self,
        event_types: &EventWeights,
        window_start: chrono::DateTime<chrono::Utc>,
        limit: usize,
    ) -> Result<Vec<Candidate>>;

    async fn load_user_embedding(&self, id: i64) -> Result<Option<Vec<f32>>>;

    async fn nearest_items(
        &self,
        vector: &[f32],
        metric: SimilarityMetric,
        limit: usize,
    ) -> Result<Vec<ScoredItem>>;

    async fn multi_hop_items(
        &self,
        user_id: i64,
        hops: &HopWeights,
        limit: usize,
    ) -> Result<Vec<ScoredItem>>;

    async fn query_items_by_kind(&self, kind: ItemKind, limit: usize) -> Result<Vec<Candidate>>;

    async fn user_blocked_items(&self, user_id: i64) -> Result<std::collections::HashSet<i64>>;

    async fn user_history_items(
        &self,
        user_id: i64,
        event_types: &[String],
        since: chrono::DateTime<chrono::Utc>,
    ) -> Result<std::collections::HashSet<i64>>;

    /// Batch hydration. Nodes must never call this once per candidate;
    /// the response formatter collects every id it needs up front.
    async fn fetch_items(&self, ids: &[i64]) -> Result<Vec<Candidate>>;

    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;
}
