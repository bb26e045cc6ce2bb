use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::traits::SimilarityMetric;
use feedrec_core::types::{Candidate, ItemKind, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{f64_or, string_or, usize_or};
use crate::framework::{Node, RecallNode};

/// Requires a resolvable user embedding: k-nearest-neighbor search in the
/// item embedding store. Candidates below `min_score` cosine similarity
/// are discarded before the node returns.
pub struct VectorRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    distance_metric: SimilarityMetric,
    min_score: f64,
}

impl VectorRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        let metric = match string_or(&config.params, "distance_metric", "cosine").as_str() {
            "l2" => SimilarityMetric::Euclidean,
            "dot" => SimilarityMetric::Dot,
            _ => SimilarityMetric::Cosine,
        };

        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
            distance_metric: metric,
            min_score: f64_or(&config.params, "min_score", 0.7),
        })
    }
}

impl Node for VectorRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "VectorRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for VectorRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let Some(user_id) = ctx.user_id else {
            return Ok(Vec::new());
        };

        let Some(vector) = ctx.db.load_user_embedding(user_id).await? else {
            return Ok(Vec::new());
        };

        let scored = ctx
            .db
            .nearest_items(&vector, self.distance_metric, self.recall_size)
            .await?;

        let ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();
        let mut by_id: std::collections::HashMap<i64, f64> = scored.into_iter().collect();

        let mut candidates = ctx.db.fetch_items(&ids).await?;
        candidates.retain_mut(|c| {
            let raw = by_id.remove(&c.id).unwrap_or(0.0);
            let score = match self.distance_metric {
                SimilarityMetric::Cosine => 1.0 - raw,
                _ => raw,
            };
            if matches!(self.distance_metric, SimilarityMetric::Cosine) && score < self.min_score {
                return false;
            }
            c.match_score = Some(score);
            c.recall_type = Some("vector".to_string());
            true
        });

        debug!(node_id = %self.node_id, count = candidates.len(), "vector recall");
        Ok(candidates)
    }
}
