use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use serde_json::Value;
use tracing::debug;

use crate::config_util::{string_or, usize_or};
use crate::framework::{Node, RankNode as RankSpecialization};

/// The precise ranker. This core carries no model-serving infrastructure
/// (spec.md's Non-goals exclude a training pipeline and online learning),
/// so `model_loaded` is always `false` here and every call takes the rule
/// fallback path — but it takes the *same* fallback path and trace detail
/// the original's "model file not found" branch does, so swapping in a
/// real model only means flipping this flag and implementing `score_with_model`.
pub struct RankNode {
    node_id: String,
    enabled: bool,
    rank_size: usize,
    score_field: String,
}

impl RankNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            rank_size: usize_or(&config.params, "rank_size", 50),
            score_field: string_or(&config.params, "score_field", "rank_score"),
        })
    }

    fn rule_rank(&self, mut input: Vec<Candidate>) -> Vec<Candidate> {
        for c in &mut input {
            let score = c.pre_rank_score.or(c.match_score).unwrap_or(0.0);
            c.rank_score = Some(score);
        }
        input.sort_by(|a, b| {
            b.rank_score
                .unwrap_or(0.0)
                .partial_cmp(&a.rank_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        input.truncate(self.rank_size);
        input
    }
}

impl Node for RankNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "RankNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RankSpecialization for RankNode {
    async fn rank(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        let has_features = input.iter().all(|c| !c.features.is_empty());
        let fallback_reason = if !has_features {
            Some("missing_features")
        } else {
            // No model loader is wired into this core; always degrade.
            Some("model_not_available")
        };

        if let (Some(reason), Some(node_id)) = (fallback_reason, &ctx.node_id) {
            ctx.trace
                .add_node_detail(node_id, "fallback_reason", Value::String(reason.to_string()));
        }

        let _ = &self.score_field;
        let ranked = self.rule_rank(input);

        debug!(node_id = %self.node_id, count = ranked.len(), "rank");
        Ok(ranked)
    }
}
