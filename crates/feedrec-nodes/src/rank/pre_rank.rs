use async_trait::async_trait;
use chrono::Utc;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{f64_or, string_or, usize_or};
use crate::framework::{Node, RankNode};

/// Lightweight first-pass ranker. The rule scorer is the only one this
/// crate actually evaluates; `model_type` values other than `"rule"` are
/// accepted for config compatibility but fall back to the rule scorer with
/// a recorded `fallback_reason`, since no model loader exists in this core
/// (spec.md §4.3.2 — "if no model is loaded ... fall back to the rule
/// scorer").
pub struct PreRankNode {
    node_id: String,
    enabled: bool,
    rank_size: usize,
    model_type: String,
    w_recency: f64,
    w_popularity: f64,
}

impl PreRankNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            rank_size: usize_or(&config.params, "rank_size", 200),
            model_type: string_or(&config.params, "model_type", "rule"),
            w_recency: f64_or(&config.params, "w_recency", 0.7),
            w_popularity: f64_or(&config.params, "w_popularity", 0.3),
        })
    }

    fn rule_score(&self, c: &Candidate) -> f64 {
        let now = Utc::now();
        let recency = c
            .created_at
            .map(|created| {
                let days = (now - created).num_milliseconds() as f64 / 86_400_000.0;
                (-0.1 * days).exp()
            })
            .unwrap_or(0.0);

        0.5 * c.match_score.unwrap_or(0.0) + self.w_recency * recency + self.w_popularity * c.popularity
    }
}

impl Node for PreRankNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "PreRankNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RankNode for PreRankNode {
    async fn rank(&self, mut input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        if self.model_type != "rule" {
            if let Some(node_id) = &ctx.node_id {
                ctx.trace.add_node_detail(
                    node_id,
                    "fallback_reason",
                    serde_json::Value::String("model_not_available".to_string()),
                );
            }
        }

        for c in &mut input {
            c.pre_rank_score = Some(self.rule_score(c));
        }

        input.sort_by(|a, b| {
            b.pre_rank_score
                .unwrap_or(0.0)
                .partial_cmp(&a.pre_rank_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        input.truncate(self.rank_size);

        debug!(node_id = %self.node_id, count = input.len(), "pre-rank");
        Ok(input)
    }
}
