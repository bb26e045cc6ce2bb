use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::traits::HopWeights;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{f64_or, string_vec_or, usize_or};
use crate::framework::{Node, RecallNode};

/// Graph walk over user->item->user->item relations, aggregating weight
/// per item across all hop paths with multiplicative decay per extra hop.
pub struct MultiHopRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    max_hops: u32,
    relation_types: Vec<String>,
    hop_decay: f64,
}

impl MultiHopRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
            max_hops: usize_or(&config.params, "max_hops", 2) as u32,
            relation_types: string_vec_or(
                &config.params,
                "relation_types",
                vec!["like".to_string(), "favorite".to_string()],
            ),
            hop_decay: f64_or(&config.params, "hop_decay", 0.5),
        })
    }
}

impl Node for MultiHopRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "MultiHopRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for MultiHopRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let Some(user_id) = ctx.user_id else {
            return Ok(Vec::new());
        };

        let hops = HopWeights {
            relation_types: self.relation_types.clone(),
            max_hops: self.max_hops,
            decay: self.hop_decay,
        };

        let scored = ctx.db.multi_hop_items(user_id, &hops, self.recall_size).await?;
        if scored.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();
        let mut by_id: std::collections::HashMap<i64, f64> = scored.into_iter().collect();

        let mut candidates = ctx.db.fetch_items(&ids).await?;
        for c in &mut candidates {
            c.match_score = Some(by_id.remove(&c.id).unwrap_or(0.0));
            c.recall_type = Some("multi_hop".to_string());
        }
        candidates.sort_by(|a, b| {
            b.match_score
                .unwrap_or(0.0)
                .partial_cmp(&a.match_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(node_id = %self.node_id, count = candidates.len(), "multi-hop recall");
        Ok(candidates)
    }
}
