use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, ItemKind, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{string_vec_or, usize_or};
use crate::framework::{Node, RecallNode};

/// Cold-start / degraded fallback: a uniform sample across item kinds.
pub struct RandomRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    content_types: Vec<ItemKind>,
    seed: Option<u64>,
}

impl RandomRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        let content_types = string_vec_or(
            &config.params,
            "content_types",
            vec!["content".into(), "ad".into(), "product".into()],
        )
        .into_iter()
        .filter_map(|s| s.parse::<ItemKind>().ok())
        .collect();

        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
            content_types,
            seed: config.params.get("seed").and_then(|v| v.as_u64()),
        })
    }
}

impl Node for RandomRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "RandomRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for RandomRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let mut candidates = ctx
            .db
            .sample_items(&self.content_types, self.recall_size, self.seed)
            .await?;

        for c in &mut candidates {
            c.match_score = Some(0.5);
            c.recall_type = Some("random".to_string());
        }

        debug!(node_id = %self.node_id, count = candidates.len(), "random recall");
        Ok(candidates)
    }
}
