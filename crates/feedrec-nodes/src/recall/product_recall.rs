use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, ItemKind, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::usize_or;
use crate::framework::{Node, RecallNode};

/// Straight listing of `kind=product` items, mirroring `AdRecallNode`.
pub struct ProductRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
}

impl ProductRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
        })
    }
}

impl Node for ProductRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "ProductRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for ProductRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let mut candidates = ctx
            .db
            .query_items_by_kind(ItemKind::Product, self.recall_size)
            .await?;
        for c in &mut candidates {
            c.match_score = Some(1.0);
            c.recall_type = Some("product".to_string());
        }

        debug!(node_id = %self.node_id, count = candidates.len(), "product recall");
        Ok(candidates)
    }
}
