use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, ItemKind, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{bool_or, usize_or};
use crate::framework::{Node, RecallNode};

/// Straight listing of `kind=ad` items. Targeting is a stub hook: a real
/// deployment would narrow the query by the request's scene/geo/ab context
/// here; this implementation only records whether targeting is configured.
pub struct AdRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    targeting_enabled: bool,
}

impl AdRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
            targeting_enabled: bool_or(&config.params, "targeting_enabled", true),
        })
    }
}

impl Node for AdRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "AdRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for AdRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        // `targeting_enabled` is a stub hook for a real targeting pass; this
        // implementation recalls the same untargeted pool either way.
        let _ = self.targeting_enabled;

        let mut candidates = ctx.db.query_items_by_kind(ItemKind::Ad, self.recall_size).await?;
        for c in &mut candidates {
            c.match_score = Some(1.0);
            c.recall_type = Some("ad".to_string());
        }

        debug!(node_id = %self.node_id, count = candidates.len(), "ad recall");
        Ok(candidates)
    }
}
