use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, ItemKind, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{f64_or, usize_or};
use crate::framework::{Node, RecallNode};

/// Requires a resolvable user: matches items against the user's own tags,
/// scoring by a position-weighted decay over the first `max_tag_match` tags.
pub struct TagRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    tag_weight_decay: f64,
    min_tag_match: usize,
    max_tag_match: usize,
}

impl TagRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: usize_or(&config.params, "recall_size", 100),
            tag_weight_decay: f64_or(&config.params, "tag_weight_decay", 0.9),
            min_tag_match: usize_or(&config.params, "min_tag_match", 1),
            max_tag_match: usize_or(&config.params, "max_tag_match", 3),
        })
    }
}

impl Node for TagRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "TagRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for TagRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let Some(user_id) = ctx.user_id else {
            return Ok(Vec::new());
        };

        let Some(user) = ctx.db.load_user(user_id).await? else {
            return Ok(Vec::new());
        };

        if user.tags.is_empty() {
            return Ok(Vec::new());
        }

        let used_tags: Vec<String> = user.tags.into_iter().take(self.max_tag_match).collect();

        let mut candidates = ctx
            .db
            .query_items_by_tag_overlap(&used_tags, &[ItemKind::Content], self.recall_size * 4)
            .await?;

        candidates.retain_mut(|c| {
            let mut score = 0.0;
            let mut matched = Vec::new();
            for (i, tag) in used_tags.iter().enumerate() {
                if c.tags.contains(tag) {
                    score += self.tag_weight_decay.powi(i as i32);
                    matched.push(tag.clone());
                }
            }
            if matched.len() < self.min_tag_match {
                return false;
            }
            c.match_score = Some(score);
            c.matched_tags = matched;
            c.recall_type = Some("tag".to_string());
            true
        });

        candidates.sort_by(|a, b| {
            b.match_score
                .unwrap_or(0.0)
                .partial_cmp(&a.match_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.recall_size);

        debug!(node_id = %self.node_id, count = candidates.len(), "tag recall");
        Ok(candidates)
    }
}
