use std::collections::HashMap;

use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, FeedItem, ItemKind, NodeConfig, RequestContext, Tracking};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config_util::bool_or;
use crate::framework::{Node, TransformNode};

/// Turns ranked candidates into wire-shaped feed items: resolves a score,
/// a human-readable reason, tracking identifiers, and (for content items)
/// the full item body — hydrated in one batch call, never per-candidate.
pub struct ResponseFormatNode {
    node_id: String,
    enabled: bool,
    generate_reason: bool,
    include_tracking: bool,
}

impl ResponseFormatNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            generate_reason: bool_or(&config.params, "generate_reason", true),
            include_tracking: bool_or(&config.params, "include_tracking", true),
        })
    }

    fn generate_reason(candidate: &Candidate) -> String {
        match candidate.recall_type.as_deref() {
            Some("tag") => match candidate.matched_tags.first() {
                Some(tag) => format!("基于你感兴趣的{tag}"),
                None => "根据你的兴趣推荐".to_string(),
            },
            Some("popular") => "热门推荐".to_string(),
            Some("vector") => "与你喜欢的内容相似".to_string(),
            Some("multi_hop") => "你可能感兴趣的发现".to_string(),
            Some("random") => "随机推荐".to_string(),
            _ => "根据你的兴趣推荐".to_string(),
        }
    }

    fn content_body(candidate: &Candidate, hydrated: Option<&Candidate>) -> Value {
        let source = hydrated.unwrap_or(candidate);
        json!({
            "title": source.title,
            "description": source.content,
            "author": { "id": source.author_id, "name": "未知作者" },
            "created_at": source.created_at,
            "media": {},
            "tags": source.tags,
        })
    }
}

impl Node for ResponseFormatNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "ResponseFormatNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl TransformNode for ResponseFormatNode {
    async fn transform(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<FeedItem>> {
        if input.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(node_id) = &ctx.node_id {
            ctx.trace.add_node_detail(node_id, "input_size", Value::from(input.len()));
        }

        let content_ids: Vec<i64> = input
            .iter()
            .filter(|c| c.kind == ItemKind::Content)
            .map(|c| c.id)
            .collect();

        let hydrated: HashMap<i64, Candidate> = if content_ids.is_empty() {
            HashMap::new()
        } else {
            ctx.db
                .fetch_items(&content_ids)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        let mut feed_items = Vec::with_capacity(input.len());

        for (i, candidate) in input.iter().enumerate() {
            let position = i + 1;
            let score = candidate
                .rerank_score
                .or(candidate.rank_score)
                .or(candidate.pre_rank_score)
                .or(candidate.match_score)
                .unwrap_or(0.9);

            let tracking = self.include_tracking.then(|| Tracking {
                event_token: format!("token-{}", Uuid::new_v4()),
                trace_id: ctx.trace.trace_id(),
            });

            let reason = self.generate_reason.then(|| Self::generate_reason(candidate));

            let mut feed_item = FeedItem {
                item_type: candidate.kind.to_string(),
                id: candidate.id.to_string(),
                score,
                position,
                reason,
                tracking,
                content: None,
                ad: None,
                product: None,
            };

            match candidate.kind {
                ItemKind::Content => {
                    feed_item.content = Some(Self::content_body(candidate, hydrated.get(&candidate.id)));
                }
                ItemKind::Ad => {
                    feed_item.ad = Some(json!({ "title": candidate.title, "tags": candidate.tags }));
                }
                ItemKind::Product => {
                    feed_item.product = Some(json!({ "title": candidate.title, "tags": candidate.tags }));
                }
            }

            feed_items.push(feed_item);
        }

        if let Some(node_id) = &ctx.node_id {
            ctx.trace.add_node_detail(node_id, "output_size", Value::from(feed_items.len()));
        }

        debug!(node_id = %self.node_id, count = feed_items.len(), "response format");
        Ok(feed_items)
    }
}
