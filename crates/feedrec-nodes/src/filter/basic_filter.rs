use std::collections::HashMap;

use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use serde_json::Value;
use tracing::debug;

use crate::config_util::{f64_or, string_vec_or};
use crate::framework::{FilterNode, Node};

/// Four fixed-order rules applied from a configurable subset: dedup by id,
/// drop blocked items, drop low-quality items, drop sensitive items.
pub struct BasicFilterNode {
    node_id: String,
    enabled: bool,
    filter_rules: Vec<String>,
    quality_threshold: f64,
}

impl BasicFilterNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            filter_rules: string_vec_or(
                &config.params,
                "filter_rules",
                vec!["duplicate".into(), "block".into(), "low_quality".into()],
            ),
            quality_threshold: f64_or(&config.params, "quality_threshold", 0.3),
        })
    }

    fn has_rule(&self, rule: &str) -> bool {
        self.filter_rules.iter().any(|r| r == rule)
    }
}

impl Node for BasicFilterNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "BasicFilterNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl FilterNode for BasicFilterNode {
    async fn filter(&self, mut input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        let mut dropped: HashMap<String, usize> = HashMap::new();

        if self.has_rule("duplicate") {
            let before = input.len();
            let mut seen = std::collections::HashSet::new();
            input.retain(|c| seen.insert(c.id));
            dropped.insert("duplicate".to_string(), before - input.len());
        }

        if self.has_rule("block") {
            if let Some(user_id) = ctx.user_id {
                let before = input.len();
                let blocked = ctx.db.user_blocked_items(user_id).await?;
                input.retain(|c| !blocked.contains(&c.id));
                dropped.insert("block".to_string(), before - input.len());
            }
        }

        if self.has_rule("low_quality") {
            let before = input.len();
            input.retain(|c| c.match_score.unwrap_or(0.0) >= self.quality_threshold);
            dropped.insert("low_quality".to_string(), before - input.len());
        }

        if self.has_rule("sensitive") {
            let before = input.len();
            input.retain(|c| !c.is_sensitive);
            dropped.insert("sensitive".to_string(), before - input.len());
        }

        if let Some(node_id) = &ctx.node_id {
            let detail: serde_json::Map<String, Value> =
                dropped.into_iter().map(|(k, v)| (k, Value::from(v))).collect();
            ctx.trace.add_node_detail(node_id, "dropped_counts", Value::Object(detail));
        }

        debug!(node_id = %self.node_id, count = input.len(), "basic filter");
        Ok(input)
    }
}
