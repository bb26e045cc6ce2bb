use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config_util::{string_or, usize_or};
use crate::framework::{FilterNode, Node};
use crate::window::sliding_window_filter;

/// Standalone N-out-of-M window cap; shares its algorithm with rerank's own
/// N-out-M pass via [`crate::window::sliding_window_filter`].
pub struct NOutMFilterNode {
    node_id: String,
    enabled: bool,
    n: usize,
    m: usize,
    key: String,
}

impl NOutMFilterNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            n: usize_or(&config.params, "n", 1),
            m: usize_or(&config.params, "m", 5),
            key: string_or(&config.params, "key", "author_id"),
        })
    }

    fn key_value(&self, c: &Candidate) -> Option<String> {
        match self.key.as_str() {
            "author_id" => c.author_id.map(|id| id.to_string()),
            "recall_type" => c.recall_type.clone(),
            "source" => c.source.clone(),
            _ => c.author_id.map(|id| id.to_string()),
        }
    }
}

impl Node for NOutMFilterNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "NOutMFilterNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl FilterNode for NOutMFilterNode {
    async fn filter(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        if self.n == 0 || self.m == 0 || self.n >= self.m {
            warn!(node_id = %self.node_id, n = self.n, m = self.m, "invalid n-out-of-m config, passing through");
            if let Some(node_id) = &ctx.node_id {
                ctx.trace.add_node_detail(node_id, "error", Value::String("invalid_config".to_string()));
            }
            return Ok(input);
        }

        let result = sliding_window_filter(input, self.n, self.m, |c| self.key_value(c));
        debug!(node_id = %self.node_id, count = result.len(), "n-out-of-m filter");
        Ok(result)
    }
}
