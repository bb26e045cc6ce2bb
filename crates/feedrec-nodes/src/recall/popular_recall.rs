use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use feedrec_core::error::Result;
use feedrec_core::traits::EventWeights;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{f64_map_or, string_or};
use crate::framework::{Node, RecallNode};

/// Aggregates events within a time window into a popularity score, weighted
/// per event type.
pub struct PopularRecallNode {
    node_id: String,
    enabled: bool,
    recall_size: usize,
    time_window: String,
    weights: HashMap<String, f64>,
}

impl PopularRecallNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        let defaults: HashMap<String, f64> = [
            ("pv".to_string(), 1.0),
            ("like".to_string(), 3.0),
            ("comment".to_string(), 5.0),
            ("share".to_string(), 7.0),
            ("favorite".to_string(), 10.0),
        ]
        .into_iter()
        .collect();

        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            recall_size: crate::config_util::usize_or(&config.params, "recall_size", 100),
            time_window: string_or(&config.params, "time_window", "1d"),
            weights: f64_map_or(&config.params, "weights", defaults),
        })
    }

    /// Accepts `h`(ours)/`d`(ays)/`w`(eeks)/`m`(inutes) suffixes; falls back
    /// to one day on anything unrecognized, matching the original parser's
    /// explicit fallback.
    fn parse_time_window(window: &str) -> Duration {
        if window.len() < 2 {
            return Duration::days(1);
        }
        let (value_part, unit) = window.split_at(window.len() - 1);
        let value: i64 = value_part.parse().unwrap_or(1);
        match unit {
            "h" => Duration::hours(value),
            "d" => Duration::days(value),
            "w" => Duration::weeks(value),
            "m" => Duration::minutes(value),
            _ => Duration::days(1),
        }
    }
}

impl Node for PopularRecallNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "PopularRecallNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RecallNode for PopularRecallNode {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let window_start = Utc::now() - Self::parse_time_window(&self.time_window);
        let weights = EventWeights {
            weights: self.weights.clone(),
        };

        let mut candidates = ctx
            .db
            .popularity_by_window(&weights, window_start, self.recall_size)
            .await?;

        for c in &mut candidates {
            c.recall_type = Some("popular".to_string());
        }

        debug!(node_id = %self.node_id, count = candidates.len(), "popular recall");
        Ok(candidates)
    }
}
