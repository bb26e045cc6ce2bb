use async_trait::async_trait;
use chrono::{Duration, Utc};
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{string_or, string_vec_or};
use crate::framework::{FilterNode, Node};

/// Drops candidates the user already touched (by event type) within a
/// trailing time window. A no-op for anonymous users.
pub struct UserHistoryFilterNode {
    node_id: String,
    enabled: bool,
    event_types: Vec<String>,
    time_window: String,
}

impl UserHistoryFilterNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            event_types: string_vec_or(
                &config.params,
                "event_types",
                vec!["impression".to_string(), "click".to_string()],
            ),
            time_window: string_or(&config.params, "time_window", "7d"),
        })
    }

    /// `h`/`d`/`w` suffixes; unrecognized units fall back to one day.
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
            _ => Duration::days(1),
        }
    }
}

impl Node for UserHistoryFilterNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "UserHistoryFilterNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl FilterNode for UserHistoryFilterNode {
    async fn filter(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        let Some(user_id) = ctx.user_id else {
            return Ok(input);
        };
        if input.is_empty() {
            return Ok(input);
        }

        let since = Utc::now() - Self::parse_time_window(&self.time_window);
        let history = ctx.db.user_history_items(user_id, &self.event_types, since).await?;

        let filtered: Vec<Candidate> = input.into_iter().filter(|c| !history.contains(&c.id)).collect();

        debug!(node_id = %self.node_id, count = filtered.len(), "user history filter");
        Ok(filtered)
    }
}
