use async_trait::async_trait;
use chrono::{Datelike, Timelike, Utc};
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, FeatureValue, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::string_vec_or;
use crate::framework::{Node, RankNode};

/// Annotates each candidate with a `features` map grouped by prefix
/// (`user_*`, `item_*`, `ctx_*`, `cross_*`). No model I/O happens here —
/// this node only prepares inputs for a downstream ranker.
pub struct FeatureExtractNode {
    node_id: String,
    enabled: bool,
    feature_groups: Vec<String>,
}

impl FeatureExtractNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            feature_groups: string_vec_or(
                &config.params,
                "feature_groups",
                vec!["user".into(), "item".into(), "context".into(), "cross".into()],
            ),
        })
    }

    fn has_group(&self, name: &str) -> bool {
        self.feature_groups.iter().any(|g| g == name)
    }
}

impl Node for FeatureExtractNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "FeatureExtractNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RankNode for FeatureExtractNode {
    async fn rank(&self, mut input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        // Stand-ins for a real feature store: a production deployment
        // replaces this with a lookup keyed by `ctx.user_id`.
        let user_activity_level = 0.8_f64;
        let user_preference_diversity = 0.6_f64;

        let now = Utc::now();
        let hour_of_day = now.hour() as f64;
        let day_of_week = now.weekday().num_days_from_monday() as f64;

        for c in &mut input {
            let mut features = std::collections::HashMap::new();

            if ctx.user_id.is_some() && self.has_group("user") {
                features.insert("user_activity_level".to_string(), FeatureValue::Num(user_activity_level));
                features.insert(
                    "user_preference_diversity".to_string(),
                    FeatureValue::Num(user_preference_diversity),
                );
            }

            let mut is_recent = false;
            if self.has_group("item") {
                features.insert("item_kind".to_string(), FeatureValue::Text(c.kind.to_string()));
                features.insert("item_tag_count".to_string(), FeatureValue::Num(c.tags.len() as f64));
                if let Some(created) = c.created_at {
                    let days = (now - created).num_milliseconds() as f64 / 86_400_000.0;
                    is_recent = days < 7.0;
                    features.insert("item_days_since_creation".to_string(), FeatureValue::Num(days));
                    features.insert("item_is_recent".to_string(), FeatureValue::Bool(is_recent));
                }
            }

            if self.has_group("context") {
                features.insert("ctx_hour_of_day".to_string(), FeatureValue::Num(hour_of_day));
                features.insert("ctx_day_of_week".to_string(), FeatureValue::Num(day_of_week));
                features.insert("ctx_scene".to_string(), FeatureValue::Text(ctx.scene.clone()));
                features.insert(
                    "ctx_device".to_string(),
                    FeatureValue::Text(ctx.device.clone().unwrap_or_else(|| "unknown".to_string())),
                );
            }

            if self.has_group("cross") && ctx.user_id.is_some() {
                features.insert(
                    "cross_activity_x_recency".to_string(),
                    FeatureValue::Num(user_activity_level * if is_recent { 1.0 } else { 0.0 }),
                );
            }

            c.features = features;
        }

        debug!(node_id = %self.node_id, count = input.len(), "feature extraction");
        Ok(input)
    }
}
