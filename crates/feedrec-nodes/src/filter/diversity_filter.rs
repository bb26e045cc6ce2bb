use std::collections::HashMap;

use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{string_vec_or, usize_map_or};
use crate::framework::{FilterNode, Node};

/// Caps how many survivors share a field value, scanning highest-score
/// first so the best candidate for a given key always wins the slot.
pub struct DiversityFilterNode {
    node_id: String,
    enabled: bool,
    diversity_fields: Vec<String>,
    max_items_per_key: HashMap<String, usize>,
}

impl DiversityFilterNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            diversity_fields: string_vec_or(
                &config.params,
                "diversity_fields",
                vec!["tags".to_string(), "author_id".to_string()],
            ),
            max_items_per_key: usize_map_or(
                &config.params,
                "max_items_per_key",
                [("author_id".to_string(), 2), ("tags".to_string(), 3)].into_iter().collect(),
            ),
        })
    }

    fn field_values(field: &str, c: &Candidate) -> Vec<String> {
        if field == "tags" {
            c.tags.clone()
        } else if field == "author_id" {
            c.author_id.map(|id| id.to_string()).into_iter().collect()
        } else {
            Vec::new()
        }
    }
}

impl Node for DiversityFilterNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "DiversityFilterNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl FilterNode for DiversityFilterNode {
    async fn filter(&self, mut input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        input.sort_by(|a, b| {
            b.ranking_score()
                .partial_cmp(&a.ranking_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut field_counts: HashMap<&str, HashMap<String, usize>> = HashMap::new();
        let mut result = Vec::with_capacity(input.len());

        for candidate in input {
            let mut should_keep = true;
            'fields: for field in &self.diversity_fields {
                let max_count = *self.max_items_per_key.get(field).unwrap_or(&2);
                let counts = field_counts.get(field.as_str());
                for value in Self::field_values(field, &candidate) {
                    if counts.and_then(|c| c.get(&value)).copied().unwrap_or(0) >= max_count {
                        should_keep = false;
                        break 'fields;
                    }
                }
            }

            if should_keep {
                for field in &self.diversity_fields {
                    for value in Self::field_values(field, &candidate) {
                        *field_counts.entry(field.as_str()).or_default().entry(value).or_insert(0) += 1;
                    }
                }
                result.push(candidate);
            }
        }

        debug!(node_id = %self.node_id, count = result.len(), "diversity filter");
        Ok(result)
    }
}
