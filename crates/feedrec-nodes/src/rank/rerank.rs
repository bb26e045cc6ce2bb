use std::collections::HashMap;

use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use tracing::debug;

use crate::config_util::{bool_or, f64_or, string_or, string_vec_or, usize_map_or, usize_or};
use crate::framework::{Node, RankNode};
use crate::window::sliding_window_filter;

struct NOutM {
    enabled: bool,
    n: usize,
    m: usize,
    key: String,
}

/// Diversity-aware greedy rerank (MMR-style), followed by an optional
/// N-out-of-M window pass over the reranked order (spec.md §4.3.4).
pub struct ReRankNode {
    node_id: String,
    enabled: bool,
    rank_size: usize,
    diversity_weight: f64,
    diversity_fields: Vec<String>,
    max_items_per_key: HashMap<String, usize>,
    n_out_m: NOutM,
}

impl ReRankNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        let n_out_m_cfg = config
            .params
            .get("n_out_m")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();

        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            rank_size: usize_or(&config.params, "rank_size", 100),
            diversity_weight: f64_or(&config.params, "diversity_weight", 0.2),
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
            n_out_m: NOutM {
                enabled: n_out_m_cfg.get("enabled").and_then(|v| v.as_bool()).unwrap_or(false),
                n: n_out_m_cfg.get("n").and_then(|v| v.as_u64()).unwrap_or(1) as usize,
                m: n_out_m_cfg.get("m").and_then(|v| v.as_u64()).unwrap_or(5) as usize,
                key: n_out_m_cfg
                    .get("key")
                    .and_then(|v| v.as_str())
                    .unwrap_or("author_id")
                    .to_string(),
            },
        })
    }

    /// One field's values for a candidate: tag fields expand to every tag,
    /// scalar fields (author_id) to a single value.
    fn field_values(field: &str, c: &Candidate) -> Vec<String> {
        if field == "tags" {
            c.tags.clone()
        } else if field == "author_id" {
            c.author_id.map(|id| id.to_string()).into_iter().collect()
        } else {
            Vec::new()
        }
    }

    fn penalty(&self, c: &Candidate, counts: &HashMap<&str, HashMap<String, usize>>) -> f64 {
        let mut penalty = 0.0;
        for field in &self.diversity_fields {
            let max_count = *self.max_items_per_key.get(field).unwrap_or(&2);
            let values = Self::field_values(field, c);
            if values.is_empty() {
                continue;
            }
            let field_counts = counts.get(field.as_str());
            if field == "tags" {
                let mut overlap = 0usize;
                for v in &values {
                    if field_counts.and_then(|fc| fc.get(v)).copied().unwrap_or(0) >= max_count {
                        overlap += 1;
                    }
                }
                penalty += overlap as f64 / values.len() as f64;
            } else {
                for v in &values {
                    if field_counts.and_then(|fc| fc.get(v)).copied().unwrap_or(0) >= max_count {
                        penalty += 1.0;
                    }
                }
            }
        }
        penalty
    }

    fn record_selection<'a>(&'a self, c: &Candidate, counts: &mut HashMap<&'a str, HashMap<String, usize>>) {
        for field in &self.diversity_fields {
            for v in Self::field_values(field, c) {
                *counts.entry(field.as_str()).or_default().entry(v).or_insert(0) += 1;
            }
        }
    }

    fn diversity_rerank(&self, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }

        candidates.sort_by(|a, b| {
            b.original_score
                .unwrap_or(0.0)
                .partial_cmp(&a.original_score.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut remaining: Vec<Candidate> = candidates;
        let mut result = vec![remaining.remove(0)];
        let mut counts: HashMap<&str, HashMap<String, usize>> = HashMap::new();
        self.record_selection(&result[0], &mut counts);

        while !remaining.is_empty() && result.len() < self.rank_size {
            let mut best_index = None;
            let mut best_score = f64::NEG_INFINITY;

            for (i, item) in remaining.iter().enumerate() {
                let penalty = self.penalty(item, &counts);
                let score = item.original_score.unwrap_or(0.0) - penalty * self.diversity_weight;
                if score > best_score {
                    best_score = score;
                    best_index = Some(i);
                }
            }

            let Some(idx) = best_index else { break };
            let chosen = remaining.remove(idx);
            self.record_selection(&chosen, &mut counts);
            result.push(chosen);
        }

        result
    }
}

impl Node for ReRankNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "ReRankNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl RankNode for ReRankNode {
    async fn rank(&self, mut input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        if input.is_empty() {
            return Ok(input);
        }

        for (i, c) in input.iter_mut().enumerate() {
            c.original_score = Some(c.ranking_score());
            c.original_position = Some(i);
        }

        let mut reranked = if self.diversity_weight > 0.0 {
            self.diversity_rerank(input)
        } else {
            input
        };

        if self.n_out_m.enabled {
            reranked = sliding_window_filter(reranked, self.n_out_m.n, self.n_out_m.m, |c| match self.n_out_m.key.as_str() {
                "author_id" => c.author_id.map(|id| id.to_string()),
                "recall_type" => c.recall_type.clone(),
                "source" => c.source.clone(),
                _ => c.author_id.map(|id| id.to_string()),
            });
        }

        for (i, c) in reranked.iter_mut().enumerate() {
            c.rerank_score = c.original_score;
            c.final_position = Some(i);
        }

        let _ = &ctx.node_id;
        debug!(node_id = %self.node_id, count = reranked.len(), "rerank");
        Ok(reranked)
    }
}
