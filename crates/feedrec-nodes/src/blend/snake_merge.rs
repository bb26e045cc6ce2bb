use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use feedrec_core::error::Result;
use feedrec_core::types::{Candidate, NodeConfig, RequestContext};
use indexmap::IndexMap;
use rand::Rng as _;
use serde_json::Value;
use tracing::debug;

use crate::config_util::{bool_or, f64_map_or, f64_or, usize_or};
use crate::framework::{BlendNode, Node};

/// Interleaves multiple recall sources round-robin, weighted by
/// `source_weights`, retiring a source as soon as it has contributed its
/// share — checked *before* popping, so a source with a zero target never
/// sneaks an extra item in (spec.md §4.3.5).
pub struct SnakeMergeNode {
    node_id: String,
    enabled: bool,
    source_weights: HashMap<String, f64>,
    default_weight: f64,
    output_size: usize,
    deduplicate: bool,
    random_start: bool,
}

impl SnakeMergeNode {
    pub fn from_config(node_id: &str, config: &NodeConfig) -> Result<Self> {
        Ok(Self {
            node_id: node_id.to_string(),
            enabled: config.enabled,
            source_weights: f64_map_or(&config.params, "source_weights", HashMap::new()),
            default_weight: f64_or(&config.params, "default_weight", 1.0),
            output_size: usize_or(&config.params, "output_size", 100),
            deduplicate: bool_or(&config.params, "deduplicate", true),
            random_start: bool_or(&config.params, "random_start", true),
        })
    }
}

impl Node for SnakeMergeNode {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn type_name(&self) -> &'static str {
        "SnakeMergeNode"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl BlendNode for SnakeMergeNode {
    async fn blend(&self, inputs: &IndexMap<String, Vec<Candidate>>, ctx: &RequestContext) -> Result<Vec<Candidate>> {
        // Edge-declaration order, as handed down by the engine's `inputs`
        // map — this is the "insertion order" spec.md §4.3.5 falls back to
        // when `random_start=false`.
        let source_names: Vec<String> = inputs
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, _)| k.clone())
            .collect();

        if source_names.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(node_id) = &ctx.node_id {
            for name in &source_names {
                ctx.trace.add_node_detail(
                    node_id,
                    &format!("source_{name}_count"),
                    Value::from(inputs[name].len()),
                );
            }
        }

        let mut queues: HashMap<String, VecDeque<Candidate>> = HashMap::new();
        for name in &source_names {
            queues.insert(name.clone(), inputs[name].clone().into());
        }

        let mut weights: HashMap<String, f64> = HashMap::new();
        for name in &source_names {
            weights.insert(name.clone(), *self.source_weights.get(name).unwrap_or(&self.default_weight));
        }
        let total_weight: f64 = weights.values().sum();
        if total_weight > 0.0 {
            for w in weights.values_mut() {
                *w /= total_weight;
            }
        }

        let mut target_counts: HashMap<String, usize> = HashMap::new();
        let mut remaining = self.output_size;
        for name in &source_names {
            let count = ((self.output_size as f64 * weights[name]) as usize).min(queues[name].len());
            target_counts.insert(name.clone(), count);
            remaining = remaining.saturating_sub(count);
        }

        if remaining > 0 {
            let mut by_size = source_names.clone();
            by_size.sort_by_key(|n| std::cmp::Reverse(queues[n].len()));
            for name in by_size {
                let capacity = queues[&name].len().saturating_sub(target_counts[&name]);
                let additional = remaining.min(capacity);
                if additional > 0 {
                    *target_counts.get_mut(&name).unwrap() += additional;
                    remaining -= additional;
                }
                if remaining == 0 {
                    break;
                }
            }
        }

        if let Some(node_id) = &ctx.node_id {
            for name in &source_names {
                ctx.trace.add_node_detail(node_id, &format!("target_{name}_count"), Value::from(target_counts[name]));
            }
        }

        let mut rotation = source_names.clone();
        if self.random_start && rotation.len() > 1 {
            let start = rand::rng().random_range(0..rotation.len());
            rotation.rotate_left(start);
        }

        let mut result = Vec::with_capacity(self.output_size);
        let mut seen_ids: HashSet<i64> = HashSet::new();
        let mut contributed: HashMap<String, usize> = HashMap::new();
        let mut active = rotation;

        while result.len() < self.output_size && !active.is_empty() {
            let mut next_active = Vec::with_capacity(active.len());

            for source in active {
                if result.len() >= self.output_size {
                    next_active.push(source);
                    continue;
                }

                let target = *target_counts.get(&source).unwrap_or(&0);
                if *contributed.get(&source).unwrap_or(&0) >= target {
                    // Target already met (including a target of zero):
                    // retire without ever popping from this source.
                    continue;
                }

                let Some(mut candidate) = queues.get_mut(&source).and_then(VecDeque::pop_front) else {
                    continue;
                };

                if self.deduplicate && !seen_ids.insert(candidate.id) {
                    next_active.push(source);
                    continue;
                }

                candidate.source = Some(source.clone());
                let count = contributed.entry(source.clone()).or_insert(0);
                *count += 1;
                result.push(candidate);

                if *count < target {
                    next_active.push(source);
                }
            }

            active = next_active;
        }

        result.truncate(self.output_size);

        if let Some(node_id) = &ctx.node_id {
            let mut final_counts: HashMap<&str, usize> = HashMap::new();
            for c in &result {
                *final_counts.entry(c.source.as_deref().unwrap_or("unknown")).or_insert(0) += 1;
            }
            for (source, count) in final_counts {
                ctx.trace.add_node_detail(node_id, &format!("final_{source}_count"), Value::from(count));
            }
        }

        debug!(node_id = %self.node_id, count = result.len(), "snake merge blend");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrec_core::traits::DataGateway;
    use feedrec_core::types::ItemKind;
    use std::collections::HashSet as StdHashSet;
    use std::sync::Arc;

    fn candidate(id: i64) -> Candidate {
        Candidate::new(id, ItemKind::Content)
    }

    struct NoopGateway;

    #[async_trait]
    impl DataGateway for NoopGateway {
        async fn sample_items(&self, _kinds: &[ItemKind], _limit: usize, _seed: Option<u64>) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn load_user(&self, _id: i64) -> Result<Option<feedrec_core::types::UserProfile>> {
            Ok(None)
        }
        async fn query_items_by_tag_overlap(
            &self,
            _tags: &[String],
            _kinds: &[ItemKind],
            _limit: usize,
        ) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn popularity_by_window(
            &self,
            _event_types: &feedrec_core::traits::EventWeights,
            _window_start: chrono::DateTime<chrono::Utc>,
            _limit: usize,
        ) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn load_user_embedding(&self, _id: i64) -> Result<Option<Vec<f32>>> {
            Ok(None)
        }
        async fn nearest_items(
            &self,
            _vector: &[f32],
            _metric: feedrec_core::traits::SimilarityMetric,
            _limit: usize,
        ) -> Result<Vec<feedrec_core::traits::ScoredItem>> {
            Ok(Vec::new())
        }
        async fn multi_hop_items(
            &self,
            _user_id: i64,
            _hops: &feedrec_core::traits::HopWeights,
            _limit: usize,
        ) -> Result<Vec<feedrec_core::traits::ScoredItem>> {
            Ok(Vec::new())
        }
        async fn query_items_by_kind(&self, _kind: ItemKind, _limit: usize) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn user_blocked_items(&self, _user_id: i64) -> Result<StdHashSet<i64>> {
            Ok(StdHashSet::new())
        }
        async fn user_history_items(
            &self,
            _user_id: i64,
            _event_types: &[String],
            _since: chrono::DateTime<chrono::Utc>,
        ) -> Result<StdHashSet<i64>> {
            Ok(StdHashSet::new())
        }
        async fn fetch_items(&self, _ids: &[i64]) -> Result<Vec<Candidate>> {
            Ok(Vec::new())
        }
        async fn begin(&self) -> Result<()> {
            Ok(())
        }
        async fn commit(&self) -> Result<()> {
            Ok(())
        }
        async fn rollback(&self) -> Result<()> {
            Ok(())
        }
    }

    fn test_context() -> RequestContext {
        RequestContext {
            db: Arc::new(NoopGateway),
            user_id: None,
            count: 10,
            offset: 0,
            scene: "feed".to_string(),
            slot: None,
            device: None,
            geo: None,
            ab: None,
            debug: false,
            trace: Arc::new(feedrec_trace::TraceRecorder::new()),
            dag_id: None,
            node_id: None,
            inputs: IndexMap::new(),
            primary_input: Vec::new(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    #[test]
    fn retires_zero_target_source_before_popping() {
        // content: c1..c4 (weight 0.8), ad: a1 (weight 0.2), product: p1 (weight 0.0)
        // output_size 5 yields target_counts content=4, ad=1, product=0 -- product
        // must never appear even though it has one item queued.
        let mut target_counts: HashMap<String, usize> = HashMap::new();
        target_counts.insert("content".to_string(), 4);
        target_counts.insert("ad".to_string(), 1);
        target_counts.insert("product".to_string(), 0);

        let mut queues: HashMap<String, VecDeque<Candidate>> = HashMap::new();
        queues.insert(
            "content".to_string(),
            vec![candidate(101), candidate(102), candidate(103), candidate(104)].into(),
        );
        queues.insert("ad".to_string(), vec![candidate(201)].into());
        queues.insert("product".to_string(), vec![candidate(301)].into());

        let mut active = vec!["content".to_string(), "ad".to_string(), "product".to_string()];
        let mut contributed: HashMap<String, usize> = HashMap::new();
        let mut result = Vec::new();

        while result.len() < 5 && !active.is_empty() {
            let mut next_active = Vec::new();
            for source in active {
                let target = *target_counts.get(&source).unwrap_or(&0);
                if *contributed.get(&source).unwrap_or(&0) >= target {
                    continue;
                }
                let Some(c) = queues.get_mut(&source).and_then(VecDeque::pop_front) else {
                    continue;
                };
                let count = contributed.entry(source.clone()).or_insert(0);
                *count += 1;
                result.push(c.id);
                if *count < target {
                    next_active.push(source);
                }
            }
            active = next_active;
        }

        assert!(!result.contains(&301), "zero-target source must never contribute an item");
        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn respects_edge_declaration_order_when_random_start_is_off() {
        // Sources {content:[c1..c5], ad:[a1,a2], product:[p1]}, weights
        // {content:0.6, ad:0.3, product:0.1}, output_size=5, random_start=false,
        // deduplicate=true. Targets: content=3, ad=1, product=0; one leftover
        // slot goes to the largest pool (content) -> content=4, ad=1. Rotation
        // starts at "content" because that's the first source declared, not
        // the alphabetically-first one ("ad").
        let mut inputs: IndexMap<String, Vec<Candidate>> = IndexMap::new();
        inputs.insert(
            "content".to_string(),
            vec![candidate(1), candidate(2), candidate(3), candidate(4), candidate(5)],
        );
        inputs.insert("ad".to_string(), vec![candidate(11), candidate(12)]);
        inputs.insert("product".to_string(), vec![candidate(21)]);

        let mut source_weights = HashMap::new();
        source_weights.insert("content".to_string(), 0.6);
        source_weights.insert("ad".to_string(), 0.3);
        source_weights.insert("product".to_string(), 0.1);

        let node = SnakeMergeNode {
            node_id: "blend".to_string(),
            enabled: true,
            source_weights,
            default_weight: 1.0,
            output_size: 5,
            deduplicate: true,
            random_start: false,
        };

        let ctx = test_context();
        let result = node.blend(&inputs, &ctx).await.unwrap();
        let ids: Vec<i64> = result.iter().map(|c| c.id).collect();

        assert_eq!(ids, vec![1, 11, 2, 3, 4]);
    }
}
