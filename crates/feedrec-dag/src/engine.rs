//! Execution: entry-first recursive traversal with a cycle guard, per-node
//! input assembly, and optional sibling parallelism (spec.md §4.4).

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use feedrec_core::error::{FeedRecError, Result};
use feedrec_core::types::{Candidate, RequestContext};
use feedrec_nodes::framework::{DynNode, NodeOutput};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::graph_def::GraphDefinition;
use crate::registry::NodeRegistry;

/// A graph definition with its nodes constructed and ready to run.
pub struct Dag {
    pub dag_id: String,
    definition: GraphDefinition,
    nodes: HashMap<String, Arc<DynNode>>,
}

impl Dag {
    pub fn build(dag_id: String, definition: GraphDefinition, registry: &NodeRegistry) -> Result<Self> {
        let mut nodes = HashMap::new();
        for (id, config) in &definition.nodes {
            let node = registry.build(id, config)?;
            nodes.insert(id.clone(), Arc::new(node));
        }
        Ok(Self { dag_id, definition, nodes })
    }

    pub fn terminal_node(&self) -> Option<&str> {
        self.definition.terminal_node.as_deref()
    }

    /// Entry point: `execute(context) → map[node-id]→output` (spec.md §4.4).
    pub async fn execute(&self, ctx: &RequestContext) -> Result<HashMap<String, NodeOutput>> {
        if let Some(user_id) = ctx.user_id {
            ctx.trace.set_global("user_id", Value::from(user_id));
        }

        let results: Mutex<HashMap<String, NodeOutput>> = Mutex::new(HashMap::new());
        let visited: AsyncMutex<HashSet<String>> = AsyncMutex::new(HashSet::new());

        let outcome = async {
            for entry in &self.definition.entry_nodes {
                self.execute_node(entry, ctx, &results, &visited).await?;
            }
            Ok::<(), FeedRecError>(())
        }
        .await;

        match outcome {
            Ok(()) => {
                ctx.trace.set_global("status", Value::String("success".to_string()));
            }
            Err(err) => {
                ctx.trace.set_global("status", Value::String("error".to_string()));
                return Err(err);
            }
        }

        Ok(results.into_inner())
    }

    fn execute_node<'a>(
        &'a self,
        node_id: &'a str,
        ctx: &'a RequestContext,
        results: &'a Mutex<HashMap<String, NodeOutput>>,
        visited: &'a AsyncMutex<HashSet<String>>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut guard = visited.lock().await;
                if guard.contains(node_id) {
                    return Ok(());
                }
                guard.insert(node_id.to_string());
            }

            let node = self
                .nodes
                .get(node_id)
                .ok_or_else(|| FeedRecError::NodeNotFound(node_id.to_string()))?;

            let incoming = self.definition.incoming_edges(node_id);

            let mut pending = Vec::new();
            for &src in &incoming {
                let already_visited = visited.lock().await.contains(src);
                if !already_visited {
                    pending.push(self.execute_node(src, ctx, results, visited));
                }
            }
            for fut in pending {
                fut.await?;
            }

            let mut inputs: IndexMap<String, Vec<Candidate>> = IndexMap::new();
            let mut primary_input: Vec<Candidate> = Vec::new();
            {
                let guard = results.lock();
                for &src in &incoming {
                    if let Some(output) = guard.get(src) {
                        if let Some(candidates) = output.as_candidates() {
                            inputs.insert(src.to_string(), candidates.to_vec());
                            primary_input.extend_from_slice(candidates);
                        }
                    }
                }
            }

            let node_ctx = ctx.with_node(node_id.to_string(), inputs, primary_input);
            let output = node.safe_process(&node_ctx).await;
            debug!(dag_id = %self.dag_id, node_id, output_count = output.len(), "node executed");

            results.lock().insert(node_id.to_string(), output);

            let outgoing = self.definition.outgoing_edges(node_id);
            let mut pending = Vec::with_capacity(outgoing.len());
            for target in outgoing {
                pending.push(self.execute_node(target, ctx, results, visited));
            }
            for fut in pending {
                fut.await?;
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrec_core::trace::NodeStatus;
    use feedrec_core::types::ItemKind;
    use feedrec_trace::TraceRecorder;
    use std::sync::Arc as StdArc;

    struct EmptyGateway;

    #[async_trait::async_trait]
    impl feedrec_core::traits::DataGateway for EmptyGateway {
        async fn sample_items(
            &self,
            _kinds: &[ItemKind],
            limit: usize,
            _seed: Option<u64>,
        ) -> Result<Vec<Candidate>> {
            Ok((0..limit.min(3))
                .map(|i| Candidate::new(i as i64, ItemKind::Content))
                .collect())
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
        async fn user_blocked_items(&self, _user_id: i64) -> Result<HashSet<i64>> {
            Ok(HashSet::new())
        }
        async fn user_history_items(
            &self,
            _user_id: i64,
            _event_types: &[String],
            _since: chrono::DateTime<chrono::Utc>,
        ) -> Result<HashSet<i64>> {
            Ok(HashSet::new())
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
            db: StdArc::new(EmptyGateway),
            user_id: None,
            count: 10,
            offset: 0,
            scene: "feed".to_string(),
            slot: None,
            device: None,
            geo: None,
            ab: None,
            debug: false,
            trace: StdArc::new(TraceRecorder::new()),
            dag_id: None,
            node_id: None,
            inputs: IndexMap::new(),
            primary_input: Vec::new(),
            cancellation: tokio_util::sync::CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn executes_a_simple_two_node_chain() {
        let definition: GraphDefinition = serde_json::from_value(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode", "recall_size": 3},
                "format": {"type": "ResponseFormatNode"}
            },
            "edges": {"recall": ["format"]}
        }))
        .unwrap();

        let dag = Dag::build("feed_rec".to_string(), definition, &NodeRegistry::with_builtin_nodes()).unwrap();
        let ctx = test_context();
        let results = dag.execute(&ctx).await.unwrap();

        assert_eq!(results.get("recall").unwrap().len(), 3);
        assert_eq!(results.get("format").unwrap().len(), 3);

        let snapshot = ctx.trace.trace_id();
        assert!(!snapshot.is_empty());
    }

    #[tokio::test]
    async fn unknown_node_reference_is_a_pipeline_error() {
        let mut definition: GraphDefinition = serde_json::from_value(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {"recall": {"type": "RandomRecallNode"}},
            "edges": {}
        }))
        .unwrap();
        definition.entry_nodes.push("ghost".to_string());

        // Bypass validate() to exercise the runtime NodeNotFound path directly.
        let dag = Dag {
            dag_id: "broken".to_string(),
            definition,
            nodes: HashMap::new(),
        };
        let ctx = test_context();
        assert!(dag.execute(&ctx).await.is_err());
    }

    #[test]
    fn node_status_as_str_round_trips_for_success() {
        assert_eq!(NodeStatus::Success.as_str(), "success");
    }
}
