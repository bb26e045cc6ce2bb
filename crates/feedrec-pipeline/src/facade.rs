//! The single public entry point an embedder calls: `get_recommended_items`.
//! Loads no DAGs itself (that's `PipelineRuntime`'s job at startup); picks
//! the `feed_rec` graph, runs it, and degrades to a random recall on any
//! failure along the way — exactly the fallback shape spec.md §4.5 describes.

use std::sync::Arc;

use feedrec_core::error::{FeedRecError, Result};
use feedrec_core::traits::DataGateway;
use feedrec_core::trace::TraceSink;
use feedrec_core::types::{Candidate, FeedItem, NodeConfig, RequestContext};
use feedrec_nodes::framework::{NodeOutput, RecallNode, TransformNode};
use feedrec_nodes::recall::RandomRecallNode;
use feedrec_nodes::transform::ResponseFormatNode;
use feedrec_trace::TraceRecorder;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::runtime::PipelineRuntime;

pub const FEED_REC_DAG_ID: &str = "feed_rec";

/// Targeting context the caller supplies alongside user/paging (spec.md
/// §3.3's `sceneCtx`). `scene` has no default since a caller always knows
/// which surface it is serving; everything else is optional targeting.
#[derive(Debug, Clone)]
pub struct SceneContext {
    pub scene: String,
    pub slot: Option<String>,
    pub device: Option<String>,
    pub geo: Option<String>,
    pub ab: Option<String>,
    pub debug: bool,
}

impl Default for SceneContext {
    fn default() -> Self {
        Self {
            scene: "feed".to_string(),
            slot: None,
            device: None,
            geo: None,
            ab: None,
            debug: false,
        }
    }
}

/// `getRecommendedItems(db, userId, count, offset, sceneCtx)` (spec.md
/// §4.5 / §6.3). Never returns an error to the caller: every failure path
/// degrades to a best-effort random recall rather than propagating.
pub async fn get_recommended_items(
    runtime: &PipelineRuntime,
    db: Arc<dyn DataGateway>,
    user_id: Option<i64>,
    count: usize,
    offset: usize,
    scene_ctx: SceneContext,
) -> Vec<FeedItem> {
    let trace = Arc::new(TraceRecorder::new());
    trace.set_user_id(user_id);

    let ctx = RequestContext {
        db: db.clone(),
        user_id,
        count,
        offset,
        scene: scene_ctx.scene,
        slot: scene_ctx.slot,
        device: scene_ctx.device,
        geo: scene_ctx.geo,
        ab: scene_ctx.ab,
        debug: scene_ctx.debug,
        trace: trace.clone(),
        dag_id: Some(FEED_REC_DAG_ID.to_string()),
        node_id: None,
        inputs: indexmap::IndexMap::new(),
        primary_input: Vec::new(),
        cancellation: CancellationToken::new(),
    };

    let Some(dag) = runtime.get(FEED_REC_DAG_ID) else {
        warn!(dag_id = FEED_REC_DAG_ID, "dag not found, degrading to random recall");
        trace.set_global("dag_lookup", Value::String("not_found".to_string()));
        let items = run_fallback(&ctx).await.unwrap_or_default();
        trace.complete("fallback");
        return items;
    };

    match run_pipeline(dag, &ctx).await {
        Ok(items) => {
            trace.complete("success");
            items
        }
        Err(err) => {
            error!(error = %err, "pipeline execution failed, degrading to random recall");
            if let Err(rollback_err) = db.rollback().await {
                warn!(error = %rollback_err, "rollback during fallback also failed");
            }
            let items = run_fallback(&ctx).await.unwrap_or_default();
            trace.complete("error");
            items
        }
    }
}

/// Runs the named DAG and selects its output: the configured terminal node
/// if present and non-empty, else `rerank`, else any node whose output is a
/// non-empty list (spec.md §4.4 "Output selection at pipeline level").
async fn run_pipeline(dag: &feedrec_dag::Dag, ctx: &RequestContext) -> Result<Vec<FeedItem>> {
    let results = dag.execute(ctx).await?;

    let preferred = dag.terminal_node().unwrap_or("rerank");
    let mut output = results.get(preferred).filter(|o| !o.is_empty()).cloned();
    if output.is_none() {
        output = results.values().find(|o| !o.is_empty()).cloned();
    }

    let output =
        output.ok_or_else(|| FeedRecError::Pipeline("no node in the dag produced a non-empty output".to_string()))?;

    match output {
        NodeOutput::Items(items) => Ok(paginate(items, ctx)),
        NodeOutput::Candidates(candidates) => format_candidates(paginate(candidates, ctx), ctx).await,
    }
}

async fn run_fallback(ctx: &RequestContext) -> Result<Vec<FeedItem>> {
    let config = NodeConfig { node_type: "RandomRecallNode".to_string(), enabled: true, params: Default::default() };
    let recall_node = RandomRecallNode::from_config("fallback_recall", &config)?;
    let candidates = recall_node.recall(ctx).await?;
    format_candidates(paginate(candidates, ctx), ctx).await
}

async fn format_candidates(candidates: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<FeedItem>> {
    let config = NodeConfig { node_type: "ResponseFormatNode".to_string(), enabled: true, params: Default::default() };
    let node = ResponseFormatNode::from_config("response_format", &config)?;
    node.transform(candidates, ctx).await
}

/// Applies the façade's cursor window (spec.md §6.3: `count`/`offset`) to a
/// node's terminal output, ahead of response-format so positions land
/// 1-indexed within the returned page rather than within the whole pipeline
/// (spec.md §8 invariant 2: `|final list| ≤ count`).
fn paginate<T>(items: Vec<T>, ctx: &RequestContext) -> Vec<T> {
    let mut page: Vec<T> = items.into_iter().skip(ctx.offset).collect();
    page.truncate(ctx.count);
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrec_core::types::ItemKind;
    use feedrec_gateway::InMemoryGateway;
    use std::io::Write;

    fn seeded_gateway() -> Arc<InMemoryGateway> {
        let gw = InMemoryGateway::new();
        for id in 1..=5 {
            gw.seed_item(Candidate::new(id, ItemKind::Content));
        }
        Arc::new(gw)
    }

    fn dag_dir_with(definition: serde_json::Value) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("feed_rec.json")).unwrap();
        write!(f, "{definition}").unwrap();
        dir
    }

    #[tokio::test]
    async fn falls_back_to_random_recall_when_dag_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = PipelineRuntime::load(dir.path()).unwrap();
        let db = seeded_gateway();

        let items = get_recommended_items(&runtime, db, Some(1), 3, 0, SceneContext::default()).await;
        assert!(!items.is_empty());
        assert!(items.len() <= 5);
    }

    #[tokio::test]
    async fn runs_a_minimal_dag_end_to_end() {
        let dir = dag_dir_with(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode", "recall_size": 5}
            },
            "edges": {},
            "terminal_node": "recall"
        }));
        let runtime = PipelineRuntime::load(dir.path()).unwrap();
        let db = seeded_gateway();

        let items = get_recommended_items(&runtime, db, None, 5, 0, SceneContext::default()).await;
        assert!(!items.is_empty());
        assert!(items.iter().all(|i| i.tracking.is_some()));
    }

    fn gateway_with(n: i64) -> Arc<InMemoryGateway> {
        let gw = InMemoryGateway::new();
        for id in 1..=n {
            gw.seed_item(Candidate::new(id, ItemKind::Content));
        }
        Arc::new(gw)
    }

    #[tokio::test]
    async fn truncates_to_count_even_when_the_node_overproduces() {
        let dir = dag_dir_with(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode", "recall_size": 20}
            },
            "edges": {},
            "terminal_node": "recall"
        }));
        let runtime = PipelineRuntime::load(dir.path()).unwrap();
        let db = gateway_with(20);

        let items = get_recommended_items(&runtime, db, None, 4, 0, SceneContext::default()).await;
        assert_eq!(items.len(), 4);
    }

    #[tokio::test]
    async fn offset_shrinks_the_page_and_positions_still_start_at_one() {
        let dir = dag_dir_with(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode", "recall_size": 10}
            },
            "edges": {},
            "terminal_node": "recall"
        }));
        let runtime = PipelineRuntime::load(dir.path()).unwrap();
        let db = gateway_with(10);

        let items = get_recommended_items(&runtime, db, None, 3, 2, SceneContext::default()).await;

        assert_eq!(items.len(), 3);
        assert_eq!(items.first().unwrap().position, 1);
        assert_eq!(items.last().unwrap().position, 3);
    }
}
