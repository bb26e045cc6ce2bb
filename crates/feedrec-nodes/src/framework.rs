//! The node contract every concrete node implements, plus the
//! `safe_process` wrapper that turns a node's `Result` into the
//! trace-recorded, degrade-on-failure behavior the engine relies on.

use async_trait::async_trait;
use feedrec_core::error::{FeedRecError, Result};
use feedrec_core::trace::NodeStatus;
use feedrec_core::types::{Candidate, FeedItem, RequestContext};
use indexmap::IndexMap;
use tracing::{error, warn};

/// What a node produced. Most specializations produce candidates; only a
/// transform node's output can differ in shape.
#[derive(Debug, Clone)]
pub enum NodeOutput {
    Candidates(Vec<Candidate>),
    Items(Vec<FeedItem>),
}

impl NodeOutput {
    pub fn len(&self) -> usize {
        match self {
            NodeOutput::Candidates(v) => v.len(),
            NodeOutput::Items(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_candidates(self) -> Vec<Candidate> {
        match self {
            NodeOutput::Candidates(v) => v,
            NodeOutput::Items(_) => Vec::new(),
        }
    }

    pub fn as_candidates(&self) -> Option<&[Candidate]> {
        match self {
            NodeOutput::Candidates(v) => Some(v),
            NodeOutput::Items(_) => None,
        }
    }

    pub fn into_items(self) -> Vec<FeedItem> {
        match self {
            NodeOutput::Items(v) => v,
            NodeOutput::Candidates(_) => Vec::new(),
        }
    }
}

/// Identity every node carries regardless of specialization.
pub trait Node: Send + Sync {
    fn node_id(&self) -> &str;
    fn type_name(&self) -> &'static str;
    fn enabled(&self) -> bool;
}

#[async_trait]
pub trait RecallNode: Node {
    async fn recall(&self, ctx: &RequestContext) -> Result<Vec<Candidate>>;
}

#[async_trait]
pub trait RankNode: Node {
    async fn rank(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>>;
}

#[async_trait]
pub trait FilterNode: Node {
    async fn filter(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<Candidate>>;
}

#[async_trait]
pub trait BlendNode: Node {
    async fn blend(
        &self,
        inputs: &IndexMap<String, Vec<Candidate>>,
        ctx: &RequestContext,
    ) -> Result<Vec<Candidate>>;
}

#[async_trait]
pub trait TransformNode: Node {
    async fn transform(&self, input: Vec<Candidate>, ctx: &RequestContext) -> Result<Vec<FeedItem>>;
}

/// The engine stores one of these per node id and dispatches `safe_process`
/// through it — this is what resolves the "what shape of input does each
/// specialization get" ambiguity: blend sees the whole map, everything else
/// sees `ctx.primary_input`.
pub enum DynNode {
    Recall(Box<dyn RecallNode>),
    Rank(Box<dyn RankNode>),
    Filter(Box<dyn FilterNode>),
    Blend(Box<dyn BlendNode>),
    Transform(Box<dyn TransformNode>),
}

impl DynNode {
    fn as_node(&self) -> &dyn Node {
        match self {
            DynNode::Recall(n) => n.as_ref(),
            DynNode::Rank(n) => n.as_ref(),
            DynNode::Filter(n) => n.as_ref(),
            DynNode::Blend(n) => n.as_ref(),
            DynNode::Transform(n) => n.as_ref(),
        }
    }

    pub fn node_id(&self) -> &str {
        self.as_node().node_id()
    }

    pub fn type_name(&self) -> &'static str {
        self.as_node().type_name()
    }

    pub fn enabled(&self) -> bool {
        self.as_node().enabled()
    }

    /// Runs the node, converting any internal failure into the degraded
    /// "return the input unchanged" output rather than propagating it —
    /// the caller (the DAG engine) always gets *some* output for this node.
    pub async fn safe_process(&self, ctx: &RequestContext) -> NodeOutput {
        if !self.enabled() {
            // A disabled node never touches the trace (matching the record
            // it would have needed is never opened), and passes its input
            // through untouched. For transform specializations there is no
            // type-preserving identity (Candidate != FeedItem), so a
            // disabled transform degrades to an empty list.
            return match self {
                DynNode::Transform(_) => NodeOutput::Items(Vec::new()),
                _ => NodeOutput::Candidates(ctx.primary_input.clone()),
            };
        }

        let node_id = self.node_id().to_string();
        ctx.trace.start_node(&node_id, self.type_name());
        ctx.trace.set_node_input_count(&node_id, ctx.primary_input.len());

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(FeedRecError::Cancelled),
            result = self.run(ctx) => result,
        };

        match outcome {
            Ok(output) => {
                ctx.trace
                    .end_node(&node_id, NodeStatus::Success, Some(output.len()));
                output
            }
            Err(err) => {
                error!(node_id = %node_id, error = %err, "node execution failed");
                ctx.trace.add_error(&node_id, &err.to_string());
                ctx.trace.end_node(&node_id, NodeStatus::Error, None);

                if let Err(rollback_err) = ctx.db.rollback().await {
                    warn!(node_id = %node_id, error = %rollback_err, "rollback after node failure also failed");
                }

                NodeOutput::Candidates(ctx.primary_input.clone())
            }
        }
    }

    async fn run(&self, ctx: &RequestContext) -> Result<NodeOutput> {
        match self {
            DynNode::Recall(n) => n.recall(ctx).await.map(NodeOutput::Candidates),
            DynNode::Rank(n) => n
                .rank(ctx.primary_input.clone(), ctx)
                .await
                .map(NodeOutput::Candidates),
            DynNode::Filter(n) => n
                .filter(ctx.primary_input.clone(), ctx)
                .await
                .map(NodeOutput::Candidates),
            DynNode::Blend(n) => n.blend(&ctx.inputs, ctx).await.map(NodeOutput::Candidates),
            DynNode::Transform(n) => n
                .transform(ctx.primary_input.clone(), ctx)
                .await
                .map(NodeOutput::Items),
        }
    }
}

/// Helper every node's constructor uses to enforce "required config raises
/// synchronously at construction" (spec.md §4.2): look up a JSON field, or
/// a default if the caller opted not to require it.
pub fn require_field<'a>(
    params: &'a serde_json::Map<String, serde_json::Value>,
    node_id: &str,
    field: &str,
) -> Result<&'a serde_json::Value> {
    params
        .get(field)
        .ok_or_else(|| FeedRecError::Configuration(format!("node {node_id} missing required field: {field}")))
}
