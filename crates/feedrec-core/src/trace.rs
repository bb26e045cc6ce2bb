use serde_json::Value;

/// Status a node record ends up in once it finishes executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Success,
    Error,
    Skipped,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Running => "running",
            NodeStatus::Success => "success",
            NodeStatus::Error => "error",
            NodeStatus::Skipped => "skipped",
        }
    }
}

/// The recording surface every DAG node writes to. `feedrec-trace` supplies
/// the concrete implementation; this trait lives in `feedrec-core` so that
/// `RequestContext` can hold a handle to it without `feedrec-core` depending
/// on the trace crate (trace has no need to know about `Candidate` or any
/// other core domain type, so the dependency only runs one way: trace and
/// nodes both depend on core, not the reverse).
pub trait TraceSink: Send + Sync {
    fn start_node(&self, node_id: &str, node_type: &str);
    fn end_node(&self, node_id: &str, status: NodeStatus, output_count: Option<usize>);
    fn set_node_input_count(&self, node_id: &str, count: usize);
    fn add_node_detail(&self, node_id: &str, key: &str, value: Value);
    fn add_error(&self, node_id: &str, message: &str);
    fn set_global(&self, key: &str, value: Value);
    fn trace_id(&self) -> String;
}
