//! Per-request trace recording. Every DAG execution carries one
//! [`TraceRecorder`], shared by `Arc` across every node task, accumulating a
//! timeline of per-node start/end/error events that the façade can surface
//! to callers in debug mode.

use std::time::Instant;

use chrono::Utc;
use feedrec_core::trace::{NodeStatus as CoreNodeStatus, TraceSink};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Running,
    Success,
    Error,
    Skipped,
}

impl From<CoreNodeStatus> for NodeStatus {
    fn from(s: CoreNodeStatus) -> Self {
        match s {
            CoreNodeStatus::Running => NodeStatus::Running,
            CoreNodeStatus::Success => NodeStatus::Success,
            CoreNodeStatus::Error => NodeStatus::Error,
            CoreNodeStatus::Skipped => NodeStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeRecord {
    pub node_id: String,
    pub node_type: String,
    #[serde(skip)]
    start: Instant,
    #[serde(skip)]
    end: Option<Instant>,
    pub status: NodeStatus,
    pub input_count: usize,
    pub output_count: usize,
    pub details: IndexMap<String, Value>,
}

impl NodeRecord {
    fn duration_ms(&self) -> Option<i64> {
        self.end.map(|e| e.duration_since(self.start).as_millis() as i64)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub node_id: String,
    pub error_type: String,
    pub error_msg: String,
    pub time_ms_since_start: i64,
}

/// The mutable trace state. Kept private behind [`TraceRecorder`]'s lock so
/// every node, running on its own spawned task, can mutate it concurrently.
#[derive(Debug)]
struct TraceInfo {
    trace_id: String,
    start_time: Instant,
    start_time_wall: chrono::DateTime<Utc>,
    end_time: Option<Instant>,
    end_time_wall: Option<chrono::DateTime<Utc>>,
    user_id: Option<i64>,
    status: String,
    node_infos: IndexMap<String, NodeRecord>,
    global_info: IndexMap<String, Value>,
    errors: Vec<ErrorRecord>,
}

impl TraceInfo {
    fn new(trace_id: Option<String>) -> Self {
        Self {
            trace_id: trace_id.unwrap_or_else(|| format!("trace-{}", uuid::Uuid::new_v4())),
            start_time: Instant::now(),
            start_time_wall: Utc::now(),
            end_time: None,
            end_time_wall: None,
            user_id: None,
            status: "running".to_string(),
            node_infos: IndexMap::new(),
            global_info: IndexMap::new(),
            errors: Vec::new(),
        }
    }
}

/// Thread-safe handle to a single request's trace. Clone-free: share via
/// `Arc<TraceRecorder>` through `RequestContext`.
#[derive(Debug)]
pub struct TraceRecorder {
    inner: Mutex<TraceInfo>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(TraceInfo::new(None)),
        }
    }

    pub fn with_trace_id(trace_id: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(TraceInfo::new(Some(trace_id.into()))),
        }
    }

    pub fn set_user_id(&self, user_id: Option<i64>) {
        self.inner.lock().user_id = user_id;
    }

    /// Marks the trace complete, stamping total duration. `status` is
    /// typically "success" or "error" (the latter when the façade had to
    /// fall back after a pipeline error).
    pub fn complete(&self, status: &str) {
        let mut guard = self.inner.lock();
        let now = Instant::now();
        guard.end_time = Some(now);
        guard.end_time_wall = Some(Utc::now());
        guard.status = status.to_string();
    }

    pub fn total_duration_ms(&self) -> Option<i64> {
        let guard = self.inner.lock();
        guard
            .end_time
            .map(|e| e.duration_since(guard.start_time).as_millis() as i64)
    }

    pub fn node_duration_ms(&self, node_id: &str) -> Option<i64> {
        self.inner.lock().node_infos.get(node_id).and_then(|n| n.duration_ms())
    }

    /// Snapshot of the whole trace, in the shape the façade hands back to
    /// debug-mode callers.
    pub fn snapshot(&self) -> TraceSnapshot {
        let guard = self.inner.lock();
        TraceSnapshot {
            trace_id: guard.trace_id.clone(),
            status: guard.status.clone(),
            user_id: guard.user_id,
            start_time: guard.start_time_wall,
            end_time: guard.end_time_wall,
            total_duration_ms: guard
                .end_time
                .map(|e| e.duration_since(guard.start_time).as_millis() as i64),
            nodes: guard
                .node_infos
                .iter()
                .map(|(id, n)| {
                    (
                        id.clone(),
                        NodeSnapshot {
                            node_id: n.node_id.clone(),
                            node_type: n.node_type.clone(),
                            status: n.status,
                            input_count: n.input_count,
                            output_count: n.output_count,
                            duration_ms: n.duration_ms(),
                            details: n.details.clone(),
                        },
                    )
                })
                .collect(),
            errors: guard.errors.clone(),
            global: guard.global_info.clone(),
        }
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub node_type: String,
    pub status: NodeStatus,
    pub input_count: usize,
    pub output_count: usize,
    pub duration_ms: Option<i64>,
    pub details: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TraceSnapshot {
    pub trace_id: String,
    pub status: String,
    pub user_id: Option<i64>,
    pub start_time: chrono::DateTime<Utc>,
    pub end_time: Option<chrono::DateTime<Utc>>,
    pub total_duration_ms: Option<i64>,
    pub nodes: IndexMap<String, NodeSnapshot>,
    pub errors: Vec<ErrorRecord>,
    pub global: IndexMap<String, Value>,
}

impl TraceSink for TraceRecorder {
    fn start_node(&self, node_id: &str, node_type: &str) {
        let mut guard = self.inner.lock();
        guard.node_infos.insert(
            node_id.to_string(),
            NodeRecord {
                node_id: node_id.to_string(),
                node_type: node_type.to_string(),
                start: Instant::now(),
                end: None,
                status: NodeStatus::Running,
                input_count: 0,
                output_count: 0,
                details: IndexMap::new(),
            },
        );
    }

    fn end_node(&self, node_id: &str, status: CoreNodeStatus, output_count: Option<usize>) {
        let mut guard = self.inner.lock();
        if let Some(record) = guard.node_infos.get_mut(node_id) {
            record.end = Some(Instant::now());
            record.status = status.into();
            if let Some(count) = output_count {
                record.output_count = count;
            }
        }
    }

    fn set_node_input_count(&self, node_id: &str, count: usize) {
        let mut guard = self.inner.lock();
        if let Some(record) = guard.node_infos.get_mut(node_id) {
            record.input_count = count;
        }
    }

    fn add_node_detail(&self, node_id: &str, key: &str, value: Value) {
        let mut guard = self.inner.lock();
        if let Some(record) = guard.node_infos.get_mut(node_id) {
            record.details.insert(key.to_string(), value);
        }
    }

    fn add_error(&self, node_id: &str, message: &str) {
        let mut guard = self.inner.lock();
        let elapsed_ms = guard.start_time.elapsed().as_millis() as i64;
        guard.errors.push(ErrorRecord {
            node_id: node_id.to_string(),
            error_type: "node_error".to_string(),
            error_msg: message.to_string(),
            time_ms_since_start: elapsed_ms,
        });
        if let Some(record) = guard.node_infos.get_mut(node_id) {
            record.status = NodeStatus::Error;
        }
        tracing::warn!(node_id, message, "node execution error recorded in trace");
    }

    fn set_global(&self, key: &str, value: Value) {
        self.inner.lock().global_info.insert(key.to_string(), value);
    }

    fn trace_id(&self) -> String {
        self.inner.lock().trace_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedrec_core::trace::NodeStatus as CoreStatus;

    #[test]
    fn start_then_end_records_status_and_duration() {
        let recorder = TraceRecorder::new();
        recorder.start_node("recall_a", "random_recall");
        recorder.set_node_input_count("recall_a", 0);
        recorder.end_node("recall_a", CoreStatus::Success, Some(20));

        let snap = recorder.snapshot();
        let node = &snap.nodes["recall_a"];
        assert_eq!(node.status, NodeStatus::Success);
        assert_eq!(node.output_count, 20);
        assert!(node.duration_ms.is_some());
    }

    #[test]
    fn add_error_marks_node_status_error() {
        let recorder = TraceRecorder::new();
        recorder.start_node("rank", "rank");
        recorder.add_error("rank", "boom");

        let snap = recorder.snapshot();
        assert_eq!(snap.nodes["rank"].status, NodeStatus::Error);
        assert_eq!(snap.errors.len(), 1);
        assert_eq!(snap.errors[0].error_msg, "boom");
    }

    #[test]
    fn end_node_on_unknown_node_is_a_noop() {
        let recorder = TraceRecorder::new();
        recorder.end_node("ghost", CoreStatus::Success, None);
        assert!(recorder.snapshot().nodes.is_empty());
    }

    #[test]
    fn complete_stamps_total_duration() {
        let recorder = TraceRecorder::new();
        assert!(recorder.total_duration_ms().is_none());
        recorder.complete("success");
        assert!(recorder.total_duration_ms().is_some());
    }
}
