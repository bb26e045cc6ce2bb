//! The static, on-disk shape of a recommendation DAG (spec.md §3.1).

use feedrec_core::types::NodeConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One JSON file's worth of graph: nodes, their edges, and the roots with
/// no incoming dependency. `IndexMap` keeps edge-declaration order, which
/// the engine relies on when assembling a node's `primary_input` as "the
/// concatenated union of incoming edges, in edge-declaration order."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub entry_nodes: Vec<String>,
    pub nodes: IndexMap<String, NodeConfig>,
    #[serde(default)]
    pub edges: IndexMap<String, Vec<String>>,

    /// Which node's output the façade should prefer when the DAG finishes.
    /// Not in the original's free-form `dag` metadata; an explicit field
    /// here resolves spec.md §4.4's "prefer the configured terminal node"
    /// without requiring callers to know a string key inside a blob.
    #[serde(default)]
    pub terminal_node: Option<String>,

    /// Free-form metadata, unused by the engine.
    #[serde(default)]
    pub dag: serde_json::Value,
}

impl GraphDefinition {
    /// spec.md §3.1 invariants: every edge endpoint must name a real node,
    /// at least one entry node must be declared, and the graph must be
    /// acyclic. Unreachable nodes (present in `nodes` but absent from
    /// `edges`/`entry_nodes`) are tolerated with a warning, not an error.
    pub fn validate(&self) -> Result<(), String> {
        if self.entry_nodes.is_empty() {
            return Err("graph has no entry_nodes".to_string());
        }

        for id in &self.entry_nodes {
            if !self.nodes.contains_key(id) {
                return Err(format!("entry node '{id}' not declared in nodes"));
            }
        }

        for (src, targets) in &self.edges {
            if !self.nodes.contains_key(src) {
                return Err(format!("edge source '{src}' not declared in nodes"));
            }
            for tgt in targets {
                if !self.nodes.contains_key(tgt) {
                    return Err(format!("edge target '{tgt}' not declared in nodes"));
                }
            }
        }

        self.check_acyclic()?;

        Ok(())
    }

    /// DFS over `edges` with an explicit recursion stack, distinct from the
    /// "completed" set: a node re-encountered while still on the current
    /// path is a back-edge (spec.md §3.1 "a back-edge raises"); a node
    /// re-encountered after its subtree already finished (legitimate
    /// diamond-shaped reconvergence, not a cycle) is skipped.
    fn check_acyclic(&self) -> Result<(), String> {
        #[derive(PartialEq, Eq, Clone, Copy)]
        enum Mark {
            OnStack,
            Done,
        }

        let mut marks: std::collections::HashMap<&str, Mark> = std::collections::HashMap::new();

        fn visit<'a>(
            graph: &'a GraphDefinition,
            node_id: &'a str,
            marks: &mut std::collections::HashMap<&'a str, Mark>,
        ) -> Result<(), String> {
            match marks.get(node_id) {
                Some(Mark::OnStack) => {
                    return Err(format!("cycle detected: back-edge into '{node_id}'"));
                }
                Some(Mark::Done) => return Ok(()),
                None => {}
            }

            marks.insert(node_id, Mark::OnStack);
            for target in graph.outgoing_edges(node_id) {
                visit(graph, target, marks)?;
            }
            marks.insert(node_id, Mark::Done);
            Ok(())
        }

        for node_id in self.nodes.keys() {
            visit(self, node_id, &mut marks)?;
        }

        Ok(())
    }

    /// Node ids present in `nodes` but touched by neither `edges` nor
    /// `entry_nodes` — unreachable, but not an error (spec.md §3.1).
    pub fn unconnected_nodes(&self) -> Vec<&str> {
        let mut referenced: std::collections::HashSet<&str> = self.entry_nodes.iter().map(String::as_str).collect();
        for (src, targets) in &self.edges {
            referenced.insert(src.as_str());
            referenced.extend(targets.iter().map(String::as_str));
        }
        self.nodes
            .keys()
            .filter(|id| !referenced.contains(id.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Incoming edges for `node_id`, in edge-declaration order.
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.iter().any(|t| t == node_id))
            .map(|(src, _)| src.as_str())
            .collect()
    }

    pub fn outgoing_edges(&self, node_id: &str) -> &[String] {
        self.edges.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphDefinition {
        serde_json::from_value(serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode"},
                "format": {"type": "ResponseFormatNode"},
                "orphan": {"type": "RandomRecallNode"}
            },
            "edges": {
                "recall": ["format"]
            }
        }))
        .unwrap()
    }

    #[test]
    fn rejects_a_direct_cycle() {
        let g: GraphDefinition = serde_json::from_value(serde_json::json!({
            "entry_nodes": ["a"],
            "nodes": {
                "a": {"type": "RandomRecallNode"},
                "b": {"type": "RandomRecallNode"}
            },
            "edges": {
                "a": ["b"],
                "b": ["a"]
            }
        }))
        .unwrap();
        let err = g.validate().unwrap_err();
        assert!(err.contains("cycle"), "expected a cycle error, got: {err}");
    }

    #[test]
    fn accepts_diamond_shaped_reconvergence() {
        // a -> b, a -> c, b -> d, c -> d: d is reached twice but this is
        // not a cycle, just a merge point.
        let g: GraphDefinition = serde_json::from_value(serde_json::json!({
            "entry_nodes": ["a"],
            "nodes": {
                "a": {"type": "RandomRecallNode"},
                "b": {"type": "RandomRecallNode"},
                "c": {"type": "RandomRecallNode"},
                "d": {"type": "ResponseFormatNode"}
            },
            "edges": {
                "a": ["b", "c"],
                "b": ["d"],
                "c": ["d"]
            }
        }))
        .unwrap();
        assert!(g.validate().is_ok());
    }

    #[test]
    fn validates_clean_graph() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_missing_entry_node() {
        let mut g = sample();
        g.entry_nodes.push("nonexistent".to_string());
        assert!(g.validate().is_err());
    }

    #[test]
    fn reports_unconnected_nodes() {
        assert_eq!(sample().unconnected_nodes(), vec!["orphan"]);
    }

    #[test]
    fn incoming_edges_respect_declaration_order() {
        let g = sample();
        assert_eq!(g.incoming_edges("format"), vec!["recall"]);
        assert!(g.incoming_edges("recall").is_empty());
    }
}
