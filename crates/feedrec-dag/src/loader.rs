//! Loads a directory of graph-definition JSON files into constructed DAGs.
//! One file, one DAG, keyed by filename stem; a failure in one file never
//! aborts the others (spec.md §4.4 construction step 4).

use std::collections::HashMap;
use std::path::Path;

use feedrec_core::error::{FeedRecError, Result};
use tracing::{error, warn};

use crate::engine::Dag;
use crate::graph_def::GraphDefinition;
use crate::registry::NodeRegistry;

pub struct DagLoader {
    registry: NodeRegistry,
}

impl DagLoader {
    pub fn new(registry: NodeRegistry) -> Self {
        Self { registry }
    }

    pub fn with_builtin_nodes() -> Self {
        Self::new(NodeRegistry::with_builtin_nodes())
    }

    /// Parses, validates, and builds nodes for a single graph definition.
    pub fn load_one(&self, dag_id: &str, source: &str) -> Result<Dag> {
        let definition: GraphDefinition = serde_json::from_str(source)?;
        definition.validate().map_err(FeedRecError::Configuration)?;

        for unconnected in definition.unconnected_nodes() {
            warn!(dag_id, node_id = unconnected, "node declared but unreachable from any entry node");
        }

        Dag::build(dag_id.to_string(), definition, &self.registry)
    }

    /// Reads every `*.json` file directly under `dir`, building one DAG per
    /// file. Returns `(dag_id, Dag)` pairs for the files that loaded
    /// successfully; failures are logged, not propagated.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<HashMap<String, Dag>> {
        let dir = dir.as_ref();
        let mut dags = HashMap::new();

        let entries = std::fs::read_dir(dir)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    error!(dag_id = stem, error = %err, "failed to read dag file");
                    continue;
                }
            };

            match self.load_one(stem, &source) {
                Ok(dag) => {
                    dags.insert(stem.to_string(), dag);
                }
                Err(err) => {
                    error!(dag_id = stem, error = %err, "failed to load dag");
                }
            }
        }

        Ok(dags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_every_valid_file_and_skips_broken_ones() {
        let dir = tempfile::tempdir().unwrap();

        let good = serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode"},
                "format": {"type": "ResponseFormatNode"}
            },
            "edges": {"recall": ["format"]}
        });
        let mut f = std::fs::File::create(dir.path().join("feed_rec.json")).unwrap();
        write!(f, "{good}").unwrap();

        let mut broken = std::fs::File::create(dir.path().join("broken.json")).unwrap();
        write!(broken, "{{ not valid json").unwrap();

        let loader = DagLoader::with_builtin_nodes();
        let dags = loader.load_dir(dir.path()).unwrap();

        assert!(dags.contains_key("feed_rec"));
        assert!(!dags.contains_key("broken"));
    }
}
