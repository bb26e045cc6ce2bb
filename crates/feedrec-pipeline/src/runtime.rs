//! Process-wide, initialized-once DAG registry. REDESIGN FLAGS: replaces the
//! original's lazily-initialized global DAG manager with an explicit
//! lifecycle object, built once at startup and handed to callers rather than
//! reached for through module-level state.

use std::collections::HashMap;
use std::path::Path;

use feedrec_core::error::Result;
use feedrec_dag::{Dag, DagLoader};

pub struct PipelineRuntime {
    dags: HashMap<String, Dag>,
}

impl PipelineRuntime {
    /// Loads every `*.json` graph definition under `dag_dir` with the
    /// built-in node registry. One bad file never prevents the others from
    /// loading (`DagLoader::load_dir`'s per-file error isolation).
    pub fn load(dag_dir: impl AsRef<Path>) -> Result<Self> {
        let loader = DagLoader::with_builtin_nodes();
        let dags = loader.load_dir(dag_dir)?;
        Ok(Self { dags })
    }

    pub fn get(&self, dag_id: &str) -> Option<&Dag> {
        self.dags.get(dag_id)
    }

    pub fn dag_ids(&self) -> impl Iterator<Item = &str> {
        self.dags.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_the_feed_rec_dag_from_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let definition = serde_json::json!({
            "entry_nodes": ["recall"],
            "nodes": {
                "recall": {"type": "RandomRecallNode"}
            },
            "edges": {},
            "terminal_node": "recall"
        });
        let mut f = std::fs::File::create(dir.path().join("feed_rec.json")).unwrap();
        write!(f, "{definition}").unwrap();

        let runtime = PipelineRuntime::load(dir.path()).unwrap();
        assert!(runtime.get("feed_rec").is_some());
        assert!(runtime.get("no_such_dag").is_none());
    }
}
