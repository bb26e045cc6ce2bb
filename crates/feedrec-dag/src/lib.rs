//! Graph definitions, a JSON directory loader, a symbolic node-type
//! registry, and the DAG execution engine itself.

pub mod engine;
pub mod graph_def;
pub mod loader;
pub mod registry;

pub use engine::Dag;
pub use graph_def::GraphDefinition;
pub use loader::DagLoader;
pub use registry::NodeRegistry;
