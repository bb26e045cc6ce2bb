pub mod facade;
pub mod runtime;

pub use facade::{get_recommended_items, SceneContext, FEED_REC_DAG_ID};
pub use runtime::PipelineRuntime;
