pub mod config;
pub mod error;
pub mod trace;
pub mod traits;
pub mod types;

pub use config::{EngineConfig, NodeDefaults};
pub use error::{FeedRecError, Result};
pub use trace::{NodeStatus, TraceSink};
pub use traits::{DataGateway, EventWeights, HopWeights, ScoredItem, SimilarityMetric};
pub use types::{
    Candidate, FeatureValue, FeedItem, ItemKind, NodeConfig, RequestContext, Tracking, UserProfile,
};
