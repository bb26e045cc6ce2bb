//! The node contract (`framework`) plus the concrete node library: recall,
//! rank, filter, blend and transform nodes that make up a recommendation
//! DAG's vertices.

pub mod blend;
pub mod config_util;
pub mod filter;
pub mod framework;
pub mod rank;
pub mod recall;
pub mod transform;
pub mod window;

pub use framework::{
    require_field, BlendNode, DynNode, FilterNode, Node, NodeOutput, RankNode, RecallNode,
    TransformNode,
};
