//! Maps a node config's symbolic `type` string to a constructor. Replaces
//! the original's dynamic `importlib`-based class lookup (REDESIGN FLAGS)
//! with an explicit, statically populated table.

use std::collections::HashMap;

use feedrec_core::error::{FeedRecError, Result};
use feedrec_core::types::NodeConfig;
use feedrec_nodes::blend::SnakeMergeNode;
use feedrec_nodes::filter::{BasicFilterNode, DiversityFilterNode, NOutMFilterNode, UserHistoryFilterNode};
use feedrec_nodes::framework::DynNode;
use feedrec_nodes::rank::{FeatureExtractNode, FinalRankNode, PreRankNode, ReRankNode};
use feedrec_nodes::recall::{
    AdRecallNode, MultiHopRecallNode, PopularRecallNode, ProductRecallNode, RandomRecallNode, TagRecallNode,
    VectorRecallNode,
};
use feedrec_nodes::transform::ResponseFormatNode;

pub type NodeFactory = Box<dyn Fn(&str, &NodeConfig) -> Result<DynNode> + Send + Sync>;

pub struct NodeRegistry {
    factories: HashMap<&'static str, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, type_name: &'static str, factory: NodeFactory) {
        self.factories.insert(type_name, factory);
    }

    pub fn build(&self, node_id: &str, config: &NodeConfig) -> Result<DynNode> {
        let factory = self
            .factories
            .get(config.node_type.as_str())
            .ok_or_else(|| FeedRecError::UnknownNodeType(config.node_type.clone()))?;
        factory(node_id, config)
    }

    /// The node library shipped in `feedrec-nodes`, registered under the
    /// type names a graph definition's `nodes[*].type` field names them by.
    pub fn with_builtin_nodes() -> Self {
        let mut registry = Self::new();

        registry.register(
            "RandomRecallNode",
            Box::new(|id, cfg| RandomRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "TagRecallNode",
            Box::new(|id, cfg| TagRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "PopularRecallNode",
            Box::new(|id, cfg| PopularRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "VectorRecallNode",
            Box::new(|id, cfg| VectorRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "MultiHopRecallNode",
            Box::new(|id, cfg| MultiHopRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "AdRecallNode",
            Box::new(|id, cfg| AdRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );
        registry.register(
            "ProductRecallNode",
            Box::new(|id, cfg| ProductRecallNode::from_config(id, cfg).map(|n| DynNode::Recall(Box::new(n)))),
        );

        registry.register(
            "PreRankNode",
            Box::new(|id, cfg| PreRankNode::from_config(id, cfg).map(|n| DynNode::Rank(Box::new(n)))),
        );
        registry.register(
            "FeatureExtractNode",
            Box::new(|id, cfg| FeatureExtractNode::from_config(id, cfg).map(|n| DynNode::Rank(Box::new(n)))),
        );
        registry.register(
            "RankNode",
            Box::new(|id, cfg| FinalRankNode::from_config(id, cfg).map(|n| DynNode::Rank(Box::new(n)))),
        );
        registry.register(
            "ReRankNode",
            Box::new(|id, cfg| ReRankNode::from_config(id, cfg).map(|n| DynNode::Rank(Box::new(n)))),
        );

        registry.register(
            "BasicFilterNode",
            Box::new(|id, cfg| BasicFilterNode::from_config(id, cfg).map(|n| DynNode::Filter(Box::new(n)))),
        );
        registry.register(
            "UserHistoryFilterNode",
            Box::new(|id, cfg| UserHistoryFilterNode::from_config(id, cfg).map(|n| DynNode::Filter(Box::new(n)))),
        );
        registry.register(
            "DiversityFilterNode",
            Box::new(|id, cfg| DiversityFilterNode::from_config(id, cfg).map(|n| DynNode::Filter(Box::new(n)))),
        );
        registry.register(
            "NOutMFilterNode",
            Box::new(|id, cfg| NOutMFilterNode::from_config(id, cfg).map(|n| DynNode::Filter(Box::new(n)))),
        );

        registry.register(
            "SnakeMergeNode",
            Box::new(|id, cfg| SnakeMergeNode::from_config(id, cfg).map(|n| DynNode::Blend(Box::new(n)))),
        );

        registry.register(
            "ResponseFormatNode",
            Box::new(|id, cfg| ResponseFormatNode::from_config(id, cfg).map(|n| DynNode::Transform(Box::new(n)))),
        );

        registry
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtin_nodes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_a_known_node_type() {
        let registry = NodeRegistry::with_builtin_nodes();
        let config: NodeConfig = serde_json::from_value(json!({"type": "RandomRecallNode"})).unwrap();
        let node = registry.build("recall", &config).unwrap();
        assert_eq!(node.type_name(), "RandomRecallNode");
    }

    #[test]
    fn rejects_unknown_node_type() {
        let registry = NodeRegistry::with_builtin_nodes();
        let config: NodeConfig = serde_json::from_value(json!({"type": "NoSuchNode"})).unwrap();
        assert!(registry.build("x", &config).is_err());
    }
}
