use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::trace::TraceSink;
use crate::traits::DataGateway;

/// The three kinds of item the engine ever recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Content,
    Ad,
    Product,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemKind::Content => "content",
            ItemKind::Ad => "ad",
            ItemKind::Product => "product",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "content" => Ok(ItemKind::Content),
            "ad" => Ok(ItemKind::Ad),
            "product" => Ok(ItemKind::Product),
            other => Err(format!("unknown item kind: {other}")),
        }
    }
}

/// A feature value attached to a candidate by feature-extract. Kept as a
/// small closed enum rather than `serde_json::Value` since every feature
/// produced in this pipeline is numeric, textual, or boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Num(f64),
    Text(String),
    Bool(bool),
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Num(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

/// A candidate item flowing through the pipeline. Required fields are
/// always populated; everything a later stage may or may not have filled
/// in is `Option` or defaults to an empty collection. `extra` is the single
/// escape hatch for free-form intermediate keys a node wants to stash
/// without widening this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub kind: ItemKind,

    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub pre_rank_score: Option<f64>,
    #[serde(default)]
    pub rank_score: Option<f64>,
    #[serde(default)]
    pub rerank_score: Option<f64>,

    #[serde(default)]
    pub recall_type: Option<String>,
    #[serde(default)]
    pub matched_tags: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub features: HashMap<String, FeatureValue>,

    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub popularity: f64,

    #[serde(default)]
    pub original_score: Option<f64>,
    #[serde(default)]
    pub original_position: Option<usize>,
    #[serde(default)]
    pub final_position: Option<usize>,

    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Candidate {
    pub fn new(id: i64, kind: ItemKind) -> Self {
        Self {
            id,
            kind,
            title: None,
            content: None,
            tags: Vec::new(),
            author_id: None,
            created_at: None,
            match_score: None,
            pre_rank_score: None,
            rank_score: None,
            rerank_score: None,
            recall_type: None,
            matched_tags: Vec::new(),
            source: None,
            features: HashMap::new(),
            is_sensitive: false,
            popularity: 0.0,
            original_score: None,
            original_position: None,
            final_position: None,
            extra: HashMap::new(),
        }
    }

    /// The score precedence used throughout ranking/transform: rerank, then
    /// rank, then pre-rank, then match, else a fallback default.
    pub fn best_score(&self) -> f64 {
        self.rerank_score
            .or(self.rank_score)
            .or(self.pre_rank_score)
            .or(self.match_score)
            .unwrap_or(0.9)
    }

    /// Same precedence chain, but without the `0.9` default — used by
    /// filters/rerank that need a "no opinion yet" distinction from "scored
    /// zero."
    pub fn ranking_score(&self) -> f64 {
        self.rerank_score
            .or(self.rank_score)
            .or(self.pre_rank_score)
            .or(self.match_score)
            .unwrap_or(0.0)
    }
}

/// Targeting / experimentation context threaded read-mostly through every
/// node alongside the current `inputs` map.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub db: Arc<dyn DataGateway>,
    pub user_id: Option<i64>,
    pub count: usize,
    pub offset: usize,
    pub scene: String,
    pub slot: Option<String>,
    pub device: Option<String>,
    pub geo: Option<String>,
    pub ab: Option<String>,
    pub debug: bool,

    pub trace: Arc<dyn TraceSink>,

    pub dag_id: Option<String>,
    pub node_id: Option<String>,

    /// Incoming-edge source-id -> that source's materialized output, for
    /// blend specializations (which need to know which source a candidate
    /// came from). `IndexMap` preserves edge-declaration order, which
    /// snake-merge relies on for its "insertion order" starting rotation
    /// (spec.md §4.3.5) when `random_start=false`; non-blend nodes don't
    /// read this directly — they read `primary_input` instead.
    pub inputs: IndexMap<String, Vec<Candidate>>,

    /// The concatenated union of every incoming edge's output, in
    /// edge-declaration order, precomputed by the engine (which holds the
    /// ordered edge list). This is what every specialization except blend
    /// treats as its input.
    pub primary_input: Vec<Candidate>,

    pub cancellation: tokio_util::sync::CancellationToken,
}

impl RequestContext {
    pub fn with_node(
        &self,
        node_id: impl Into<String>,
        inputs: IndexMap<String, Vec<Candidate>>,
        primary_input: Vec<Candidate>,
    ) -> Self {
        Self {
            db: self.db.clone(),
            user_id: self.user_id,
            count: self.count,
            offset: self.offset,
            scene: self.scene.clone(),
            slot: self.slot.clone(),
            device: self.device.clone(),
            geo: self.geo.clone(),
            ab: self.ab.clone(),
            debug: self.debug,
            trace: self.trace.clone(),
            dag_id: self.dag_id.clone(),
            node_id: Some(node_id.into()),
            inputs,
            primary_input,
            cancellation: self.cancellation.clone(),
        }
    }
}

/// A single page of the wire response, handed back by the façade. The
/// content/ad/product payload shape is kind-dependent and is an HTTP
/// serialization concern left to the adapter layer, so it travels as a
/// generic JSON map here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub id: String,
    pub score: f64,
    pub position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<Tracking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracking {
    pub event_token: String,
    pub trace_id: String,
}

/// A resolved user profile as loaded from the gateway.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// One entry of a graph definition's `nodes` map. `params` carries every
/// implementation-specific key verbatim; each node's constructor picks out
/// the fields it needs and validates them eagerly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}
