//! Recall nodes: the first DAG stage, generating candidates from a single
//! strategy. Every recall node returns `[]` rather than erroring when its
//! prerequisites are missing (anonymous user, no embedding, no matching
//! tags) per spec.md §4.3.1.

mod ad_recall;
mod multi_hop_recall;
mod popular_recall;
mod product_recall;
mod random_recall;
mod tag_recall;
mod vector_recall;

pub use ad_recall::AdRecallNode;
pub use multi_hop_recall::MultiHopRecallNode;
pub use popular_recall::PopularRecallNode;
pub use product_recall::ProductRecallNode;
pub use random_recall::RandomRecallNode;
pub use tag_recall::TagRecallNode;
pub use vector_recall::VectorRecallNode;
