//! Transform nodes: the only specialization whose output isn't
//! `Vec<Candidate>` — this is the boundary between the pipeline's internal
//! candidate representation and the wire response shape.

mod response_format;

pub use response_format::ResponseFormatNode;
