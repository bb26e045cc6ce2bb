//! Blend nodes: the only specialization that sees every incoming edge's
//! output at once (`ctx.inputs`), rather than the single concatenated
//! `ctx.primary_input` every other specialization receives.

mod snake_merge;

pub use snake_merge::SnakeMergeNode;
