//! Bend-penalized shortest paths over the visibility graph.

pub mod entry;
pub mod msmt;
pub mod ssst;

pub use entry::{DirectionEntries, EntryArena, EntryId, VertexEntry};
pub use msmt::{FoundPath, MsmtSearch};
pub use ssst::{DEFAULT_BEND_PENALTY_PERCENT, SearchEnds, SsstSearch};
