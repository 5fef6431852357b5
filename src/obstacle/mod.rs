//! Padded obstacles, their overlap structure and spatial queries.

pub mod crossings;
pub mod model;
pub mod spatial;
pub mod tree;

pub use crossings::{CROSSING_INTERIOR_OFFSET, GroupBoundaryCrossing, group_by_edge};
pub use model::{LOOSE_PADDING, Obstacle, ObstacleId, OverlapHull};
pub use spatial::SpatialIndex;
pub use tree::{ObstacleTree, OverlapSummary, VisibilitySegment};
