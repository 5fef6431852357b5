//! Points, rectangles, directions and convex polygons, all compared through
//! one epsilon-aware comparator.

pub mod compare;
pub mod direction;
pub mod point;
pub mod polygon;

pub use compare::{PointKey, close, close_points, compare, compare_points, round, round_point};
pub use direction::{Direction, Directions, pure_direction};
pub use point::{Point, Rect};
pub use polygon::{PointLocation, Polygon};
