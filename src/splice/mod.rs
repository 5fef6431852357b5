//! Per-edge graph splicing: ports, free points and waypoints are added to
//! the visibility graph for one search and removed after it.

pub mod free_point;
pub mod manager;
pub mod ports;
pub mod transient;

pub use free_point::splice_free_point;
pub use manager::{Endpoint, PortManager, SplicedEndpoints};
pub use ports::{ObstaclePort, PortEntrance, visibility_intersection};
pub use transient::TransientGraph;
