//! Rectilinear edge routing: padded obstacles, a sweep-built visibility
//! graph, port splicing and bend-penalized shortest paths.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod obstacle;
pub mod path;
pub mod render;
pub mod router;
pub mod scene;
pub mod splice;
pub mod visibility;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{RouterConfig, load_config};
pub use error::{RouterError, RouterResult};
pub use geometry::{Point, Rect};
pub use router::{EdgeRequest, EndpointRef, Port, RoutedEdge, Router, Shape};
pub use scene::{Scene, build_router, routes_to_json};
