use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::path::DEFAULT_BEND_PENALTY_PERCENT;

/// Settings shared by every edge a router routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// Distance kept between paths and the shapes they avoid.
    pub padding: f64,
    /// Corner radius for the curve-fitting step downstream of routing.
    pub corner_fit_radius: f64,
    /// Cost of one bend, as a percentage of the distance between the
    /// endpoints.
    pub bend_penalty_percent: f64,
    /// Paths run to the port location instead of stopping at the shape
    /// border.
    pub route_to_center: bool,
    pub use_sparse_visibility_graph: bool,
    /// Every padded shape is replaced by its bounding box.
    pub use_obstacle_rectangles: bool,
    /// Port and free-point rays stop shortly past the endpoints' bounding
    /// box.
    pub limit_port_visibility_splice: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            padding: 1.0,
            corner_fit_radius: 3.0,
            bend_penalty_percent: DEFAULT_BEND_PENALTY_PERCENT,
            route_to_center: false,
            use_sparse_visibility_graph: false,
            use_obstacle_rectangles: false,
            limit_port_visibility_splice: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    padding: Option<f64>,
    corner_fit_radius: Option<f64>,
    bend_penalty_percent: Option<f64>,
    route_to_center: Option<bool>,
    use_sparse_visibility_graph: Option<bool>,
    use_obstacle_rectangles: Option<bool>,
    limit_port_visibility_splice: Option<bool>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<RouterConfig> {
    let Some(path) = path else {
        return Ok(RouterConfig::default());
    };
    let contents = std::fs::read_to_string(path)?;
    config_from_str(&contents)
}

/// Defaults overlaid with whatever fields `contents` sets. Strict JSON is
/// tried first, then JSON5.
pub fn config_from_str(contents: &str) -> anyhow::Result<RouterConfig> {
    let parsed: ConfigFile = match serde_json::from_str(contents) {
        Ok(parsed) => parsed,
        Err(strict) => json5::from_str(contents).map_err(|_| strict)?,
    };

    let mut config = RouterConfig::default();
    if let Some(v) = parsed.padding {
        config.padding = v;
    }
    if let Some(v) = parsed.corner_fit_radius {
        config.corner_fit_radius = v;
    }
    if let Some(v) = parsed.bend_penalty_percent {
        config.bend_penalty_percent = v;
    }
    if let Some(v) = parsed.route_to_center {
        config.route_to_center = v;
    }
    if let Some(v) = parsed.use_sparse_visibility_graph {
        config.use_sparse_visibility_graph = v;
    }
    if let Some(v) = parsed.use_obstacle_rectangles {
        config.use_obstacle_rectangles = v;
    }
    if let Some(v) = parsed.limit_port_visibility_splice {
        config.limit_port_visibility_splice = v;
    }
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &RouterConfig) -> anyhow::Result<()> {
    for (name, value) in [
        ("padding", config.padding),
        ("cornerFitRadius", config.corner_fit_radius),
        ("bendPenaltyPercent", config.bend_penalty_percent),
    ] {
        if !value.is_finite() || value < 0.0 {
            anyhow::bail!("{name} must be a finite non-negative number, got {value}");
        }
    }
    Ok(())
}
