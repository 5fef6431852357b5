//! Scene documents: shapes and edge requests read from JSON or JSON5.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::RouterConfig;
use crate::geometry::Point;
use crate::router::{EdgeRequest, EndpointRef, Port, RoutedEdge, Router, Shape};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub shapes: Vec<SceneShape>,
    #[serde(default)]
    pub edges: Vec<SceneEdge>,
}

/// A shape given either as `rect: [left, bottom, right, top]` or as a
/// `polygon` of `[x, y]` pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneShape {
    pub id: String,
    #[serde(default)]
    pub rect: Option<[f64; 4]>,
    #[serde(default)]
    pub polygon: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub ports: Vec<ScenePort>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePort {
    pub id: String,
    pub at: [f64; 2],
    #[serde(default)]
    pub curve: Option<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SceneEndpoint {
    Port { shape: String, port: String },
    Point([f64; 2]),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEdge {
    #[serde(default)]
    pub id: Option<String>,
    pub source: SceneEndpoint,
    pub target: SceneEndpoint,
    #[serde(default)]
    pub waypoints: Vec<[f64; 2]>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RoutesFile<'a> {
    edges: &'a [RoutedEdge],
}

fn point([x, y]: [f64; 2]) -> Point {
    Point::new(x, y)
}

impl SceneShape {
    fn boundary(&self) -> Vec<Point> {
        match (&self.rect, &self.polygon) {
            (Some([left, bottom, right, top]), _) => {
                Shape::rectangle(self.id.clone(), *left, *bottom, *right, *top).boundary
            }
            (None, Some(polygon)) => polygon.iter().copied().map(point).collect(),
            (None, None) => Vec::new(),
        }
    }

    pub fn to_shape(&self) -> Shape {
        Shape {
            id: self.id.clone(),
            boundary: self.boundary(),
            is_group: self.is_group,
            children: self.children.clone(),
            ports: self
                .ports
                .iter()
                .map(|p| Port {
                    id: p.id.clone(),
                    location: point(p.at),
                    curve: p.curve.as_ref().map(|c| c.iter().copied().map(point).collect()),
                })
                .collect(),
        }
    }
}

impl SceneEndpoint {
    fn to_ref(&self) -> EndpointRef {
        match self {
            SceneEndpoint::Port { shape, port } => EndpointRef::Port {
                shape: shape.clone(),
                port: port.clone(),
            },
            SceneEndpoint::Point(p) => EndpointRef::Point(point(*p)),
        }
    }
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        match serde_json::from_str(contents) {
            Ok(scene) => Ok(scene),
            Err(strict) => json5::from_str(contents).map_err(|_| anyhow::Error::new(strict).context("invalid scene")),
        }
    }

    pub fn edge_requests(&self) -> Vec<EdgeRequest> {
        self.edges
            .iter()
            .enumerate()
            .map(|(i, e)| EdgeRequest {
                id: e.id.clone().unwrap_or_else(|| format!("e{i}")),
                source: e.source.to_ref(),
                target: e.target.to_ref(),
                waypoints: e.waypoints.iter().copied().map(point).collect(),
            })
            .collect()
    }
}

/// A router holding every shape of `scene`.
pub fn build_router(scene: &Scene, config: RouterConfig) -> Result<Router> {
    let mut router = Router::new(config);
    for shape in &scene.shapes {
        router
            .add_shape(shape.to_shape())
            .with_context(|| format!("adding shape '{}'", shape.id))?;
    }
    router.rebuild()?;
    Ok(router)
}

pub fn routes_to_json(routes: &[RoutedEdge]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&RoutesFile { edges: routes })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "shapes": [
            { "id": "a", "rect": [0, 0, 10, 10], "ports": [{ "id": "out", "at": [5, 5] }] },
            { "id": "b", "polygon": [[30, 0], [40, 0], [40, 10], [30, 10]], "ports": [{ "id": "in", "at": [35, 5] }] }
        ],
        "edges": [
            { "id": "ab", "source": { "shape": "a", "port": "out" }, "target": { "shape": "b", "port": "in" } },
            { "source": [20, -10], "target": [20, 30], "waypoints": [[25, 10]] }
        ]
    }"#;

    #[test]
    fn parses_shapes_and_edges() {
        let scene = Scene::parse(SCENE).expect("scene");
        assert_eq!(scene.shapes.len(), 2);
        assert_eq!(scene.shapes[0].to_shape().boundary.len(), 4);
        let requests = scene.edge_requests();
        assert_eq!(requests[1].id, "e1");
        assert_eq!(requests[1].source, EndpointRef::Point(Point::new(20.0, -10.0)));
        assert!(matches!(&requests[0].target, EndpointRef::Port { port, .. } if port == "in"));
    }

    #[test]
    fn json5_scene_is_accepted() {
        let scene = Scene::parse("{ shapes: [{ id: 'a', rect: [0, 0, 1, 1], },], }").expect("json5");
        assert_eq!(scene.shapes[0].id, "a");
        assert!(scene.edges.is_empty());
    }

    #[test]
    fn shape_without_geometry_is_rejected() {
        let scene = Scene::parse(r#"{ "shapes": [{ "id": "ghost" }] }"#).expect("scene");
        let err = build_router(&scene, RouterConfig::default()).err().expect("error");
        assert!(format!("{err:#}").contains("ghost"));
    }

    #[test]
    fn routes_serialize_as_polylines() {
        let scene = Scene::parse(SCENE).expect("scene");
        let mut router = build_router(&scene, RouterConfig::default()).expect("router");
        let routes = router
            .route_edges(&scene.edge_requests(), |_, _| std::ops::ControlFlow::Continue(()))
            .expect("routes");
        let json = routes_to_json(&routes).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["edges"][0]["id"], "ab");
        assert_eq!(value["edges"][0]["bends"], 0);
        assert!(value["edges"][1]["points"].as_array().is_some_and(|p| p.len() >= 3));
    }
}
