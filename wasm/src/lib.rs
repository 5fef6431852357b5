use std::ops::ControlFlow;

use rectilinear_router::config::{RouterConfig, config_from_str};
use rectilinear_router::render::{RenderOptions, render_svg};
use rectilinear_router::scene::{Scene, build_router, routes_to_json};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreviewOptions {
    show_graph: Option<bool>,
    scale: Option<f64>,
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn load_config(config_json: Option<String>) -> Result<RouterConfig, JsValue> {
    match config_json {
        Some(raw) => config_from_str(&raw).map_err(to_js),
        None => Ok(RouterConfig::default()),
    }
}

/// Routes every edge of a scene and returns the polylines as JSON.
#[wasm_bindgen]
pub fn route_scene(scene_json: &str, config_json: Option<String>) -> Result<String, JsValue> {
    let scene = Scene::parse(scene_json).map_err(to_js)?;
    let mut router = build_router(&scene, load_config(config_json)?).map_err(to_js)?;
    let routes = router
        .route_edges(&scene.edge_requests(), |_, _| ControlFlow::Continue(()))
        .map_err(to_js)?;
    routes_to_json(&routes).map_err(to_js)
}

/// Routes a scene and draws it as SVG.
#[wasm_bindgen]
pub fn render_scene_svg(
    scene_json: &str,
    config_json: Option<String>,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let preview: PreviewOptions = match options_json {
        Some(raw) => serde_json::from_str(&raw).map_err(to_js)?,
        None => PreviewOptions::default(),
    };
    let scene = Scene::parse(scene_json).map_err(to_js)?;
    let mut router = build_router(&scene, load_config(config_json)?).map_err(to_js)?;
    let routes = router
        .route_edges(&scene.edge_requests(), |_, _| ControlFlow::Continue(()))
        .map_err(to_js)?;
    let mut options = RenderOptions::default();
    if let Some(show_graph) = preview.show_graph {
        options.show_graph = show_graph;
    }
    if let Some(scale) = preview.scale {
        options.scale = scale;
    }
    let (tree, graph) = router.snapshot().map_err(to_js)?;
    Ok(render_svg(tree, Some(graph), &routes, &options))
}
