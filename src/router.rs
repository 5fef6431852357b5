//! The public routing entry point: shapes in, rectilinear polylines out.

use std::collections::{BTreeSet, HashMap};
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RouterConfig;
use crate::error::{RouterError, RouterResult};
use crate::geometry::{Point, PointLocation, Polygon, close_points, pure_direction, round_point};
use crate::obstacle::{Obstacle, ObstacleId, ObstacleTree};
use crate::path::{FoundPath, MsmtSearch};
use crate::splice::{Endpoint, PortManager};
use crate::visibility::{self, GeneratedGraph, VisibilityGraph};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: String,
    pub location: Point,
    /// Outline the port's entrances are found on; the shape's boundary
    /// when absent.
    #[serde(default)]
    pub curve: Option<Vec<Point>>,
}

/// A polygon to route around, or a group to route into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    pub boundary: Vec<Point>,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub ports: Vec<Port>,
}

impl Shape {
    pub fn rectangle(id: impl Into<String>, left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            id: id.into(),
            boundary: vec![
                Point::new(left, bottom),
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
            ],
            is_group: false,
            children: Vec::new(),
            ports: Vec::new(),
        }
    }

    pub fn with_port(mut self, id: impl Into<String>, location: Point) -> Self {
        self.ports.push(Port {
            id: id.into(),
            location,
            curve: None,
        });
        self
    }

    pub fn group(mut self, children: &[&str]) -> Self {
        self.is_group = true;
        self.children = children.iter().map(|c| c.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EndpointRef {
    Port { shape: String, port: String },
    Point(Point),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRequest {
    pub id: String,
    pub source: EndpointRef,
    pub target: EndpointRef,
    #[serde(default)]
    pub waypoints: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedEdge {
    pub id: String,
    pub points: Vec<Point>,
    pub bends: usize,
    pub length: f64,
}

impl RoutedEdge {
    fn from_points(id: &str, points: Vec<Point>) -> Self {
        let length = points.windows(2).map(|w| w[0].manhattan(w[1])).sum();
        Self {
            id: id.to_string(),
            bends: points.len().saturating_sub(2),
            length,
            points,
        }
    }
}

/// Shapes, their obstacles and the visibility graph built around them.
/// Shape changes mark the graph stale; the next route rebuilds it.
pub struct Router {
    config: RouterConfig,
    shapes: Vec<Shape>,
    by_id: HashMap<String, usize>,
    tree: ObstacleTree,
    generated: GeneratedGraph,
    ports: PortManager,
    stale: bool,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        let ports = PortManager::new(config.route_to_center, config.limit_port_visibility_splice);
        Self {
            config,
            shapes: Vec::new(),
            by_id: HashMap::new(),
            tree: ObstacleTree::new(Vec::new(), Vec::new()),
            generated: GeneratedGraph::empty(),
            ports,
            stale: false,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.by_id.get(id).map(|i| &self.shapes[*i])
    }

    // ── Shape changes ───────────────────────────────────────────────

    pub fn add_shape(&mut self, shape: Shape) -> RouterResult<()> {
        validate_shape(&shape)?;
        if self.by_id.contains_key(&shape.id) {
            return Err(RouterError::DuplicateShape(shape.id));
        }
        self.by_id.insert(shape.id.clone(), self.shapes.len());
        self.shapes.push(shape);
        self.stale = true;
        Ok(())
    }

    pub fn update_shape(&mut self, shape: Shape) -> RouterResult<()> {
        validate_shape(&shape)?;
        let Some(index) = self.by_id.get(&shape.id).copied() else {
            return Err(RouterError::UnknownShape(shape.id));
        };
        self.shapes[index] = shape;
        self.stale = true;
        Ok(())
    }

    pub fn remove_shape(&mut self, id: &str) -> RouterResult<Shape> {
        let Some(index) = self.by_id.remove(id) else {
            return Err(RouterError::UnknownShape(id.to_string()));
        };
        let removed = self.shapes.remove(index);
        for slot in self.by_id.values_mut() {
            if *slot > index {
                *slot -= 1;
            }
        }
        for shape in &mut self.shapes {
            shape.children.retain(|c| c != id);
        }
        self.stale = true;
        Ok(removed)
    }

    // ── Graph ───────────────────────────────────────────────────────

    pub fn rebuild(&mut self) -> RouterResult<()> {
        let mut obstacles = Vec::with_capacity(self.shapes.len());
        for (i, shape) in self.shapes.iter().enumerate() {
            let input = shape_polygon(shape)?;
            obstacles.push(Obstacle::new(
                ObstacleId(i),
                i,
                input,
                self.config.padding,
                shape.is_group,
                self.config.use_obstacle_rectangles,
            ));
        }
        let ancestors = self.group_ancestors()?;
        self.tree = ObstacleTree::create(obstacles, ancestors);
        self.generated = visibility::generate(&self.tree, self.config.use_sparse_visibility_graph)?;
        self.ports.clear_visibility();
        self.stale = false;
        info!(
            shapes = self.shapes.len(),
            vertices = self.generated.graph.vertex_count(),
            edges = self.generated.graph.edge_count(),
            sparse = self.config.use_sparse_visibility_graph,
            "router graph rebuilt"
        );
        Ok(())
    }

    fn ensure_built(&mut self) -> RouterResult<()> {
        if self.stale {
            self.rebuild()?;
        }
        Ok(())
    }

    fn group_ancestors(&self) -> RouterResult<Vec<BTreeSet<ObstacleId>>> {
        let mut ancestors = vec![BTreeSet::new(); self.shapes.len()];
        for (g, group) in self.shapes.iter().enumerate() {
            if !group.is_group {
                continue;
            }
            let mut pending: Vec<usize> = Vec::new();
            for child in &group.children {
                let Some(c) = self.by_id.get(child) else {
                    return Err(RouterError::UnknownChild {
                        group: group.id.clone(),
                        child: child.clone(),
                    });
                };
                pending.push(*c);
            }
            let mut seen = BTreeSet::new();
            while let Some(d) = pending.pop() {
                if d == g || !seen.insert(d) {
                    continue;
                }
                ancestors[d].insert(ObstacleId(g));
                let shape = &self.shapes[d];
                if shape.is_group {
                    pending.extend(shape.children.iter().filter_map(|c| self.by_id.get(c).copied()));
                }
            }
        }
        Ok(ancestors)
    }

    pub fn obstacle_tree(&mut self) -> RouterResult<&ObstacleTree> {
        self.ensure_built()?;
        Ok(&self.tree)
    }

    pub fn visibility_graph(&mut self) -> RouterResult<&VisibilityGraph> {
        self.ensure_built()?;
        Ok(&self.generated.graph)
    }

    pub fn snapshot(&mut self) -> RouterResult<(&ObstacleTree, &VisibilityGraph)> {
        self.ensure_built()?;
        Ok((&self.tree, &self.generated.graph))
    }

    // ── Routing ─────────────────────────────────────────────────────

    /// Routes `edges` one after another. `progress` is asked before each
    /// edge and may stop the run; edges routed so far are returned.
    pub fn route_edges<F>(&mut self, edges: &[EdgeRequest], mut progress: F) -> RouterResult<Vec<RoutedEdge>>
    where
        F: FnMut(usize, usize) -> ControlFlow<()>,
    {
        self.ensure_built()?;
        let mut routed = Vec::with_capacity(edges.len());
        for (i, edge) in edges.iter().enumerate() {
            if progress(i, edges.len()).is_break() {
                info!(routed = i, total = edges.len(), "routing cancelled");
                break;
            }
            routed.push(self.route_edge(edge)?);
        }
        Ok(routed)
    }

    pub fn route_edge(&mut self, edge: &EdgeRequest) -> RouterResult<RoutedEdge> {
        self.ensure_built()?;
        let source = self.resolve(&edge.source)?;
        let target = self.resolve(&edge.target)?;
        if !edge.waypoints.iter().all(|p| p.in_range()) {
            return Err(RouterError::InvalidCoordinate(format!("waypoint of edge {}", edge.id)));
        }
        let (s, t) = (round_point(source.location()), round_point(target.location()));
        if close_points(s, t) && edge.waypoints.is_empty() {
            return Ok(RoutedEdge::from_points(&edge.id, vec![s]));
        }
        let waypoints: Vec<Point> = edge.waypoints.iter().map(|p| round_point(*p)).collect();
        if self.tree.is_empty() {
            debug!(edge = %edge.id, "no obstacles, direct path");
            return Ok(RoutedEdge::from_points(&edge.id, fallback_path(s, &waypoints, t)));
        }
        if waypoints.is_empty()
            && let Some(points) = self.ports.visibility_intersection(&self.tree, &source, &target)
        {
            debug!(edge = %edge.id, "ports see each other");
            return Ok(RoutedEdge::from_points(&edge.id, points));
        }
        let found = self.search_with_escalation(&edge.id, &source, &target, &waypoints);
        let removed = self.ports.remove_control_points(&mut self.generated);
        let found = found?;
        removed?;
        Ok(settle(&edge.id, found, s, &waypoints, t))
    }

    /// Searches with the endpoints' non-shared groups passable, then every
    /// group around the endpoints, then every group.
    fn search_with_escalation(
        &mut self,
        id: &str,
        source: &Endpoint,
        target: &Endpoint,
        waypoints: &[Point],
    ) -> RouterResult<Option<FoundPath>> {
        let spliced = self
            .ports
            .add_control_points(&mut self.generated, &self.tree, source, target, waypoints)?;
        let search = MsmtSearch::new(self.config.bend_penalty_percent);
        for attempt in 0..3 {
            match attempt {
                0 => {}
                1 => {
                    debug!(edge = id, "retrying with all ancestors transparent");
                    self.ports.set_all_ancestors_active(&mut self.tree, source, target);
                }
                _ => {
                    debug!(edge = id, "retrying with all groups transparent");
                    self.ports.set_all_groups_active(&self.tree);
                }
            }
            let found = search.path_through(
                &self.generated.graph,
                self.ports.transparent(),
                &spliced.sources,
                &spliced.waypoints,
                &spliced.targets,
            );
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn resolve(&self, endpoint: &EndpointRef) -> RouterResult<Endpoint> {
        let (shape_id, port_id) = match endpoint {
            EndpointRef::Point(p) if p.in_range() => return Ok(Endpoint::Free(*p)),
            EndpointRef::Point(p) => return Err(RouterError::InvalidCoordinate(format!("free point {p:?}"))),
            EndpointRef::Port { shape, port } => (shape, port),
        };
        let Some(index) = self.by_id.get(shape_id).copied() else {
            return Err(RouterError::UnknownShape(shape_id.clone()));
        };
        let shape = &self.shapes[index];
        let Some((port_index, port)) = shape.ports.iter().enumerate().find(|(_, p)| &p.id == port_id) else {
            return Err(RouterError::UnknownPort {
                shape: shape_id.clone(),
                port: port_id.clone(),
            });
        };
        let obstacle = self.tree.obstacle(ObstacleId(index));
        let curve = match &port.curve {
            Some(points) => Polygon::from_points(points.iter().copied()),
            None => None,
        };
        let outline = curve.as_ref().unwrap_or(&obstacle.input);
        if outline.contains_point(port.location) == PointLocation::Outside {
            debug!(shape = %shape_id, port = %port_id, "port outside its shape, routed as a free point");
            return Ok(Endpoint::Free(port.location));
        }
        Ok(Endpoint::Port {
            obstacle: ObstacleId(index),
            index: port_index,
            location: port.location,
            curve,
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

fn validate_shape(shape: &Shape) -> RouterResult<()> {
    if !shape.boundary.iter().all(|p| p.in_range()) {
        return Err(RouterError::InvalidCoordinate(format!("shape {}", shape.id)));
    }
    shape_polygon(shape)?;
    for port in &shape.ports {
        let curve = port.curve.iter().flatten();
        if !port.location.in_range() || !curve.copied().all(Point::in_range) {
            return Err(RouterError::InvalidCoordinate(format!("port {} of shape {}", port.id, shape.id)));
        }
    }
    Ok(())
}

fn shape_polygon(shape: &Shape) -> RouterResult<Polygon> {
    Polygon::from_points(shape.boundary.iter().map(|p| round_point(*p)))
        .ok_or_else(|| RouterError::MissingBoundary(shape.id.clone()))
}

fn settle(id: &str, found: Option<FoundPath>, source: Point, waypoints: &[Point], target: Point) -> RoutedEdge {
    match found {
        Some(path) => RoutedEdge::from_points(id, path.points),
        None => {
            warn!(edge = id, "no path found, using a direct bent path");
            RoutedEdge::from_points(id, fallback_path(source, waypoints, target))
        }
    }
}

/// The path used when no search succeeds: straight where possible, else
/// one bend per leg, passing every waypoint.
pub fn fallback_path(source: Point, waypoints: &[Point], target: Point) -> Vec<Point> {
    let stops: Vec<Point> = std::iter::once(source)
        .chain(waypoints.iter().copied())
        .chain(std::iter::once(target))
        .collect();
    let mut points = vec![source];
    for leg in stops.windows(2) {
        let (a, b) = (leg[0], leg[1]);
        if close_points(a, b) {
            continue;
        }
        if pure_direction(a, b).is_none() {
            points.push(Point::new(a.x, b.y));
        }
        points.push(b);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port_ref(shape: &str, port: &str) -> EndpointRef {
        EndpointRef::Port {
            shape: shape.to_string(),
            port: port.to_string(),
        }
    }

    fn edge(source: EndpointRef, target: EndpointRef) -> EdgeRequest {
        EdgeRequest {
            id: "e".to_string(),
            source,
            target,
            waypoints: Vec::new(),
        }
    }

    #[test]
    fn fallback_bends_once_per_offset_leg() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 5.0);
        assert_eq!(fallback_path(a, &[], b), vec![a, Point::new(0.0, 5.0), b]);
        let c = Point::new(10.0, 0.0);
        assert_eq!(fallback_path(a, &[], c), vec![a, c]);
    }

    #[test]
    fn failed_search_falls_back_through_waypoints() {
        let (s, t) = (Point::new(0.0, 0.0), Point::new(20.0, 10.0));
        let routed = settle("e", None, s, &[Point::new(10.0, 0.0)], t);
        assert_eq!(
            routed.points,
            vec![s, Point::new(10.0, 0.0), Point::new(10.0, 10.0), t]
        );
        assert_eq!(routed.bends, 2);
        assert_eq!(routed.length, 30.0);

        let found = FoundPath {
            points: vec![s, Point::new(0.0, 10.0), t],
            cost: 30.0,
            length: 30.0,
            bends: 1,
        };
        assert_eq!(settle("e", Some(found), s, &[], t).points.len(), 3);
    }

    #[test]
    fn free_point_inside_a_group_escapes_on_retry() {
        let mut router = Router::default();
        router
            .add_shape(Shape::rectangle("g", 0.0, 0.0, 60.0, 40.0).group(&["c"]))
            .expect("add");
        router.add_shape(Shape::rectangle("c", 20.0, 10.0, 40.0, 30.0)).expect("add");
        router.add_shape(Shape::rectangle("far", 110.0, 0.0, 120.0, 40.0)).expect("add");
        // Keep the group's border off the graph box so leaving it is a crossing.
        router.add_shape(Shape::rectangle("top", -20.0, 60.0, 120.0, 70.0)).expect("add");
        router.add_shape(Shape::rectangle("bottom", -20.0, -30.0, 120.0, -20.0)).expect("add");
        let request = edge(
            EndpointRef::Point(Point::new(10.0, 20.0)),
            EndpointRef::Point(Point::new(100.0, 20.0)),
        );
        let routed = router.route_edge(&request).expect("route");
        assert_eq!(routed.points.first(), Some(&Point::new(10.0, 20.0)));
        assert_eq!(routed.points.last(), Some(&Point::new(100.0, 20.0)));
        assert!(routed.bends >= 2, "{:?}", routed.points);
        let tree = router.obstacle_tree().expect("tree");
        let child = &tree.obstacle(ObstacleId(1)).input;
        assert!(routed.points.windows(2).all(|w| !child.crosses_interior(w[0], w[1])));
    }

    #[test]
    fn shape_errors_fail_fast() {
        let mut router = Router::default();
        let flat = Shape {
            boundary: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0)],
            ..Shape::rectangle("flat", 0.0, 0.0, 1.0, 1.0)
        };
        assert!(matches!(router.add_shape(flat), Err(RouterError::MissingBoundary(_))));
        router.add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)).expect("add");
        assert!(matches!(
            router.add_shape(Shape::rectangle("a", 0.0, 0.0, 1.0, 1.0)),
            Err(RouterError::DuplicateShape(_))
        ));
        assert!(matches!(router.remove_shape("missing"), Err(RouterError::UnknownShape(_))));
        let request = edge(port_ref("a", "p"), EndpointRef::Point(Point::new(20.0, 20.0)));
        assert!(matches!(router.route_edge(&request), Err(RouterError::UnknownPort { .. })));
    }

    #[test]
    fn self_edge_is_a_single_point() {
        let mut router = Router::default();
        router
            .add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0).with_port("p", Point::new(5.0, 5.0)))
            .expect("add");
        let routed = router.route_edge(&edge(port_ref("a", "p"), port_ref("a", "p"))).expect("route");
        assert_eq!(routed.points, vec![Point::new(5.0, 5.0)]);
        assert_eq!(routed.bends, 0);
    }

    #[test]
    fn facing_ports_route_straight() {
        let mut router = Router::default();
        router
            .add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0).with_port("p", Point::new(5.0, 5.0)))
            .expect("add");
        router
            .add_shape(Shape::rectangle("b", 30.0, 0.0, 40.0, 10.0).with_port("p", Point::new(35.0, 5.0)))
            .expect("add");
        let routed = router.route_edge(&edge(port_ref("a", "p"), port_ref("b", "p"))).expect("route");
        assert_eq!(routed.points, vec![Point::new(10.0, 5.0), Point::new(30.0, 5.0)]);
        assert_eq!(routed.bends, 0);
        assert_eq!(routed.length, 20.0);
    }

    #[test]
    fn removal_and_update_rebuild_the_graph() {
        let mut router = Router::default();
        router.add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)).expect("add");
        router.add_shape(Shape::rectangle("b", 30.0, 0.0, 40.0, 10.0)).expect("add");
        let before = router.visibility_graph().expect("graph").vertex_count();
        router.remove_shape("b").expect("remove");
        let after = router.visibility_graph().expect("graph").vertex_count();
        assert!(after < before);
        router.update_shape(Shape::rectangle("a", 0.0, 0.0, 20.0, 20.0)).expect("update");
        let graph_box = router.obstacle_tree().expect("tree").graph_box();
        assert_eq!(graph_box.right, 21.0);
    }

    #[test]
    fn nested_groups_give_every_member_its_ancestors() {
        let mut router = Router::default();
        router
            .add_shape(Shape::rectangle("outer", 0.0, 0.0, 100.0, 100.0).group(&["inner"]))
            .expect("add");
        router
            .add_shape(Shape::rectangle("inner", 10.0, 10.0, 60.0, 60.0).group(&["leaf"]))
            .expect("add");
        router.add_shape(Shape::rectangle("leaf", 20.0, 20.0, 30.0, 30.0)).expect("add");
        let tree = router.obstacle_tree().expect("tree");
        let leaf: Vec<ObstacleId> = tree.ancestors(ObstacleId(2)).iter().copied().collect();
        assert_eq!(leaf, vec![ObstacleId(0), ObstacleId(1)]);
        assert!(tree.ancestors(ObstacleId(0)).is_empty());

        router.remove_shape("inner").expect("remove");
        router.add_shape(Shape::rectangle("g", 0.0, 0.0, 5.0, 5.0).group(&["ghost"])).expect("add");
        assert!(matches!(router.rebuild(), Err(RouterError::UnknownChild { .. })));
    }

    #[test]
    fn cancelled_run_returns_edges_routed_so_far() {
        let mut router = Router::default();
        router.add_shape(Shape::rectangle("a", 0.0, 0.0, 10.0, 10.0)).expect("add");
        let edges: Vec<EdgeRequest> = (0..3)
            .map(|i| EdgeRequest {
                id: format!("e{i}"),
                source: EndpointRef::Point(Point::new(-5.0, i as f64 * 5.0)),
                target: EndpointRef::Point(Point::new(15.0, i as f64 * 5.0)),
                waypoints: Vec::new(),
            })
            .collect();
        let routed = router
            .route_edges(&edges, |i, _| if i < 2 { ControlFlow::Continue(()) } else { ControlFlow::Break(()) })
            .expect("route");
        assert_eq!(routed.len(), 2);
    }
}
