//! Adds the endpoints of one edge to the graph before its search and takes
//! them out again afterwards.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::RouterResult;
use crate::geometry::{Point, PointLocation, Polygon, Rect, close_points, round_point};
use crate::obstacle::{ObstacleId, ObstacleTree};
use crate::visibility::{GeneratedGraph, ScanDirection, TransparentGroups, VertexId};

use super::free_point::splice_free_point;
use super::ports::{ObstaclePort, PortEntrance, visibility_intersection};
use super::transient::TransientGraph;

/// One end of an edge.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Port `index` of the shape behind `obstacle`. Entrances are found
    /// on `curve`, or on the shape itself without one.
    Port {
        obstacle: ObstacleId,
        index: usize,
        location: Point,
        curve: Option<Polygon>,
    },
    Free(Point),
}

impl Endpoint {
    pub fn location(&self) -> Point {
        match self {
            Endpoint::Port { location, .. } => *location,
            Endpoint::Free(point) => *point,
        }
    }

    pub fn obstacle(&self) -> Option<ObstacleId> {
        match self {
            Endpoint::Port { obstacle, .. } => Some(*obstacle),
            Endpoint::Free(_) => None,
        }
    }
}

/// Vertices the search starts from, must reach, and must pass in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplicedEndpoints {
    pub sources: Vec<VertexId>,
    pub targets: Vec<VertexId>,
    pub waypoints: Vec<VertexId>,
}

#[derive(Debug, Default)]
pub struct PortManager {
    route_to_center: bool,
    limit_splice: bool,
    ports: HashMap<(ObstacleId, usize), ObstaclePort>,
    transient: Option<TransientGraph>,
    active: TransparentGroups,
}

impl PortManager {
    pub fn new(route_to_center: bool, limit_splice: bool) -> Self {
        Self {
            route_to_center,
            limit_splice,
            ..Self::default()
        }
    }

    /// Forgets cached ports and any splice left in a graph that is being
    /// replaced; port entrances depend on the obstacles.
    pub fn clear_visibility(&mut self) {
        self.ports.clear();
        self.transient = None;
        self.active.clear();
    }

    pub fn transparent(&self) -> &TransparentGroups {
        &self.active
    }

    fn port(
        &mut self,
        tree: &ObstacleTree,
        obstacle: ObstacleId,
        index: usize,
        location: Point,
        curve: Option<&Polygon>,
    ) -> ObstaclePort {
        let location = round_point(location);
        if let Some(port) = self.ports.get(&(obstacle, index))
            && close_points(port.location, location)
        {
            return port.clone();
        }
        let curve = curve.unwrap_or(&tree.obstacle(obstacle).input);
        let port = ObstaclePort::new(tree, obstacle, location, curve);
        self.ports.insert((obstacle, index), port.clone());
        port
    }

    pub fn visibility_intersection(
        &mut self,
        tree: &ObstacleTree,
        source: &Endpoint,
        target: &Endpoint,
    ) -> Option<Vec<Point>> {
        if self.route_to_center {
            return None;
        }
        let (
            Endpoint::Port {
                obstacle: so,
                index: si,
                location: sl,
                curve: sc,
            },
            Endpoint::Port {
                obstacle: to,
                index: ti,
                location: tl,
                curve: tc,
            },
        ) = (source, target)
        else {
            return None;
        };
        if so == to {
            return None;
        }
        let source = self.port(tree, *so, *si, *sl, sc.as_ref());
        let target = self.port(tree, *to, *ti, *tl, tc.as_ref());
        visibility_intersection(tree, &source, &target)
    }

    /// Splices both endpoints and the waypoints, and activates the groups
    /// that only one endpoint sits in.
    pub fn add_control_points(
        &mut self,
        generated: &mut GeneratedGraph,
        tree: &ObstacleTree,
        source: &Endpoint,
        target: &Endpoint,
        waypoints: &[Point],
    ) -> RouterResult<SplicedEndpoints> {
        if let Some(previous) = self.transient.take() {
            previous.remove_from_graph(&mut generated.graph)?;
        }
        self.active.clear();
        if let (Some(s), Some(t)) = (source.obstacle(), target.obstacle()) {
            let (a, b) = (tree.ancestors(s), tree.ancestors(t));
            self.active.extend(a.symmetric_difference(b).copied());
        }
        let limit = self.limit_splice.then(|| splice_limit(tree, source, target, waypoints));
        let mut transient = TransientGraph::begin(&generated.graph);
        let result = self.splice_all(&mut transient, generated, tree, source, target, waypoints, limit.as_ref());
        self.transient = Some(transient);
        let spliced = result?;
        debug!(
            sources = spliced.sources.len(),
            targets = spliced.targets.len(),
            waypoints = spliced.waypoints.len(),
            transparent = self.active.len(),
            "control points added"
        );
        Ok(spliced)
    }

    #[allow(clippy::too_many_arguments)]
    fn splice_all(
        &mut self,
        transient: &mut TransientGraph,
        generated: &mut GeneratedGraph,
        tree: &ObstacleTree,
        source: &Endpoint,
        target: &Endpoint,
        waypoints: &[Point],
        limit: Option<&Rect>,
    ) -> RouterResult<SplicedEndpoints> {
        let sources = self.splice_endpoint(transient, generated, tree, source, limit)?;
        let targets = self.splice_endpoint(transient, generated, tree, target, limit)?;
        let waypoints = waypoints
            .iter()
            .map(|p| splice_free_point(transient, generated, tree, *p, limit))
            .collect::<RouterResult<Vec<_>>>()?;
        Ok(SplicedEndpoints {
            sources,
            targets,
            waypoints,
        })
    }

    fn splice_endpoint(
        &mut self,
        transient: &mut TransientGraph,
        generated: &mut GeneratedGraph,
        tree: &ObstacleTree,
        endpoint: &Endpoint,
        limit: Option<&Rect>,
    ) -> RouterResult<Vec<VertexId>> {
        let (obstacle, index, location, curve) = match endpoint {
            Endpoint::Free(point) => {
                return Ok(vec![splice_free_point(transient, generated, tree, *point, limit)?]);
            }
            Endpoint::Port {
                obstacle,
                index,
                location,
                curve,
            } => (*obstacle, *index, *location, curve.as_ref()),
        };
        let port = self.port(tree, obstacle, index, location, curve);
        if port.entrances.is_empty() {
            return Ok(vec![splice_free_point(transient, generated, tree, location, limit)?]);
        }
        let center = self
            .route_to_center
            .then(|| transient.find_or_add_vertex(&mut generated.graph, port.location));
        let mut borders = Vec::new();
        for entrance in &port.entrances {
            let border = add_entrance(transient, generated, tree, entrance, limit)?;
            if let Some(center) = center {
                transient.connect_via_bend(
                    &mut generated.graph,
                    center,
                    border,
                    entrance.outward,
                    entrance.initial_weight(),
                )?;
            }
            if !borders.contains(&border) {
                borders.push(border);
            }
        }
        Ok(match center {
            Some(center) => vec![center],
            None => borders,
        })
    }

    pub fn remove_control_points(&mut self, generated: &mut GeneratedGraph) -> RouterResult<()> {
        if let Some(transient) = self.transient.take() {
            transient.remove_from_graph(&mut generated.graph)?;
        }
        Ok(())
    }

    /// First escalation: after re-deriving spatial ancestry, every group
    /// around either endpoint becomes passable.
    pub fn set_all_ancestors_active(&mut self, tree: &mut ObstacleTree, source: &Endpoint, target: &Endpoint) {
        tree.adjust_spatial_ancestors();
        for endpoint in [source, target] {
            let groups = enclosing_groups(tree, endpoint);
            self.active.extend(groups);
        }
        debug!(transparent = self.active.len(), "ancestors activated");
    }

    pub fn set_all_groups_active(&mut self, tree: &ObstacleTree) {
        self.active.extend(tree.groups().map(|g| g.id));
        debug!(transparent = self.active.len(), "all groups activated");
    }
}

/// Ties one entrance into the graph: its padded border chains out along
/// the entrance's visibility and joins the unpadded border point.
fn add_entrance(
    transient: &mut TransientGraph,
    generated: &mut GeneratedGraph,
    tree: &ObstacleTree,
    entrance: &PortEntrance,
    limit: Option<&Rect>,
) -> RouterResult<VertexId> {
    let border = transient.find_or_add_vertex(&mut generated.graph, entrance.unpadded_border);
    let padded = transient.find_or_add_vertex(&mut generated.graph, entrance.visibility_border);
    if entrance.can_extend() {
        let (graph, perpendicular) =
            generated.graph_and_segments(ScanDirection::for_direction(entrance.outward).perpendicular());
        transient.extend_edge_chain(
            graph,
            tree,
            perpendicular,
            padded,
            &entrance.max_visibility,
            limit,
        )?;
    }
    if border != padded {
        transient.find_or_add_edge(&mut generated.graph, border, padded, entrance.border_weight)?;
    }
    Ok(border)
}

fn enclosing_groups(tree: &ObstacleTree, endpoint: &Endpoint) -> BTreeSet<ObstacleId> {
    match endpoint {
        Endpoint::Port { obstacle, .. } => tree.ancestors(*obstacle).clone(),
        Endpoint::Free(point) => tree
            .groups()
            .filter(|g| g.visibility_polygon().contains_point(*point) != PointLocation::Outside)
            .map(|g| g.id)
            .collect(),
    }
}

/// Bounding box of the endpoints' obstacles, free points and in-bounds
/// waypoints.
fn splice_limit(tree: &ObstacleTree, source: &Endpoint, target: &Endpoint, waypoints: &[Point]) -> Rect {
    let graph_box = tree.graph_box();
    let mut limit: Option<Rect> = None;
    let mut add = |rect: Rect| {
        limit = Some(match limit {
            Some(current) => current.union(&rect),
            None => rect,
        });
    };
    for endpoint in [source, target] {
        match endpoint {
            Endpoint::Port { obstacle, .. } => add(tree.obstacle(*obstacle).visibility_bbox()),
            Endpoint::Free(point) => add(Rect::from_point(*point)),
        }
    }
    for point in waypoints.iter().filter(|p| graph_box.contains_point(**p)) {
        add(Rect::from_point(*point));
    }
    limit.unwrap_or(graph_box)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::obstacle::Obstacle;
    use crate::visibility::generate;

    fn scene(rects: &[Rect]) -> (ObstacleTree, GeneratedGraph) {
        let obstacles = rects
            .iter()
            .enumerate()
            .map(|(i, r)| Obstacle::new(ObstacleId(i), i, Polygon::rectangle(r), 1.0, false, false))
            .collect();
        let tree = ObstacleTree::create(obstacles, Vec::new());
        let generated = generate(&tree, false).expect("graph");
        (tree, generated)
    }

    fn port(obstacle: usize, x: f64, y: f64) -> Endpoint {
        Endpoint::Port {
            obstacle: ObstacleId(obstacle),
            index: 0,
            location: Point::new(x, y),
            curve: None,
        }
    }

    #[test]
    fn add_then_remove_restores_the_graph() {
        let (tree, mut generated) = scene(&[
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(30.0, 20.0, 40.0, 30.0),
            Rect::new(15.0, 40.0, 25.0, 50.0),
        ]);
        let before = generated.graph.clone();
        let mut manager = PortManager::new(false, false);
        let spliced = manager
            .add_control_points(
                &mut generated,
                &tree,
                &port(0, 5.0, 5.0),
                &port(1, 35.0, 25.0),
                &[Point::new(20.0, 35.0)],
            )
            .expect("splice");
        assert_eq!(spliced.sources.len(), 4);
        assert_eq!(spliced.targets.len(), 4);
        assert_eq!(spliced.waypoints.len(), 1);
        assert!(generated.graph.vertex_count() > before.vertex_count());
        manager.remove_control_points(&mut generated).expect("remove");
        assert_eq!(generated.graph, before);
    }

    #[test]
    fn route_to_center_starts_at_the_port_location() {
        let (tree, mut generated) = scene(&[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(30.0, 20.0, 40.0, 30.0)]);
        let mut manager = PortManager::new(true, false);
        let spliced = manager
            .add_control_points(&mut generated, &tree, &port(0, 5.0, 5.0), &Endpoint::Free(Point::new(20.0, 40.0)), &[])
            .expect("splice");
        assert_eq!(spliced.sources.len(), 1);
        let center = spliced.sources[0];
        assert_eq!(generated.graph.point(center), Point::new(5.0, 5.0));
        assert_eq!(generated.graph.vertex(center).degree(), 4);
        manager.remove_control_points(&mut generated).expect("remove");
    }

    #[test]
    fn facing_ports_skip_the_graph() {
        let (tree, _) = scene(&[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(30.0, 0.0, 40.0, 10.0)]);
        let mut manager = PortManager::new(false, false);
        let path = manager
            .visibility_intersection(&tree, &port(0, 5.0, 5.0), &port(1, 35.0, 5.0))
            .expect("direct path");
        assert_eq!(path, vec![Point::new(10.0, 5.0), Point::new(30.0, 5.0)]);
    }

    #[test]
    fn escalation_widens_the_transparent_groups() {
        let obstacles = vec![
            Obstacle::new(ObstacleId(0), 0, Polygon::rectangle(&Rect::new(0.0, 0.0, 40.0, 40.0)), 1.0, true, false),
            Obstacle::new(ObstacleId(1), 1, Polygon::rectangle(&Rect::new(10.0, 10.0, 20.0, 20.0)), 1.0, false, false),
            Obstacle::new(ObstacleId(2), 2, Polygon::rectangle(&Rect::new(60.0, 0.0, 90.0, 40.0)), 1.0, true, false),
        ];
        let mut tree = ObstacleTree::create(obstacles, Vec::new());
        let mut generated = generate(&tree, false).expect("graph");
        let mut manager = PortManager::new(false, false);
        let (source, target) = (Endpoint::Free(Point::new(30.0, 30.0)), Endpoint::Free(Point::new(50.0, 20.0)));
        manager
            .add_control_points(&mut generated, &tree, &source, &target, &[])
            .expect("splice");
        assert!(manager.transparent().is_empty());

        manager.set_all_ancestors_active(&mut tree, &source, &target);
        assert_eq!(manager.transparent().iter().collect::<Vec<_>>(), vec![ObstacleId(0)]);

        manager.set_all_groups_active(&tree);
        assert_eq!(manager.transparent().len(), 2);
        manager.remove_control_points(&mut generated).expect("remove");
    }

    #[test]
    fn limit_covers_endpoint_obstacles() {
        let (tree, _) = scene(&[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(30.0, 20.0, 40.0, 30.0)]);
        let limit = splice_limit(&tree, &port(0, 5.0, 5.0), &Endpoint::Free(Point::new(50.0, 50.0)), &[]);
        assert_eq!(limit, Rect::new(-1.0, -1.0, 50.0, 50.0));
    }
}
