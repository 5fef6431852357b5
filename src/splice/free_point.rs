//! Splicing points that belong to no obstacle: free ports and waypoints.

use tracing::trace;

use crate::error::RouterResult;
use crate::geometry::{Direction, Point, Rect, close, round_point};
use crate::obstacle::ObstacleTree;
use crate::visibility::{GeneratedGraph, NORMAL_WEIGHT, ScanDirection, VertexId};

use super::transient::TransientGraph;

/// Ties `location` into the graph and returns its vertex.
///
/// A point already on a vertex needs nothing. A point outside the graph
/// box is joined, through at most one bend, to its clamp onto the box.
/// Anything else shoots a ray each way and splices into every segment the
/// ray crosses before it is blocked.
pub fn splice_free_point(
    transient: &mut TransientGraph,
    generated: &mut GeneratedGraph,
    tree: &ObstacleTree,
    location: Point,
    limit: Option<&Rect>,
) -> RouterResult<VertexId> {
    let location = round_point(location);
    if let Some(vertex) = generated.graph.find_vertex(location) {
        return Ok(vertex);
    }
    let graph_box = tree.graph_box();
    if graph_box.contains_point(location) {
        return splice_in_bounds(transient, generated, tree, location, limit);
    }
    let clamped = round_point(graph_box.clamp(location));
    let inside = match generated.graph.find_vertex(clamped) {
        Some(vertex) => vertex,
        None => splice_in_bounds(transient, generated, tree, clamped, limit)?,
    };
    let outside = transient.find_or_add_vertex(&mut generated.graph, location);
    let arrival = if close(location.x, clamped.x) {
        Direction::North
    } else {
        Direction::East
    };
    transient.connect_via_bend(&mut generated.graph, outside, inside, arrival, NORMAL_WEIGHT)?;
    trace!(?location, ?clamped, "out-of-bounds point spliced");
    Ok(outside)
}

fn splice_in_bounds(
    transient: &mut TransientGraph,
    generated: &mut GeneratedGraph,
    tree: &ObstacleTree,
    location: Point,
    limit: Option<&Rect>,
) -> RouterResult<VertexId> {
    let vertex = transient.find_or_add_vertex(&mut generated.graph, location);
    for dir in Direction::ALL {
        // Inside an obstacle the ray leaves it and stops at the next one.
        let reach = tree.max_visibility_segment(location, dir);
        if reach.is_degenerate() {
            continue;
        }
        let (graph, perpendicular) = generated.graph_and_segments(ScanDirection::for_direction(dir).perpendicular());
        transient.extend_edge_chain(graph, tree, perpendicular, vertex, &reach, limit)?;
    }
    trace!(?location, degree = generated.graph.vertex(vertex).degree(), "free point spliced");
    Ok(vertex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::obstacle::{Obstacle, ObstacleId};
    use crate::visibility::generate;

    fn scene() -> (ObstacleTree, GeneratedGraph) {
        let obstacles = [Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(30.0, 0.0, 40.0, 10.0)]
            .iter()
            .enumerate()
            .map(|(i, r)| Obstacle::new(ObstacleId(i), i, Polygon::rectangle(r), 1.0, false, false))
            .collect();
        let tree = ObstacleTree::create(obstacles, Vec::new());
        let generated = generate(&tree, false).expect("graph");
        (tree, generated)
    }

    #[test]
    fn point_between_obstacles_connects_each_way() {
        let (tree, mut generated) = scene();
        let before = generated.graph.clone();
        let mut transient = TransientGraph::begin(&generated.graph);
        let vertex = splice_free_point(&mut transient, &mut generated, &tree, Point::new(20.0, 5.0), None)
            .expect("splice");
        assert_eq!(generated.graph.vertex(vertex).degree(), 4);
        transient.remove_from_graph(&mut generated.graph).expect("remove");
        assert_eq!(generated.graph, before);
    }

    #[test]
    fn existing_vertex_needs_no_splice() {
        let (tree, mut generated) = scene();
        let (existing, point) = {
            let (id, v) = generated.graph.vertices().next().expect("vertex");
            (id, v.point)
        };
        let edges = generated.graph.edge_count();
        let mut transient = TransientGraph::begin(&generated.graph);
        let vertex = splice_free_point(&mut transient, &mut generated, &tree, point, None).expect("splice");
        assert_eq!(vertex, existing);
        assert_eq!(generated.graph.edge_count(), edges);
    }

    #[test]
    fn out_of_bounds_point_bends_onto_the_box() {
        let (tree, mut generated) = scene();
        let before = generated.graph.clone();
        let mut transient = TransientGraph::begin(&generated.graph);
        let location = Point::new(60.0, 30.0);
        let vertex = splice_free_point(&mut transient, &mut generated, &tree, location, None).expect("splice");
        assert_eq!(generated.graph.point(vertex), location);
        assert_eq!(generated.graph.vertex(vertex).degree(), 1);
        transient.remove_from_graph(&mut generated.graph).expect("remove");
        assert_eq!(generated.graph, before);
    }
}
