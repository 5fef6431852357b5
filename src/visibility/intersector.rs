//! Turns merged scan segments into graph vertices and edges.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::RouterResult;
use crate::geometry::compare::coordinate_key;
use crate::geometry::{Point, PointKey};
use crate::obstacle::group_by_edge;

use super::graph::VisibilityGraph;
use super::scan::ScanDirection;
use super::scan_segment::{ScanSegmentTree, SegmentId};

pub type SegmentPoints = BTreeMap<SegmentId, Vec<Point>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum IntersectEvent {
    VerticalOpen,
    Horizontal,
    VerticalClose,
}

/// Realizes every crossing of a horizontal and a vertical segment, then
/// builds the graph.
pub fn intersect(horizontal: &mut ScanSegmentTree, vertical: &mut ScanSegmentTree) -> RouterResult<VisibilityGraph> {
    debug_assert_eq!(horizontal.direction(), ScanDirection::Horizontal);
    let mut events: Vec<(i64, IntersectEvent, SegmentId)> = Vec::new();
    for (id, seg) in vertical.segments() {
        events.push((coordinate_key(seg.start.y), IntersectEvent::VerticalOpen, id));
        events.push((coordinate_key(seg.end.y), IntersectEvent::VerticalClose, id));
    }
    for (id, seg) in horizontal.segments() {
        events.push((coordinate_key(seg.start.y), IntersectEvent::Horizontal, id));
    }
    events.sort();

    let mut active: BTreeMap<(i64, SegmentId), ()> = BTreeMap::new();
    let mut h_points = SegmentPoints::new();
    let mut v_points = SegmentPoints::new();
    for (_, kind, id) in events {
        match kind {
            IntersectEvent::VerticalOpen => {
                active.insert((coordinate_key(vertical.segment(id).start.x), id), ());
            }
            IntersectEvent::VerticalClose => {
                active.remove(&(coordinate_key(vertical.segment(id).start.x), id));
            }
            IntersectEvent::Horizontal => {
                let seg = horizontal.segment(id);
                let lo = (coordinate_key(seg.start.x), SegmentId(0));
                let hi = (coordinate_key(seg.end.x), SegmentId(usize::MAX));
                for ((_, vid), _) in active.range(lo..=hi) {
                    let point = Point::new(vertical.segment(*vid).start.x, seg.start.y);
                    h_points.entry(id).or_default().push(point);
                    v_points.entry(*vid).or_default().push(point);
                }
            }
        }
    }
    realize(horizontal, vertical, h_points, v_points)
}

fn add_required_points(tree: &ScanSegmentTree, points: &mut SegmentPoints) {
    for (id, seg) in tree.segments() {
        let list = points.entry(id).or_default();
        if seg.need_start_vertex {
            list.push(seg.start);
        }
        if seg.need_end_vertex {
            list.push(seg.end);
        }
        for crossing in &seg.crossings {
            let (a, b) = crossing.edge_points();
            list.push(a);
            list.push(b);
        }
    }
}

fn synchronize(from: &SegmentPoints, to_tree: &ScanSegmentTree, to: &mut SegmentPoints) {
    for points in from.values() {
        for p in points {
            if let Some(id) = to_tree.find_containing_point(*p) {
                to.entry(id).or_default().push(*p);
            }
        }
    }
}

/// Creates vertices at the given points (plus each segment's required
/// points), joins consecutive vertices along every segment and drops
/// segments left without vertices.
pub fn realize(
    horizontal: &mut ScanSegmentTree,
    vertical: &mut ScanSegmentTree,
    mut h_points: SegmentPoints,
    mut v_points: SegmentPoints,
) -> RouterResult<VisibilityGraph> {
    add_required_points(horizontal, &mut h_points);
    add_required_points(vertical, &mut v_points);
    let snapshot = h_points.clone();
    synchronize(&snapshot, vertical, &mut v_points);
    let snapshot = v_points.clone();
    synchronize(&snapshot, horizontal, &mut h_points);

    let mut graph = VisibilityGraph::new();
    build_edges(&mut graph, horizontal, h_points)?;
    build_edges(&mut graph, vertical, v_points)?;
    Ok(graph)
}

fn build_edges(graph: &mut VisibilityGraph, tree: &mut ScanSegmentTree, mut points: SegmentPoints) -> RouterResult<()> {
    let d = tree.direction();
    for id in tree.ids() {
        let mut list = points.remove(&id).unwrap_or_default();
        let seg = tree.segment(id);
        let (lo, hi) = (coordinate_key(d.coord(seg.start)), coordinate_key(d.coord(seg.end)));
        list.retain(|p| {
            let k = coordinate_key(d.coord(*p));
            lo <= k && k <= hi
        });
        list.sort_by(|a, b| d.coord(*a).partial_cmp(&d.coord(*b)).unwrap_or(Ordering::Equal));
        list.dedup_by_key(|p| PointKey::from(*p));
        if list.is_empty() {
            tree.remove(id);
            continue;
        }
        let crossing_edges: BTreeMap<(PointKey, PointKey), Vec<_>> = group_by_edge(&seg.crossings)
            .into_iter()
            .map(|(a, b, groups)| ((PointKey::from(a), PointKey::from(b)), groups))
            .collect();
        let weight = seg.weight;
        let vertices: Vec<_> = list.iter().map(|p| graph.add_vertex(*p)).collect();
        for (pair, w) in list.windows(2).zip(vertices.windows(2)) {
            let groups = crossing_edges
                .get(&(PointKey::from(pair[0]), PointKey::from(pair[1])))
                .cloned()
                .unwrap_or_default();
            graph.add_edge(w[0], w[1], weight, groups)?;
        }
        let seg = tree.segment_mut(id);
        seg.lowest_vertex = vertices.first().copied();
        seg.highest_vertex = vertices.last().copied();
    }
    Ok(())
}
