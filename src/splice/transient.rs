//! Temporary graph edits made while a single edge is routed.
//!
//! Everything spliced in for one edge is recorded against a [`GraphMark`]:
//! new vertices and edges live past the mark and persistent edges that had
//! to be split are remembered, so [`TransientGraph::remove_from_graph`]
//! puts the graph back exactly as it was.

use std::cmp::Ordering;

use tracing::trace;

use crate::error::{RouterError, RouterResult};
use crate::geometry::{Direction, Point, Rect, close_points, compare, pure_direction};
use crate::obstacle::{ObstacleTree, VisibilitySegment, group_by_edge};
use crate::visibility::{
    EdgeId, GraphMark, NORMAL_WEIGHT, OVERLAPPED_WEIGHT, ScanDirection, ScanSegmentTree, SegmentId, VertexId,
    VisibilityGraph,
};

enum Bracket {
    Reached(VertexId, VertexId),
    Spanned(VertexId, VertexId),
    Open(VertexId),
}

#[derive(Debug)]
pub struct TransientGraph {
    mark: GraphMark,
    removed: Vec<EdgeId>,
}

impl TransientGraph {
    pub fn begin(graph: &VisibilityGraph) -> Self {
        Self {
            mark: graph.mark(),
            removed: Vec::new(),
        }
    }

    pub fn mark(&self) -> GraphMark {
        self.mark
    }

    pub fn is_transient_vertex(&self, vertex: VertexId) -> bool {
        vertex.0 >= self.mark.vertices
    }

    pub fn is_transient_edge(&self, edge: EdgeId) -> bool {
        edge.0 >= self.mark.edges
    }

    pub fn removed_edges(&self) -> &[EdgeId] {
        &self.removed
    }

    pub fn find_or_add_vertex(&mut self, graph: &mut VisibilityGraph, point: Point) -> VertexId {
        graph.add_vertex(point)
    }

    fn bracket(graph: &VisibilityGraph, from: VertexId, target: Point, dir: Direction) -> Bracket {
        let mut current = from;
        loop {
            let Some(next) = graph.neighbor(current, dir) else {
                return Bracket::Open(current);
            };
            let point = graph.point(next);
            if close_points(point, target) {
                return Bracket::Reached(current, next);
            }
            if pure_direction(point, target) != Some(dir) {
                return Bracket::Spanned(current, next);
            }
            current = next;
        }
    }

    fn edge_between(graph: &VisibilityGraph, a: VertexId, b: VertexId) -> RouterResult<EdgeId> {
        graph.find_edge(a, b).ok_or_else(|| {
            RouterError::Inconsistent(format!(
                "no edge between {:?} and {:?}",
                graph.point(a),
                graph.point(b)
            ))
        })
    }

    /// Joins two collinear vertices, reusing or splitting whatever part of
    /// the line the graph already covers.
    pub fn find_or_add_edge(
        &mut self,
        graph: &mut VisibilityGraph,
        a: VertexId,
        b: VertexId,
        weight: f64,
    ) -> RouterResult<EdgeId> {
        let (pa, pb) = (graph.point(a), graph.point(b));
        let Some(dir) = pure_direction(pa, pb) else {
            return Err(RouterError::Inconsistent(format!(
                "cannot join {pa:?} and {pb:?} with one edge"
            )));
        };
        let from_a = match Self::bracket(graph, a, pb, dir) {
            Bracket::Reached(s, t) => return Self::edge_between(graph, s, t),
            Bracket::Spanned(s, t) => {
                let edge = Self::edge_between(graph, s, t)?;
                return self.split_edge(graph, edge, b);
            }
            Bracket::Open(last) => last,
        };
        let from_b = match Self::bracket(graph, b, pa, dir.opposite()) {
            Bracket::Reached(s, t) => return Self::edge_between(graph, s, t),
            Bracket::Spanned(s, t) => {
                let edge = Self::edge_between(graph, s, t)?;
                return self.split_edge(graph, edge, a);
            }
            Bracket::Open(last) => last,
        };
        self.stitch(graph, from_a, from_b, dir, weight)
    }

    /// Joins two chain ends that face each other across a gap. Vertices
    /// already on the line inside the gap are threaded in order, so no new
    /// edge passes over an existing vertex or edge.
    fn stitch(
        &mut self,
        graph: &mut VisibilityGraph,
        from: VertexId,
        to: VertexId,
        dir: Direction,
        weight: f64,
    ) -> RouterResult<EdgeId> {
        let mut stops = graph.vertices_between(graph.point(from), graph.point(to));
        stops.push(to);
        let mut current = from;
        let mut last = None;
        for stop in stops {
            let edge = match graph.edge_in_direction(current, dir) {
                Some(edge) if graph.edge(edge).other(current) == stop => edge,
                Some(edge) => {
                    self.split_edge(graph, edge, stop)?;
                    Self::edge_between(graph, current, stop)?
                }
                // An edge reaching back over `current` is split at it.
                None => match graph.edge_in_direction(stop, dir.opposite()) {
                    Some(edge) => {
                        self.split_edge(graph, edge, current)?;
                        Self::edge_between(graph, current, stop)?
                    }
                    None => graph.add_edge(current, stop, weight, Vec::new())?,
                },
            };
            last = Some(edge);
            current = stop;
        }
        last.ok_or_else(|| RouterError::Inconsistent("empty stitch".to_string()))
    }

    /// Replaces `edge` by two halves meeting at `vertex` and returns the
    /// lower half. Weight and crossings carry over to both halves.
    pub fn split_edge(&mut self, graph: &mut VisibilityGraph, edge: EdgeId, vertex: VertexId) -> RouterResult<EdgeId> {
        let (source, target) = {
            let e = graph.edge(edge);
            (e.source, e.target)
        };
        if vertex == source || vertex == target {
            return Ok(edge);
        }
        let removed = graph.remove_edge(edge);
        if !self.is_transient_edge(edge) {
            self.removed.push(edge);
        }
        graph.add_edge(vertex, removed.target, removed.weight, removed.crossings.clone())?;
        graph.add_edge(removed.source, vertex, removed.weight, removed.crossings)
    }

    /// Connects `from` to `to`, through one bend when they are not
    /// collinear; the leg arriving at `to` runs along `final_dir`.
    pub fn connect_via_bend(
        &mut self,
        graph: &mut VisibilityGraph,
        from: VertexId,
        to: VertexId,
        final_dir: Direction,
        weight: f64,
    ) -> RouterResult<()> {
        if from == to {
            return Ok(());
        }
        let (pa, pb) = (graph.point(from), graph.point(to));
        if pure_direction(pa, pb).is_some() {
            self.find_or_add_edge(graph, from, to, weight)?;
            return Ok(());
        }
        let bend = if final_dir.is_vertical() {
            Point::new(pb.x, pa.y)
        } else {
            Point::new(pa.x, pb.y)
        };
        let bend = graph.add_vertex(bend);
        self.find_or_add_edge(graph, from, bend, weight)?;
        self.find_or_add_edge(graph, bend, to, weight)?;
        Ok(())
    }

    /// Puts a vertex at `point` on segment `id` and ties it into the
    /// segment's edge chain. `None` if the segment has no vertices.
    pub fn link_into_segment(
        &mut self,
        graph: &mut VisibilityGraph,
        segments: &ScanSegmentTree,
        id: SegmentId,
        point: Point,
    ) -> RouterResult<Option<VertexId>> {
        let d = segments.direction();
        let ascending = d.ascending();
        let segment = segments.segment(id);
        let Some(mut lowest) = segment.lowest_vertex else {
            return Ok(None);
        };
        // Earlier splices may have extended the chain below its lowest
        // persistent vertex.
        let start = d.coord(segment.start);
        while let Some(prev) = graph.neighbor(lowest, ascending.opposite()) {
            if compare(d.coord(graph.point(prev)), start) == Ordering::Less {
                break;
            }
            lowest = prev;
        }
        let c = d.coord(point);
        if compare(c, d.coord(graph.point(lowest))) == Ordering::Less {
            let vertex = graph.add_vertex(point);
            self.find_or_add_edge(graph, vertex, lowest, segment.weight)?;
            return Ok(Some(vertex));
        }
        let mut current = lowest;
        loop {
            if compare(d.coord(graph.point(current)), c) == Ordering::Equal {
                return Ok(Some(current));
            }
            match graph.neighbor(current, ascending) {
                Some(next) if compare(d.coord(graph.point(next)), c) == Ordering::Greater => {
                    let vertex = graph.add_vertex(point);
                    let edge = Self::edge_between(graph, current, next)?;
                    self.split_edge(graph, edge, vertex)?;
                    return Ok(Some(vertex));
                }
                Some(next) => current = next,
                None => {
                    let vertex = graph.add_vertex(point);
                    self.find_or_add_edge(graph, current, vertex, segment.weight)?;
                    return Ok(Some(vertex));
                }
            }
        }
    }

    /// Runs a chain of edges from `start` toward `reach.end`, splicing into
    /// every perpendicular segment it crosses, then adds the group-crossing
    /// edges that lie on it. With a `limit`, the chain stops at the first
    /// segment past the rectangle once it has made at least one splice.
    /// Returns the first vertex spliced.
    pub fn extend_edge_chain(
        &mut self,
        graph: &mut VisibilityGraph,
        tree: &ObstacleTree,
        perpendicular: &ScanSegmentTree,
        start: VertexId,
        reach: &VisibilitySegment,
        limit: Option<&Rect>,
    ) -> RouterResult<Option<VertexId>> {
        let origin = graph.point(start);
        let Some(dir) = pure_direction(origin, reach.end) else {
            return Ok(None);
        };
        let along = ScanDirection::for_direction(dir);
        debug_assert_eq!(perpendicular.direction(), along.perpendicular());
        let line = along.perp(origin);
        let mut ids = perpendicular.crossing(line, along.coord(origin), along.coord(reach.end));
        if !dir.is_ascending() {
            ids.reverse();
        }
        let bound = limit.map(|rect| rect_bound(rect, dir));
        let mut previous = start;
        let mut first = None;
        for id in ids {
            let coord = perpendicular.direction().perp(perpendicular.segment(id).start);
            if first.is_some() && bound.is_some_and(|b| is_past(coord, b, dir)) {
                break;
            }
            let point = along.make_point(coord, line);
            let Some(vertex) = self.link_into_segment(graph, perpendicular, id, point)? else {
                continue;
            };
            if vertex != previous {
                let weight = piece_weight(tree, graph.point(previous), graph.point(vertex));
                self.find_or_add_edge(graph, previous, vertex, weight)?;
                first.get_or_insert(vertex);
            }
            previous = vertex;
        }
        let reached = graph.point(previous);
        self.splice_crossings(graph, start, dir, reached, reach)?;
        trace!(?origin, ?reached, ?dir, "edge chain extended");
        Ok(first)
    }

    /// Gives the chain from `start` its group-crossing edges, for crossings
    /// between `start` and `reached`.
    fn splice_crossings(
        &mut self,
        graph: &mut VisibilityGraph,
        start: VertexId,
        dir: Direction,
        reached: Point,
        reach: &VisibilitySegment,
    ) -> RouterResult<()> {
        let origin = graph.point(start);
        let along = ScanDirection::for_direction(dir);
        let (lo, hi) = {
            let (a, b) = (along.coord(origin), along.coord(reached));
            (a.min(b), a.max(b))
        };
        for (a, b, groups) in group_by_edge(&reach.crossings) {
            let inside = |p: Point| {
                let c = along.coord(p);
                compare(c, lo) == Ordering::Greater && compare(c, hi) == Ordering::Less
            };
            if !inside(a) || !inside(b) {
                continue;
            }
            let va = graph.add_vertex(a);
            self.insert_on_chain(graph, start, dir, va)?;
            let vb = graph.add_vertex(b);
            self.insert_on_chain(graph, start, dir, vb)?;
            let edge = Self::edge_between(graph, va, vb)?;
            if self.is_transient_edge(edge) {
                graph.set_edge_crossings(edge, groups);
            }
        }
        Ok(())
    }

    fn insert_on_chain(
        &mut self,
        graph: &mut VisibilityGraph,
        start: VertexId,
        dir: Direction,
        vertex: VertexId,
    ) -> RouterResult<()> {
        let target = graph.point(vertex);
        match Self::bracket(graph, start, target, dir) {
            Bracket::Reached(..) => Ok(()),
            Bracket::Spanned(s, t) => {
                let edge = Self::edge_between(graph, s, t)?;
                self.split_edge(graph, edge, vertex)?;
                Ok(())
            }
            Bracket::Open(_) if start == vertex => Ok(()),
            Bracket::Open(last) => Err(RouterError::Inconsistent(format!(
                "crossing at {target:?} lies past the chain end {:?}",
                graph.point(last)
            ))),
        }
    }

    /// Drops everything added since [`begin`](Self::begin) and restores the
    /// persistent edges that were split.
    pub fn remove_from_graph(self, graph: &mut VisibilityGraph) -> RouterResult<()> {
        let added = graph.vertex_count() - self.mark.vertices;
        graph.truncate(self.mark);
        for edge in self.removed.iter().rev() {
            graph.restore_edge(*edge)?;
        }
        trace!(added, restored = self.removed.len(), "transient graph removed");
        Ok(())
    }
}

pub fn rect_bound(rect: &Rect, dir: Direction) -> f64 {
    match dir {
        Direction::North => rect.top,
        Direction::East => rect.right,
        Direction::South => rect.bottom,
        Direction::West => rect.left,
    }
}

fn is_past(coord: f64, bound: f64, dir: Direction) -> bool {
    let order = compare(coord, bound);
    if dir.is_ascending() {
        order == Ordering::Greater
    } else {
        order == Ordering::Less
    }
}

/// Overlapped weight for a stretch whose middle lies inside obstacles.
pub fn piece_weight(tree: &ObstacleTree, a: Point, b: Point) -> f64 {
    if tree.point_inside_obstacle((a + b) * 0.5) {
        OVERLAPPED_WEIGHT
    } else {
        NORMAL_WEIGHT
    }
}
