//! Rectilinear visibility graph stored in two arenas.
//!
//! Vertices are looked up by their rounded point and hold at most one edge
//! per compass direction. Edges always run from the lower endpoint (source)
//! to the higher one (target), so their direction is North or East.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{RouterError, RouterResult};
use crate::geometry::{Direction, Point, PointKey, Rect, pure_direction, round_point};
use crate::obstacle::ObstacleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub point: Point,
    adjacent: [Option<EdgeId>; 4],
}

impl Vertex {
    pub fn edge(&self, dir: Direction) -> Option<EdgeId> {
        self.adjacent[dir.index()]
    }

    pub fn degree(&self) -> usize {
        self.adjacent.iter().flatten().count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub direction: Direction,
    pub weight: f64,
    pub crossings: Vec<ObstacleId>,
    alive: bool,
}

impl Edge {
    pub fn other(&self, vertex: VertexId) -> VertexId {
        if vertex == self.source { self.target } else { self.source }
    }

    pub fn is_passable(&self, transparent: &TransparentGroups) -> bool {
        self.crossings.iter().all(|g| transparent.contains(*g))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransparentGroups(BTreeSet<ObstacleId>);

impl TransparentGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, group: ObstacleId) -> bool {
        self.0.contains(&group)
    }

    pub fn insert(&mut self, group: ObstacleId) {
        self.0.insert(group);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ObstacleId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<ObstacleId> for TransparentGroups {
    fn from_iter<I: IntoIterator<Item = ObstacleId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ObstacleId> for TransparentGroups {
    fn extend<I: IntoIterator<Item = ObstacleId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Arena lengths at some moment; everything added after it can be dropped
/// by [`VisibilityGraph::truncate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphMark {
    pub vertices: usize,
    pub edges: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    // Column-major (x, y) and row-major (y, x) so a line can be scanned.
    lookup: BTreeMap<PointKey, VertexId>,
    rows: BTreeMap<(i64, i64), VertexId>,
    edge_count: usize,
}

impl VisibilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn point(&self, id: VertexId) -> Point {
        self.vertices[id.0].point
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> + '_ {
        self.vertices.iter().enumerate().map(|(i, v)| (VertexId(i), v))
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.alive)
            .map(|(i, e)| (EdgeId(i), e))
    }

    pub fn edge_length(&self, id: EdgeId) -> f64 {
        let edge = &self.edges[id.0];
        self.point(edge.source).manhattan(self.point(edge.target))
    }

    pub fn find_vertex(&self, point: Point) -> Option<VertexId> {
        self.lookup.get(&PointKey::from(round_point(point))).copied()
    }

    pub fn add_vertex(&mut self, point: Point) -> VertexId {
        let point = round_point(point);
        let key = PointKey::from(point);
        if let Some(id) = self.lookup.get(&key) {
            return *id;
        }
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex {
            point,
            adjacent: [None; 4],
        });
        self.lookup.insert(key, id);
        self.rows.insert((key.y, key.x), id);
        id
    }

    /// Vertices strictly between two axis-aligned points, ordered from `a`
    /// toward `b`.
    pub fn vertices_between(&self, a: Point, b: Point) -> Vec<VertexId> {
        let (ka, kb) = (PointKey::from(round_point(a)), PointKey::from(round_point(b)));
        let mut found: Vec<VertexId> = if ka.x == kb.x {
            let (lo, hi) = (ka.y.min(kb.y), ka.y.max(kb.y));
            if hi - lo < 2 {
                return Vec::new();
            }
            self.lookup
                .range(PointKey { x: ka.x, y: lo + 1 }..PointKey { x: ka.x, y: hi })
                .map(|(_, id)| *id)
                .collect()
        } else if ka.y == kb.y {
            let (lo, hi) = (ka.x.min(kb.x), ka.x.max(kb.x));
            if hi - lo < 2 {
                return Vec::new();
            }
            self.rows.range((ka.y, lo + 1)..(ka.y, hi)).map(|(_, id)| *id).collect()
        } else {
            return Vec::new();
        };
        if ka > kb {
            found.reverse();
        }
        found
    }

    pub fn edge_in_direction(&self, vertex: VertexId, dir: Direction) -> Option<EdgeId> {
        self.vertices[vertex.0].edge(dir)
    }

    pub fn neighbor(&self, vertex: VertexId, dir: Direction) -> Option<VertexId> {
        self.edge_in_direction(vertex, dir)
            .map(|e| self.edges[e.0].other(vertex))
    }

    pub fn find_edge(&self, a: VertexId, b: VertexId) -> Option<EdgeId> {
        let dir = pure_direction(self.point(a), self.point(b))?;
        self.edge_in_direction(a, dir)
            .filter(|e| self.edges[e.0].other(a) == b)
    }

    /// Connects two axis-aligned vertices. Returns the existing edge if they
    /// are already joined.
    pub fn add_edge(
        &mut self,
        a: VertexId,
        b: VertexId,
        weight: f64,
        crossings: Vec<ObstacleId>,
    ) -> RouterResult<EdgeId> {
        let (pa, pb) = (self.point(a), self.point(b));
        let Some(dir) = pure_direction(pa, pb) else {
            return Err(RouterError::Inconsistent(format!(
                "edge {pa:?} -> {pb:?} is not axis-aligned"
            )));
        };
        let (source, target, dir) = if dir.is_ascending() {
            (a, b, dir)
        } else {
            (b, a, dir.opposite())
        };
        if let Some(existing) = self.find_edge(source, target) {
            return Ok(existing);
        }
        if self.vertices[source.0].edge(dir).is_some()
            || self.vertices[target.0].edge(dir.opposite()).is_some()
        {
            return Err(RouterError::Inconsistent(format!(
                "edge {pa:?} -> {pb:?} overlaps an existing edge"
            )));
        }
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            source,
            target,
            direction: dir,
            weight,
            crossings,
            alive: true,
        });
        self.attach(id);
        Ok(id)
    }

    pub fn set_edge_crossings(&mut self, id: EdgeId, crossings: Vec<ObstacleId>) {
        self.edges[id.0].crossings = crossings;
    }

    fn attach(&mut self, id: EdgeId) {
        let edge = &self.edges[id.0];
        let (source, target, dir) = (edge.source, edge.target, edge.direction);
        self.vertices[source.0].adjacent[dir.index()] = Some(id);
        self.vertices[target.0].adjacent[dir.opposite().index()] = Some(id);
        self.edge_count += 1;
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Edge {
        let edge = &mut self.edges[id.0];
        if edge.alive {
            edge.alive = false;
            let (source, target, dir) = (edge.source, edge.target, edge.direction);
            self.vertices[source.0].adjacent[dir.index()] = None;
            self.vertices[target.0].adjacent[dir.opposite().index()] = None;
            self.edge_count -= 1;
        }
        let mut copy = self.edges[id.0].clone();
        copy.alive = true;
        copy
    }

    pub fn restore_edge(&mut self, id: EdgeId) -> RouterResult<()> {
        let edge = &self.edges[id.0];
        if edge.alive {
            return Ok(());
        }
        let (source, target, dir) = (edge.source, edge.target, edge.direction);
        if self.vertices[source.0].edge(dir).is_some()
            || self.vertices[target.0].edge(dir.opposite()).is_some()
        {
            return Err(RouterError::Inconsistent(format!(
                "cannot restore edge {} over a live edge",
                id.0
            )));
        }
        self.edges[id.0].alive = true;
        self.attach(id);
        Ok(())
    }

    pub fn mark(&self) -> GraphMark {
        GraphMark {
            vertices: self.vertices.len(),
            edges: self.edges.len(),
        }
    }

    pub fn truncate(&mut self, mark: GraphMark) {
        for i in mark.edges..self.edges.len() {
            self.remove_edge(EdgeId(i));
        }
        self.edges.truncate(mark.edges);
        for vertex in self.vertices.drain(mark.vertices..) {
            debug_assert!(vertex.adjacent.iter().all(Option::is_none));
            let key = PointKey::from(vertex.point);
            self.lookup.remove(&key);
            self.rows.remove(&(key.y, key.x));
        }
    }

    pub fn bounds(&self) -> Option<Rect> {
        Rect::around(self.vertices.iter().map(|v| v.point))
    }
}
