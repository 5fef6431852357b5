use crate::geometry::{Direction, Point};
use crate::visibility::{VertexId, VisibilityGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

/// How a partial path arrived at a vertex. A vertex keeps one entry per
/// direction of arrival, so a cheaper arrival from the west does not hide a
/// costlier one from the south that bends less later.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexEntry {
    pub vertex: VertexId,
    pub direction: Option<Direction>,
    pub previous: Option<EntryId>,
    pub length: f64,
    pub bends: usize,
    pub cost: f64,
    pub closed: bool,
}

pub type DirectionEntries = [Option<EntryId>; 4];

#[derive(Debug, Default)]
pub struct EntryArena {
    entries: Vec<VertexEntry>,
}

impl EntryArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: VertexEntry) -> EntryId {
        self.entries.push(entry);
        EntryId(self.entries.len() - 1)
    }

    pub fn get(&self, id: EntryId) -> &VertexEntry {
        &self.entries[id.0]
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut VertexEntry {
        &mut self.entries[id.0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn previous_vertex(&self, id: EntryId) -> Option<VertexId> {
        self.get(id).previous.map(|p| self.get(p).vertex)
    }

    /// Walks back from `last` and keeps only the points where the direction
    /// of travel changes, plus both ends.
    pub fn restore_path(&self, graph: &VisibilityGraph, last: EntryId) -> Vec<Point> {
        let mut points = Vec::new();
        let mut last_direction: Option<Option<Direction>> = None;
        let mut current = last;
        loop {
            let entry = self.get(current);
            if last_direction != Some(entry.direction) {
                points.push(graph.point(entry.vertex));
                last_direction = Some(entry.direction);
            }
            match entry.previous {
                Some(previous) => current = previous,
                None => break,
            }
        }
        let start = graph.point(self.get(current).vertex);
        if points.last() != Some(&start) {
            points.push(start);
        }
        points.reverse();
        points
    }
}
