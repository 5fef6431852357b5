//! Single-source single-target search minimizing weighted length plus a
//! penalty per bend.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use tracing::trace;

use crate::geometry::{Direction, Directions, Point, close, pure_direction};
use crate::visibility::{TransparentGroups, VertexId, VisibilityGraph};

use super::entry::{DirectionEntries, EntryArena, EntryId, VertexEntry};

pub const DEFAULT_BEND_PENALTY_PERCENT: f64 = 4.0;

#[derive(Debug, Clone, Copy)]
struct Queued {
    cost: f64,
    order: u64,
    entry: EntryId,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Where the search stops and what it already knows going in.
#[derive(Debug, Clone, Copy)]
pub struct SearchEnds<'a> {
    pub source: VertexId,
    pub source_entries: Option<&'a DirectionEntries>,
    pub source_adjustment: f64,
    pub target: VertexId,
    pub target_adjustment: f64,
    pub upper_bound: f64,
}

pub struct SsstSearch<'g> {
    graph: &'g VisibilityGraph,
    transparent: &'g TransparentGroups,
    pub length_importance: f64,
    pub bends_importance: f64,
    source: VertexId,
    target: VertexId,
    target_point: Point,
    entry_directions_to_target: Directions,
    upper_bound: f64,
    source_adjustment: f64,
    target_adjustment: f64,
    queue: BinaryHeap<Queued>,
    order: u64,
    entries: HashMap<VertexId, DirectionEntries>,
}

impl<'g> SsstSearch<'g> {
    pub fn new(graph: &'g VisibilityGraph, transparent: &'g TransparentGroups) -> Self {
        Self {
            graph,
            transparent,
            length_importance: 1.0,
            bends_importance: 1.0,
            source: VertexId(0),
            target: VertexId(0),
            target_point: Point::new(0.0, 0.0),
            entry_directions_to_target: Directions::NONE,
            upper_bound: f64::INFINITY,
            source_adjustment: 0.0,
            target_adjustment: 0.0,
            queue: BinaryHeap::new(),
            order: 0,
            entries: HashMap::new(),
        }
    }

    fn combined_cost(&self, length: f64, bends: usize) -> f64 {
        self.length_importance * length + self.bends_importance * bends as f64
    }

    fn cost_from_source(&self, length: f64, bends: usize) -> f64 {
        self.combined_cost(length, bends) + self.source_adjustment
    }

    /// Bound for a waypoint stage: entries slightly costlier than the best
    /// may still win once the next stage's bends are counted.
    pub fn multistage_bound(&self, best_cost: f64) -> f64 {
        if best_cost.is_finite() {
            best_cost + self.bends_importance
        } else {
            best_cost
        }
    }

    /// Cheapest path between `ends`, or `None` past the upper bound.
    ///
    /// With `target_entries` the search keeps going after the first arrival
    /// until the target has been entered from every direction it can be,
    /// leaves the target's entries there, and returns `None`.
    pub fn path_with_cost(
        &mut self,
        arena: &mut EntryArena,
        ends: SearchEnds<'_>,
        mut target_entries: Option<&mut DirectionEntries>,
    ) -> Option<EntryId> {
        if !self.init(arena, &ends) {
            return None;
        }
        while let Some(queued) = self.queue.pop() {
            let best = arena.get(queued.entry);
            if best.closed || best.cost != queued.cost {
                continue;
            }
            let vertex = best.vertex;
            if vertex == self.target {
                let Some(out) = target_entries.as_deref_mut() else {
                    self.cleanup();
                    return Some(queued.entry);
                };
                if let Some(dir) = best.direction {
                    self.entry_directions_to_target = self.entry_directions_to_target.without(dir);
                }
                if self.entry_directions_to_target.is_empty() {
                    *out = self.entries.get(&self.target).copied().unwrap_or_default();
                    self.cleanup();
                    return None;
                }
                self.upper_bound = self.multistage_bound(best.cost).min(self.upper_bound);
                continue;
            }
            arena.get_mut(queued.entry).closed = true;
            self.extend(arena, queued.entry);
        }
        if let Some(out) = target_entries
            && let Some(found) = self.entries.get(&self.target)
        {
            *out = *found;
        }
        self.cleanup();
        None
    }

    fn init(&mut self, arena: &mut EntryArena, ends: &SearchEnds<'_>) -> bool {
        self.cleanup();
        self.source = ends.source;
        self.target = ends.target;
        self.target_point = self.graph.point(ends.target);
        self.upper_bound = ends.upper_bound;
        self.source_adjustment = ends.source_adjustment;
        self.target_adjustment = ends.target_adjustment;
        if ends.source == ends.target || !self.init_entry_directions() {
            return false;
        }
        let source_point = self.graph.point(ends.source);
        let cost = self.cost_from_source(0.0, 0) + self.heuristic(source_point, None);
        if cost >= self.upper_bound {
            return false;
        }
        match ends.source_entries {
            Some(carried) => {
                for id in carried.iter().flatten() {
                    let mut entry = arena.get(*id).clone();
                    entry.closed = false;
                    entry.cost = self.cost_from_source(entry.length, entry.bends)
                        + self.heuristic(self.graph.point(entry.vertex), entry.direction);
                    let copy = arena.push(entry);
                    self.enqueue(arena, copy);
                }
            }
            None => {
                let start = arena.push(VertexEntry {
                    vertex: ends.source,
                    direction: None,
                    previous: None,
                    length: 0.0,
                    bends: 0,
                    cost,
                    closed: true,
                });
                for dir in Direction::ALL {
                    if let Some((neighbor, weight)) = self.passable_neighbor(ends.source, dir) {
                        self.extend_to_neighbor(arena, start, neighbor, weight);
                    }
                }
            }
        }
        !self.queue.is_empty()
    }

    fn init_entry_directions(&mut self) -> bool {
        let vertex = self.graph.vertex(self.target);
        self.entry_directions_to_target = Direction::ALL
            .into_iter()
            .filter(|dir| vertex.edge(*dir).is_some())
            .fold(Directions::NONE, |acc, dir| acc | dir.opposite().flag());
        !self.entry_directions_to_target.is_empty()
    }

    fn passable_neighbor(&self, vertex: VertexId, dir: Direction) -> Option<(VertexId, f64)> {
        let edge = self.graph.edge(self.graph.edge_in_direction(vertex, dir)?);
        edge.is_passable(self.transparent)
            .then(|| (edge.other(vertex), edge.weight))
    }

    // ── Heuristic ───────────────────────────────────────────────────

    fn heuristic(&self, point: Point, entry: Option<Direction>) -> f64 {
        let to_target = self.target_point - point;
        if close(to_target.x, 0.0) && close(to_target.y, 0.0) {
            return self.target_adjustment;
        }
        let dir_to_target = Directions::between(point, self.target_point);
        let entry = entry.map_or(Directions::ALL, Directions::from);
        let bends = match dir_to_target.pure() {
            Some(dir) => bends_for_pure_direction(entry, dir, self.entry_directions_to_target),
            None => bends_for_mixed_direction(dir_to_target, entry, self.entry_directions_to_target),
        };
        self.combined_cost(point.manhattan(self.target_point), bends) + self.target_adjustment
    }

    // ── Extension ───────────────────────────────────────────────────

    /// Extends straight ahead first, then with the preferred (clockwise)
    /// turn, then the rest.
    fn extend(&mut self, arena: &mut EntryArena, best: EntryId) {
        let (vertex, direction) = {
            let entry = arena.get(best);
            (entry.vertex, entry.direction)
        };
        let previous = arena.previous_vertex(best);
        let preferred = direction.map(Direction::rotate_right);
        let mut straight = None;
        let mut preferred_bend = None;
        let mut others = Vec::new();
        for dir in Direction::ALL {
            let Some((neighbor, weight)) = self.passable_neighbor(vertex, dir) else {
                continue;
            };
            if Some(neighbor) == previous {
                // Turning back is only useful out of a dead-end source.
                if self.graph.vertex(vertex).degree() > 1 || vertex != self.source {
                    continue;
                }
                self.extend_to_neighbor(arena, best, neighbor, weight);
                continue;
            }
            if Some(dir) == direction {
                straight = Some((neighbor, weight));
            } else if Some(dir) == preferred {
                preferred_bend = Some((neighbor, weight));
            } else {
                others.push((neighbor, weight));
            }
        }
        for (neighbor, weight) in straight.into_iter().chain(preferred_bend).chain(others) {
            self.extend_to_neighbor(arena, best, neighbor, weight);
        }
    }

    fn extend_to_neighbor(&mut self, arena: &mut EntryArena, best: EntryId, neighbor: VertexId, weight: f64) {
        let vertex = arena.get(best).vertex;
        let Some(dir) = pure_direction(self.graph.point(vertex), self.graph.point(neighbor)) else {
            return;
        };
        match self.slot(neighbor, dir) {
            None => {
                if !self.enqueue_reversed(arena, best, neighbor, weight) {
                    self.create_entry(arena, best, neighbor, weight);
                }
            }
            Some(existing) if !arena.get(existing).closed => {
                self.update_entry(arena, best, existing, weight);
            }
            Some(_) => {}
        }
    }

    fn step(&self, arena: &EntryArena, best: EntryId, neighbor: VertexId, weight: f64) -> Option<(f64, usize, Direction)> {
        let entry = arena.get(best);
        let from = self.graph.point(entry.vertex);
        let to = self.graph.point(neighbor);
        let dir = pure_direction(from, to)?;
        let length = entry.length + from.manhattan(to) * weight;
        let bends = match entry.direction {
            Some(d) if d != dir => entry.bends + 1,
            _ => entry.bends,
        };
        Some((length, bends, dir))
    }

    /// Stepping back toward a vertex this one was entered from: worth a
    /// new entry there only when cheaper, or when this vertex is a dead end.
    fn enqueue_reversed(&mut self, arena: &mut EntryArena, best: EntryId, neighbor: VertexId, weight: f64) -> bool {
        let vertex = arena.get(best).vertex;
        let Some(from_neighbor) = pure_direction(self.graph.point(neighbor), self.graph.point(vertex)) else {
            return false;
        };
        let Some(entry_from_neighbor) = self.slot(vertex, from_neighbor) else {
            return false;
        };
        let Some((length, bends, dir)) = self.step(arena, best, neighbor, weight) else {
            return true;
        };
        let existing = arena.get(entry_from_neighbor);
        if self.combined_cost(length, bends) < self.combined_cost(existing.length, existing.bends)
            || self.graph.vertex(vertex).degree() == 1
        {
            let cost = self.cost_from_source(length, bends) + self.heuristic(self.graph.point(neighbor), Some(dir));
            self.push_entry(arena, best, neighbor, dir, length, bends, cost);
        }
        true
    }

    fn create_entry(&mut self, arena: &mut EntryArena, best: EntryId, neighbor: VertexId, weight: f64) {
        let Some((length, bends, dir)) = self.step(arena, best, neighbor, weight) else {
            return;
        };
        let cost = self.cost_from_source(length, bends) + self.heuristic(self.graph.point(neighbor), Some(dir));
        if cost < self.upper_bound {
            self.push_entry(arena, best, neighbor, dir, length, bends, cost);
        }
    }

    fn update_entry(&mut self, arena: &mut EntryArena, best: EntryId, existing: EntryId, weight: f64) {
        let neighbor = arena.get(existing).vertex;
        let Some((length, bends, dir)) = self.step(arena, best, neighbor, weight) else {
            return;
        };
        let current = arena.get(existing);
        if self.combined_cost(length, bends) < self.combined_cost(current.length, current.bends) {
            let cost = self.cost_from_source(length, bends) + self.heuristic(self.graph.point(neighbor), Some(dir));
            let entry = arena.get_mut(existing);
            entry.previous = Some(best);
            entry.length = length;
            entry.bends = bends;
            entry.cost = cost;
            self.enqueue(arena, existing);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_entry(
        &mut self,
        arena: &mut EntryArena,
        best: EntryId,
        neighbor: VertexId,
        dir: Direction,
        length: f64,
        bends: usize,
        cost: f64,
    ) {
        let id = arena.push(VertexEntry {
            vertex: neighbor,
            direction: Some(dir),
            previous: Some(best),
            length,
            bends,
            cost,
            closed: false,
        });
        self.entries.entry(neighbor).or_default()[dir.index()] = Some(id);
        self.enqueue(arena, id);
    }

    fn enqueue(&mut self, arena: &EntryArena, id: EntryId) {
        self.order += 1;
        self.queue.push(Queued {
            cost: arena.get(id).cost,
            order: self.order,
            entry: id,
        });
    }

    fn slot(&self, vertex: VertexId, dir: Direction) -> Option<EntryId> {
        self.entries.get(&vertex).and_then(|slots| slots[dir.index()])
    }

    fn cleanup(&mut self) {
        if !self.entries.is_empty() {
            trace!(visited = self.entries.len(), "search state cleared");
        }
        self.entries.clear();
        self.queue.clear();
        self.order = 0;
    }
}

// ── Bend lower bounds ───────────────────────────────────────────────

/// Fewest bends to reach a target straight along `dir_to_target` when the
/// current leg runs in one of `entry` and the target can be entered by
/// `at_target`.
fn bends_for_pure_direction(entry: Directions, dir_to_target: Direction, at_target: Directions) -> usize {
    if entry.contains(dir_to_target) {
        if at_target.contains(dir_to_target) {
            return 0;
        }
        if at_target.contains(dir_to_target.rotate_left()) || at_target.contains(dir_to_target.rotate_right()) {
            return 2;
        }
        return 4;
    }
    bends_for_pure_direction(entry.add_one_turn(), dir_to_target, at_target) + 1
}

fn bends_for_mixed_direction(dir_to_target: Directions, entry: Directions, at_target: Directions) -> usize {
    let along_entry = dir_to_target & entry;
    if along_entry.is_empty() {
        return bends_for_mixed_direction(dir_to_target, entry.add_one_turn(), at_target) + 1;
    }
    let into_target = dir_to_target & at_target;
    if into_target.is_empty() {
        return bends_for_mixed_direction(dir_to_target, entry, at_target.add_one_turn()) + 1;
    }
    if along_entry | into_target == dir_to_target { 1 } else { 2 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> VisibilityGraph {
        let mut graph = VisibilityGraph::new();
        let mut ids = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                ids.push(graph.add_vertex(Point::new(x as f64 * 10.0, y as f64 * 10.0)));
            }
        }
        for y in 0..3 {
            for x in 0..3 {
                let id = ids[y * 3 + x];
                if x < 2 {
                    graph.add_edge(id, ids[y * 3 + x + 1], 1.0, Vec::new()).expect("edge");
                }
                if y < 2 {
                    graph.add_edge(id, ids[(y + 1) * 3 + x], 1.0, Vec::new()).expect("edge");
                }
            }
        }
        graph
    }

    fn ends(graph: &VisibilityGraph, from: Point, to: Point) -> SearchEnds<'static> {
        SearchEnds {
            source: graph.find_vertex(from).expect("source"),
            source_entries: None,
            source_adjustment: 0.0,
            target: graph.find_vertex(to).expect("target"),
            target_adjustment: 0.0,
            upper_bound: f64::INFINITY,
        }
    }

    #[test]
    fn straight_path_has_no_bends() {
        let graph = lattice();
        let transparent = TransparentGroups::new();
        let mut search = SsstSearch::new(&graph, &transparent);
        let mut arena = EntryArena::new();
        let last = search
            .path_with_cost(&mut arena, ends(&graph, Point::new(0.0, 10.0), Point::new(20.0, 10.0)), None)
            .expect("path");
        let entry = arena.get(last);
        assert_eq!(entry.bends, 0);
        assert_eq!(entry.length, 20.0);
        assert_eq!(entry.cost, 20.0);
        assert_eq!(
            arena.restore_path(&graph, last),
            vec![Point::new(0.0, 10.0), Point::new(20.0, 10.0)]
        );
    }

    #[test]
    fn diagonal_target_takes_one_bend() {
        let graph = lattice();
        let transparent = TransparentGroups::new();
        let mut search = SsstSearch::new(&graph, &transparent);
        search.bends_importance = 5.0;
        let mut arena = EntryArena::new();
        let last = search
            .path_with_cost(&mut arena, ends(&graph, Point::new(0.0, 0.0), Point::new(20.0, 20.0)), None)
            .expect("path");
        assert_eq!(arena.get(last).bends, 1);
        assert_eq!(arena.restore_path(&graph, last).len(), 3);
    }

    #[test]
    fn upper_bound_prunes_expensive_paths() {
        let graph = lattice();
        let transparent = TransparentGroups::new();
        let mut search = SsstSearch::new(&graph, &transparent);
        let mut arena = EntryArena::new();
        let mut bounded = ends(&graph, Point::new(0.0, 0.0), Point::new(20.0, 20.0));
        bounded.upper_bound = 10.0;
        assert!(search.path_with_cost(&mut arena, bounded, None).is_none());
    }

    #[test]
    fn gated_edges_block_until_transparent() {
        let mut graph = VisibilityGraph::new();
        let a = graph.add_vertex(Point::new(0.0, 0.0));
        let b = graph.add_vertex(Point::new(10.0, 0.0));
        let group = crate::obstacle::ObstacleId(7);
        graph.add_edge(a, b, 1.0, vec![group]).expect("edge");
        let closed = TransparentGroups::new();
        let mut arena = EntryArena::new();
        let ends = SearchEnds {
            source: a,
            source_entries: None,
            source_adjustment: 0.0,
            target: b,
            target_adjustment: 0.0,
            upper_bound: f64::INFINITY,
        };
        assert!(SsstSearch::new(&graph, &closed).path_with_cost(&mut arena, ends, None).is_none());
        let open: TransparentGroups = [group].into_iter().collect();
        assert!(SsstSearch::new(&graph, &open).path_with_cost(&mut arena, ends, None).is_some());
    }

    #[test]
    fn multistage_collects_every_entry_direction() {
        let graph = lattice();
        let transparent = TransparentGroups::new();
        let mut search = SsstSearch::new(&graph, &transparent);
        let mut arena = EntryArena::new();
        let mut collected = [None; 4];
        let found = search.path_with_cost(
            &mut arena,
            ends(&graph, Point::new(0.0, 0.0), Point::new(10.0, 10.0)),
            Some(&mut collected),
        );
        assert!(found.is_none());
        // Arrivals heading south or west need two more bends than the bound allows.
        assert!(collected[Direction::East.index()].is_some());
        assert!(collected[Direction::North.index()].is_some());
        assert_eq!(collected.iter().flatten().count(), 2);
    }

    #[test]
    fn bend_bounds_match_geometry() {
        let all = Directions::ALL;
        let east = Directions::EAST;
        assert_eq!(bends_for_pure_direction(east, Direction::East, east), 0);
        assert_eq!(bends_for_pure_direction(Directions::NORTH, Direction::East, east), 1);
        assert_eq!(bends_for_pure_direction(east, Direction::East, Directions::NORTH), 2);
        assert_eq!(bends_for_pure_direction(Directions::WEST, Direction::East, east), 2);
        let north_east = Directions::NORTH | Directions::EAST;
        assert_eq!(bends_for_mixed_direction(north_east, all, all), 1);
        assert_eq!(bends_for_mixed_direction(north_east, east, east), 2);
        assert_eq!(bends_for_mixed_direction(north_east, east, Directions::NORTH), 1);
        assert_eq!(bends_for_mixed_direction(north_east, east, Directions::SOUTH), 3);
    }
}
