//! Multiple-source multiple-target search, optionally through waypoints.

use tracing::debug;

use crate::geometry::{Point, close, close_points};
use crate::visibility::{OVERLAPPED_WEIGHT, TransparentGroups, VertexId, VisibilityGraph};

use super::entry::{DirectionEntries, EntryArena, EntryId};
use super::ssst::{DEFAULT_BEND_PENALTY_PERCENT, SearchEnds, SsstSearch};

#[derive(Debug, Clone, PartialEq)]
pub struct FoundPath {
    pub points: Vec<Point>,
    pub cost: f64,
    pub length: f64,
    pub bends: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct MsmtSearch {
    bend_penalty_percent: f64,
}

impl Default for MsmtSearch {
    fn default() -> Self {
        Self::new(DEFAULT_BEND_PENALTY_PERCENT)
    }
}

impl MsmtSearch {
    pub fn new(bend_penalty_percent: f64) -> Self {
        Self { bend_penalty_percent }
    }

    pub fn path(
        &self,
        graph: &VisibilityGraph,
        transparent: &TransparentGroups,
        sources: &[VertexId],
        targets: &[VertexId],
    ) -> Option<FoundPath> {
        self.path_through(graph, transparent, sources, &[], targets)
    }

    /// Cheapest path visiting `waypoints` in order. Each waypoint stage
    /// hands the entries it left at its waypoint to the next stage, so a
    /// stage does not commit to one arrival direction.
    pub fn path_through(
        &self,
        graph: &VisibilityGraph,
        transparent: &TransparentGroups,
        sources: &[VertexId],
        waypoints: &[VertexId],
        targets: &[VertexId],
    ) -> Option<FoundPath> {
        let mut arena = EntryArena::new();
        let mut search = SsstSearch::new(graph, transparent);
        let mut stage_sources = sources.to_vec();
        let mut carried: Option<DirectionEntries> = None;
        for (stage, waypoint) in waypoints.iter().enumerate() {
            // Already standing on it; the carried entries stay as they are.
            if stage_sources.contains(waypoint) {
                stage_sources = vec![*waypoint];
                continue;
            }
            let mut reached = [None; 4];
            self.stage(&mut search, &mut arena, graph, carried.as_ref(), &stage_sources, Some(&mut reached), &[*waypoint]);
            if reached.iter().all(Option::is_none) {
                debug!(stage, "waypoint unreachable");
                return None;
            }
            carried = Some(reached);
            stage_sources = vec![*waypoint];
        }
        let last = match (&stage_sources[..], carried) {
            // The last waypoint is a target.
            ([at], Some(entries)) if targets.contains(at) => entries
                .into_iter()
                .flatten()
                .min_by(|a, b| arena.get(*a).cost.total_cmp(&arena.get(*b).cost))?,
            _ => self.stage(&mut search, &mut arena, graph, carried.as_ref(), &stage_sources, None, targets)?,
        };
        let entry = arena.get(last);
        Some(FoundPath {
            points: arena.restore_path(graph, last),
            cost: entry.cost,
            length: entry.length,
            bends: entry.bends,
        })
    }

    /// One stage: tries every source and target pair, closest first, and
    /// keeps the cheapest. Each endpoint's cost is offset by its distance
    /// from the barycenter of its side so that a close but awkward pair
    /// does not win on proximity alone.
    #[allow(clippy::too_many_arguments)]
    fn stage(
        &self,
        search: &mut SsstSearch<'_>,
        arena: &mut EntryArena,
        graph: &VisibilityGraph,
        source_entries: Option<&DirectionEntries>,
        sources: &[VertexId],
        mut target_entries: Option<&mut DirectionEntries>,
        targets: &[VertexId],
    ) -> Option<EntryId> {
        if sources.is_empty() || targets.is_empty() {
            return None;
        }
        let mut best_entry = None;
        let mut best_cost = f64::MAX / OVERLAPPED_WEIGHT;
        let mut best_ratio = f64::INFINITY;
        let source_center = barycenter(graph, sources);
        let target_center = barycenter(graph, targets);
        let distance = source_center.manhattan(target_center);
        search.bends_importance = (distance * self.bend_penalty_percent * 0.01).max(0.001);
        let interior_length_adjustment = search.length_importance;

        let mut pairs: Vec<(VertexId, VertexId)> = sources
            .iter()
            .flat_map(|s| targets.iter().map(move |t| (*s, *t)))
            .collect();
        pairs.sort_by(|a, b| {
            let da = graph.point(a.0).manhattan(graph.point(a.1));
            let db = graph.point(b.0).manhattan(graph.point(b.1));
            da.total_cmp(&db)
        });

        for (source, target) in pairs {
            let (sp, tp) = (graph.point(source), graph.point(target));
            if close_points(sp, tp) {
                continue;
            }
            let mut ends = SearchEnds {
                source,
                source_entries,
                source_adjustment: sp.manhattan(source_center) * interior_length_adjustment,
                target,
                target_adjustment: tp.manhattan(target_center) * interior_length_adjustment,
                upper_bound: best_cost,
            };
            if let Some(collected) = target_entries.as_deref_mut() {
                ends.upper_bound = search.multistage_bound(best_cost);
                let mut pass = [None; 4];
                search.path_with_cost(arena, ends, Some(&mut pass));
                merge_target_entries(arena, collected, &pass, &mut best_cost, &mut best_entry);
                continue;
            }
            let Some(last) = search.path_with_cost(arena, ends, None) else {
                continue;
            };
            let cost = arena.get(last).cost;
            let ratio = cost / sp.manhattan(tp);
            if cost < best_cost || (close(cost, best_cost) && ratio < best_ratio) {
                best_cost = cost;
                best_entry = Some(last);
                best_ratio = ratio;
            }
        }
        best_entry
    }
}

fn merge_target_entries(
    arena: &EntryArena,
    collected: &mut DirectionEntries,
    pass: &DirectionEntries,
    best_cost: &mut f64,
    best_entry: &mut Option<EntryId>,
) {
    for (slot, candidate) in collected.iter_mut().zip(pass) {
        let Some(candidate) = *candidate else {
            continue;
        };
        let cost = arena.get(candidate).cost;
        if slot.is_none_or(|current| cost < arena.get(current).cost) {
            *slot = Some(candidate);
            if cost < *best_cost {
                *best_cost = cost;
                *best_entry = Some(candidate);
            }
        }
    }
}

fn barycenter(graph: &VisibilityGraph, vertices: &[VertexId]) -> Point {
    let sum = vertices
        .iter()
        .fold(Point::new(0.0, 0.0), |acc, v| acc + graph.point(*v));
    sum * (1.0 / vertices.len() as f64)
}
