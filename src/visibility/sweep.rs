//! Event queue and helpers shared by the sweep-based generators.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::compare::coordinate_key;
use crate::geometry::{Point, close, compare};
use crate::obstacle::{ObstacleId, ObstacleTree};

use super::scan::ScanDirection;
use super::scan_segment::ScanSegmentTree;
use super::scanline::{LineSpan, SideKind};

/// Continuation of a reflection staircase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionSite {
    pub toward: SideKind,
    pub staircase: usize,
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepEventKind {
    Open,
    Close,
    LowBend,
    HighBend,
    Reflection(ReflectionSite),
}

impl SweepEventKind {
    fn rank(self) -> u8 {
        match self {
            SweepEventKind::Reflection(_) => 0,
            SweepEventKind::Open => 1,
            SweepEventKind::LowBend => 2,
            SweepEventKind::HighBend => 3,
            SweepEventKind::Close => 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SweepEvent {
    pub site: Point,
    pub obstacle: ObstacleId,
    pub kind: SweepEventKind,
    perp: i64,
    coord: i64,
    ordinal: usize,
}

impl SweepEvent {
    pub fn new(direction: ScanDirection, site: Point, obstacle: ObstacleId, kind: SweepEventKind, ordinal: usize) -> Self {
        Self {
            site,
            obstacle,
            kind,
            perp: coordinate_key(direction.perp(site)),
            coord: coordinate_key(direction.coord(site)),
            ordinal,
        }
    }
}

// Reversed so the max-heap pops the lowest event first.
impl Ord for SweepEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .perp
            .cmp(&self.perp)
            .then_with(|| other.kind.rank().min(1).cmp(&self.kind.rank().min(1)))
            .then_with(|| other.coord.cmp(&self.coord))
            .then_with(|| other.ordinal.cmp(&self.ordinal))
            .then_with(|| other.kind.rank().cmp(&self.kind.rank()))
    }
}

impl PartialEq for SweepEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SweepEvent {}

impl PartialOrd for SweepEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Events ordered by perpendicular coordinate, reflections before vertex
/// events, then scan coordinate, then ordinal.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<SweepEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SweepEvent) {
        self.heap.push(event);
    }

    pub fn pop(&mut self) -> Option<SweepEvent> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Open, close and bend events for every primary obstacle, groups
/// included.
pub fn vertex_events(tree: &ObstacleTree, direction: ScanDirection) -> EventQueue {
    let mut queue = EventQueue::default();
    for obstacle in tree.primary_obstacles() {
        let polygon = obstacle.visibility_polygon();
        let points = polygon.points();
        let lowest = points
            .iter()
            .min_by(|a, b| direction.compare(**a, **b));
        let highest = points
            .iter()
            .min_by(|a, b| {
                compare(direction.perp(**b), direction.perp(**a))
                    .then_with(|| compare(direction.coord(**a), direction.coord(**b)))
            });
        let (Some(lowest), Some(highest)) = (lowest, highest) else {
            continue;
        };
        let (pmin, pmax) = (direction.perp(*lowest), direction.perp(*highest));
        queue.push(SweepEvent::new(direction, *lowest, obstacle.id, SweepEventKind::Open, obstacle.id.0));
        queue.push(SweepEvent::new(direction, *highest, obstacle.id, SweepEventKind::Close, obstacle.id.0));
        for p in points {
            let perp = direction.perp(*p);
            if compare(perp, pmin) != Ordering::Greater || compare(perp, pmax) != Ordering::Less {
                continue;
            }
            let Some((lo, _)) = polygon.span_on_line(direction.is_horizontal(), perp) else {
                continue;
            };
            let kind = if close(direction.coord(*p), lo) {
                SweepEventKind::LowBend
            } else {
                SweepEventKind::HighBend
            };
            queue.push(SweepEvent::new(direction, *p, obstacle.id, kind, obstacle.id.0));
        }
    }
    queue
}

/// Splits `lo..hi` on line `perp` into maximal runs that are uniformly in
/// free or overlapped space. Returns `(lo, hi, overlapped)` runs in order.
pub fn split_extent(
    tree: &ObstacleTree,
    direction: ScanDirection,
    perp: f64,
    lo: f64,
    hi: f64,
    spans: &[LineSpan],
) -> Vec<(f64, f64, bool)> {
    let mut cuts = vec![lo, hi];
    for span in spans {
        for c in [span.lo, span.hi] {
            if compare(c, lo) == Ordering::Greater && compare(c, hi) == Ordering::Less {
                cuts.push(c);
            }
        }
    }
    cuts.sort_by(|a, b| compare(*a, *b));
    cuts.dedup_by(|a, b| close(*a, *b));
    let mut runs: Vec<(f64, f64, bool)> = Vec::new();
    for w in cuts.windows(2) {
        let mid = direction.make_point((w[0] + w[1]) / 2.0, perp);
        let overlapped = tree.point_inside_obstacle(mid);
        match runs.last_mut() {
            Some(last) if last.2 == overlapped => last.1 = w[1],
            _ => runs.push((w[0], w[1], overlapped)),
        }
    }
    runs
}

pub fn assign_group_crossings(tree: &ObstacleTree, segments: &mut ScanSegmentTree) {
    for id in segments.ids() {
        let (start, end) = {
            let seg = segments.segment(id);
            (seg.start, seg.end)
        };
        segments.segment_mut(id).crossings = tree.group_crossings(start, end);
    }
}
