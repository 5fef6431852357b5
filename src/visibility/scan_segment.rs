//! Maximal axis-aligned visibility intervals and the ordered tree that
//! holds them for one scan direction.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::geometry::compare::coordinate_key;
use crate::geometry::{Point, compare_points, round};
use crate::obstacle::GroupBoundaryCrossing;

use super::graph::VertexId;
use super::scan::ScanDirection;

// ── Segment weights ─────────────────────────────────────────────────
pub const NORMAL_WEIGHT: f64 = 1.0;
pub const REFLECTION_WEIGHT: f64 = 5.0;
pub const OVERLAPPED_WEIGHT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSegment {
    pub start: Point,
    pub end: Point,
    pub weight: f64,
    pub crossings: Vec<GroupBoundaryCrossing>,
    /// The start touches a segment of the other overlap state and needs a
    /// vertex even if nothing crosses it there.
    pub need_start_vertex: bool,
    pub need_end_vertex: bool,
    pub lowest_vertex: Option<VertexId>,
    pub highest_vertex: Option<VertexId>,
}

impl ScanSegment {
    pub fn new(a: Point, b: Point, weight: f64) -> Self {
        let (start, end) = if compare_points(a, b).is_le() { (a, b) } else { (b, a) };
        Self {
            start,
            end,
            weight,
            crossings: Vec::new(),
            need_start_vertex: false,
            need_end_vertex: false,
            lowest_vertex: None,
            highest_vertex: None,
        }
    }

    pub fn is_overlapped(&self) -> bool {
        self.weight >= OVERLAPPED_WEIGHT
    }

    pub fn length(&self) -> f64 {
        self.start.manhattan(self.end)
    }

    pub fn midpoint(&self) -> Point {
        (self.start + self.end) * 0.5
    }
}

type SegmentKey = (i64, i64, i64);

/// Segments of one scan direction ordered by (perp, start, end).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSegmentTree {
    direction: ScanDirection,
    segments: Vec<ScanSegment>,
    order: BTreeMap<SegmentKey, SegmentId>,
}

impl ScanSegmentTree {
    pub fn new(direction: ScanDirection) -> Self {
        Self {
            direction,
            segments: Vec::new(),
            order: BTreeMap::new(),
        }
    }

    pub fn direction(&self) -> ScanDirection {
        self.direction
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn key(&self, segment: &ScanSegment) -> SegmentKey {
        let d = self.direction;
        (
            coordinate_key(d.perp(segment.start)),
            coordinate_key(d.coord(segment.start)),
            coordinate_key(d.coord(segment.end)),
        )
    }

    pub fn segment(&self, id: SegmentId) -> &ScanSegment {
        &self.segments[id.0]
    }

    pub fn segment_mut(&mut self, id: SegmentId) -> &mut ScanSegment {
        &mut self.segments[id.0]
    }

    pub fn ids(&self) -> Vec<SegmentId> {
        self.order.values().copied().collect()
    }

    pub fn segments(&self) -> impl Iterator<Item = (SegmentId, &ScanSegment)> + '_ {
        self.order.values().map(move |id| (*id, &self.segments[id.0]))
    }

    /// Adds `a..b`; an identical interval keeps the lower weight. Single
    /// points are not segments.
    pub fn insert(&mut self, a: Point, b: Point, weight: f64) -> Option<SegmentId> {
        debug_assert!(self.direction.is_parallel(a, b), "segment not along scan direction");
        let segment = ScanSegment::new(a, b, weight);
        if compare_points(segment.start, segment.end).is_eq() {
            return None;
        }
        let key = self.key(&segment);
        if let Some(id) = self.order.get(&key) {
            let existing = &mut self.segments[id.0];
            existing.weight = existing.weight.min(weight);
            return Some(*id);
        }
        let id = SegmentId(self.segments.len());
        self.segments.push(segment);
        self.order.insert(key, id);
        Some(id)
    }

    pub fn remove(&mut self, id: SegmentId) {
        let key = self.key(&self.segments[id.0]);
        self.order.remove(&key);
    }

    fn line_range(&self, perp: f64, coord_hi: Option<f64>) -> impl DoubleEndedIterator<Item = SegmentId> + '_ {
        let p = coordinate_key(perp);
        let hi = coord_hi.map_or(i64::MAX, coordinate_key);
        self.order
            .range((Bound::Included((p, i64::MIN, i64::MIN)), Bound::Included((p, hi, i64::MAX))))
            .map(|(_, id)| *id)
    }

    pub fn find(&self, a: Point, b: Point) -> Option<SegmentId> {
        let query = ScanSegment::new(a, b, NORMAL_WEIGHT);
        self.order.get(&self.key(&query)).copied()
    }

    pub fn covers(&self, a: Point, b: Point) -> bool {
        let d = self.direction;
        let query = ScanSegment::new(a, b, NORMAL_WEIGHT);
        let (lo, hi) = (d.coord(query.start), d.coord(query.end));
        self.line_range(d.perp(query.start), Some(lo)).any(|id| {
            let seg = &self.segments[id.0];
            round(d.coord(seg.end)) >= round(hi)
        })
    }

    /// The segment whose closed span holds `point`; at a shared endpoint
    /// the later segment wins.
    pub fn find_containing_point(&self, point: Point) -> Option<SegmentId> {
        let d = self.direction;
        let c = round(d.coord(point));
        self.line_range(d.perp(point), Some(c))
            .rev()
            .find(|id| round(d.coord(self.segments[id.0].end)) >= c)
    }

    /// Segments crossing the perpendicular line `coord` between `perp_lo`
    /// and `perp_hi` (inclusive), ordered by perpendicular coordinate.
    pub fn crossing(&self, coord: f64, perp_lo: f64, perp_hi: f64) -> Vec<SegmentId> {
        let d = self.direction;
        let c = round(coord);
        let lo = coordinate_key(perp_lo.min(perp_hi));
        let hi = coordinate_key(perp_lo.max(perp_hi));
        self.order
            .range((Bound::Included((lo, i64::MIN, i64::MIN)), Bound::Included((hi, i64::MAX, i64::MAX))))
            .map(|(_, id)| *id)
            .filter(|id| {
                let seg = &self.segments[id.0];
                round(d.coord(seg.start)) <= c && round(d.coord(seg.end)) >= c
            })
            .collect()
    }

    /// Rewrites every line so that no two segments overlap. Where spans
    /// disagree, non-overlapped pieces win; adjoining pieces of differing
    /// overlap state are marked as needing a vertex at their shared end.
    pub fn merge_segments(&mut self) {
        let d = self.direction;
        let mut lines: BTreeMap<i64, Vec<SegmentId>> = BTreeMap::new();
        for ((perp, _, _), id) in &self.order {
            lines.entry(*perp).or_default().push(*id);
        }
        let mut merged: Vec<ScanSegment> = Vec::new();
        for ids in lines.values() {
            let line: Vec<&ScanSegment> = ids.iter().map(|id| &self.segments[id.0]).collect();
            let perp = d.perp(line[0].start);
            let mut breaks: BTreeMap<i64, f64> = BTreeMap::new();
            for seg in &line {
                for p in [seg.start, seg.end] {
                    let c = d.coord(p);
                    breaks.insert(coordinate_key(c), c);
                }
            }
            let breaks: Vec<(i64, f64)> = breaks.into_iter().collect();
            let mut pieces: Vec<ScanSegment> = Vec::new();
            for w in breaks.windows(2) {
                let ((klo, lo), (khi, hi)) = (w[0], w[1]);
                let covering = line.iter().filter(|s| {
                    coordinate_key(d.coord(s.start)) <= klo && coordinate_key(d.coord(s.end)) >= khi
                });
                let mut free: Option<f64> = None;
                let mut overlapped = false;
                for seg in covering {
                    if seg.is_overlapped() {
                        overlapped = true;
                    } else {
                        free = Some(free.map_or(seg.weight, |w| w.min(seg.weight)));
                    }
                }
                let weight = match (free, overlapped) {
                    (Some(w), _) => w,
                    (None, true) => OVERLAPPED_WEIGHT,
                    (None, false) => continue,
                };
                let start = d.make_point(lo, perp);
                let end = d.make_point(hi, perp);
                if let Some(last) = pieces.last_mut() {
                    if last.end == start {
                        if last.is_overlapped() == (weight >= OVERLAPPED_WEIGHT) {
                            last.end = end;
                            last.weight = last.weight.min(weight);
                            continue;
                        }
                        last.need_end_vertex = true;
                        let mut piece = ScanSegment::new(start, end, weight);
                        piece.need_start_vertex = true;
                        pieces.push(piece);
                        continue;
                    }
                }
                pieces.push(ScanSegment::new(start, end, weight));
            }
            merged.extend(pieces);
        }
        self.segments.clear();
        self.order.clear();
        for segment in merged {
            let key = self.key(&segment);
            let id = SegmentId(self.segments.len());
            self.segments.push(segment);
            self.order.insert(key, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(x0: f64, x1: f64, y: f64) -> (Point, Point) {
        (Point::new(x0, y), Point::new(x1, y))
    }

    #[test]
    fn overlapping_segments_merge() {
        let mut tree = ScanSegmentTree::new(ScanDirection::Horizontal);
        let (a, b) = h(0.0, 10.0, 5.0);
        tree.insert(a, b, NORMAL_WEIGHT);
        let (a, b) = h(4.0, 20.0, 5.0);
        tree.insert(a, b, NORMAL_WEIGHT);
        let (a, b) = h(0.0, 3.0, 6.0);
        tree.insert(a, b, NORMAL_WEIGHT);
        tree.merge_segments();
        let segs: Vec<&ScanSegment> = tree.segments().map(|(_, s)| s).collect();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].start, Point::new(0.0, 5.0));
        assert_eq!(segs[0].end, Point::new(20.0, 5.0));
    }

    #[test]
    fn non_overlapped_wins_and_marks_boundaries() {
        let mut tree = ScanSegmentTree::new(ScanDirection::Horizontal);
        let (a, b) = h(0.0, 10.0, 0.0);
        tree.insert(a, b, OVERLAPPED_WEIGHT);
        let (a, b) = h(6.0, 14.0, 0.0);
        tree.insert(a, b, NORMAL_WEIGHT);
        tree.merge_segments();
        let segs: Vec<&ScanSegment> = tree.segments().map(|(_, s)| s).collect();
        assert_eq!(segs.len(), 2);
        assert!(segs[0].is_overlapped());
        assert_eq!(segs[0].end, Point::new(6.0, 0.0));
        assert!(segs[0].need_end_vertex);
        assert!(!segs[1].is_overlapped());
        assert!(segs[1].need_start_vertex);
    }

    #[test]
    fn point_and_crossing_queries() {
        let mut tree = ScanSegmentTree::new(ScanDirection::Vertical);
        tree.insert(Point::new(2.0, 0.0), Point::new(2.0, 10.0), NORMAL_WEIGHT);
        tree.insert(Point::new(5.0, 3.0), Point::new(5.0, 4.0), NORMAL_WEIGHT);
        tree.insert(Point::new(8.0, -5.0), Point::new(8.0, 1.0), NORMAL_WEIGHT);
        assert!(tree.find_containing_point(Point::new(2.0, 10.0)).is_some());
        assert!(tree.find_containing_point(Point::new(2.0, 10.5)).is_none());
        let crossing = tree.crossing(1.0, 0.0, 10.0);
        assert_eq!(crossing.len(), 2);
        assert_eq!(tree.segment(crossing[1]).start, Point::new(8.0, -5.0));
        assert!(tree.covers(Point::new(2.0, 1.0), Point::new(2.0, 9.0)));
        assert!(!tree.covers(Point::new(2.0, 1.0), Point::new(2.0, 11.0)));
    }
}
