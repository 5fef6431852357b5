//! Sparse visibility graph. Segments span the whole graph box on every
//! distinct bounding-box extreme; only selected crossings are realized,
//! chosen by binary division toward each obstacle vertex.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::RouterResult;
use crate::geometry::compare::coordinate_key;
use crate::geometry::{Point, PointKey, Rect, close, compare};
use crate::obstacle::ObstacleTree;

use super::GeneratedGraph;
use super::intersector::{SegmentPoints, realize};
use super::scan::ScanDirection;
use super::scan_segment::{NORMAL_WEIGHT, OVERLAPPED_WEIGHT, ScanSegmentTree};
use super::scanline::{LineSpan, Scanline, SideKind};
use super::sweep::assign_group_crossings;

pub fn generate(tree: &ObstacleTree) -> RouterResult<GeneratedGraph> {
    if tree.is_empty() {
        return Ok(GeneratedGraph::empty());
    }
    let ys = Axis::lines_of(tree, ScanDirection::Horizontal);
    let xs = Axis::lines_of(tree, ScanDirection::Vertical);
    let mut horizontal = build_lines(tree, ScanDirection::Horizontal, &ys);
    let mut vertical = build_lines(tree, ScanDirection::Vertical, &xs);
    horizontal.merge_segments();
    vertical.merge_segments();

    let mut steiner: BTreeMap<PointKey, Point> = BTreeMap::new();
    let h_sites = vertex_points(tree, ScanDirection::Horizontal, &mut steiner);
    let v_sites = vertex_points(tree, ScanDirection::Vertical, &mut steiner);
    let steiner: Vec<Point> = steiner.into_values().collect();

    let h_points = sparse_points(&horizontal, &xs, &h_sites, &steiner);
    let v_points = sparse_points(&vertical, &ys, &v_sites, &steiner);
    assign_group_crossings(tree, &mut horizontal);
    assign_group_crossings(tree, &mut vertical);
    let graph = realize(&mut horizontal, &mut vertical, h_points, v_points)?;
    debug!(
        lines = xs.len() + ys.len(),
        steiner = steiner.len(),
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "sparse visibility graph generated"
    );
    Ok(GeneratedGraph {
        graph,
        horizontal,
        vertical,
    })
}

#[derive(Debug, Clone, PartialEq)]
struct Axis {
    coords: Vec<f64>,
}

impl Axis {
    fn lines_of(tree: &ObstacleTree, direction: ScanDirection) -> Self {
        let mut coords: BTreeMap<i64, f64> = BTreeMap::new();
        for obstacle in tree.obstacles() {
            let bbox = obstacle.visibility_bbox();
            for corner in [bbox.left_bottom(), bbox.right_top()] {
                let c = direction.perp(corner);
                coords.insert(coordinate_key(c), c);
            }
        }
        Self {
            coords: coords.into_values().collect(),
        }
    }

    fn len(&self) -> usize {
        self.coords.len()
    }

    fn exact(&self, c: f64) -> Option<usize> {
        let i = self.coords.partition_point(|x| compare(*x, c) == Ordering::Less);
        (i < self.coords.len() && close(self.coords[i], c)).then_some(i)
    }

    fn first_at_or_above(&self, c: f64) -> Option<usize> {
        let i = self.coords.partition_point(|x| compare(*x, c) == Ordering::Less);
        (i < self.coords.len()).then_some(i)
    }

    fn last_at_or_below(&self, c: f64) -> Option<usize> {
        let i = self.coords.partition_point(|x| compare(*x, c) != Ordering::Greater);
        i.checked_sub(1)
    }
}

/// Non-group obstacles whose interior the line at `perp` passes through,
/// ordered by their low end.
fn line_spans(tree: &ObstacleTree, direction: ScanDirection, perp: f64) -> Vec<LineSpan> {
    let b = tree.graph_box();
    let (lo, hi) = if direction.is_horizontal() {
        (b.left, b.right)
    } else {
        (b.bottom, b.top)
    };
    let area = Rect::from_points(direction.make_point(lo, perp), direction.make_point(hi, perp));
    let mut spans: Vec<LineSpan> = tree
        .query(&area)
        .into_iter()
        .filter_map(|id| {
            let obstacle = tree.obstacle(id);
            if obstacle.is_group {
                return None;
            }
            let bbox = obstacle.visibility_bbox();
            let (pmin, pmax) = (direction.perp(bbox.left_bottom()), direction.perp(bbox.right_top()));
            if compare(pmin, perp) != Ordering::Less || compare(perp, pmax) != Ordering::Less {
                return None;
            }
            let (lo, hi) = obstacle.visibility_polygon().span_on_line(direction.is_horizontal(), perp)?;
            (compare(lo, hi) == Ordering::Less).then_some(LineSpan { obstacle: id, lo, hi })
        })
        .collect();
    spans.sort_by(|a, b| compare(a.lo, b.lo).then_with(|| a.obstacle.cmp(&b.obstacle)));
    spans
}

/// Full-span segments on every line: free between obstacles, overlapped
/// across runs of touching or overlapping obstacles that contain an
/// overlapped (or group-corner) obstacle, absent across other obstacles.
fn build_lines(tree: &ObstacleTree, direction: ScanDirection, lines: &Axis) -> ScanSegmentTree {
    let mut segments = ScanSegmentTree::new(direction);
    let b = tree.graph_box();
    let (box_lo, box_hi) = if direction.is_horizontal() {
        (b.left, b.right)
    } else {
        (b.bottom, b.top)
    };
    for &perp in &lines.coords {
        let at = |c: f64| direction.make_point(c, perp);
        let spans = line_spans(tree, direction, perp);
        let mut cursor = box_lo;
        let mut i = 0;
        while i < spans.len() {
            let region_lo = spans[i].lo;
            let mut region_hi = spans[i].hi;
            let mut keep = false;
            while i < spans.len() && compare(spans[i].lo, region_hi) != Ordering::Greater {
                let obstacle = tree.obstacle(spans[i].obstacle);
                keep |= obstacle.is_overlapped() || obstacle.overlaps_group_corner;
                region_hi = region_hi.max(spans[i].hi);
                i += 1;
            }
            segments.insert(at(cursor), at(region_lo), NORMAL_WEIGHT);
            if keep {
                segments.insert(at(region_lo), at(region_hi), OVERLAPPED_WEIGHT);
            }
            cursor = region_hi;
        }
        segments.insert(at(cursor), at(box_hi), NORMAL_WEIGHT);
    }
    segments
}

/// Extreme vertices plus the bounding-box corners they can see, for the
/// lines of `direction`. Steiner points where those lines meet the
/// neighbouring obstacles' bounding boxes are collected into `steiner`.
fn vertex_points(tree: &ObstacleTree, direction: ScanDirection, steiner: &mut BTreeMap<PointKey, Point>) -> Vec<Point> {
    let b = tree.graph_box();
    let (box_lo, box_hi) = if direction.is_horizontal() {
        (b.left, b.right)
    } else {
        (b.bottom, b.top)
    };
    let mut points: BTreeMap<PointKey, Point> = BTreeMap::new();
    let mut spans_by_line: BTreeMap<i64, Vec<LineSpan>> = BTreeMap::new();
    for obstacle in tree.primary_obstacles() {
        let bbox = obstacle.visibility_bbox();
        let (coord_lo, coord_hi) = (direction.coord(bbox.left_bottom()), direction.coord(bbox.right_top()));
        for perp in [direction.perp(bbox.left_bottom()), direction.perp(bbox.right_top())] {
            let Some((lo, hi)) = obstacle
                .visibility_polygon()
                .span_on_line(direction.is_horizontal(), perp)
            else {
                continue;
            };
            let site = direction.make_point(lo, perp);
            points.insert(PointKey::from(site), site);
            let spans = spans_by_line
                .entry(coordinate_key(perp))
                .or_insert_with(|| line_spans(tree, direction, perp));
            let low = Scanline::walk(spans, lo, SideKind::Low, box_lo);
            let high = Scanline::walk(spans, hi, SideKind::High, box_hi);
            let same_clump = |id| {
                let other = tree.obstacle(id);
                other.clump().is_some() && other.clump() == obstacle.clump()
            };

            if let Some(n) = low.obstacle {
                let edge = direction.coord(tree.obstacle(n).visibility_bbox().right_top());
                if compare(edge, lo) == Ordering::Less {
                    let p = direction.make_point(edge, perp);
                    steiner.insert(PointKey::from(p), p);
                }
            }
            if let Some(n) = high.obstacle {
                let edge = direction.coord(tree.obstacle(n).visibility_bbox().left_bottom());
                if compare(edge, hi) == Ordering::Greater {
                    let p = direction.make_point(edge, perp);
                    steiner.insert(PointKey::from(p), p);
                }
            }

            let low_visible = low
                .obstacle
                .is_none_or(|n| compare(low.coord, coord_lo) == Ordering::Less || same_clump(n));
            if low_visible {
                let corner = direction.make_point(coord_lo, perp);
                points.insert(PointKey::from(corner), corner);
            }
            let high_visible = high
                .obstacle
                .is_none_or(|n| compare(coord_hi, high.coord) == Ordering::Less || same_clump(n));
            if high_visible {
                let corner = direction.make_point(coord_hi, perp);
                points.insert(PointKey::from(corner), corner);
            }
        }
    }
    points.into_values().collect()
}

/// Perpendicular slots realized on a segment spanning `start..=end` for a
/// vertex at `site`: both ends, the site, and the halving slots between.
fn division_slots(len: usize, start: usize, site: Option<usize>, end: usize) -> Vec<usize> {
    let mut slots = vec![start, end];
    let Some(site) = site.filter(|s| *s > start && *s < end) else {
        return slots;
    };
    slots.push(site);
    let mut low = 0usize;
    let mut high = len.saturating_sub(1);
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if site <= mid {
            high = mid;
            if site < high && high <= end {
                slots.push(high);
            }
            continue;
        }
        low = mid;
        if site > low && low >= start {
            slots.push(low);
        }
    }
    slots
}

fn sparse_points(parallel: &ScanSegmentTree, across: &Axis, sites: &[Point], steiner: &[Point]) -> SegmentPoints {
    let d = parallel.direction();
    let mut out = SegmentPoints::new();
    for site in sites {
        let Some(id) = parallel.find_containing_point(*site) else {
            continue;
        };
        let seg = parallel.segment(id);
        let (Some(start), Some(end)) = (
            across.first_at_or_above(d.coord(seg.start)),
            across.last_at_or_below(d.coord(seg.end)),
        ) else {
            continue;
        };
        if start >= end {
            continue;
        }
        let perp = d.perp(*site);
        let slots = division_slots(across.len(), start, across.exact(d.coord(*site)), end);
        let list = out.entry(id).or_default();
        list.extend(slots.into_iter().map(|s| d.make_point(across.coords[s], perp)));
    }
    for p in steiner {
        let (Some(id), Some(slot)) = (parallel.find_containing_point(*p), across.exact(d.coord(*p))) else {
            continue;
        };
        out.entry(id)
            .or_default()
            .push(d.make_point(across.coords[slot], d.perp(*p)));
    }
    out
}
