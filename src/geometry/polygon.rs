//! Convex polygons stored as clockwise vertex vectors.
//!
//! Vertices wrap around by index arithmetic; there are no linked vertex
//! nodes. Every polygon built here is convex and rounded, and starts at its
//! leftmost-then-lowest vertex, so two polygons built from the same point
//! set compare equal.

use std::cmp::Ordering;

use super::compare::{BOUNDARY_TOLERANCE, DISTANCE_EPSILON, close, close_points, compare_points, round_point};
use super::point::{Point, Rect};

/// Where a point sits relative to a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLocation {
    Inside,
    Boundary,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    Point(Point),
    Overlap(Point, Point),
}

/// Intersection of segments `a1a2` and `b1b2` with boundary tolerance.
pub fn segment_intersection(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<SegmentIntersection> {
    let d1 = a2 - a1;
    let d2 = b2 - b1;
    let len1 = d1.length();
    let len2 = d2.length();
    if len1 <= DISTANCE_EPSILON {
        return point_on_segment(a1, b1, b2).then_some(SegmentIntersection::Point(a1));
    }
    if len2 <= DISTANCE_EPSILON {
        return point_on_segment(b1, a1, a2).then_some(SegmentIntersection::Point(b1));
    }
    let denom = d1.cross(d2);
    if denom.abs() <= 1e-12 * len1 * len2 {
        // Parallel: only collinear overlaps count.
        if (d1.cross(b1 - a1) / len1).abs() > BOUNDARY_TOLERANCE {
            return None;
        }
        let sq = len1 * len1;
        let t0 = (b1 - a1).dot(d1) / sq;
        let t1 = (b2 - a1).dot(d1) / sq;
        let lo = t0.min(t1).max(0.0);
        let hi = t0.max(t1).min(1.0);
        let slack = BOUNDARY_TOLERANCE / len1;
        if lo > hi + slack {
            return None;
        }
        let p = round_point(a1 + d1 * lo);
        let q = round_point(a1 + d1 * hi.max(lo));
        if close_points(p, q) {
            return Some(SegmentIntersection::Point(p));
        }
        return Some(SegmentIntersection::Overlap(p, q));
    }
    let diff = b1 - a1;
    let t = diff.cross(d2) / denom;
    let u = diff.cross(d1) / denom;
    let slack_t = BOUNDARY_TOLERANCE / len1;
    let slack_u = BOUNDARY_TOLERANCE / len2;
    if t < -slack_t || t > 1.0 + slack_t || u < -slack_u || u > 1.0 + slack_u {
        return None;
    }
    let mut hit = a1 + d1 * t.clamp(0.0, 1.0);
    // Keep axis-aligned coordinates exact.
    if close(a1.x, a2.x) {
        hit.x = a1.x;
    } else if close(b1.x, b2.x) {
        hit.x = b1.x;
    }
    if close(a1.y, a2.y) {
        hit.y = a1.y;
    } else if close(b1.y, b2.y) {
        hit.y = b1.y;
    }
    Some(SegmentIntersection::Point(round_point(hit)))
}

pub fn point_on_segment(p: Point, a: Point, b: Point) -> bool {
    distance_to_segment(p, a, b) <= BOUNDARY_TOLERANCE
}

pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let d = b - a;
    let sq = d.dot(d);
    if sq <= DISTANCE_EPSILON * DISTANCE_EPSILON {
        return (p - a).length();
    }
    let t = ((p - a).dot(d) / sq).clamp(0.0, 1.0);
    (p - (a + d * t)).length()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
}

impl Polygon {
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Polygon> {
        convex_hull(points)
    }

    pub fn rectangle(rect: &Rect) -> Polygon {
        Polygon {
            points: rect.corners().iter().map(|p| round_point(*p)).collect(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, index: usize) -> Point {
        self.points[index % self.points.len()]
    }

    pub fn edge(&self, index: usize) -> (Point, Point) {
        (self.point(index), self.point(index + 1))
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        (0..self.points.len()).map(move |i| self.edge(i))
    }

    pub fn bbox(&self) -> Rect {
        Rect::around(self.points.iter().copied()).unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0))
    }

    pub fn is_rectangle(&self) -> bool {
        if self.points.len() != 4 {
            return false;
        }
        self.edges()
            .all(|(a, b)| close(a.x, b.x) || close(a.y, b.y))
    }

    pub fn area(&self) -> f64 {
        let twice: f64 = self.edges().map(|(a, b)| a.cross(b)).sum();
        twice.abs() / 2.0
    }

    pub fn contains_point(&self, point: Point) -> PointLocation {
        let mut on_boundary = false;
        for (a, b) in self.edges() {
            let d = b - a;
            let len = d.length();
            if len <= DISTANCE_EPSILON {
                continue;
            }
            // Clockwise: the interior lies to the right of each edge.
            let dist = d.cross(point - a) / len;
            if dist > BOUNDARY_TOLERANCE {
                return PointLocation::Outside;
            }
            if dist.abs() <= BOUNDARY_TOLERANCE {
                on_boundary = true;
            }
        }
        if on_boundary {
            PointLocation::Boundary
        } else {
            PointLocation::Inside
        }
    }

    pub fn boundary_intersections(&self, a: Point, b: Point) -> Vec<Point> {
        let mut hits = Vec::new();
        for (p, q) in self.edges() {
            match segment_intersection(a, b, p, q) {
                Some(SegmentIntersection::Point(x)) => hits.push(x),
                Some(SegmentIntersection::Overlap(x, y)) => {
                    hits.push(x);
                    hits.push(y);
                }
                None => {}
            }
        }
        hits.sort_by(|p, q| {
            (*p - a)
                .length()
                .partial_cmp(&(*q - a).length())
                .unwrap_or(Ordering::Equal)
        });
        hits.dedup_by(|p, q| close_points(*p, *q));
        hits
    }

    pub fn crosses_interior(&self, a: Point, b: Point) -> bool {
        let mut stops = vec![a];
        stops.extend(self.boundary_intersections(a, b));
        stops.push(b);
        stops
            .windows(2)
            .any(|w| self.contains_point((w[0] + w[1]) * 0.5) == PointLocation::Inside)
    }

    pub fn intersects_boundary(&self, other: &Polygon) -> bool {
        if !self.bbox().intersects(&other.bbox()) {
            return false;
        }
        self.edges().any(|(a, b)| {
            other
                .edges()
                .any(|(p, q)| segment_intersection(a, b, p, q).is_some())
        })
    }

    pub fn contains_polygon(&self, other: &Polygon) -> bool {
        other
            .points
            .iter()
            .all(|p| self.contains_point(*p) != PointLocation::Outside)
    }

    pub fn distance_to_border(&self, point: Point) -> f64 {
        self.edges()
            .map(|(a, b)| distance_to_segment(point, a, b))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn edges_containing(&self, point: Point) -> Vec<usize> {
        (0..self.points.len())
            .filter(|&i| {
                let (a, b) = self.edge(i);
                point_on_segment(point, a, b)
            })
            .collect()
    }

    /// Extent of the polygon along a horizontal (`line_is_horizontal`) or
    /// vertical line at `coord`.
    pub fn span_on_line(&self, line_is_horizontal: bool, coord: f64) -> Option<(f64, f64)> {
        let (perp, along): (fn(Point) -> f64, fn(Point) -> f64) = if line_is_horizontal {
            (|p: Point| p.y, |p: Point| p.x)
        } else {
            (|p: Point| p.x, |p: Point| p.y)
        };
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for (a, b) in self.edges() {
            let (pa, pb) = (perp(a), perp(b));
            if close(pa, coord) {
                lo = lo.min(along(a));
                hi = hi.max(along(a));
            }
            if close(pb, coord) {
                lo = lo.min(along(b));
                hi = hi.max(along(b));
            }
            if (pa < coord && pb > coord) || (pa > coord && pb < coord) {
                let t = (coord - pa) / (pb - pa);
                let v = along(a) + (along(b) - along(a)) * t;
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if lo > hi {
            return None;
        }
        Some((super::compare::round(lo), super::compare::round(hi)))
    }

    /// Outward offset by `amount`; corners sharper than 60 degrees are
    /// beveled instead of mitered.
    pub fn padded(&self, amount: f64) -> Polygon {
        if amount <= 0.0 || self.points.len() < 3 {
            return self.clone();
        }
        let n = self.points.len();
        let mut out = Vec::with_capacity(n * 2);
        for i in 0..n {
            let prev = self.point(i + n - 1);
            let cur = self.point(i);
            let next = self.point(i + 1);
            let e1 = (cur - prev).normalized();
            let e2 = (next - cur).normalized();
            let n1 = left_normal(e1);
            let n2 = left_normal(e2);
            let bisector = (n1 + n2).normalized();
            let cos_half = bisector.dot(n1);
            if cos_half >= 0.5 {
                out.push(cur + bisector * (amount / cos_half));
                continue;
            }
            let along1 = e1.dot(bisector);
            let along2 = -e2.dot(bisector);
            if along1 <= DISTANCE_EPSILON || along2 <= DISTANCE_EPSILON {
                out.push(cur + n1 * amount);
                out.push(cur + n2 * amount);
                continue;
            }
            let t1 = (amount - amount * n1.dot(bisector)) / along1;
            let t2 = (amount - amount * n2.dot(bisector)) / along2;
            out.push(cur + n1 * amount + e1 * t1);
            out.push(cur + n2 * amount - e2 * t2);
        }
        convex_hull(out).unwrap_or_else(|| self.clone())
    }
}

fn left_normal(dir: Point) -> Point {
    Point::new(-dir.y, dir.x)
}

fn turn(o: Point, a: Point, b: Point) -> f64 {
    (a - o).cross(b - o)
}

/// Clockwise convex hull in canonical start order.
pub fn convex_hull<I: IntoIterator<Item = Point>>(points: I) -> Option<Polygon> {
    let mut pts: Vec<Point> = points.into_iter().map(round_point).collect();
    pts.sort_by(|a, b| compare_points(*a, *b));
    pts.dedup_by(|a, b| close_points(*a, *b));
    if pts.len() < 3 {
        return None;
    }
    let mut lower: Vec<Point> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && turn(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && turn(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    // Counterclockwise so far; drop near-collinear vertices, then flip.
    let mut ccw = lower;
    let mut changed = true;
    while changed && ccw.len() > 3 {
        changed = false;
        for i in 0..ccw.len() {
            let n = ccw.len();
            let prev = ccw[(i + n - 1) % n];
            let next = ccw[(i + 1) % n];
            if distance_to_segment(ccw[i], prev, next) < DISTANCE_EPSILON {
                ccw.remove(i);
                changed = true;
                break;
            }
        }
    }
    if ccw.len() < 3 {
        return None;
    }
    ccw.reverse();
    let start = ccw
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| compare_points(**a, **b))
        .map(|(i, _)| i)
        .unwrap_or(0);
    ccw.rotate_left(start);
    let polygon = Polygon { points: ccw };
    if polygon.area() <= DISTANCE_EPSILON {
        return None;
    }
    Some(polygon)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(l: f64, b: f64, r: f64, t: f64) -> Polygon {
        Polygon::rectangle(&Rect::new(l, b, r, t))
    }

    #[test]
    fn hull_of_rectangle_matches_rectangle() {
        let hull = Polygon::from_points([
            Point::new(10.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
            Point::new(5.0, 0.0),
        ])
        .expect("hull");
        assert_eq!(hull, square(0.0, 0.0, 10.0, 5.0));
        assert!(hull.is_rectangle());
    }

    #[test]
    fn degenerate_points_have_no_hull() {
        assert!(Polygon::from_points([Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)]).is_none());
    }

    #[test]
    fn point_location() {
        let sq = square(0.0, 0.0, 10.0, 10.0);
        assert_eq!(sq.contains_point(Point::new(5.0, 5.0)), PointLocation::Inside);
        assert_eq!(sq.contains_point(Point::new(10.0, 5.0)), PointLocation::Boundary);
        assert_eq!(sq.contains_point(Point::new(10.5, 5.0)), PointLocation::Outside);
    }

    #[test]
    fn padding_a_rectangle_is_exact() {
        let sq = square(0.0, 0.0, 10.0, 10.0).padded(2.0);
        assert_eq!(sq, square(-2.0, -2.0, 12.0, 12.0));
    }

    #[test]
    fn sharp_corners_are_beveled() {
        let spike = Polygon::from_points([Point::new(0.0, 0.0), Point::new(1.0, 20.0), Point::new(2.0, 0.0)])
            .expect("triangle");
        let padded = spike.padded(1.0);
        assert!(padded.len() > 3);
        assert!(padded.bbox().top < 20.0 + 3.0);
        for p in spike.points() {
            assert_eq!(padded.contains_point(*p), PointLocation::Inside);
        }
    }

    #[test]
    fn spans_on_lines() {
        let diamond = Polygon::from_points([
            Point::new(0.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 0.0),
        ])
        .expect("diamond");
        assert_eq!(diamond.span_on_line(true, 5.0), Some((0.0, 10.0)));
        assert_eq!(diamond.span_on_line(true, 0.0), Some((5.0, 5.0)));
        assert_eq!(diamond.span_on_line(false, 2.5), Some((2.5, 7.5)));
        assert_eq!(diamond.span_on_line(true, 11.0), None);
    }

    #[test]
    fn boundary_intersections_are_ordered() {
        let sq = square(0.0, 0.0, 10.0, 10.0);
        let hits = sq.boundary_intersections(Point::new(-5.0, 5.0), Point::new(15.0, 5.0));
        assert_eq!(hits, vec![Point::new(0.0, 5.0), Point::new(10.0, 5.0)]);
        let along = sq.boundary_intersections(Point::new(-5.0, 0.0), Point::new(15.0, 0.0));
        assert_eq!(along, vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
    }

    #[test]
    fn touching_borders_intersect() {
        let a = square(0.0, 0.0, 10.0, 10.0);
        let b = square(10.0, 2.0, 20.0, 8.0);
        let c = square(11.0, 2.0, 20.0, 8.0);
        assert!(a.intersects_boundary(&b));
        assert!(!a.intersects_boundary(&c));
        assert!(a.contains_polygon(&square(1.0, 1.0, 2.0, 2.0)));
    }
}
