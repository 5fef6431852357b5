//! Ports tied to obstacles and the border entrances paths leave them by.

use std::cmp::Ordering;

use crate::geometry::compare::INTERSECTION_EPSILON;
use crate::geometry::{
    Direction, Directions, Point, PointLocation, Polygon, Rect, close, close_points, compare, pure_direction, round_point,
};
use crate::obstacle::{ObstacleId, ObstacleTree, VisibilitySegment};
use crate::visibility::{NORMAL_WEIGHT, OVERLAPPED_WEIGHT, ScanDirection};

use super::transient::rect_bound;

/// One way out of an obstacle port: a point on the port's border, the
/// direction leaving it and how far that direction can be followed.
#[derive(Debug, Clone, PartialEq)]
pub struct PortEntrance {
    pub obstacle: ObstacleId,
    pub unpadded_border: Point,
    pub outward: Direction,
    pub visibility_border: Point,
    pub max_visibility: VisibilitySegment,
    pub overlapped: bool,
    pub border_weight: f64,
}

impl PortEntrance {
    pub fn new(tree: &ObstacleTree, obstacle: ObstacleId, unpadded_border: Point, outward: Direction) -> Self {
        let owner = tree.obstacle(obstacle);
        let polygon = owner.visibility_polygon();
        let far = border_point(&owner.visibility_bbox(), unpadded_border, outward);
        let visibility_border = polygon
            .boundary_intersections(unpadded_border, far)
            .last()
            .copied()
            .map_or(far, round_point);
        let max_visibility = tree.max_visibility_segment(visibility_border, outward);
        let mut entrance = Self {
            obstacle,
            unpadded_border,
            outward,
            visibility_border,
            max_visibility,
            overlapped: false,
            border_weight: NORMAL_WEIGHT,
        };
        if owner.is_overlapped() || (owner.is_group && !owner.is_in_hull()) {
            entrance.overlapped = tree
                .obstacles_containing(visibility_border)
                .iter()
                .any(|id| *id != obstacle);
            if !owner.is_group || entrance.overlapped || entrance.interior_crosses_obstacle(tree) {
                entrance.border_weight = OVERLAPPED_WEIGHT;
            }
        }
        if owner.is_in_hull() && entrance.border_weight == NORMAL_WEIGHT {
            let crosses = if owner.is_group {
                entrance.interior_crosses_obstacle(tree)
            } else {
                entrance.interior_crosses_hull_siblings(tree)
            };
            if crosses {
                entrance.border_weight = OVERLAPPED_WEIGHT;
            }
        }
        entrance
    }

    fn interior_crosses_obstacle(&self, tree: &ObstacleTree) -> bool {
        let ignore = [self.obstacle];
        tree.segment_crosses_an_obstacle(self.unpadded_border, self.visibility_border, &ignore)
            || tree
                .obstacles_containing(self.unpadded_border)
                .iter()
                .any(|id| *id != self.obstacle)
    }

    fn interior_crosses_hull_siblings(&self, tree: &ObstacleTree) -> bool {
        tree.siblings(self.obstacle).into_iter().any(|id| {
            let padded = &tree.obstacle(id).padded;
            padded.crosses_interior(self.unpadded_border, self.visibility_border)
                || padded.contains_point(self.unpadded_border) != PointLocation::Outside
        })
    }

    pub fn initial_weight(&self) -> f64 {
        if self.overlapped { OVERLAPPED_WEIGHT } else { NORMAL_WEIGHT }
    }

    pub fn is_vertical(&self) -> bool {
        self.outward.is_vertical()
    }

    pub fn can_extend(&self) -> bool {
        !self.max_visibility.is_degenerate()
    }

    pub fn has_group_crossings(&self) -> bool {
        !self.max_visibility.crossings.is_empty()
    }

    /// True if the nearest group crossing lies between the entrance and
    /// `point`.
    pub fn has_group_crossing_before(&self, point: Point) -> bool {
        let crossings = &self.max_visibility.crossings;
        let nearest = if self.outward.is_ascending() {
            crossings.first()
        } else {
            crossings.last()
        };
        let Some(nearest) = nearest else {
            return false;
        };
        Directions::between(self.max_visibility.start, nearest.point) == Directions::between(nearest.point, point)
    }

    fn is_collinear_with(&self, location: Point) -> bool {
        pure_direction(self.visibility_border, location).is_some()
    }
}

fn border_point(rect: &Rect, point: Point, dir: Direction) -> Point {
    let bound = rect_bound(rect, dir);
    ScanDirection::for_direction(dir).make_point(bound, ScanDirection::for_direction(dir).perp(point))
}

/// A port whose location lies on or inside its obstacle.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstaclePort {
    pub obstacle: ObstacleId,
    pub location: Point,
    pub entrances: Vec<PortEntrance>,
    pub visibility_rect: Rect,
}

impl ObstaclePort {
    /// Entrances where horizontal and vertical lines through the location
    /// cross `curve`; corner locations get the two outward directions of
    /// that corner. A crossing on a sloped stretch of the curve also gets
    /// an entrance perpendicular to the first.
    pub fn new(tree: &ObstacleTree, obstacle: ObstacleId, location: Point, curve: &Polygon) -> Self {
        let location = round_point(location);
        let bbox = curve.bbox();
        let curve_box = Rect::from_points(round_point(bbox.left_bottom()), round_point(bbox.right_top()));
        let mut builder = EntranceBuilder {
            tree,
            obstacle,
            location,
            curve,
            curve_box,
            entrances: Vec::new(),
        };
        let mut found = false;
        if !close(location.y, curve_box.top) && !close(location.y, curve_box.bottom) {
            found = true;
            if let Some((x0, x1)) = curve.span_on_line(true, location.y) {
                let west = Point::new(x0.max(curve_box.left), location.y);
                let east = Point::new(x1.min(curve_box.right), location.y);
                builder.at_border_pair(west, east, Direction::East);
            }
        }
        if !close(location.x, curve_box.left) && !close(location.x, curve_box.right) {
            found = true;
            if let Some((y0, y1)) = curve.span_on_line(false, location.x) {
                let south = Point::new(location.x, y0.max(curve_box.bottom));
                let north = Point::new(location.x, y1.min(curve_box.top));
                builder.at_border_pair(south, north, Direction::North);
            }
        }
        if !found {
            builder.at_corner();
        }
        let entrances = builder.entrances;
        let visibility_rect = Rect::around(
            std::iter::once(location).chain(
                entrances
                    .iter()
                    .flat_map(|e| [e.max_visibility.start, e.max_visibility.end]),
            ),
        )
        .unwrap_or(Rect::from_point(location));
        Self {
            obstacle,
            location,
            entrances,
            visibility_rect,
        }
    }

    pub fn has_collinear_entrances(&self) -> bool {
        self.entrances.iter().any(|e| e.is_collinear_with(self.location))
    }

    pub fn wants_visibility_intersection(&self, entrance: &PortEntrance) -> bool {
        !entrance.overlapped
            && entrance.can_extend()
            && (!self.has_collinear_entrances() || entrance.is_collinear_with(self.location))
    }
}

struct EntranceBuilder<'a> {
    tree: &'a ObstacleTree,
    obstacle: ObstacleId,
    location: Point,
    curve: &'a Polygon,
    curve_box: Rect,
    entrances: Vec<PortEntrance>,
}

impl EntranceBuilder<'_> {
    /// `low` and `high` are where one line through the location crosses
    /// the curve, `dir` points from low to high. A location sitting on one
    /// of them only exits through that side.
    fn at_border_pair(&mut self, low: Point, high: Point, dir: Direction) {
        if !close_points(low, self.location) {
            self.add(high, dir);
        }
        if !close_points(high, self.location) {
            self.add(low, dir.opposite());
        }
    }

    fn add(&mut self, border: Point, outward: Direction) {
        self.entrances
            .push(PortEntrance::new(self.tree, self.obstacle, border, outward));
        let along = ScanDirection::for_direction(outward);
        let gap = (rect_bound(&self.curve_box, outward) - along.coord(border)).abs();
        if gap <= INTERSECTION_EPSILON {
            return;
        }
        if let Some(perpendicular) = self.sloped_exit(border, outward) {
            self.entrances
                .push(PortEntrance::new(self.tree, self.obstacle, border, perpendicular));
        }
    }

    /// Perpendicular exit from a sloped stretch of the curve: the side of
    /// the tangent facing away from the interior.
    fn sloped_exit(&self, border: Point, outward: Direction) -> Option<Direction> {
        let edges = self.curve.edges_containing(border);
        let index = *edges.first()?;
        let (a, b) = self.curve.edge(index);
        let tangent = b - a;
        let across = if outward.is_vertical() { tangent.x } else { tangent.y };
        let perpendicular = match (compare(across, 0.0), outward.is_vertical()) {
            (Ordering::Equal, _) => return None,
            (Ordering::Greater, true) => Direction::East,
            (Ordering::Less, true) => Direction::West,
            (Ordering::Greater, false) => Direction::North,
            (Ordering::Less, false) => Direction::South,
        };
        if tangent.dot(outward.unit()) > 0.0 {
            Some(perpendicular.opposite())
        } else {
            Some(perpendicular)
        }
    }

    fn at_corner(&mut self) {
        let b = self.curve_box;
        let location = self.location;
        let outward = if close_points(location, b.left_bottom()) {
            Direction::South
        } else if close_points(location, b.left_top()) {
            Direction::West
        } else if close_points(location, b.right_bottom()) {
            Direction::East
        } else {
            Direction::North
        };
        self.entrances
            .push(PortEntrance::new(self.tree, self.obstacle, location, outward));
        self.entrances
            .push(PortEntrance::new(self.tree, self.obstacle, location, outward.rotate_right()));
    }
}

/// Straight or one-bend path between two ports whose entrances see each
/// other directly. Returns `None` when the ports must be routed through
/// the graph.
pub fn visibility_intersection(tree: &ObstacleTree, source: &ObstaclePort, target: &ObstaclePort) -> Option<Vec<Point>> {
    if tree.obstacle(source.obstacle).is_in_hull() || tree.obstacle(target.obstacle).is_in_hull() {
        return None;
    }
    if !source.visibility_rect.intersects(&target.visibility_rect) {
        return None;
    }
    for s in source.entrances.iter().filter(|e| source.wants_visibility_intersection(e)) {
        for t in target.entrances.iter().filter(|e| target.wants_visibility_intersection(e)) {
            let points = if s.is_vertical() == t.is_vertical() {
                facing_collinear(s, t)
            } else {
                crossing_perpendicular(s, t)
            };
            if points.is_some() {
                return points;
            }
        }
    }
    None
}

fn facing_collinear(s: &PortEntrance, t: &PortEntrance) -> Option<Vec<Point>> {
    let (a, b) = (&s.max_visibility, &t.max_visibility);
    if !close_points(a.start, b.end) || !close_points(a.end, b.start) {
        return None;
    }
    if s.has_group_crossings() || t.has_group_crossings() {
        return None;
    }
    if close_points(s.unpadded_border, t.unpadded_border) {
        return None;
    }
    Some(vec![s.unpadded_border, t.unpadded_border])
}

fn crossing_perpendicular(s: &PortEntrance, t: &PortEntrance) -> Option<Vec<Point>> {
    let (h, v) = if s.is_vertical() {
        (&t.max_visibility, &s.max_visibility)
    } else {
        (&s.max_visibility, &t.max_visibility)
    };
    let within = |value: f64, a: f64, b: f64| {
        compare(value, a.min(b)) != Ordering::Less && compare(value, a.max(b)) != Ordering::Greater
    };
    let point = Point::new(v.start.x, h.start.y);
    if !within(point.x, h.start.x, h.end.x) || !within(point.y, v.start.y, v.end.y) {
        return None;
    }
    if s.has_group_crossing_before(point) || t.has_group_crossing_before(point) {
        return None;
    }
    Some(vec![s.unpadded_border, point, t.unpadded_border])
}
