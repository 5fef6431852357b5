use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::geometry::compare::{INTERSECTION_EPSILON, compare};
use crate::geometry::polygon::convex_hull;
use crate::geometry::{Direction, Point, PointLocation, Polygon, Rect, close, round_point};

use super::crossings::GroupBoundaryCrossing;
use super::model::{LOOSE_PADDING, Obstacle, ObstacleId, OverlapHull};
use super::spatial::SpatialIndex;

// ── Resolution limits ───────────────────────────────────────────────
/// Upper bound on hull-accretion and group-growth passes.
const MAX_RESOLUTION_PASSES: usize = 64;
/// Upper bound on re-growing one group around one obstacle.
const MAX_GROWTH_STEPS: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlapSummary {
    pub clumps: usize,
    pub hulls: usize,
    pub grown_groups: usize,
}

/// Farthest unobstructed reach from a point in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilitySegment {
    pub start: Point,
    pub end: Point,
    pub crossings: Vec<GroupBoundaryCrossing>,
}

impl VisibilitySegment {
    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }

    fn components(&mut self) -> BTreeMap<usize, Vec<ObstacleId>> {
        let mut out: BTreeMap<usize, Vec<ObstacleId>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            out.entry(root).or_default().push(ObstacleId(i));
        }
        out.retain(|_, members| members.len() > 1);
        out
    }
}

/// The obstacle set with its spatial index, overlap structure and group
/// ancestry.
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleTree {
    obstacles: Vec<Obstacle>,
    clumps: Vec<Vec<ObstacleId>>,
    hulls: Vec<OverlapHull>,
    ancestors: Vec<BTreeSet<ObstacleId>>,
    spatial_ancestors_adjusted: bool,
    index: SpatialIndex,
    graph_box: Rect,
}

impl ObstacleTree {
    /// Indexes `obstacles` as given, without resolving overlaps.
    /// `ancestors[i]` lists the hierarchical group ancestors of obstacle `i`.
    pub fn new(obstacles: Vec<Obstacle>, mut ancestors: Vec<BTreeSet<ObstacleId>>) -> Self {
        ancestors.resize(obstacles.len(), BTreeSet::new());
        let mut tree = Self {
            obstacles,
            clumps: Vec::new(),
            hulls: Vec::new(),
            ancestors,
            spatial_ancestors_adjusted: false,
            index: SpatialIndex::default(),
            graph_box: Rect::new(0.0, 0.0, 0.0, 0.0),
        };
        tree.rebuild_index();
        tree
    }

    pub fn create(obstacles: Vec<Obstacle>, ancestors: Vec<BTreeSet<ObstacleId>>) -> Self {
        let mut tree = Self::new(obstacles, ancestors);
        tree.resolve_overlaps();
        tree
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn obstacle(&self, id: ObstacleId) -> &Obstacle {
        &self.obstacles[id.0]
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn is_primary(&self, id: ObstacleId) -> bool {
        match self.obstacles[id.0].hull() {
            None => true,
            Some(h) => self.hulls[h].primary() == Some(id),
        }
    }

    pub fn primary_obstacles(&self) -> impl Iterator<Item = &Obstacle> + '_ {
        self.obstacles.iter().filter(|o| self.is_primary(o.id))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Obstacle> + '_ {
        self.obstacles.iter().filter(|o| o.is_group)
    }

    pub fn clumps(&self) -> &[Vec<ObstacleId>] {
        &self.clumps
    }

    pub fn hulls(&self) -> &[OverlapHull] {
        &self.hulls
    }

    pub fn siblings(&self, id: ObstacleId) -> Vec<ObstacleId> {
        let obstacle = &self.obstacles[id.0];
        let mut out = BTreeSet::new();
        if let Some(c) = obstacle.clump() {
            out.extend(self.clumps[c].iter().copied());
        }
        if let Some(h) = obstacle.hull() {
            out.extend(self.hulls[h].members.iter().copied());
        }
        out.remove(&id);
        out.into_iter().collect()
    }

    pub fn ancestors(&self, id: ObstacleId) -> &BTreeSet<ObstacleId> {
        &self.ancestors[id.0]
    }

    pub fn graph_box(&self) -> Rect {
        self.graph_box
    }

    pub fn query(&self, rect: &Rect) -> Vec<ObstacleId> {
        self.index.query(rect)
    }

    fn rebuild_index(&mut self) {
        let items: Vec<(ObstacleId, Rect)> = self
            .primary_obstacles()
            .map(|o| (o.id, o.visibility_bbox()))
            .collect();
        self.index = SpatialIndex::build(items);
        self.graph_box = self.index.bounds().unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
    }

    // ── Overlap resolution ──────────────────────────────────────────

    /// Clumps overlapping rectangles, merges other overlaps into convex
    /// hulls and grows groups around what they cut through. Running it on
    /// an already resolved tree changes nothing.
    pub fn resolve_overlaps(&mut self) -> OverlapSummary {
        let clumps = self.accrete_clumps();
        let hulls = self.accrete_convex_hulls();
        let grown_groups = self.grow_groups_to_accommodate_overlaps();
        self.compact();
        self.rebuild_index();
        let summary = OverlapSummary {
            clumps,
            hulls,
            grown_groups,
        };
        debug!(
            obstacles = self.obstacles.len(),
            clumps = self.clumps.len(),
            hulls = self.hulls.len(),
            grown_groups,
            "resolved obstacle overlaps"
        );
        summary
    }

    /// Whether the borders of `a` and `b` cross or nearly touch, plus the
    /// containment relation when they don't.
    pub fn obstacles_intersect(&self, a: ObstacleId, b: ObstacleId) -> (bool, bool, bool) {
        let (oa, ob) = (&self.obstacles[a.0], &self.obstacles[b.0]);
        let (pa, pb) = (oa.visibility_polygon(), ob.visibility_polygon());
        if pa.intersects_boundary(pb) {
            return (true, false, false);
        }
        let a_inside_b = pb.contains_point(pa.point(0)) != PointLocation::Outside;
        let b_inside_a = !a_inside_b && pa.contains_point(pb.point(0)) != PointLocation::Outside;
        if oa.is_rectangle() && ob.is_rectangle() {
            return (false, a_inside_b, b_inside_a);
        }
        if Self::close_enough_to_touch(oa, ob, a_inside_b, b_inside_a) {
            return (true, false, false);
        }
        (false, a_inside_b, b_inside_a)
    }

    fn close_enough_to_touch(a: &Obstacle, b: &Obstacle, a_inside_b: bool, b_inside_a: bool) -> bool {
        if !a_inside_b && !b_inside_a {
            return a.loose_polygon().intersects_boundary(b.visibility_polygon());
        }
        let (inner, outer) = if a_inside_b {
            (a.loose_polygon(), b.visibility_polygon())
        } else {
            (b.loose_polygon(), a.visibility_polygon())
        };
        inner.points().iter().any(|p| {
            outer.contains_point(*p) == PointLocation::Outside
                && outer.distance_to_border(*p) > INTERSECTION_EPSILON
        })
    }

    fn candidate_pairs(&self, left: &[ObstacleId], right: &[ObstacleId]) -> Vec<(ObstacleId, ObstacleId)> {
        let index = SpatialIndex::build(
            right
                .iter()
                .map(|id| (*id, self.obstacles[id.0].visibility_bbox()))
                .collect(),
        );
        let mut pairs = Vec::new();
        for a in left {
            let area = self.obstacles[a.0].visibility_bbox().padded(LOOSE_PADDING);
            for b in index.query(&area) {
                if b != *a {
                    pairs.push((*a, b));
                }
            }
        }
        pairs
    }

    fn accrete_clumps(&mut self) -> usize {
        for obstacle in &mut self.obstacles {
            if obstacle.clump().is_some() {
                obstacle.set_clump(None);
            }
        }
        self.clumps.clear();
        let rects: Vec<ObstacleId> = self
            .obstacles
            .iter()
            .filter(|o| !o.is_group && o.is_rectangle() && !o.is_in_hull())
            .map(|o| o.id)
            .collect();
        let mut sets = DisjointSets::new(self.obstacles.len());
        for (a, b) in self.candidate_pairs(&rects, &rects) {
            if a > b {
                continue;
            }
            let (hit, a_inside_b, b_inside_a) = self.obstacles_intersect(a, b);
            if hit || a_inside_b || b_inside_a {
                sets.union(a.0, b.0);
            }
        }
        for members in sets.components().into_values() {
            let clump = self.clumps.len();
            for id in &members {
                self.obstacles[id.0].set_clump(Some(clump));
            }
            self.clumps.push(members);
        }
        self.clumps.len()
    }

    fn accrete_convex_hulls(&mut self) -> usize {
        let mut created = 0;
        for _ in 0..MAX_RESOLUTION_PASSES {
            let ids: Vec<ObstacleId> = self
                .primary_obstacles()
                .filter(|o| !o.is_group)
                .map(|o| o.id)
                .collect();
            let mut sets = DisjointSets::new(self.obstacles.len());
            let mut found = false;
            for (a, b) in self.candidate_pairs(&ids, &ids) {
                if a > b {
                    continue;
                }
                let (hit, a_inside_b, b_inside_a) = self.obstacles_intersect(a, b);
                if !hit && !a_inside_b && !b_inside_a {
                    continue;
                }
                let (oa, ob) = (&self.obstacles[a.0], &self.obstacles[b.0]);
                if !oa.is_in_hull() && !ob.is_in_hull() && oa.is_rectangle() && ob.is_rectangle() {
                    continue;
                }
                found = true;
                sets.union(a.0, b.0);
                for id in [a, b] {
                    for sibling in self.siblings(id) {
                        sets.union(id.0, sibling.0);
                    }
                }
            }
            if !found {
                return created;
            }
            for members in sets.components().into_values() {
                let points: Vec<Point> = members
                    .iter()
                    .flat_map(|id| self.obstacles[id.0].visibility_polygon().points().to_vec())
                    .collect();
                let Some(polygon) = convex_hull(points) else {
                    continue;
                };
                let hull = self.hulls.len();
                for id in &members {
                    self.obstacles[id.0].set_hull(hull, polygon.clone());
                }
                self.hulls.push(OverlapHull { polygon, members });
                created += 1;
            }
        }
        warn!("convex hull accretion stopped before converging");
        created
    }

    fn grow_groups_to_accommodate_overlaps(&mut self) -> usize {
        let mut grown = BTreeSet::new();
        for _ in 0..MAX_RESOLUTION_PASSES {
            let groups: Vec<ObstacleId> = self.groups().map(|o| o.id).collect();
            if groups.is_empty() {
                break;
            }
            let primaries: Vec<ObstacleId> = self.primary_obstacles().map(|o| o.id).collect();
            let mut seen = BTreeSet::new();
            let mut pairs = Vec::new();
            for (a, b) in self.candidate_pairs(&groups, &primaries) {
                if seen.contains(&(b, a)) {
                    continue;
                }
                let (hit, a_inside_b, b_inside_a) = self.obstacles_intersect(a, b);
                if !hit && !a_inside_b && !b_inside_a {
                    continue;
                }
                let (group, other) = (&self.obstacles[a.0], &self.obstacles[b.0]);
                if group.is_rectangle() && other.is_rectangle() {
                    // Rectangles keep their shape; the sparse generator needs to know.
                    let corner = {
                        let (gb, ob) = (group.visibility_bbox(), other.visibility_bbox());
                        gb.corners().iter().any(|c| ob.contains_point(*c))
                    };
                    if !other.is_group && (a_inside_b || corner) {
                        self.obstacles[b.0].overlaps_group_corner = true;
                    }
                    continue;
                }
                if !hit && (other.is_group || b_inside_a) {
                    continue;
                }
                seen.insert((a, b));
                pairs.push((a, b));
            }
            if pairs.is_empty() {
                break;
            }
            for (a, b) in pairs {
                let (group, obstacle) = if self.obstacles[b.0].is_group {
                    let area_a = self.obstacles[a.0].visibility_bbox().area();
                    let area_b = self.obstacles[b.0].visibility_bbox().area();
                    if area_a > area_b { (a, b) } else { (b, a) }
                } else {
                    (a, b)
                };
                self.grow_group_around(group, obstacle);
                grown.insert(group);
            }
        }
        grown.len()
    }

    fn grow_group_around(&mut self, group: ObstacleId, obstacle: ObstacleId) {
        let mut loose = self.obstacles[obstacle.0].loose_polygon().clone();
        self.grow_group_around_polygon(group, &loose);
        for _ in 0..MAX_GROWTH_STEPS {
            let (hit, obstacle_inside, _) = self.obstacles_intersect(obstacle, group);
            if !hit && obstacle_inside {
                return;
            }
            // Rounding may still leave them touching; loosen and grow again.
            loose = loose.padded(LOOSE_PADDING);
            self.grow_group_around_polygon(group, &loose);
        }
        warn!(group = group.0, obstacle = obstacle.0, "group growth did not clear obstacle");
    }

    fn grow_group_around_polygon(&mut self, group: ObstacleId, polygon: &Polygon) {
        let points: Vec<Point> = self.obstacles[group.0]
            .visibility_polygon()
            .points()
            .iter()
            .chain(polygon.points())
            .copied()
            .collect();
        if let Some(hull) = convex_hull(points) {
            self.obstacles[group.0].grow_to(hull);
        }
    }

    fn compact(&mut self) {
        let mut clumps: BTreeMap<ObstacleId, Vec<ObstacleId>> = BTreeMap::new();
        let mut by_old_clump: BTreeMap<usize, Vec<ObstacleId>> = BTreeMap::new();
        let mut by_old_hull: BTreeMap<usize, Vec<ObstacleId>> = BTreeMap::new();
        for obstacle in &self.obstacles {
            if let Some(c) = obstacle.clump() {
                by_old_clump.entry(c).or_default().push(obstacle.id);
            }
            if let Some(h) = obstacle.hull() {
                by_old_hull.entry(h).or_default().push(obstacle.id);
            }
        }
        for members in by_old_clump.into_values() {
            clumps.insert(members[0], members);
        }
        self.clumps = clumps.into_values().collect();
        for (index, members) in self.clumps.iter().enumerate() {
            for id in members {
                self.obstacles[id.0].set_clump(Some(index));
            }
        }

        let mut hulls: BTreeMap<ObstacleId, OverlapHull> = BTreeMap::new();
        for (old, members) in by_old_hull {
            hulls.insert(
                members[0],
                OverlapHull {
                    polygon: self.hulls[old].polygon.clone(),
                    members,
                },
            );
        }
        self.hulls = hulls.into_values().collect();
        for (index, hull) in self.hulls.iter().enumerate() {
            for id in &hull.members {
                self.obstacles[id.0].renumber_hull(index);
            }
        }
    }

    /// Adds groups whose interior meets an obstacle to that obstacle's
    /// ancestors, and drops hierarchical ancestors that are nowhere near it.
    /// Returns false if this already ran.
    pub fn adjust_spatial_ancestors(&mut self) -> bool {
        if self.spatial_ancestors_adjusted {
            return false;
        }
        let groups: Vec<ObstacleId> = self.groups().map(|g| g.id).collect();
        for group in groups {
            let group_polygon = self.obstacles[group.0].visibility_polygon().clone();
            for id in self.index.query(&group_polygon.bbox()) {
                if id == group {
                    continue;
                }
                let polygon = self.obstacles[id.0].visibility_polygon();
                if !interiors_intersect(polygon, &group_polygon) {
                    continue;
                }
                let mut members = self.siblings(id);
                members.push(id);
                for member in members {
                    self.ancestors[member.0].insert(group);
                }
            }
        }
        for i in 0..self.obstacles.len() {
            let bbox = self.obstacles[i].visibility_bbox();
            let obstacles = &self.obstacles;
            self.ancestors[i].retain(|g| bbox.intersects(&obstacles[g.0].visibility_bbox()));
        }
        self.spatial_ancestors_adjusted = true;
        true
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Strictly inside a non-group obstacle, or on the border of two or
    /// more (touching obstacles count as overlapping).
    pub fn point_inside_obstacle(&self, point: Point) -> bool {
        let mut on_border = 0;
        for id in self.index.query_point(point) {
            let obstacle = &self.obstacles[id.0];
            if obstacle.is_group {
                continue;
            }
            match obstacle.visibility_polygon().contains_point(point) {
                PointLocation::Inside => return true,
                PointLocation::Boundary => on_border += 1,
                PointLocation::Outside => {}
            }
        }
        on_border >= 2
    }

    pub fn obstacles_containing(&self, point: Point) -> Vec<ObstacleId> {
        self.index
            .query_point(point)
            .into_iter()
            .filter(|id| {
                let o = &self.obstacles[id.0];
                !o.is_group && o.visibility_polygon().contains_point(point) != PointLocation::Outside
            })
            .collect()
    }

    /// First point where segment `start..end` enters the interior of a
    /// non-group obstacle that does not already contain `start`.
    pub fn first_obstacle_hit(&self, start: Point, end: Point) -> Option<(Point, ObstacleId)> {
        let rect = Rect::from_points(start, end);
        let mut best: Option<(f64, Point, ObstacleId)> = None;
        for id in self.index.query(&rect) {
            let obstacle = &self.obstacles[id.0];
            if obstacle.is_group {
                continue;
            }
            let polygon = obstacle.visibility_polygon();
            if polygon.contains_point(start) != PointLocation::Outside {
                continue;
            }
            let Some(hit) = entering_point(polygon, start, end) else {
                continue;
            };
            let distance = start.manhattan(hit);
            if best.as_ref().is_none_or(|(d, _, _)| distance < *d) {
                best = Some((distance, hit, id));
            }
        }
        best.map(|(_, p, id)| (p, id))
    }

    pub fn restrict_segment(&self, start: Point, end: Point) -> Point {
        self.first_obstacle_hit(start, end)
            .map(|(p, _)| p)
            .unwrap_or(end)
    }

    pub fn graph_box_border(&self, start: Point, dir: Direction) -> Point {
        let b = self.graph_box;
        let p = match dir {
            Direction::North => Point::new(start.x, b.top.max(start.y)),
            Direction::South => Point::new(start.x, b.bottom.min(start.y)),
            Direction::East => Point::new(b.right.max(start.x), start.y),
            Direction::West => Point::new(b.left.min(start.x), start.y),
        };
        round_point(p)
    }

    /// Maximal unobstructed segment from `start` in `dir`, clipped to the
    /// graph box, with the group borders it crosses.
    pub fn max_visibility_segment(&self, start: Point, dir: Direction) -> VisibilitySegment {
        let border = self.graph_box_border(start, dir);
        if border == start {
            return VisibilitySegment {
                start,
                end: start,
                crossings: Vec::new(),
            };
        }
        let end = self.restrict_segment(start, border);
        let crossings = self.group_crossings(start, end);
        VisibilitySegment { start, end, crossings }
    }

    /// Group borders crossed strictly inside axis-aligned segment `a..b`,
    /// in coordinate order. Segments running along a group's flat extreme
    /// cross nothing.
    pub fn group_crossings(&self, a: Point, b: Point) -> Vec<GroupBoundaryCrossing> {
        let horizontal = close(a.y, b.y);
        let (perp, lo, hi) = if horizontal {
            (a.y, a.x.min(b.x), a.x.max(b.x))
        } else {
            (a.x, a.y.min(b.y), a.y.max(b.y))
        };
        let ascending = if horizontal { Direction::East } else { Direction::North };
        let mut out = Vec::new();
        for id in self.index.query(&Rect::from_points(a, b)) {
            let group = &self.obstacles[id.0];
            if !group.is_group {
                continue;
            }
            let bbox = group.visibility_bbox();
            let (pmin, pmax) = if horizontal {
                (bbox.bottom, bbox.top)
            } else {
                (bbox.left, bbox.right)
            };
            if compare(perp, pmin) != std::cmp::Ordering::Greater
                || compare(perp, pmax) != std::cmp::Ordering::Less
            {
                continue;
            }
            let Some((glo, ghi)) = group.visibility_polygon().span_on_line(horizontal, perp) else {
                continue;
            };
            let make = |along: f64| {
                if horizontal {
                    Point::new(along, perp)
                } else {
                    Point::new(perp, along)
                }
            };
            if strictly_between(glo, lo, hi) {
                out.push(GroupBoundaryCrossing {
                    point: make(glo),
                    group: id,
                    direction_to_inside: ascending,
                });
            }
            if strictly_between(ghi, lo, hi) {
                out.push(GroupBoundaryCrossing {
                    point: make(ghi),
                    group: id,
                    direction_to_inside: ascending.opposite(),
                });
            }
        }
        out.sort_by(|x, y| {
            let (kx, ky) = if horizontal { (x.point.x, y.point.x) } else { (x.point.y, y.point.y) };
            compare(kx, ky).then_with(|| x.group.cmp(&y.group))
        });
        out
    }

    /// True if segment `a..b` passes through the interior of a non-group
    /// obstacle other than those in `ignore`.
    pub fn segment_crosses_an_obstacle(&self, a: Point, b: Point, ignore: &[ObstacleId]) -> bool {
        self.index.query(&Rect::from_points(a, b)).into_iter().any(|id| {
            let obstacle = &self.obstacles[id.0];
            !obstacle.is_group
                && !ignore.contains(&id)
                && obstacle.visibility_polygon().crosses_interior(a, b)
        })
    }
}

fn strictly_between(v: f64, lo: f64, hi: f64) -> bool {
    compare(v, lo) == std::cmp::Ordering::Greater && compare(v, hi) == std::cmp::Ordering::Less
}

fn interiors_intersect(a: &Polygon, b: &Polygon) -> bool {
    a.intersects_boundary(b)
        || b.contains_point(a.point(0)) == PointLocation::Inside
        || a.contains_point(b.point(0)) == PointLocation::Inside
}

fn entering_point(polygon: &Polygon, start: Point, end: Point) -> Option<Point> {
    let hits = polygon.boundary_intersections(start, end);
    for (i, hit) in hits.iter().enumerate() {
        let next = hits.get(i + 1).copied().unwrap_or(end);
        let mid = (*hit + next) * 0.5;
        if polygon.contains_point(mid) == PointLocation::Inside {
            return Some(*hit);
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use super::*;

    fn rect_obstacle(id: usize, l: f64, b: f64, r: f64, t: f64, group: bool) -> Obstacle {
        Obstacle::new(
            ObstacleId(id),
            id,
            Polygon::rectangle(&Rect::new(l, b, r, t)),
            0.0,
            group,
            false,
        )
    }

    fn diamond_obstacle(id: usize, cx: f64, cy: f64, r: f64) -> Obstacle {
        let poly = Polygon::from_points([
            Point::new(cx - r, cy),
            Point::new(cx, cy + r),
            Point::new(cx + r, cy),
            Point::new(cx, cy - r),
        ])
        .expect("diamond");
        Obstacle::new(ObstacleId(id), id, poly, 0.0, false, false)
    }

    #[test]
    fn overlapping_rectangles_form_a_clump() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 10.0, 10.0, false),
                rect_obstacle(1, 5.0, 5.0, 15.0, 15.0, false),
                rect_obstacle(2, 40.0, 0.0, 50.0, 10.0, false),
            ],
            Vec::new(),
        );
        assert_eq!(tree.clumps(), &[vec![ObstacleId(0), ObstacleId(1)]]);
        assert!(tree.obstacle(ObstacleId(0)).is_overlapped());
        assert!(!tree.obstacle(ObstacleId(2)).is_overlapped());
        assert!(tree.hulls().is_empty());
    }

    #[test]
    fn touching_rectangles_clump() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 10.0, 10.0, false),
                rect_obstacle(1, 10.0, 0.0, 20.0, 10.0, false),
            ],
            Vec::new(),
        );
        assert_eq!(tree.clumps().len(), 1);
        assert!(tree.point_inside_obstacle(Point::new(10.0, 5.0)));
        assert!(!tree.point_inside_obstacle(Point::new(0.0, 5.0)));
    }

    #[test]
    fn overlapping_diamond_and_clump_merge_into_one_hull() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 10.0, 10.0, false),
                rect_obstacle(1, 8.0, 0.0, 18.0, 10.0, false),
                diamond_obstacle(2, 20.0, 5.0, 4.0),
            ],
            Vec::new(),
        );
        assert!(tree.clumps().is_empty());
        assert_eq!(tree.hulls().len(), 1);
        assert_eq!(
            tree.hulls()[0].members,
            vec![ObstacleId(0), ObstacleId(1), ObstacleId(2)]
        );
        assert_eq!(tree.primary_obstacles().count(), 1);
        assert_eq!(tree.graph_box(), Rect::new(0.0, 0.0, 24.0, 10.0));
    }

    #[test]
    fn groups_grow_around_obstacles_they_cut() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 20.0, 20.0, true),
                diamond_obstacle(1, 20.0, 10.0, 3.0),
            ],
            Vec::new(),
        );
        let group = tree.obstacle(ObstacleId(0));
        let diamond = tree.obstacle(ObstacleId(1));
        assert!(!group.is_rectangle());
        assert!(group.visibility_polygon().contains_polygon(diamond.visibility_polygon()));
        assert!(!group.visibility_polygon().intersects_boundary(diamond.visibility_polygon()));
    }

    #[test]
    fn rectangle_on_group_corner_is_flagged() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 20.0, 20.0, true),
                rect_obstacle(1, 15.0, 15.0, 25.0, 25.0, false),
            ],
            Vec::new(),
        );
        assert!(tree.obstacle(ObstacleId(1)).overlaps_group_corner);
        assert!(tree.obstacle(ObstacleId(0)).is_rectangle());
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 10.0, 10.0, false),
                rect_obstacle(1, 5.0, 5.0, 15.0, 15.0, false),
                diamond_obstacle(2, 30.0, 5.0, 4.0),
                diamond_obstacle(3, 34.0, 5.0, 4.0),
                rect_obstacle(4, 25.0, -10.0, 45.0, 3.0, true),
            ],
            Vec::new(),
        );
        let before = tree.clone();
        tree.resolve_overlaps();
        assert_eq!(tree, before);
    }

    #[test]
    fn rays_stop_at_first_obstacle() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 10.0, 10.0, false),
                rect_obstacle(1, 20.0, 0.0, 30.0, 10.0, false),
                rect_obstacle(2, 40.0, 0.0, 50.0, 10.0, false),
            ],
            Vec::new(),
        );
        let seg = tree.max_visibility_segment(Point::new(10.0, 5.0), Direction::East);
        assert_eq!(seg.end, Point::new(20.0, 5.0));
        // Running along a flat side is not blocked.
        let along = tree.max_visibility_segment(Point::new(10.0, 10.0), Direction::East);
        assert_eq!(along.end, Point::new(50.0, 10.0));
        let up = tree.max_visibility_segment(Point::new(15.0, 5.0), Direction::North);
        assert_eq!(up.end, Point::new(15.0, 10.0));
    }

    #[test]
    fn group_crossings_record_direction_to_inside() {
        let tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 10.0, 0.0, 30.0, 20.0, true),
                rect_obstacle(1, 15.0, 5.0, 20.0, 10.0, false),
                rect_obstacle(2, 50.0, 0.0, 60.0, 20.0, false),
            ],
            Vec::new(),
        );
        let crossings = tree.group_crossings(Point::new(0.0, 15.0), Point::new(50.0, 15.0));
        assert_eq!(crossings.len(), 2);
        assert_eq!(crossings[0].point, Point::new(10.0, 15.0));
        assert_eq!(crossings[0].direction_to_inside, Direction::East);
        assert_eq!(crossings[1].direction_to_inside, Direction::West);
        // Along the group's top border there is no crossing.
        assert!(tree.group_crossings(Point::new(0.0, 20.0), Point::new(50.0, 20.0)).is_empty());
    }

    #[test]
    fn spatial_ancestors_include_enclosing_groups() {
        let mut tree = ObstacleTree::create(
            vec![
                rect_obstacle(0, 0.0, 0.0, 30.0, 30.0, true),
                rect_obstacle(1, 5.0, 5.0, 10.0, 10.0, false),
                rect_obstacle(2, 50.0, 5.0, 60.0, 10.0, false),
            ],
            vec![BTreeSet::new(), BTreeSet::new(), BTreeSet::from([ObstacleId(0)])],
        );
        assert!(tree.adjust_spatial_ancestors());
        assert!(!tree.adjust_spatial_ancestors());
        assert!(tree.ancestors(ObstacleId(1)).contains(&ObstacleId(0)));
        assert!(tree.ancestors(ObstacleId(2)).is_empty());
    }
}
