//! Full visibility graph: one plane sweep per direction emits the maximal
//! segments leaving every obstacle vertex, and rays that strike sloped
//! sides are followed up reflection staircases.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::error::RouterResult;
use crate::geometry::{Point, PointKey, Polygon, close, close_points, compare};
use crate::obstacle::{ObstacleId, ObstacleTree};

use super::GeneratedGraph;
use super::scan::ScanDirection;
use super::scan_segment::{NORMAL_WEIGHT, OVERLAPPED_WEIGHT, REFLECTION_WEIGHT, ScanSegmentTree};
use super::scanline::{Blocker, Scanline, SideKind};
use super::sweep::{EventQueue, ReflectionSite, SweepEvent, SweepEventKind, split_extent, vertex_events};

/// Longest staircase followed from one reflecting side.
pub const MAX_STAIRCASE_STEPS: usize = 32;

const SLOPE_TOLERANCE: f64 = 1e-6;

pub fn generate(tree: &ObstacleTree) -> RouterResult<GeneratedGraph> {
    let mut horizontal = ScanSegmentTree::new(ScanDirection::Horizontal);
    let mut vertical = ScanSegmentTree::new(ScanDirection::Vertical);
    if tree.is_empty() {
        return Ok(GeneratedGraph::empty());
    }
    FullSweep::new(tree, ScanDirection::Horizontal).run(&mut horizontal, &mut vertical);
    FullSweep::new(tree, ScanDirection::Vertical).run(&mut vertical, &mut horizontal);
    GeneratedGraph::from_segments(tree, horizontal, vertical)
}

/// Sites struck by one staircase. Risers only climb, so a repeated site
/// means the staircase stepped back to where it started.
#[derive(Debug, Default)]
struct Staircase {
    sites: BTreeSet<PointKey>,
}

impl Staircase {
    fn visit(&mut self, site: Point) -> bool {
        self.sites.insert(PointKey::from(site))
    }
}

struct FullSweep<'a> {
    tree: &'a ObstacleTree,
    direction: ScanDirection,
    scanline: Scanline,
    queue: EventQueue,
    staircases: Vec<Staircase>,
    next_ordinal: usize,
    coord_range: (f64, f64),
    perp_range: (f64, f64),
}

impl<'a> FullSweep<'a> {
    fn new(tree: &'a ObstacleTree, direction: ScanDirection) -> Self {
        let b = tree.graph_box();
        let (coord_range, perp_range) = if direction.is_horizontal() {
            ((b.left, b.right), (b.bottom, b.top))
        } else {
            ((b.bottom, b.top), (b.left, b.right))
        };
        Self {
            tree,
            direction,
            scanline: Scanline::new(direction),
            queue: vertex_events(tree, direction),
            staircases: Vec::new(),
            next_ordinal: tree.len(),
            coord_range,
            perp_range,
        }
    }

    /// Sweeps upward, adding segments along the sweep direction to
    /// `parallel` and staircase risers to `perpendicular`.
    fn run(mut self, parallel: &mut ScanSegmentTree, perpendicular: &mut ScanSegmentTree) {
        let mut processed = 0usize;
        while let Some(event) = self.queue.pop() {
            processed += 1;
            match event.kind {
                SweepEventKind::Reflection(site) => self.reflect(&event, site, parallel, perpendicular),
                _ => self.vertex_event(&event, parallel, perpendicular),
            }
        }
        debug!(
            direction = ?self.direction,
            events = processed,
            segments = parallel.len(),
            staircases = self.staircases.len(),
            "sweep finished"
        );
    }

    fn vertex_event(&mut self, event: &SweepEvent, parallel: &mut ScanSegmentTree, perpendicular: &mut ScanSegmentTree) {
        let d = self.direction;
        let obstacle = self.tree.obstacle(event.obstacle);
        let perp = d.perp(event.site);
        let coord = d.coord(event.site);
        let (lo, hi) = match event.kind {
            SweepEventKind::Open | SweepEventKind::Close => obstacle
                .visibility_polygon()
                .span_on_line(d.is_horizontal(), perp)
                .unwrap_or((coord, coord)),
            _ => (coord, coord),
        };
        // Groups are transparent to the sweep; their borders become crossings.
        let blocks = !obstacle.is_group;
        if event.kind == SweepEventKind::Open && blocks {
            self.scanline.insert(self.tree, event.obstacle, perp);
        }
        self.extend_from(event, perp, (lo, hi), parallel, perpendicular);
        if event.kind == SweepEventKind::Close && blocks {
            self.scanline.remove(event.obstacle);
        }
    }

    /// Emits the segment through `lo..hi` on line `perp`, stretched outward
    /// until blocked, and starts staircases where it strikes sloped sides.
    fn extend_from(
        &mut self,
        event: &SweepEvent,
        perp: f64,
        (lo, hi): (f64, f64),
        parallel: &mut ScanSegmentTree,
        perpendicular: &mut ScanSegmentTree,
    ) {
        let d = self.direction;
        let low = event.kind != SweepEventKind::HighBend;
        let high = event.kind != SweepEventKind::LowBend;
        let spans = self.scanline.spans_at(self.tree, perp, Some(event.obstacle));
        let start = if low {
            Scanline::walk(&spans, lo, SideKind::Low, self.coord_range.0)
        } else {
            Blocker { coord: lo, obstacle: None }
        };
        let end = if high {
            Scanline::walk(&spans, hi, SideKind::High, self.coord_range.1)
        } else {
            Blocker { coord: hi, obstacle: None }
        };
        if compare(start.coord, end.coord) != Ordering::Less {
            return;
        }
        let runs = split_extent(self.tree, d, perp, start.coord, end.coord, &spans);
        for &(a, b, overlapped) in &runs {
            let weight = if overlapped { OVERLAPPED_WEIGHT } else { NORMAL_WEIGHT };
            parallel.insert(d.make_point(a, perp), d.make_point(b, perp), weight);
        }

        // Only rays in free space reflect.
        let first_free = runs.first().is_some_and(|r| !r.2);
        let last_free = runs.last().is_some_and(|r| !r.2);
        if low && first_free {
            if let Some(blocker) = start.obstacle {
                self.try_reflect_upward(blocker, d.make_point(start.coord, perp), SideKind::High, perpendicular);
            }
        }
        if high && last_free {
            if let Some(blocker) = end.obstacle {
                self.try_reflect_upward(blocker, d.make_point(end.coord, perp), SideKind::Low, perpendicular);
            }
        }
        match event.kind {
            SweepEventKind::LowBend if last_free => {
                self.try_reflect_upward(event.obstacle, event.site, SideKind::Low, perpendicular);
            }
            SweepEventKind::HighBend if first_free => {
                self.try_reflect_upward(event.obstacle, event.site, SideKind::High, perpendicular);
            }
            _ => {}
        }
    }

    fn try_reflect_upward(&mut self, id: ObstacleId, at: Point, facing: SideKind, perpendicular: &mut ScanSegmentTree) {
        if reflects_upward(self.tree.obstacle(id).visibility_polygon(), at, self.direction, facing) {
            self.climb(at, None, 0, perpendicular);
        }
    }

    /// One staircase riser: from `from` straight up to the next obstacle,
    /// which must present a sloped side facing down; the ray then turns
    /// along the sweep direction as a reflection event.
    fn climb(&mut self, from: Point, staircase: Option<usize>, steps: usize, perpendicular: &mut ScanSegmentTree) {
        let d = self.direction;
        if steps >= MAX_STAIRCASE_STEPS {
            trace!(?from, steps, "staircase step limit reached");
            return;
        }
        let top = self.perp_range.1;
        if compare(d.perp(from), top) != Ordering::Less {
            return;
        }
        let Some((hit, id)) = self.tree.first_obstacle_hit(from, d.make_point(d.coord(from), top)) else {
            return;
        };
        if close_points(hit, from) {
            return;
        }
        let polygon = self.tree.obstacle(id).visibility_polygon();
        // A vertex hit has no single reflecting side.
        let edges = polygon.edges_containing(hit);
        let [edge] = edges[..] else {
            return;
        };
        let (nc, np) = outward_normal(polygon.edge(edge), d);
        if np > -SLOPE_TOLERANCE || nc.abs() < SLOPE_TOLERANCE {
            return;
        }
        let toward = if nc > 0.0 { SideKind::High } else { SideKind::Low };
        let staircase = match staircase {
            Some(k) => k,
            None => {
                self.staircases.push(Staircase::default());
                self.staircases.len() - 1
            }
        };
        if !self.staircases[staircase].visit(hit) {
            trace!(?hit, staircase, "staircase cycle");
            return;
        }
        perpendicular.insert(from, hit, REFLECTION_WEIGHT);
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        let site = ReflectionSite {
            toward,
            staircase,
            steps: steps + 1,
        };
        self.queue
            .push(SweepEvent::new(d, hit, id, SweepEventKind::Reflection(site), ordinal));
    }

    fn reflect(
        &mut self,
        event: &SweepEvent,
        site: ReflectionSite,
        parallel: &mut ScanSegmentTree,
        perpendicular: &mut ScanSegmentTree,
    ) {
        let d = self.direction;
        let perp = d.perp(event.site);
        let from = d.coord(event.site);
        let spans = self.scanline.spans_at(self.tree, perp, Some(event.obstacle));
        let limit = match site.toward {
            SideKind::Low => self.coord_range.0,
            SideKind::High => self.coord_range.1,
        };
        let blocker = Scanline::walk(&spans, from, site.toward, limit);
        if close(blocker.coord, from) {
            return;
        }
        let end = d.make_point(blocker.coord, perp);
        if self.tree.point_inside_obstacle((event.site + end) * 0.5) {
            return;
        }
        if parallel.covers(event.site, end) {
            trace!(site = ?event.site, "reflection already covered");
            return;
        }
        parallel.insert(event.site, end, REFLECTION_WEIGHT);
        let Some(next) = blocker.obstacle else {
            return;
        };
        let facing = match site.toward {
            SideKind::Low => SideKind::High,
            SideKind::High => SideKind::Low,
        };
        if reflects_upward(self.tree.obstacle(next).visibility_polygon(), end, d, facing) {
            self.climb(end, Some(site.staircase), site.steps, perpendicular);
        }
    }
}

fn outward_normal((a, b): (Point, Point), d: ScanDirection) -> (f64, f64) {
    let e = (b - a).normalized();
    let n = Point::new(-e.y, e.x);
    (d.coord(n), d.perp(n))
}

/// True when the side of `polygon` rising from `at` is sloped, faces up
/// and faces `facing` along the scan coordinate, so a ray arriving from
/// that side is turned upward.
fn reflects_upward(polygon: &Polygon, at: Point, d: ScanDirection, facing: SideKind) -> bool {
    let perp = d.perp(at);
    let rising = polygon
        .edges_containing(at)
        .into_iter()
        .map(|i| polygon.edge(i))
        .find(|(a, b)| compare(d.perp(*a).max(d.perp(*b)), perp) == Ordering::Greater);
    let Some(side) = rising else {
        return false;
    };
    let (nc, np) = outward_normal(side, d);
    if np < SLOPE_TOLERANCE || nc.abs() < SLOPE_TOLERANCE {
        return false;
    }
    match facing {
        SideKind::Low => nc < 0.0,
        SideKind::High => nc > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::obstacle::Obstacle;

    fn rect(id: usize, r: Rect) -> Obstacle {
        Obstacle::new(ObstacleId(id), id, Polygon::rectangle(&r), 0.0, false, false)
    }

    fn diamond(id: usize, points: [(f64, f64); 4]) -> Obstacle {
        let polygon = Polygon::from_points(points.map(|(x, y)| Point::new(x, y))).expect("diamond");
        Obstacle::new(ObstacleId(id), id, polygon, 0.0, false, false)
    }

    fn triangle(id: usize, points: [(f64, f64); 3]) -> Obstacle {
        let polygon = Polygon::from_points(points.map(|(x, y)| Point::new(x, y))).expect("triangle");
        Obstacle::new(ObstacleId(id), id, polygon, 0.0, false, false)
    }

    fn free_edges_stay_outside(tree: &ObstacleTree, generated: &GeneratedGraph) {
        for (id, edge) in generated.graph.edges() {
            if edge.weight >= OVERLAPPED_WEIGHT {
                continue;
            }
            let a = generated.graph.point(edge.source);
            let b = generated.graph.point(edge.target);
            assert!(
                !tree.point_inside_obstacle((a + b) * 0.5),
                "edge {id:?} from {a:?} to {b:?} runs through an obstacle"
            );
        }
    }

    #[test]
    fn two_rectangles_form_a_ladder() {
        let tree = ObstacleTree::create(
            vec![
                rect(0, Rect::new(0.0, 0.0, 10.0, 10.0)),
                rect(1, Rect::new(20.0, 0.0, 30.0, 10.0)),
            ],
            Vec::new(),
        );
        let generated = generate(&tree).expect("graph");
        assert_eq!(generated.graph.vertex_count(), 8);
        assert_eq!(generated.graph.edge_count(), 10);
        assert!(generated.graph.find_vertex(Point::new(20.0, 10.0)).is_some());
        free_edges_stay_outside(&tree, &generated);
    }

    #[test]
    fn overlapping_rectangles_get_overlapped_edges() {
        let tree = ObstacleTree::create(
            vec![
                rect(0, Rect::new(0.0, 0.0, 10.0, 10.0)),
                rect(1, Rect::new(5.0, 5.0, 15.0, 15.0)),
            ],
            Vec::new(),
        );
        let generated = generate(&tree).expect("graph");
        assert!(generated.graph.find_vertex(Point::new(5.0, 5.0)).is_some());
        assert!(
            generated
                .graph
                .edges()
                .any(|(_, e)| e.weight >= OVERLAPPED_WEIGHT)
        );
        free_edges_stay_outside(&tree, &generated);
    }

    #[test]
    fn sloped_sides_produce_a_staircase() {
        let tree = ObstacleTree::create(
            vec![
                rect(0, Rect::new(0.0, 12.0, 10.0, 14.0)),
                diamond(1, [(20.0, 10.0), (30.0, 20.0), (40.0, 10.0), (30.0, 0.0)]),
                diamond(2, [(15.0, 30.0), (25.0, 40.0), (35.0, 30.0), (25.0, 20.0)]),
            ],
            Vec::new(),
        );
        assert!(tree.hulls().is_empty());
        let generated = generate(&tree).expect("graph");
        // The ray leaving the rectangle at y=12 hits the lower diamond at
        // x=22, climbs to the upper diamond and turns back west at y=23.
        let riser = generated.vertical.find_containing_point(Point::new(22.0, 18.0));
        assert!(riser.is_some());
        let tread = generated.horizontal.find_containing_point(Point::new(11.0, 23.0));
        assert!(tread.is_some());
        assert!(generated.graph.find_vertex(Point::new(22.0, 23.0)).is_some());
        free_edges_stay_outside(&tree, &generated);
    }

    #[test]
    fn long_channel_staircase_stops_at_the_step_limit() {
        // Two sides of slope 1 facing each other across a channel; each
        // riser climbs 20 and moves 20 east.
        let tree = ObstacleTree::create(
            vec![
                triangle(0, [(0.0, -10.0), (1000.0, 990.0), (1000.0, -10.0)]),
                triangle(1, [(-10.0, 0.0), (-10.0, 1000.0), (990.0, 1000.0)]),
            ],
            Vec::new(),
        );
        assert!(tree.hulls().is_empty());
        let generated = generate(&tree).expect("graph");
        let riser = |k: usize| {
            let x = 10.0 + 20.0 * (k - 1) as f64;
            let y = 20.0 * k as f64 - 10.0;
            generated.vertical.find_containing_point(Point::new(x, y))
        };
        assert!(riser(1).is_some());
        assert!(riser(MAX_STAIRCASE_STEPS).is_some());
        assert!(riser(MAX_STAIRCASE_STEPS + 1).is_none());
        free_edges_stay_outside(&tree, &generated);
    }

    #[test]
    fn staircase_notices_a_repeated_site() {
        let mut staircase = Staircase::default();
        assert!(staircase.visit(Point::new(10.0, 20.0)));
        assert!(staircase.visit(Point::new(30.0, 40.0)));
        assert!(!staircase.visit(Point::new(10.000_000_1, 20.0)));
    }

    #[test]
    fn empty_tree_yields_empty_graph() {
        let tree = ObstacleTree::create(Vec::new(), Vec::new());
        let generated = generate(&tree).expect("graph");
        assert!(generated.graph.is_empty());
    }
}
