use crate::geometry::{Point, Polygon, Rect};

/// Outward distance of an obstacle's loose polygon from its visibility
/// polygon; obstacles within this distance of each other are touching.
pub const LOOSE_PADDING: f64 = 1e-3;

/// Index of an obstacle in its [`ObstacleTree`](super::ObstacleTree); also
/// the scanline tiebreak ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObstacleId(pub usize);

/// A padded shape to route around.
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub shape: usize,
    pub input: Polygon,
    pub padded: Polygon,
    pub is_group: bool,
    /// A rectangle overlapping a rectangular group's corner; the sparse
    /// generator creates interior segments for it.
    pub overlaps_group_corner: bool,
    is_rectangle: bool,
    clump: Option<usize>,
    hull: Option<usize>,
    visibility: Polygon,
    loose: Polygon,
}

impl Obstacle {
    pub fn new(
        id: ObstacleId,
        shape: usize,
        input: Polygon,
        padding: f64,
        is_group: bool,
        rectangles_only: bool,
    ) -> Self {
        let padded = if rectangles_only {
            Polygon::rectangle(&input.bbox().padded(padding))
        } else {
            input.padded(padding)
        };
        let loose = padded.padded(LOOSE_PADDING);
        Self {
            id,
            shape,
            input,
            is_rectangle: padded.is_rectangle(),
            visibility: padded.clone(),
            padded,
            is_group,
            overlaps_group_corner: false,
            clump: None,
            hull: None,
            loose,
        }
    }

    pub fn is_rectangle(&self) -> bool {
        self.is_rectangle
    }

    pub fn clump(&self) -> Option<usize> {
        self.clump
    }

    pub fn hull(&self) -> Option<usize> {
        self.hull
    }

    pub fn is_overlapped(&self) -> bool {
        self.clump.is_some() && !self.is_group
    }

    pub fn is_in_hull(&self) -> bool {
        self.hull.is_some()
    }

    /// Hull polygon for hull members, grown polygon for grown groups,
    /// padded polygon otherwise.
    pub fn visibility_polygon(&self) -> &Polygon {
        &self.visibility
    }

    pub fn loose_polygon(&self) -> &Polygon {
        &self.loose
    }

    pub fn visibility_bbox(&self) -> Rect {
        self.visibility.bbox()
    }

    pub fn center(&self) -> Point {
        self.input.bbox().center()
    }

    pub(crate) fn set_clump(&mut self, clump: Option<usize>) {
        self.clump = clump;
    }

    pub(crate) fn set_hull(&mut self, hull: usize, polygon: Polygon) {
        self.clump = None;
        self.hull = Some(hull);
        self.is_rectangle = false;
        self.loose = polygon.padded(LOOSE_PADDING);
        self.visibility = polygon;
    }

    pub(crate) fn renumber_hull(&mut self, hull: usize) {
        self.hull = Some(hull);
    }

    pub(crate) fn grow_to(&mut self, polygon: Polygon) {
        self.is_rectangle = false;
        self.loose = polygon.padded(LOOSE_PADDING);
        self.visibility = polygon;
    }
}

/// Several overlapping obstacles sharing one convex footprint. The first
/// member is the primary obstacle that stands for all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapHull {
    pub polygon: Polygon,
    pub members: Vec<ObstacleId>,
}

impl OverlapHull {
    pub fn primary(&self) -> Option<ObstacleId> {
        self.members.first().copied()
    }
}
