use std::cmp::Ordering;

use crate::geometry::{Direction, Point, compare};

/// Orientation of the segments a sweep produces. A horizontal scan moves
/// a horizontal line upward: segments run along X (the scan coordinate)
/// and events are ordered by Y (the perpendicular coordinate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanDirection {
    Horizontal,
    Vertical,
}

impl ScanDirection {
    pub fn is_horizontal(self) -> bool {
        matches!(self, ScanDirection::Horizontal)
    }

    pub fn perpendicular(self) -> ScanDirection {
        match self {
            ScanDirection::Horizontal => ScanDirection::Vertical,
            ScanDirection::Vertical => ScanDirection::Horizontal,
        }
    }

    pub fn coord(self, p: Point) -> f64 {
        match self {
            ScanDirection::Horizontal => p.x,
            ScanDirection::Vertical => p.y,
        }
    }

    pub fn perp(self, p: Point) -> f64 {
        match self {
            ScanDirection::Horizontal => p.y,
            ScanDirection::Vertical => p.x,
        }
    }

    pub fn make_point(self, coord: f64, perp: f64) -> Point {
        match self {
            ScanDirection::Horizontal => Point::new(coord, perp),
            ScanDirection::Vertical => Point::new(perp, coord),
        }
    }

    pub fn ascending(self) -> Direction {
        match self {
            ScanDirection::Horizontal => Direction::East,
            ScanDirection::Vertical => Direction::North,
        }
    }

    pub fn perp_ascending(self) -> Direction {
        self.perpendicular().ascending()
    }

    pub fn for_direction(dir: Direction) -> ScanDirection {
        if dir.is_vertical() {
            ScanDirection::Vertical
        } else {
            ScanDirection::Horizontal
        }
    }

    pub fn compare(self, a: Point, b: Point) -> Ordering {
        compare(self.perp(a), self.perp(b)).then_with(|| compare(self.coord(a), self.coord(b)))
    }

    pub fn is_parallel(self, a: Point, b: Point) -> bool {
        compare(self.perp(a), self.perp(b)) == Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_scan_swaps_axes() {
        let v = ScanDirection::Vertical;
        let p = v.make_point(3.0, 7.0);
        assert_eq!(p, Point::new(7.0, 3.0));
        assert_eq!(v.coord(p), 3.0);
        assert_eq!(v.perp(p), 7.0);
        assert_eq!(v.ascending(), Direction::North);
        assert_eq!(v.perp_ascending(), Direction::East);
    }

    #[test]
    fn compare_orders_by_perp_first() {
        let h = ScanDirection::Horizontal;
        assert_eq!(h.compare(Point::new(9.0, 0.0), Point::new(0.0, 1.0)), Ordering::Less);
        assert!(h.is_parallel(Point::new(0.0, 2.0), Point::new(5.0, 2.0)));
        assert!(!h.is_parallel(Point::new(0.0, 2.0), Point::new(0.0, 5.0)));
    }
}
