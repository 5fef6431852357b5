//! Epsilon-aware rounding and ordering.
//!
//! Every coordinate that takes part in a comparison is first passed through
//! [`round`]. Rounding keeps six decimal places, so coordinates must stay
//! below [`MAX_COORDINATE`] in magnitude for the integer keys used by the
//! graph and segment indexes to remain exact.

use std::cmp::Ordering;

use super::point::Point;

// ── Precision ───────────────────────────────────────────────────────
/// Number of decimal places kept by [`round`].
pub const ROUNDING_DECIMALS: i32 = 6;
const ROUNDING_SCALE: f64 = 1_000_000.0;
/// Smallest distinct distance between rounded coordinates.
pub const DISTANCE_EPSILON: f64 = 1e-6;
/// Slack used by the ordering comparator; half a rounding unit.
pub const DIFFERENCE_EPSILON: f64 = DISTANCE_EPSILON / 2.0;
/// Tolerance for "is this intersection on the border" style tests.
pub const INTERSECTION_EPSILON: f64 = 1e-4;
/// Tolerance for a point lying on a polygon side after rounding.
pub const BOUNDARY_TOLERANCE: f64 = 1e-5;
/// Largest coordinate magnitude for which keys stay exact.
pub const MAX_COORDINATE: f64 = 1e9;

pub fn round(value: f64) -> f64 {
    let scaled = (value * ROUNDING_SCALE).round() / ROUNDING_SCALE;
    // Normalize negative zero so keys and equality agree.
    if scaled == 0.0 { 0.0 } else { scaled }
}

pub fn round_point(point: Point) -> Point {
    Point::new(round(point.x), round(point.y))
}

/// Same coordinate after rounding; distinct rounded values are never close.
pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= DIFFERENCE_EPSILON
}

pub fn close_points(a: Point, b: Point) -> bool {
    close(a.x, b.x) && close(a.y, b.y)
}

pub fn compare(a: f64, b: f64) -> Ordering {
    if a + DIFFERENCE_EPSILON < b {
        Ordering::Less
    } else if a > b + DIFFERENCE_EPSILON {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Orders points by X, then Y.
pub fn compare_points(a: Point, b: Point) -> Ordering {
    compare(a.x, b.x).then_with(|| compare(a.y, b.y))
}

/// Integer key of a coordinate, exact for rounded values.
pub fn coordinate_key(value: f64) -> i64 {
    (value * ROUNDING_SCALE).round() as i64
}

/// Hashable, totally ordered identity of a rounded point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointKey {
    pub x: i64,
    pub y: i64,
}

impl From<Point> for PointKey {
    fn from(point: Point) -> Self {
        Self {
            x: coordinate_key(point.x),
            y: coordinate_key(point.y),
        }
    }
}

pub fn is_finite_coordinate(value: f64) -> bool {
    value.is_finite() && value.abs() < MAX_COORDINATE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_keeps_six_decimals() {
        assert_eq!(round(1.000_000_4), 1.0);
        assert_eq!(round(1.000_000_6), 1.000_001);
        assert_eq!(round(-0.000_000_1), 0.0);
        assert!(round(-0.000_000_1).is_sign_positive());
    }

    #[test]
    fn compare_absorbs_noise() {
        assert_eq!(compare(1.0, 1.0 + 1e-7), Ordering::Equal);
        assert_eq!(compare(1.0, 1.000_001), Ordering::Less);
        assert_eq!(compare(2.0, 1.0), Ordering::Greater);
    }

    #[test]
    fn close_agrees_with_compare() {
        for (a, b) in [(1.0, 1.000_001), (1.0, 1.000_000_4), (5.0, 5.0), (-3.0, -2.999_999)] {
            assert_eq!(close(a, b), compare(a, b) == Ordering::Equal, "{a} vs {b}");
        }
        assert!(!close(1.0, 1.000_001));
        assert!(close(1.0, 1.000_000_4));
    }

    #[test]
    fn points_order_by_x_then_y() {
        let a = Point::new(0.0, 5.0);
        let b = Point::new(1.0, 0.0);
        let c = Point::new(1.0, 2.0);
        assert_eq!(compare_points(a, b), Ordering::Less);
        assert_eq!(compare_points(b, c), Ordering::Less);
        assert_eq!(compare_points(c, c), Ordering::Equal);
    }

    #[test]
    fn keys_match_for_rounded_equal_points() {
        let a = round_point(Point::new(3.000_000_2, 4.0));
        let b = round_point(Point::new(2.999_999_9, 4.000_000_3));
        assert_eq!(PointKey::from(a), PointKey::from(b));
    }
}
