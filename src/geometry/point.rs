use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use super::compare::{DISTANCE_EPSILON, close, is_finite_coordinate, round};

/// A 2-D point in a y-up coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn normalized(self) -> Point {
        let len = self.length();
        if len <= DISTANCE_EPSILON {
            return Point::default();
        }
        Point::new(self.x / len, self.y / len)
    }

    pub fn rounded(self) -> Point {
        Point::new(round(self.x), round(self.y))
    }

    /// Finite and within [`MAX_COORDINATE`](super::compare::MAX_COORDINATE)
    /// on both axes.
    pub fn in_range(self) -> bool {
        is_finite_coordinate(self.x) && is_finite_coordinate(self.y)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle; `bottom <= top` in a y-up system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Rect {
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left: left.min(right),
            bottom: bottom.min(top),
            right: left.max(right),
            top: bottom.max(top),
        }
    }

    pub fn from_point(point: Point) -> Self {
        Self::new(point.x, point.y, point.x, point.y)
    }

    pub fn from_points(a: Point, b: Point) -> Self {
        Self::new(a.x, a.y, b.x, b.y)
    }

    pub fn around<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut rect = Rect::from_point(first);
        for point in iter {
            rect.add_point(point);
        }
        Some(rect)
    }

    pub fn add_point(&mut self, point: Point) {
        self.left = self.left.min(point.x);
        self.right = self.right.max(point.x);
        self.bottom = self.bottom.min(point.y);
        self.top = self.top.max(point.y);
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            self.left.min(other.left),
            self.bottom.min(other.bottom),
            self.right.max(other.right),
            self.top.max(other.top),
        )
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2.0, (self.bottom + self.top) / 2.0)
    }

    pub fn left_bottom(&self) -> Point {
        Point::new(self.left, self.bottom)
    }

    pub fn left_top(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn right_top(&self) -> Point {
        Point::new(self.right, self.top)
    }

    pub fn right_bottom(&self) -> Point {
        Point::new(self.right, self.bottom)
    }

    /// Corners in clockwise order starting at the left-bottom corner.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.left_bottom(),
            self.left_top(),
            self.right_top(),
            self.right_bottom(),
        ]
    }

    pub fn padded(&self, amount: f64) -> Rect {
        Rect::new(
            self.left - amount,
            self.bottom - amount,
            self.right + amount,
            self.top + amount,
        )
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.left - DISTANCE_EPSILON
            && point.x <= self.right + DISTANCE_EPSILON
            && point.y >= self.bottom - DISTANCE_EPSILON
            && point.y <= self.top + DISTANCE_EPSILON
    }

    pub fn contains_point_strictly(&self, point: Point) -> bool {
        point.x > self.left + DISTANCE_EPSILON
            && point.x < self.right - DISTANCE_EPSILON
            && point.y > self.bottom + DISTANCE_EPSILON
            && point.y < self.top - DISTANCE_EPSILON
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains_point(other.left_bottom()) && self.contains_point(other.right_top())
    }

    /// Closed intersection test; touching rectangles intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right + DISTANCE_EPSILON
            && other.left <= self.right + DISTANCE_EPSILON
            && self.bottom <= other.top + DISTANCE_EPSILON
            && other.bottom <= self.top + DISTANCE_EPSILON
    }

    pub fn is_on_border(&self, point: Point) -> bool {
        self.contains_point(point)
            && (close(point.x, self.left)
                || close(point.x, self.right)
                || close(point.y, self.bottom)
                || close(point.y, self.top))
    }

    pub fn clamp(&self, point: Point) -> Point {
        Point::new(
            point.x.clamp(self.left, self.right),
            point.y.clamp(self.bottom, self.top),
        )
    }
}
