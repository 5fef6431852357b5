use std::cmp::Ordering;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use super::compare::compare;
use super::point::Point;

/// A pure compass direction in a y-up system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::East => 1,
            Direction::South => 2,
            Direction::West => 3,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    pub fn rotate_right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    pub fn rotate_left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::East => Direction::North,
            Direction::South => Direction::East,
            Direction::West => Direction::South,
        }
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::North | Direction::South)
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, Direction::North | Direction::East)
    }

    pub fn unit(self) -> Point {
        match self {
            Direction::North => Point::new(0.0, 1.0),
            Direction::East => Point::new(1.0, 0.0),
            Direction::South => Point::new(0.0, -1.0),
            Direction::West => Point::new(-1.0, 0.0),
        }
    }

    pub fn flag(self) -> Directions {
        match self {
            Direction::North => Directions::NORTH,
            Direction::East => Directions::EAST,
            Direction::South => Directions::SOUTH,
            Direction::West => Directions::WEST,
        }
    }
}

/// Set of compass directions; composite values such as north-east have two
/// bits set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Directions(u8);

impl Directions {
    pub const NONE: Directions = Directions(0);
    pub const NORTH: Directions = Directions(1);
    pub const EAST: Directions = Directions(2);
    pub const SOUTH: Directions = Directions(4);
    pub const WEST: Directions = Directions(8);
    pub const ALL: Directions = Directions(15);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, direction: Direction) -> bool {
        self.0 & direction.flag().0 != 0
    }

    pub fn contains_all(self, other: Directions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn without(self, direction: Direction) -> Directions {
        Directions(self.0 & !direction.flag().0)
    }

    pub fn pure(self) -> Option<Direction> {
        match self {
            Directions::NORTH => Some(Direction::North),
            Directions::EAST => Some(Direction::East),
            Directions::SOUTH => Some(Direction::South),
            Directions::WEST => Some(Direction::West),
            _ => None,
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Direction> {
        Direction::ALL.into_iter().filter(move |dir| self.contains(*dir))
    }

    pub fn rotate_right(self) -> Directions {
        self.iter()
            .fold(Directions::NONE, |acc, dir| acc | dir.rotate_right().flag())
    }

    pub fn rotate_left(self) -> Directions {
        self.iter()
            .fold(Directions::NONE, |acc, dir| acc | dir.rotate_left().flag())
    }

    pub fn add_one_turn(self) -> Directions {
        self | self.rotate_left() | self.rotate_right()
    }

    pub fn between(a: Point, b: Point) -> Directions {
        let mut dirs = Directions::NONE;
        match compare(a.x, b.x) {
            Ordering::Less => dirs |= Directions::EAST,
            Ordering::Greater => dirs |= Directions::WEST,
            Ordering::Equal => {}
        }
        match compare(a.y, b.y) {
            Ordering::Less => dirs |= Directions::NORTH,
            Ordering::Greater => dirs |= Directions::SOUTH,
            Ordering::Equal => {}
        }
        dirs
    }
}

impl BitOr for Directions {
    type Output = Directions;
    fn bitor(self, rhs: Directions) -> Directions {
        Directions(self.0 | rhs.0)
    }
}

impl BitOrAssign for Directions {
    fn bitor_assign(&mut self, rhs: Directions) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Directions {
    type Output = Directions;
    fn bitand(self, rhs: Directions) -> Directions {
        Directions(self.0 & rhs.0)
    }
}

impl Not for Directions {
    type Output = Directions;
    fn not(self) -> Directions {
        Directions(!self.0 & Directions::ALL.0)
    }
}

impl From<Direction> for Directions {
    fn from(direction: Direction) -> Self {
        direction.flag()
    }
}

/// Pure direction from `a` to `b`, `None` if composite or equal.
pub fn pure_direction(a: Point, b: Point) -> Option<Direction> {
    Directions::between(a, b).pure()
}
