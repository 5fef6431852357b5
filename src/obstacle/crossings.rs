use crate::geometry::compare::DISTANCE_EPSILON;
use crate::geometry::{Direction, Point, round_point};

use super::model::ObstacleId;

/// Offset of the interior vertex of a group-boundary crossing from the
/// boundary itself.
pub const CROSSING_INTERIOR_OFFSET: f64 = DISTANCE_EPSILON;

/// Where an axis-aligned segment passes through a group's border.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupBoundaryCrossing {
    pub point: Point,
    pub group: ObstacleId,
    pub direction_to_inside: Direction,
}

impl GroupBoundaryCrossing {
    pub fn interior_point(&self) -> Point {
        round_point(self.point + self.direction_to_inside.unit() * CROSSING_INTERIOR_OFFSET)
    }

    pub fn edge_points(&self) -> (Point, Point) {
        let interior = self.interior_point();
        if self.direction_to_inside.is_ascending() {
            (self.point, interior)
        } else {
            (interior, self.point)
        }
    }
}

/// Groups the crossings of one segment by (point, direction). Each entry
/// becomes one crossing edge whose passability depends on all its groups.
pub fn group_by_edge(crossings: &[GroupBoundaryCrossing]) -> Vec<(Point, Point, Vec<ObstacleId>)> {
    let mut edges: Vec<(Point, Point, Vec<ObstacleId>)> = Vec::new();
    for crossing in crossings {
        let (lo, hi) = crossing.edge_points();
        match edges.iter_mut().find(|(a, b, _)| *a == lo && *b == hi) {
            Some((_, _, groups)) => {
                if !groups.contains(&crossing.group) {
                    groups.push(crossing.group);
                    groups.sort();
                }
            }
            None => edges.push((lo, hi, vec![crossing.group])),
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_point_is_inside_the_group() {
        let crossing = GroupBoundaryCrossing {
            point: Point::new(10.0, 4.0),
            group: ObstacleId(2),
            direction_to_inside: Direction::West,
        };
        assert_eq!(crossing.interior_point(), Point::new(9.999_999, 4.0));
        let (lo, hi) = crossing.edge_points();
        assert!(lo.x < hi.x);
    }

    #[test]
    fn shared_crossings_merge_groups() {
        let a = GroupBoundaryCrossing {
            point: Point::new(0.0, 0.0),
            group: ObstacleId(4),
            direction_to_inside: Direction::East,
        };
        let b = GroupBoundaryCrossing { group: ObstacleId(1), ..a };
        let edges = group_by_edge(&[a, b]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].2, vec![ObstacleId(1), ObstacleId(4)]);
    }
}
