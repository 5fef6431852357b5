use std::cmp::Ordering;

use crate::geometry::{compare, round};
use crate::obstacle::{ObstacleId, ObstacleTree};

use super::scan::ScanDirection;

/// Which chain of an obstacle's border a scanline side belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SideKind {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanlineSide {
    pub obstacle: ObstacleId,
    pub kind: SideKind,
    key: f64,
}

/// Where a walk along the line stopped: at an obstacle side, or at the
/// graph box when `obstacle` is `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blocker {
    pub coord: f64,
    pub obstacle: Option<ObstacleId>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSpan {
    pub obstacle: ObstacleId,
    pub lo: f64,
    pub hi: f64,
}

/// Sides of the obstacles the sweep line currently passes through, sorted
/// by scan coordinate. Sides of non-overlapping convex obstacles never
/// swap order between insertion and removal.
#[derive(Debug, Clone)]
pub struct Scanline {
    direction: ScanDirection,
    sides: Vec<ScanlineSide>,
}

fn side_order(a: &ScanlineSide, b: &ScanlineSide) -> Ordering {
    compare(a.key, b.key)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.obstacle.cmp(&b.obstacle))
}

impl Scanline {
    pub fn new(direction: ScanDirection) -> Self {
        Self {
            direction,
            sides: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    pub fn sides(&self) -> &[ScanlineSide] {
        &self.sides
    }

    pub fn insert(&mut self, tree: &ObstacleTree, id: ObstacleId, perp: f64) {
        let polygon = tree.obstacle(id).visibility_polygon();
        let Some((lo, hi)) = polygon.span_on_line(self.direction.is_horizontal(), perp) else {
            return;
        };
        for (kind, key) in [(SideKind::Low, lo), (SideKind::High, hi)] {
            let side = ScanlineSide { obstacle: id, kind, key };
            let at = self
                .sides
                .partition_point(|s| side_order(s, &side) == Ordering::Less);
            self.sides.insert(at, side);
        }
    }

    pub fn remove(&mut self, id: ObstacleId) {
        self.sides.retain(|s| s.obstacle != id);
    }

    /// Spans of active obstacles strictly straddling `perp`, in side order.
    /// An obstacle whose flat extreme lies on the line does not block it.
    pub fn spans_at(&self, tree: &ObstacleTree, perp: f64, exclude: Option<ObstacleId>) -> Vec<LineSpan> {
        let horizontal = self.direction.is_horizontal();
        self.sides
            .iter()
            .filter(|s| s.kind == SideKind::Low && Some(s.obstacle) != exclude)
            .filter_map(|s| {
                let obstacle = tree.obstacle(s.obstacle);
                let bbox = obstacle.visibility_bbox();
                let (pmin, pmax) = if horizontal {
                    (bbox.bottom, bbox.top)
                } else {
                    (bbox.left, bbox.right)
                };
                if compare(pmin, perp) != Ordering::Less || compare(perp, pmax) != Ordering::Less {
                    return None;
                }
                let (lo, hi) = obstacle.visibility_polygon().span_on_line(horizontal, perp)?;
                (compare(lo, hi) == Ordering::Less).then_some(LineSpan {
                    obstacle: s.obstacle,
                    lo,
                    hi,
                })
            })
            .collect()
    }

    /// Walks from `from` toward `toward` and returns the first side that is
    /// entered from free space. Starting inside obstacles, the walk first
    /// passes through them; touching obstacles count as one overlap.
    pub fn walk(spans: &[LineSpan], from: f64, toward: SideKind, limit: f64) -> Blocker {
        let from = round(from);
        // (position, is_exit, obstacle), ordered in walking order.
        let mut events: Vec<(f64, bool, ObstacleId)> = Vec::new();
        let mut depth = 0usize;
        for span in spans {
            match toward {
                SideKind::Low => {
                    if compare(span.lo, from) == Ordering::Less && compare(span.hi, from) != Ordering::Less {
                        depth += 1;
                    }
                    if compare(span.hi, from) == Ordering::Less {
                        events.push((span.hi, false, span.obstacle));
                    }
                    if compare(span.lo, from) == Ordering::Less {
                        events.push((span.lo, true, span.obstacle));
                    }
                }
                SideKind::High => {
                    if compare(span.hi, from) == Ordering::Greater && compare(span.lo, from) != Ordering::Greater {
                        depth += 1;
                    }
                    if compare(span.lo, from) == Ordering::Greater {
                        events.push((span.lo, false, span.obstacle));
                    }
                    if compare(span.hi, from) == Ordering::Greater {
                        events.push((span.hi, true, span.obstacle));
                    }
                }
            }
        }
        events.sort_by(|a, b| {
            let by_position = match toward {
                SideKind::Low => compare(b.0, a.0),
                SideKind::High => compare(a.0, b.0),
            };
            by_position
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        for (position, is_exit, obstacle) in events {
            let beyond = match toward {
                SideKind::Low => compare(position, limit) == Ordering::Less,
                SideKind::High => compare(position, limit) == Ordering::Greater,
            };
            if beyond {
                break;
            }
            if is_exit {
                depth = depth.saturating_sub(1);
            } else if depth == 0 {
                return Blocker {
                    coord: position,
                    obstacle: Some(obstacle),
                };
            } else {
                depth += 1;
            }
        }
        Blocker {
            coord: limit,
            obstacle: None,
        }
    }
}
