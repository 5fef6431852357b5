//! Bulk-loaded bounding-volume hierarchy over obstacle bounding boxes.
//!
//! Nodes live in one arena and refer to their children by index. The tree
//! is rebuilt whenever the primary obstacle set changes.

use std::cmp::Ordering;

use crate::geometry::{Point, Rect};

use super::model::ObstacleId;

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Leaf(ObstacleId),
    Internal(usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    bbox: Rect,
    kind: NodeKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl SpatialIndex {
    pub fn build(mut items: Vec<(ObstacleId, Rect)>) -> Self {
        let mut index = SpatialIndex::default();
        if items.is_empty() {
            return index;
        }
        items.sort_by_key(|(id, _)| *id);
        let root = index.build_node(&mut items);
        index.root = Some(root);
        index
    }

    fn build_node(&mut self, items: &mut [(ObstacleId, Rect)]) -> usize {
        if items.len() == 1 {
            let (id, bbox) = items[0];
            self.nodes.push(Node {
                bbox,
                kind: NodeKind::Leaf(id),
            });
            return self.nodes.len() - 1;
        }
        let centers = Rect::around(items.iter().map(|(_, r)| r.center()))
            .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
        // Split on the longer axis of the center spread, at the median.
        let by_x = centers.width() >= centers.height();
        items.sort_by(|(ia, a), (ib, b)| {
            let (ca, cb) = (a.center(), b.center());
            let key = if by_x {
                ca.x.partial_cmp(&cb.x)
            } else {
                ca.y.partial_cmp(&cb.y)
            };
            key.unwrap_or(Ordering::Equal).then_with(|| ia.cmp(ib))
        });
        let mid = items.len() / 2;
        let (lo, hi) = items.split_at_mut(mid);
        let left = self.build_node(lo);
        let right = self.build_node(hi);
        let bbox = self.nodes[left].bbox.union(&self.nodes[right].bbox);
        self.nodes.push(Node {
            bbox,
            kind: NodeKind::Internal(left, right),
        });
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.root.map(|r| self.nodes[r].bbox)
    }

    pub fn query(&self, rect: &Rect) -> Vec<ObstacleId> {
        let mut found = Vec::new();
        let Some(root) = self.root else {
            return found;
        };
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bbox.intersects(rect) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(id) => found.push(id),
                NodeKind::Internal(left, right) => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        found.sort();
        found
    }

    pub fn query_point(&self, point: Point) -> Vec<ObstacleId> {
        self.query(&Rect::from_point(point))
    }
}
