//! Rectilinear visibility graph: scan segments found by sweeping the
//! obstacles in both directions, intersected into vertices and edges.

pub mod full;
pub mod graph;
pub mod intersector;
pub mod scan;
pub mod scan_segment;
pub mod scanline;
pub mod sparse;
pub mod sweep;

use tracing::debug;

use crate::error::RouterResult;
use crate::obstacle::ObstacleTree;

pub use graph::{Edge, EdgeId, GraphMark, TransparentGroups, Vertex, VertexId, VisibilityGraph};
pub use scan::ScanDirection;
pub use scan_segment::{NORMAL_WEIGHT, OVERLAPPED_WEIGHT, REFLECTION_WEIGHT, ScanSegment, ScanSegmentTree, SegmentId};

/// A generated graph together with the segment trees it was built from;
/// splicing ports and free points consults the trees later.
#[derive(Debug, Clone)]
pub struct GeneratedGraph {
    pub graph: VisibilityGraph,
    pub horizontal: ScanSegmentTree,
    pub vertical: ScanSegmentTree,
}

impl GeneratedGraph {
    pub fn empty() -> Self {
        Self {
            graph: VisibilityGraph::new(),
            horizontal: ScanSegmentTree::new(ScanDirection::Horizontal),
            vertical: ScanSegmentTree::new(ScanDirection::Vertical),
        }
    }

    pub fn segments(&self, direction: ScanDirection) -> &ScanSegmentTree {
        match direction {
            ScanDirection::Horizontal => &self.horizontal,
            ScanDirection::Vertical => &self.vertical,
        }
    }

    pub fn graph_and_segments(&mut self, direction: ScanDirection) -> (&mut VisibilityGraph, &ScanSegmentTree) {
        match direction {
            ScanDirection::Horizontal => (&mut self.graph, &self.horizontal),
            ScanDirection::Vertical => (&mut self.graph, &self.vertical),
        }
    }

    fn from_segments(
        tree: &ObstacleTree,
        mut horizontal: ScanSegmentTree,
        mut vertical: ScanSegmentTree,
    ) -> RouterResult<Self> {
        horizontal.merge_segments();
        vertical.merge_segments();
        sweep::assign_group_crossings(tree, &mut horizontal);
        sweep::assign_group_crossings(tree, &mut vertical);
        let graph = intersector::intersect(&mut horizontal, &mut vertical)?;
        debug!(
            horizontal = horizontal.len(),
            vertical = vertical.len(),
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            "visibility graph generated"
        );
        Ok(Self {
            graph,
            horizontal,
            vertical,
        })
    }
}

pub fn generate(tree: &ObstacleTree, sparse: bool) -> RouterResult<GeneratedGraph> {
    if sparse {
        sparse::generate(tree)
    } else {
        full::generate(tree)
    }
}
