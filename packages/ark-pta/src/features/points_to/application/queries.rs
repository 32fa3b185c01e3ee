//! Alias queries over a finished analysis
//!
//! All queries are read-only and merge every context: a value's points-to
//! set is the union over all of its PAG nodes.

use std::collections::BTreeSet;

use crate::features::points_to::domain::{NodeID, PagEdgeKind, PagValue, PointsToSet, PtsSet};
use crate::features::points_to::infrastructure::PointerAnalysis;
use crate::shared::models::ValueId;

/// Edges along which a value flows unchanged
const FLOW_EDGES: [PagEdgeKind; 3] =
    [PagEdgeKind::Copy, PagEdgeKind::InterProceduralCopy, PagEdgeKind::This];

impl PointerAnalysis<'_> {
    /// PAG nodes of `value` across all contexts
    pub fn nodes_of(&self, value: ValueId) -> &[NodeID] {
        self.pag().nodes_of_value(value)
    }

    /// Objects `value` may point to in any context
    pub fn points_to(&self, value: ValueId) -> PtsSet {
        let pag = self.pag();
        let mut pts = PtsSet::new(pag.backing());
        for node in self.nodes_of(value).iter().filter_map(|&id| pag.node(id)) {
            pts.union_with(node.pts());
        }
        pts
    }

    /// True when both values may point to a common object
    pub fn may_alias(&self, a: ValueId, b: ValueId) -> bool {
        self.points_to(a).intersects(&self.points_to(b))
    }

    pub fn no_alias(&self, a: ValueId, b: ValueId) -> bool {
        !self.may_alias(a, b)
    }

    /// Nodes connected to `value` by pure data flow, in either direction
    ///
    /// Walks Copy, InterProceduralCopy and This edges from every node of the
    /// value; the value's own nodes are included.
    pub fn get_related_nodes(&self, value: ValueId) -> BTreeSet<NodeID> {
        let pag = self.pag();
        let mut visited: BTreeSet<NodeID> = BTreeSet::new();
        let mut stack: Vec<NodeID> = self.nodes_of(value).to_vec();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = pag.node(id) else {
                continue;
            };
            for kind in FLOW_EDGES {
                stack.extend(node.out_edges(kind).iter().filter(|n| !visited.contains(n)));
                stack.extend(node.in_edges(kind).iter().filter(|n| !visited.contains(n)));
            }
        }
        visited
    }

    /// Scene values among [`get_related_nodes`](Self::get_related_nodes)
    pub fn related_values(&self, value: ValueId) -> BTreeSet<ValueId> {
        let pag = self.pag();
        self.get_related_nodes(value)
            .into_iter()
            .filter_map(|id| match pag.node(id).map(|n| &n.value) {
                Some(PagValue::Value(v)) => Some(*v),
                _ => None,
            })
            .collect()
    }
}
