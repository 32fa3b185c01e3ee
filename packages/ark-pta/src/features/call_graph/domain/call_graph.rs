//! Call graph
//!
//! Nodes are methods, edges aggregate every call statement between one ordered
//! pair of methods. Static call sites are recorded as [`CallSite`]s; instance and
//! pointer invokes whose target depends on points-to facts are recorded as
//! [`DynCallSite`]s and cloned into `CallSite`s once a callee is known. Both kinds
//! draw their ids from one counter, and cloning keeps the id.
//!
//! A `petgraph` mirror of the edge set answers reachability queries and renders
//! Graphviz dumps.

use petgraph::algo::has_path_connecting;
use petgraph::dot::{Config as DotConfig, Dot};
use petgraph::graphmap::DiGraphMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::shared::models::{MethodSignature, StmtId, ValueId};

pub type FuncID = u32;
pub type CallSiteID = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallGraphNodeKind {
    Real,
    /// Placeholder for a callee whose concrete method is not known yet
    Virtual,
    /// Method synthesized by the front-end
    Intrinsic,
    Constructor,
    /// Method without a body
    Blank,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphNode {
    pub id: FuncID,
    pub method: MethodSignature,
    pub kind: CallGraphNodeKind,
    pub is_sdk: bool,
}

/// How a call statement reaches its callee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Direct,
    /// Constructor-like call
    Special,
    /// Resolved through dispatch or points-to facts
    Indirect,
}

/// All calls from `src` to `dst`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub src: FuncID,
    pub dst: FuncID,
    direct_calls: FxHashSet<StmtId>,
    special_calls: FxHashSet<StmtId>,
    indirect_calls: FxHashSet<StmtId>,
}

impl CallGraphEdge {
    fn new(src: FuncID, dst: FuncID) -> Self {
        Self {
            src,
            dst,
            ..Default::default()
        }
    }

    /// Returns true if the statement was not recorded under `kind` yet
    fn add_call(&mut self, stmt: StmtId, kind: CallKind) -> bool {
        match kind {
            CallKind::Direct => self.direct_calls.insert(stmt),
            CallKind::Special => self.special_calls.insert(stmt),
            CallKind::Indirect => self.indirect_calls.insert(stmt),
        }
    }

    pub fn direct_calls(&self) -> &FxHashSet<StmtId> {
        &self.direct_calls
    }

    pub fn special_calls(&self) -> &FxHashSet<StmtId> {
        &self.special_calls
    }

    pub fn indirect_calls(&self) -> &FxHashSet<StmtId> {
        &self.indirect_calls
    }

    pub fn call_count(&self) -> usize {
        self.direct_calls.len() + self.special_calls.len() + self.indirect_calls.len()
    }
}

/// Call statement with a known callee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub id: CallSiteID,
    pub call_stmt: StmtId,
    pub args: Vec<ValueId>,
    pub caller: FuncID,
    pub callee: FuncID,
}

/// Call statement whose callee depends on the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynCallSite {
    pub id: CallSiteID,
    pub call_stmt: StmtId,
    pub args: Vec<ValueId>,
    pub caller: FuncID,
    /// Declared target, when the Scene or the SDK names one
    pub potential_callee: Option<FuncID>,
}

impl DynCallSite {
    /// Static call site for a concrete callee; the call-site id is kept
    pub fn clone_to_call_site(&self, callee: FuncID) -> CallSite {
        CallSite {
            id: self.id,
            call_stmt: self.call_stmt,
            args: self.args.clone(),
            caller: self.caller,
            callee,
        }
    }
}

/// Assigns call-site ids and indexes call sites by statement
#[derive(Debug, Default)]
pub struct CallSiteManager {
    next_id: CallSiteID,
    call_sites: FxHashMap<StmtId, Vec<CallSite>>,
    dyn_call_sites: FxHashMap<StmtId, DynCallSite>,
}

impl CallSiteManager {
    fn fresh_id(&mut self) -> CallSiteID {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn new_call_site(
        &mut self,
        call_stmt: StmtId,
        args: Vec<ValueId>,
        caller: FuncID,
        callee: FuncID,
    ) -> CallSite {
        if let Some(existing) = self
            .call_sites
            .get(&call_stmt)
            .and_then(|sites| sites.iter().find(|cs| cs.callee == callee))
        {
            return existing.clone();
        }
        let cs = CallSite {
            id: self.fresh_id(),
            call_stmt,
            args,
            caller,
            callee,
        };
        self.call_sites.entry(call_stmt).or_default().push(cs.clone());
        cs
    }

    pub fn new_dyn_call_site(
        &mut self,
        call_stmt: StmtId,
        args: Vec<ValueId>,
        caller: FuncID,
        potential_callee: Option<FuncID>,
    ) -> DynCallSite {
        if let Some(existing) = self.dyn_call_sites.get(&call_stmt) {
            return existing.clone();
        }
        let cs = DynCallSite {
            id: self.fresh_id(),
            call_stmt,
            args,
            caller,
            potential_callee,
        };
        self.dyn_call_sites.insert(call_stmt, cs.clone());
        cs
    }

    pub fn call_sites_by_stmt(&self, stmt: StmtId) -> &[CallSite] {
        self.call_sites
            .get(&stmt)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn dyn_call_site_by_stmt(&self, stmt: StmtId) -> Option<&DynCallSite> {
        self.dyn_call_sites.get(&stmt)
    }

    pub fn count(&self) -> usize {
        self.next_id as usize
    }
}

#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: Vec<CallGraphNode>,
    method_to_node: FxHashMap<MethodSignature, FuncID>,
    edges: FxHashMap<(FuncID, FuncID), CallGraphEdge>,
    graph: DiGraphMap<FuncID, ()>,
    call_sites: CallSiteManager,
    entries: Vec<FuncID>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════════

    /// Node for `method`, created with `kind` on first request
    pub fn add_node(
        &mut self,
        method: &MethodSignature,
        kind: CallGraphNodeKind,
        is_sdk: bool,
    ) -> FuncID {
        if let Some(&id) = self.method_to_node.get(method) {
            return id;
        }
        let id = self.nodes.len() as FuncID;
        self.nodes.push(CallGraphNode {
            id,
            method: method.clone(),
            kind,
            is_sdk,
        });
        self.method_to_node.insert(method.clone(), id);
        self.graph.add_node(id);
        id
    }

    pub fn node(&self, id: FuncID) -> Option<&CallGraphNode> {
        self.nodes.get(id as usize)
    }

    pub fn func_id(&self, method: &MethodSignature) -> Option<FuncID> {
        self.method_to_node.get(method).copied()
    }

    pub fn method_of(&self, id: FuncID) -> Option<&MethodSignature> {
        self.node(id).map(|n| &n.method)
    }

    pub fn is_sdk(&self, id: FuncID) -> bool {
        self.node(id).is_some_and(|n| n.is_sdk)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CallGraphNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Edges
    // ═══════════════════════════════════════════════════════════════════════

    /// Records `stmt` on the `(src, dst)` edge. Returns true if the edge is new.
    pub fn add_call_edge(
        &mut self,
        src: FuncID,
        dst: FuncID,
        stmt: StmtId,
        kind: CallKind,
    ) -> bool {
        let mut is_new = false;
        self.edges
            .entry((src, dst))
            .or_insert_with(|| {
                is_new = true;
                CallGraphEdge::new(src, dst)
            })
            .add_call(stmt, kind);
        if is_new {
            self.graph.add_edge(src, dst, ());
        }
        is_new
    }

    pub fn edge(&self, src: FuncID, dst: FuncID) -> Option<&CallGraphEdge> {
        self.edges.get(&(src, dst))
    }

    pub fn has_edge(&self, src: FuncID, dst: FuncID) -> bool {
        self.edges.contains_key(&(src, dst))
    }

    pub fn edges(&self) -> impl Iterator<Item = &CallGraphEdge> {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn callees(&self, id: FuncID) -> Vec<FuncID> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut v: Vec<FuncID> = self
            .graph
            .neighbors_directed(id, petgraph::Direction::Outgoing)
            .collect();
        v.sort_unstable();
        v
    }

    pub fn callers(&self, id: FuncID) -> Vec<FuncID> {
        if !self.graph.contains_node(id) {
            return Vec::new();
        }
        let mut v: Vec<FuncID> = self
            .graph
            .neighbors_directed(id, petgraph::Direction::Incoming)
            .collect();
        v.sort_unstable();
        v
    }

    /// True if `dst` is reachable from `src` (a node reaches itself)
    pub fn reachable(&self, src: FuncID, dst: FuncID) -> bool {
        if !self.graph.contains_node(src) || !self.graph.contains_node(dst) {
            return false;
        }
        has_path_connecting(&self.graph, src, dst, None)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Call sites
    // ═══════════════════════════════════════════════════════════════════════

    pub fn call_site_manager(&self) -> &CallSiteManager {
        &self.call_sites
    }

    pub fn new_call_site(
        &mut self,
        stmt: StmtId,
        args: Vec<ValueId>,
        caller: FuncID,
        callee: FuncID,
    ) -> CallSite {
        self.call_sites.new_call_site(stmt, args, caller, callee)
    }

    pub fn new_dyn_call_site(
        &mut self,
        stmt: StmtId,
        args: Vec<ValueId>,
        caller: FuncID,
        potential_callee: Option<FuncID>,
    ) -> DynCallSite {
        self.call_sites
            .new_dyn_call_site(stmt, args, caller, potential_callee)
    }

    pub fn call_sites_by_stmt(&self, stmt: StmtId) -> &[CallSite] {
        self.call_sites.call_sites_by_stmt(stmt)
    }

    pub fn dyn_call_site_by_stmt(&self, stmt: StmtId) -> Option<&DynCallSite> {
        self.call_sites.dyn_call_site_by_stmt(stmt)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Entries & dumps
    // ═══════════════════════════════════════════════════════════════════════

    pub fn set_entries(&mut self, entries: Vec<FuncID>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[FuncID] {
        &self.entries
    }

    /// Graphviz rendering labelled with method names
    pub fn to_dot(&self) -> String {
        let mut labelled: petgraph::Graph<String, &'static str> = petgraph::Graph::new();
        let mut index = FxHashMap::default();
        for node in &self.nodes {
            let label =
                format!("{}.{} ({:?})", node.method.class.name, node.method.name, node.kind);
            index.insert(node.id, labelled.add_node(label));
        }
        let mut edges: Vec<_> = self.edges.keys().copied().collect();
        edges.sort_unstable();
        for (src, dst) in edges {
            if let (Some(&a), Some(&b)) = (index.get(&src), index.get(&dst)) {
                labelled.add_edge(a, b, "");
            }
        }
        format!("{:?}", Dot::with_config(&labelled, &[DotConfig::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ClassSignature, FileSignature};

    fn sig(name: &str) -> MethodSignature {
        MethodSignature::new(ClassSignature::new(FileSignature::new("p", "a.ts"), "%dflt"), name)
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut cg = CallGraph::new();
        let a = cg.add_node(&sig("a"), CallGraphNodeKind::Real, false);
        let again = cg.add_node(&sig("a"), CallGraphNodeKind::Blank, true);
        assert_eq!(a, again);
        assert_eq!(cg.node(a).unwrap().kind, CallGraphNodeKind::Real);
        assert_eq!(cg.func_id(&sig("a")), Some(a));
    }

    #[test]
    fn test_one_edge_per_pair() {
        let mut cg = CallGraph::new();
        let a = cg.add_node(&sig("a"), CallGraphNodeKind::Real, false);
        let b = cg.add_node(&sig("b"), CallGraphNodeKind::Real, false);

        assert!(cg.add_call_edge(a, b, StmtId(1), CallKind::Direct));
        assert!(!cg.add_call_edge(a, b, StmtId(2), CallKind::Indirect));
        assert!(!cg.add_call_edge(a, b, StmtId(1), CallKind::Direct));

        assert_eq!(cg.edge_count(), 1);
        let edge = cg.edge(a, b).unwrap();
        assert_eq!(edge.call_count(), 2);
        assert_eq!(cg.callees(a), vec![b]);
        assert_eq!(cg.callers(b), vec![a]);
    }

    #[test]
    fn test_reachability() {
        let mut cg = CallGraph::new();
        let a = cg.add_node(&sig("a"), CallGraphNodeKind::Real, false);
        let b = cg.add_node(&sig("b"), CallGraphNodeKind::Real, false);
        let c = cg.add_node(&sig("c"), CallGraphNodeKind::Real, false);
        cg.add_call_edge(a, b, StmtId(0), CallKind::Direct);
        cg.add_call_edge(b, c, StmtId(1), CallKind::Direct);

        assert!(cg.reachable(a, c));
        assert!(!cg.reachable(c, a));
        assert!(cg.reachable(b, b));
        assert!(!cg.reachable(a, 99));
    }

    #[test]
    fn test_dyn_call_site_clone_keeps_id() {
        let mut cg = CallGraph::new();
        let a = cg.add_node(&sig("a"), CallGraphNodeKind::Real, false);
        let b = cg.add_node(&sig("b"), CallGraphNodeKind::Real, false);

        let s0 = cg.new_call_site(StmtId(0), vec![], a, b);
        let dyn_cs = cg.new_dyn_call_site(StmtId(1), vec![ValueId(3)], a, None);
        assert_ne!(s0.id, dyn_cs.id);

        let cloned = dyn_cs.clone_to_call_site(b);
        assert_eq!(cloned.id, dyn_cs.id);
        assert_eq!(cloned.args, vec![ValueId(3)]);
        assert_eq!(cg.dyn_call_site_by_stmt(StmtId(1)).unwrap().id, dyn_cs.id);
        assert_eq!(cg.call_site_manager().count(), 2);
    }

    #[test]
    fn test_dot_mentions_methods() {
        let mut cg = CallGraph::new();
        let a = cg.add_node(&sig("main"), CallGraphNodeKind::Real, false);
        let b = cg.add_node(&sig("helper"), CallGraphNodeKind::Blank, true);
        cg.add_call_edge(a, b, StmtId(0), CallKind::Direct);
        let dot = cg.to_dot();
        assert!(dot.contains("digraph"));
        assert!(dot.contains("helper"));
    }
}
