//! Pointer Assignment Graph
//!
//! Arena of context-qualified nodes connected by typed edges. A node is
//! identified by `(ContextID, PagValue)`; values that are shared by every
//! context (static fields, `globalThis`, exports) always live in
//! [`DUMMY_CID`], and the element slots of containers in [`CONTAINER_CID`].
//!
//! Every node keeps its incoming and outgoing edges per [`PagEdgeKind`], the
//! abstract field references whose base it is, the call sites that must be
//! re-resolved when its points-to set grows and the points-to set exposed to
//! queries.

use std::fmt;

use petgraph::dot::Dot;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::context::{ContextID, CONTAINER_CID, DUMMY_CID};
use super::pts_set::PtsSet;
use crate::config::PtsBacking;
use crate::features::call_graph::domain::FuncID;
use crate::shared::models::{
    ClassSignature, FieldSignature, FileSignature, MethodSignature, StmtId, ValueId,
};

pub type NodeID = u32;

// ═══════════════════════════════════════════════════════════════════════════
// Keys
// ═══════════════════════════════════════════════════════════════════════════

/// Field of an abstract object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldKey {
    Named(String),
    /// Array slots and container contents
    Element,
}

impl FieldKey {
    pub fn of(field: &FieldSignature) -> Self {
        FieldKey::Named(field.name.clone())
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Named(name) => f.write_str(name),
            FieldKey::Element => f.write_str("[*]"),
        }
    }
}

/// What a PAG node stands for, independent of its context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PagValue {
    /// A value of the Scene
    Value(ValueId),
    /// Static field, shared by every context
    StaticField(FieldSignature),
    /// Field of an abstract object
    ObjField { obj: NodeID, field: FieldKey },
    /// Function object produced by `bind` at `stmt` from `target`
    BoundFunction { stmt: StmtId, target: NodeID },
    /// The global object
    GlobalThis,
    /// Exported binding of a file
    Export { file: FileSignature, name: String },
    /// Object returned by an opaque SDK call
    SdkReturn(StmtId),
    /// Slot owned by a plugin (storage keys, worker channels, spread arguments)
    Synthetic { owner: &'static str, key: String },
}

impl fmt::Display for PagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PagValue::Value(v) => write!(f, "{}", v),
            PagValue::StaticField(field) => write!(f, "{}", field),
            PagValue::ObjField { obj, field } => write!(f, "n{}.{}", obj, field),
            PagValue::BoundFunction { stmt, target } => write!(f, "bind(n{})@{}", target, stmt),
            PagValue::GlobalThis => f.write_str("globalThis"),
            PagValue::Export { file, name } => write!(f, "export {} of {}", name, file),
            PagValue::SdkReturn(stmt) => write!(f, "sdk@{}", stmt),
            PagValue::Synthetic { owner, key } => write!(f, "{}:{}", owner, key),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Nodes
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Array,
    Map,
    Set,
    /// List-like collections of the SDK (`ArrayList`, `Queue`, ...)
    List,
}

impl ContainerKind {
    pub fn of_class(class: &ClassSignature) -> Option<Self> {
        match class.name.as_str() {
            "Array" | "ReadonlyArray" => Some(ContainerKind::Array),
            "Map" | "WeakMap" | "HashMap" | "TreeMap" | "LightWeightMap" | "PlainArray" => {
                Some(ContainerKind::Map)
            }
            "Set" | "WeakSet" | "HashSet" | "TreeSet" | "LightWeightSet" => {
                Some(ContainerKind::Set)
            }
            "ArrayList" | "List" | "LinkedList" | "Deque" | "Queue" | "Stack" | "Vector" => {
                Some(ContainerKind::List)
            }
            _ => None,
        }
    }
}

/// A function value, possibly a `bind` clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionObject {
    pub method: MethodSignature,
    pub func: Option<FuncID>,
    /// `bind` call that produced this clone
    pub call_site: Option<StmtId>,
    /// Receiver fixed by `bind`
    pub this_pt: Option<NodeID>,
    /// Arguments fixed by `bind`, with the parameter index each one binds
    pub bound_args: Vec<(NodeID, usize)>,
    /// Index of the first parameter bound by the call's own arguments
    pub arg_offset: usize,
}

impl FunctionObject {
    pub fn new(method: MethodSignature, func: Option<FuncID>) -> Self {
        Self {
            method,
            func,
            call_site: None,
            this_pt: None,
            bound_args: Vec::new(),
            arg_offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagNodeKind {
    LocalVar,
    /// Field access. Abstract references are based on a local; concrete field
    /// nodes are based on an object and remember the reference they were
    /// first cloned from.
    RefVar {
        base: Option<NodeID>,
        field: FieldKey,
        clone_of: Option<NodeID>,
    },
    Param { index: usize },
    ThisRef,
    Function(FunctionObject),
    HeapObj {
        class: Option<ClassSignature>,
        container: Option<ContainerKind>,
    },
    GlobalThis,
    ExportInfo,
}

impl PagNodeKind {
    /// Nodes that are points-to targets rather than pointers
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            PagNodeKind::Function(_) | PagNodeKind::HeapObj { .. } | PagNodeKind::GlobalThis
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PagNodeKind::LocalVar => "LocalVar",
            PagNodeKind::RefVar { .. } => "RefVar",
            PagNodeKind::Param { .. } => "Param",
            PagNodeKind::ThisRef => "ThisRef",
            PagNodeKind::Function(_) => "Function",
            PagNodeKind::HeapObj { .. } => "HeapObj",
            PagNodeKind::GlobalThis => "GlobalThis",
            PagNodeKind::ExportInfo => "ExportInfo",
        }
    }
}

/// How a call site is tied to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteRole {
    /// Receiver or function pointer of a call with a declared callee in the Scene
    Receiver,
    /// Receiver of a call whose declared callee is unknown
    Unknown,
    /// Argument watched by a plugin (callbacks)
    Arg(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiteRef {
    pub stmt: StmtId,
    pub role: SiteRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PagEdgeKind {
    Address,
    Copy,
    Load,
    Write,
    This,
    InterProceduralCopy,
}

impl PagEdgeKind {
    pub const ALL: [PagEdgeKind; 6] = [
        PagEdgeKind::Address,
        PagEdgeKind::Copy,
        PagEdgeKind::Load,
        PagEdgeKind::Write,
        PagEdgeKind::This,
        PagEdgeKind::InterProceduralCopy,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PagEdgeKind::Address => "address",
            PagEdgeKind::Copy => "copy",
            PagEdgeKind::Load => "load",
            PagEdgeKind::Write => "write",
            PagEdgeKind::This => "this",
            PagEdgeKind::InterProceduralCopy => "interprocedural",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PagNode {
    pub id: NodeID,
    pub cid: ContextID,
    pub value: PagValue,
    pub kind: PagNodeKind,
    out_edges: [Vec<NodeID>; 6],
    in_edges: [Vec<NodeID>; 6],
    pts: PtsSet,
    fields: FxHashMap<FieldKey, NodeID>,
    ref_nodes: Vec<NodeID>,
    related_sites: Vec<SiteRef>,
}

impl PagNode {
    pub fn out_edges(&self, kind: PagEdgeKind) -> &[NodeID] {
        &self.out_edges[kind.index()]
    }

    pub fn in_edges(&self, kind: PagEdgeKind) -> &[NodeID] {
        &self.in_edges[kind.index()]
    }

    /// Points-to set exposed to queries (everything propagated so far)
    pub fn pts(&self) -> &PtsSet {
        &self.pts
    }

    pub(crate) fn pts_mut(&mut self) -> &mut PtsSet {
        &mut self.pts
    }

    /// Concrete field nodes of an object node
    pub fn field_node(&self, field: &FieldKey) -> Option<NodeID> {
        self.fields.get(field).copied()
    }

    pub fn field_nodes(&self) -> impl Iterator<Item = (&FieldKey, NodeID)> {
        self.fields.iter().map(|(k, &v)| (k, v))
    }

    /// Abstract field references based on this node
    pub fn ref_nodes(&self) -> &[NodeID] {
        &self.ref_nodes
    }

    pub fn related_sites(&self) -> &[SiteRef] {
        &self.related_sites
    }

    pub fn function(&self) -> Option<&FunctionObject> {
        match &self.kind {
            PagNodeKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Field the node accesses, for reference nodes
    pub fn ref_field(&self) -> Option<(Option<NodeID>, &FieldKey)> {
        match &self.kind {
            PagNodeKind::RefVar { base, field, .. } => Some((*base, field)),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Graph
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Pag {
    backing: PtsBacking,
    nodes: Vec<PagNode>,
    index: FxHashMap<(ContextID, PagValue), NodeID>,
    value_nodes: FxHashMap<ValueId, Vec<NodeID>>,
    base_value_refs: FxHashMap<ValueId, Vec<ValueId>>,
    edges: FxHashSet<(NodeID, NodeID, PagEdgeKind)>,
    edge_counts: [usize; 6],
}

impl Pag {
    pub fn new(backing: PtsBacking) -> Self {
        Self {
            backing,
            nodes: Vec::new(),
            index: FxHashMap::default(),
            value_nodes: FxHashMap::default(),
            base_value_refs: FxHashMap::default(),
            edges: FxHashSet::default(),
            edge_counts: [0; 6],
        }
    }

    pub fn backing(&self) -> PtsBacking {
        self.backing
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nodes
    // ═══════════════════════════════════════════════════════════════════════

    /// Node of `(cid, value)`; `kind` is only used on creation. Returns the id
    /// and whether the node is new.
    pub fn add_node(
        &mut self,
        cid: ContextID,
        value: PagValue,
        kind: PagNodeKind,
    ) -> (NodeID, bool) {
        let key = (cid, value);
        if let Some(&id) = self.index.get(&key) {
            return (id, false);
        }
        let (cid, value) = key;
        let id = self.nodes.len() as NodeID;

        match (&value, &kind) {
            (PagValue::ObjField { obj, field }, _) => {
                if let Some(owner) = self.nodes.get_mut(*obj as usize) {
                    owner.fields.insert(field.clone(), id);
                }
            }
            (_, PagNodeKind::RefVar { base: Some(b), .. }) => {
                if let Some(base) = self.nodes.get_mut(*b as usize) {
                    base.ref_nodes.push(id);
                }
            }
            _ => {}
        }
        if let PagValue::Value(v) = &value {
            self.value_nodes.entry(*v).or_default().push(id);
        }

        self.index.insert((cid, value.clone()), id);
        self.nodes.push(PagNode {
            id,
            cid,
            value,
            kind,
            out_edges: Default::default(),
            in_edges: Default::default(),
            pts: PtsSet::new(self.backing),
            fields: FxHashMap::default(),
            ref_nodes: Vec::new(),
            related_sites: Vec::new(),
        });
        (id, true)
    }

    #[inline]
    pub fn node(&self, id: NodeID) -> Option<&PagNode> {
        self.nodes.get(id as usize)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeID) -> Option<&mut PagNode> {
        self.nodes.get_mut(id as usize)
    }

    pub fn get_node(&self, cid: ContextID, value: &PagValue) -> Option<NodeID> {
        self.index.get(&(cid, value.clone())).copied()
    }

    pub fn has_node(&self, cid: ContextID, value: &PagValue) -> bool {
        self.get_node(cid, value).is_some()
    }

    /// Nodes of a Scene value across all contexts
    pub fn nodes_of_value(&self, value: ValueId) -> &[NodeID] {
        self.value_nodes
            .get(&value)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PagNode> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Records that `field_ref` reads or writes a field of `base`
    pub fn record_base_ref(&mut self, base: ValueId, field_ref: ValueId) {
        let refs = self.base_value_refs.entry(base).or_default();
        if !refs.contains(&field_ref) {
            refs.push(field_ref);
        }
    }

    /// Field references whose base is `base`
    pub fn refs_of_base_value(&self, base: ValueId) -> &[ValueId] {
        self.base_value_refs
            .get(&base)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Ties a call site to a node; returns false when already registered
    pub fn register_site(&mut self, node: NodeID, site: SiteRef) -> bool {
        let Some(n) = self.node_mut(node) else {
            return false;
        };
        if n.related_sites.contains(&site) {
            return false;
        }
        n.related_sites.push(site);
        true
    }

    /// Whether elements of `obj` live in the container context
    pub fn is_container(&self, obj: NodeID) -> bool {
        matches!(
            self.node(obj).map(|n| &n.kind),
            Some(PagNodeKind::HeapObj { container: Some(_), .. })
        )
    }

    /// Context that field nodes of `obj` are created in
    pub fn field_context(&self, obj: NodeID) -> ContextID {
        if self.is_container(obj) {
            CONTAINER_CID
        } else {
            DUMMY_CID
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Edges
    // ═══════════════════════════════════════════════════════════════════════

    /// Adds `src -> dst`; returns false for duplicates and unknown endpoints
    pub fn add_edge(&mut self, kind: PagEdgeKind, src: NodeID, dst: NodeID) -> bool {
        if self.node(src).is_none() || self.node(dst).is_none() {
            return false;
        }
        if !self.edges.insert((src, dst, kind)) {
            return false;
        }
        self.nodes[src as usize].out_edges[kind.index()].push(dst);
        self.nodes[dst as usize].in_edges[kind.index()].push(src);
        self.edge_counts[kind.index()] += 1;
        true
    }

    pub fn has_edge(&self, kind: PagEdgeKind, src: NodeID, dst: NodeID) -> bool {
        self.edges.contains(&(src, dst, kind))
    }

    pub fn edge_count(&self, kind: PagEdgeKind) -> usize {
        self.edge_counts[kind.index()]
    }

    pub fn total_edge_count(&self) -> usize {
        self.edges.len()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Dumps
    // ═══════════════════════════════════════════════════════════════════════

    pub fn describe_node(&self, id: NodeID) -> String {
        match self.node(id) {
            Some(n) => format!("n{} {} c{} {}", n.id, n.kind.name(), n.cid, n.value),
            None => format!("n{} <missing>", id),
        }
    }

    /// Graphviz rendering, edges labelled with their kind
    pub fn to_dot(&self) -> String {
        let mut graph: petgraph::Graph<String, &'static str> = petgraph::Graph::new();
        let indices: Vec<_> = self
            .nodes
            .iter()
            .map(|n| graph.add_node(self.describe_node(n.id)))
            .collect();
        let mut edges: Vec<_> = self.edges.iter().copied().collect();
        edges.sort_unstable();
        for (src, dst, kind) in edges {
            graph.add_edge(indices[src as usize], indices[dst as usize], kind.name());
        }
        format!("{:?}", Dot::with_config(&graph, &[])) + &self.edge_legend()
    }

    fn edge_legend(&self) -> String {
        let counts: Vec<String> = PagEdgeKind::ALL
            .iter()
            .map(|k| format!("{}={}", k.name(), self.edge_count(*k)))
            .collect();
        format!("// edges: {}\n", counts.join(" "))
    }
}
