//! Per-method PAG summary
//!
//! Context-independent: endpoints are [`PagValue`]s, instantiated into PAG nodes
//! once per context the method is analysed in. Built at most once per method
//! and never modified afterwards.

use crate::features::call_graph::domain::{CallSite, DynCallSite, FuncID};
use crate::shared::models::{FileSignature, StmtId, ValueId};

use super::pag::{PagEdgeKind, PagValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntraEdge {
    pub kind: PagEdgeKind,
    pub src: PagValue,
    pub dst: PagValue,
    pub stmt: StmtId,
}

/// Local used by a method but declared at file scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeValue {
    pub local: ValueId,
    /// Declaring local, in the default method of its file
    pub decl: ValueId,
    /// Export the declaration was reached through, for imported bindings
    pub export: Option<(FileSignature, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct FuncPag {
    func: FuncID,
    internal_edges: Vec<IntraEdge>,
    normal_call_sites: Vec<CallSite>,
    dynamic_call_sites: Vec<DynCallSite>,
    unknown_call_sites: Vec<DynCallSite>,
    return_values: Vec<ValueId>,
    free_values: Vec<FreeValue>,
}

impl FuncPag {
    pub fn new(func: FuncID) -> Self {
        Self {
            func,
            ..Default::default()
        }
    }

    pub fn func(&self) -> FuncID {
        self.func
    }

    pub fn add_internal_edge(
        &mut self,
        kind: PagEdgeKind,
        src: PagValue,
        dst: PagValue,
        stmt: StmtId,
    ) {
        self.internal_edges.push(IntraEdge { kind, src, dst, stmt });
    }

    pub fn add_normal_call_site(&mut self, cs: CallSite) {
        self.normal_call_sites.push(cs);
    }

    pub fn add_dynamic_call_site(&mut self, cs: DynCallSite) {
        self.dynamic_call_sites.push(cs);
    }

    pub fn add_unknown_call_site(&mut self, cs: DynCallSite) {
        self.unknown_call_sites.push(cs);
    }

    pub fn add_return_value(&mut self, v: ValueId) {
        if !self.return_values.contains(&v) {
            self.return_values.push(v);
        }
    }

    pub fn add_free_value(&mut self, free: FreeValue) {
        if !self.free_values.iter().any(|f| f.local == free.local) {
            self.free_values.push(free);
        }
    }

    pub fn internal_edges(&self) -> &[IntraEdge] {
        &self.internal_edges
    }

    pub fn normal_call_sites(&self) -> &[CallSite] {
        &self.normal_call_sites
    }

    pub fn dynamic_call_sites(&self) -> &[DynCallSite] {
        &self.dynamic_call_sites
    }

    pub fn unknown_call_sites(&self) -> &[DynCallSite] {
        &self.unknown_call_sites
    }

    pub fn return_values(&self) -> &[ValueId] {
        &self.return_values
    }

    pub fn free_values(&self) -> &[FreeValue] {
        &self.free_values
    }

    pub fn edge_count(&self, kind: PagEdgeKind) -> usize {
        self.internal_edges.iter().filter(|e| e.kind == kind).count()
    }
}
