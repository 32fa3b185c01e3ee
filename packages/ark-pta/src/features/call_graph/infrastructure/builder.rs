//! Direct call-graph construction
//!
//! One node per method; static invokes get an edge and a [`CallSite`]
//! immediately, instance and pointer invokes are recorded as [`DynCallSite`]s
//! for the resolvers and the pointer analysis.
//!
//! [`CallSite`]: crate::features::call_graph::domain::CallSite
//! [`DynCallSite`]: crate::features::call_graph::domain::DynCallSite

use tracing::{debug, info};

use super::abstract_analysis::AbstractAnalysis;
use super::cha::ClassHierarchyAnalysis;
use super::rta::RapidTypeAnalysis;
use crate::features::call_graph::domain::{CallGraph, CallGraphNodeKind, CallKind, FuncID};
use crate::shared::models::{ArkMethod, InvokeKind, MethodSignature, Scene, StmtId};

pub struct CallGraphBuilder<'a> {
    cg: &'a mut CallGraph,
    scene: &'a Scene,
}

impl<'a> CallGraphBuilder<'a> {
    pub fn new(cg: &'a mut CallGraph, scene: &'a Scene) -> Self {
        Self { cg, scene }
    }

    /// Node kind inferred from the method's flags
    pub fn node_kind(method: &ArkMethod) -> CallGraphNodeKind {
        if method.is_generated {
            CallGraphNodeKind::Intrinsic
        } else if !method.has_body() {
            CallGraphNodeKind::Blank
        } else if method.signature.is_constructor() {
            CallGraphNodeKind::Constructor
        } else {
            CallGraphNodeKind::Real
        }
    }

    /// Node of a method of the Scene, or an SDK placeholder of `missing_kind`
    /// for signatures the Scene does not declare
    pub fn node_for(&mut self, sig: &MethodSignature, missing_kind: CallGraphNodeKind) -> FuncID {
        node_for(self.cg, self.scene, sig, missing_kind)
    }

    pub fn build_direct_call_graph_for_scene(&mut self) {
        let methods: Vec<MethodSignature> =
            self.scene.methods().map(|m| m.signature.clone()).collect();
        self.build_direct_call_graph(&methods);
    }

    pub fn build_direct_call_graph(&mut self, methods: &[MethodSignature]) {
        for sig in methods {
            self.node_for(sig, CallGraphNodeKind::Blank);
        }

        let scene = self.scene;
        let mut static_sites = 0usize;
        let mut dyn_sites = 0usize;
        for sig in methods {
            let Some(method) = scene.method(sig) else {
                continue;
            };
            let caller = self.node_for(sig, CallGraphNodeKind::Blank);
            for &stmt in method.stmts() {
                match self.add_call_site(caller, stmt) {
                    Some(true) => static_sites += 1,
                    Some(false) => dyn_sites += 1,
                    None => {}
                }
            }
        }

        info!(
            nodes = self.cg.node_count(),
            edges = self.cg.edge_count(),
            static_sites,
            dyn_sites,
            "Direct call graph built"
        );
    }

    /// Records the call of `stmt`; `Some(true)` for static, `Some(false)` for dynamic
    fn add_call_site(&mut self, caller: FuncID, stmt: StmtId) -> Option<bool> {
        let scene = self.scene;
        let invoke = scene.invoke_of(stmt)?;
        let args = invoke.args.clone();
        match invoke.kind {
            InvokeKind::Static => {
                let callee = self.node_for(&invoke.method, CallGraphNodeKind::Blank);
                let kind = if invoke.method.is_constructor() {
                    CallKind::Special
                } else {
                    CallKind::Direct
                };
                self.cg.add_call_edge(caller, callee, stmt, kind);
                self.cg.new_call_site(stmt, args, caller, callee);
                Some(true)
            }
            InvokeKind::Instance | InvokeKind::Pointer => {
                let potential = self.node_for(&invoke.method, CallGraphNodeKind::Virtual);
                debug!(stmt = %stmt, callee = %invoke.method, "Dynamic call site recorded");
                self.cg.new_dyn_call_site(stmt, args, caller, Some(potential));
                Some(false)
            }
        }
    }

    /// Sets the analysis entries from method signatures
    pub fn set_entries(&mut self, entries: &[MethodSignature]) -> Vec<FuncID> {
        let ids: Vec<FuncID> = entries
            .iter()
            .map(|m| self.node_for(m, CallGraphNodeKind::Blank))
            .collect();
        self.cg.set_entries(ids.clone());
        ids
    }

    /// Direct graph refined by class-hierarchy dispatch from `entries`
    pub fn build_class_hierarchy_call_graph(&mut self, entries: &[MethodSignature]) -> Vec<FuncID> {
        self.build_direct_call_graph_for_scene();
        let ids = self.set_entries(entries);
        let mut cha = ClassHierarchyAnalysis::new(self.cg, self.scene);
        cha.start(&ids)
    }

    /// Direct graph refined by rapid type analysis from `entries`
    pub fn build_rapid_type_call_graph(&mut self, entries: &[MethodSignature]) -> Vec<FuncID> {
        self.build_direct_call_graph_for_scene();
        let ids = self.set_entries(entries);
        let mut rta = RapidTypeAnalysis::new(self.cg, self.scene);
        rta.start(&ids)
    }
}

/// Node of `sig`, created with its inferred kind on first request
pub(crate) fn node_for(
    cg: &mut CallGraph,
    scene: &Scene,
    sig: &MethodSignature,
    missing_kind: CallGraphNodeKind,
) -> FuncID {
    if let Some(id) = cg.func_id(sig) {
        return id;
    }
    match scene.method(sig) {
        Some(method) => {
            let kind = CallGraphBuilder::node_kind(method);
            cg.add_node(sig, kind, scene.is_sdk_method(sig))
        }
        None => cg.add_node(sig, missing_kind, true),
    }
}
