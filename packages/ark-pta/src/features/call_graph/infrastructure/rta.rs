//! Rapid type analysis
//!
//! Class hierarchy dispatch restricted to classes instantiated by reached code.
//! Candidates whose receiver class has not been seen yet are parked per class
//! and replayed once an allocation of that class is reached.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use super::abstract_analysis::{dispatch, AbstractAnalysis, Dispatch};
use super::builder::node_for;
use crate::features::call_graph::domain::{CallGraph, CallGraphNodeKind, CallKind, FuncID};
use crate::shared::models::{ClassSignature, Scene, StmtId, StmtKind, Value};

/// Call deferred until its receiver class is instantiated
#[derive(Debug, Clone, Copy)]
struct IgnoredCall {
    caller: FuncID,
    stmt: StmtId,
    callee: FuncID,
}

pub struct RapidTypeAnalysis<'a> {
    cg: &'a mut CallGraph,
    scene: &'a Scene,
    worklist: VecDeque<FuncID>,
    processed: FxHashSet<FuncID>,
    instantiated: FxHashSet<ClassSignature>,
    ignored: FxHashMap<ClassSignature, Vec<IgnoredCall>>,
}

impl<'a> RapidTypeAnalysis<'a> {
    pub fn new(cg: &'a mut CallGraph, scene: &'a Scene) -> Self {
        Self {
            cg,
            scene,
            worklist: VecDeque::new(),
            processed: FxHashSet::default(),
            instantiated: FxHashSet::default(),
            ignored: FxHashMap::default(),
        }
    }

    pub fn is_instantiated(&self, class: &ClassSignature) -> bool {
        self.instantiated.contains(class)
    }

    fn mark_instantiated(&mut self, class: ClassSignature) {
        if !self.instantiated.insert(class.clone()) {
            return;
        }
        let Some(calls) = self.ignored.remove(&class) else {
            return;
        };
        debug!(class = %class, calls = calls.len(), "Replaying deferred calls");
        for call in calls {
            self.cg
                .add_call_edge(call.caller, call.callee, call.stmt, CallKind::Indirect);
            self.push_callee(call.callee);
        }
    }
}

impl AbstractAnalysis for RapidTypeAnalysis<'_> {
    fn scene(&self) -> &Scene {
        self.scene
    }

    fn call_graph(&self) -> &CallGraph {
        &*self.cg
    }

    fn call_graph_mut(&mut self) -> &mut CallGraph {
        &mut *self.cg
    }

    fn worklist(&mut self) -> &mut VecDeque<FuncID> {
        &mut self.worklist
    }

    fn processed(&mut self) -> &mut FxHashSet<FuncID> {
        &mut self.processed
    }

    fn name(&self) -> &'static str {
        "rta"
    }

    fn pre_process_method(&mut self, func: FuncID) {
        let scene = self.scene;
        let Some(method) = self.cg.method_of(func).and_then(|sig| scene.method(sig)) else {
            return;
        };
        for &sid in method.stmts() {
            if let StmtKind::Assign { right, .. } = &scene.stmt(sid).kind {
                if let Value::NewObject { class } = scene.value(*right) {
                    self.mark_instantiated(class.clone());
                }
            }
        }
    }

    fn resolve_call(&mut self, caller: FuncID, stmt: StmtId) -> Vec<FuncID> {
        let scene = self.scene;
        let Some(invoke) = scene.invoke_of(stmt) else {
            return Vec::new();
        };
        match dispatch(scene, invoke) {
            Dispatch::Fixed(target) => {
                let missing = if invoke.is_static() {
                    CallGraphNodeKind::Blank
                } else {
                    CallGraphNodeKind::Virtual
                };
                vec![node_for(self.cg, scene, &target, missing)]
            }
            Dispatch::Virtual(targets) => {
                let mut callees = Vec::new();
                for (class, method) in targets {
                    let id = node_for(self.cg, scene, &method, CallGraphNodeKind::Virtual);
                    if self.instantiated.contains(&class) {
                        if !callees.contains(&id) {
                            callees.push(id);
                        }
                    } else {
                        self.ignored.entry(class).or_default().push(IgnoredCall {
                            caller,
                            stmt,
                            callee: id,
                        });
                    }
                }
                if callees.is_empty() {
                    debug!(stmt = %stmt, "No instantiated receiver yet");
                }
                callees
            }
        }
    }
}
