//! Worklist driver shared by the call-graph resolvers
//!
//! Implementors only decide how one call statement is resolved; the traversal
//! from the entries, the processed set and the edge bookkeeping live here.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::features::call_graph::domain::{CallGraph, CallKind, FuncID};
use crate::shared::constants::names;
use crate::shared::models::{
    ClassSignature, InvokeExpr, InvokeKind, MethodSignature, Scene, StmtId, ValueId,
};

pub trait AbstractAnalysis {
    fn scene(&self) -> &Scene;

    fn call_graph(&self) -> &CallGraph;

    fn call_graph_mut(&mut self) -> &mut CallGraph;

    fn worklist(&mut self) -> &mut VecDeque<FuncID>;

    fn processed(&mut self) -> &mut FxHashSet<FuncID>;

    /// Callees of the invoke at `stmt` inside `caller`
    fn resolve_call(&mut self, caller: FuncID, stmt: StmtId) -> Vec<FuncID>;

    /// Hook run once per reached method, before its calls are resolved
    fn pre_process_method(&mut self, _func: FuncID) {}

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Traverses the program from `entries`; returns the methods reached, in
    /// processing order
    fn start(&mut self, entries: &[FuncID]) -> Vec<FuncID> {
        let mut reached = Vec::new();
        self.worklist().extend(entries.iter().copied());

        while let Some(func) = self.worklist().pop_front() {
            if !self.processed().insert(func) {
                continue;
            }
            let Some(sig) = self.call_graph().method_of(func).cloned() else {
                continue;
            };
            let stmts: Vec<StmtId> = match self.scene().method(&sig) {
                Some(method) if method.has_body() => method.stmts().to_vec(),
                _ => {
                    debug!(method = %sig, "Skipping bodiless method");
                    continue;
                }
            };

            reached.push(func);
            self.pre_process_method(func);

            for stmt in stmts {
                let Some(kind) = self.scene().invoke_of(stmt).map(edge_kind) else {
                    continue;
                };
                let callees = self.resolve_call(func, stmt);
                if callees.is_empty() {
                    warn!(
                        analysis = self.name(),
                        caller = %sig,
                        stmt = %stmt,
                        "Unresolved call site"
                    );
                    continue;
                }
                for callee in callees {
                    self.call_graph_mut().add_call_edge(func, callee, stmt, kind);
                    self.push_callee(callee);
                }
            }
        }

        info!(
            analysis = self.name(),
            reached = reached.len(),
            edges = self.call_graph().edge_count(),
            "Call graph resolution finished"
        );
        reached
    }

    fn push_callee(&mut self, callee: FuncID) {
        if !self.processed().contains(&callee) {
            self.worklist().push_back(callee);
        }
    }
}

fn edge_kind(invoke: &InvokeExpr) -> CallKind {
    match invoke.kind {
        InvokeKind::Static if invoke.method.is_constructor() => CallKind::Special,
        InvokeKind::Static => CallKind::Direct,
        InvokeKind::Instance | InvokeKind::Pointer => CallKind::Indirect,
    }
}

/// Outcome of looking up the targets of one invoke in the class hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Target named by the invoke itself
    Fixed(MethodSignature),
    /// One implementation per possible receiver class
    Virtual(Vec<(ClassSignature, MethodSignature)>),
}

/// Class-hierarchy targets of `invoke`.
///
/// `super.m()` and constructor calls dispatch on the statically named class only.
/// When the declared class is not part of the Scene the receiver's static type is
/// tried, and failing that the declared signature is kept so that SDK stubs can
/// pick the call up.
pub(crate) fn dispatch(scene: &Scene, invoke: &InvokeExpr) -> Dispatch {
    let declared = &invoke.method;
    match invoke.kind {
        InvokeKind::Static => Dispatch::Fixed(declared.clone()),
        InvokeKind::Pointer => {
            if scene.method(declared).is_some() {
                return Dispatch::Fixed(declared.clone());
            }
            let from_type = invoke
                .base
                .and_then(|fp| scene.value(fp).ty().function_signature().cloned());
            Dispatch::Fixed(from_type.unwrap_or_else(|| declared.clone()))
        }
        InvokeKind::Instance => {
            if is_super_receiver(scene, invoke.base) || declared.is_constructor() {
                let target = scene
                    .find_method_in_chain(&declared.class, &declared.name)
                    .cloned()
                    .unwrap_or_else(|| declared.clone());
                return Dispatch::Fixed(target);
            }

            let root = if scene.class(&declared.class).is_some() {
                Some(declared.class.clone())
            } else {
                invoke
                    .base
                    .and_then(|b| scene.value(b).ty().class_signature().cloned())
                    .filter(|c| scene.class(c).is_some())
            };
            let Some(root) = root else {
                return Dispatch::Fixed(declared.clone());
            };

            let targets: Vec<(ClassSignature, MethodSignature)> = scene
                .class_and_sub_classes(&root)
                .into_iter()
                .filter_map(|cls| {
                    let m = scene.find_method_in_chain(&cls, &declared.name)?.clone();
                    Some((cls, m))
                })
                .collect();
            if targets.is_empty() {
                Dispatch::Fixed(declared.clone())
            } else {
                Dispatch::Virtual(targets)
            }
        }
    }
}

/// Whether the receiver is the `super` local
pub(crate) fn is_super_receiver(scene: &Scene, base: Option<ValueId>) -> bool {
    base.and_then(|b| scene.value(b).local_name()) == Some(names::SUPER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{ArkType, SceneBuilder};

    #[test]
    fn test_dispatch_walks_sub_classes() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let b = sb.add_class(&file, "B", Some(&a));
        let c = sb.add_class(&file, "C", Some(&a));
        let af = sb.add_method(&a, "f");
        let bf = sb.add_method(&b, "f");
        let main = sb.default_method(&file);
        let stmt = sb.body(&main, |bb| {
            let o = bb.local("o", ArkType::Class(a.clone()));
            bb.call_instance(None, o, &af, &[])
        });
        let scene = sb.build();

        let Dispatch::Virtual(mut targets) = dispatch(&scene, scene.invoke_of(stmt).unwrap()) else {
            panic!("expected virtual dispatch");
        };
        targets.sort();
        assert_eq!(
            targets,
            vec![(a, af.clone()), (b, bf), (c, af)]
        );
    }

    #[test]
    fn test_super_call_is_fixed() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let b = sb.add_class(&file, "B", Some(&a));
        let af = sb.add_method(&a, "f");
        sb.add_method(&b, "f");
        let bg = sb.add_method(&b, "g");
        let stmt = sb.body(&bg, |bb| {
            let sup = bb.local(names::SUPER, ArkType::Class(a.clone()));
            bb.call_instance(None, sup, &af, &[])
        });
        let scene = sb.build();

        assert_eq!(dispatch(&scene, scene.invoke_of(stmt).unwrap()), Dispatch::Fixed(af));
    }

    #[test]
    fn test_unknown_class_keeps_declared_signature() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let main = sb.default_method(&file);
        let push = MethodSignature::builtin("Array", "push");
        let stmt = sb.body(&main, |bb| {
            let arr = bb.local("arr", ArkType::Unknown);
            bb.call_instance(None, arr, &push, &[])
        });
        let scene = sb.build();

        assert_eq!(dispatch(&scene, scene.invoke_of(stmt).unwrap()), Dispatch::Fixed(push));
    }
}
