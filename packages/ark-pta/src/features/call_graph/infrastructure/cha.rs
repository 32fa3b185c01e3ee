//! Class hierarchy analysis
//!
//! Every subclass of the receiver's declared class is a possible receiver; the
//! closest implementation of each one becomes a callee.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use super::abstract_analysis::{dispatch, AbstractAnalysis, Dispatch};
use super::builder::node_for;
use crate::features::call_graph::domain::{CallGraph, CallGraphNodeKind, FuncID};
use crate::shared::models::{Scene, StmtId};

pub struct ClassHierarchyAnalysis<'a> {
    cg: &'a mut CallGraph,
    scene: &'a Scene,
    worklist: VecDeque<FuncID>,
    processed: FxHashSet<FuncID>,
}

impl<'a> ClassHierarchyAnalysis<'a> {
    pub fn new(cg: &'a mut CallGraph, scene: &'a Scene) -> Self {
        Self {
            cg,
            scene,
            worklist: VecDeque::new(),
            processed: FxHashSet::default(),
        }
    }
}

impl AbstractAnalysis for ClassHierarchyAnalysis<'_> {
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
        "cha"
    }

    fn resolve_call(&mut self, _caller: FuncID, stmt: StmtId) -> Vec<FuncID> {
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
                for (_, method) in targets {
                    let id = node_for(self.cg, scene, &method, CallGraphNodeKind::Virtual);
                    if !callees.contains(&id) {
                        callees.push(id);
                    }
                }
                callees
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::call_graph::infrastructure::CallGraphBuilder;
    use crate::shared::models::{ArkType, SceneBuilder};

    #[test]
    fn test_cha_includes_every_override() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let b = sb.add_class(&file, "B", Some(&a));
        let c = sb.add_class(&file, "C", Some(&a));
        let af = sb.add_method(&a, "f");
        let bf = sb.add_method(&b, "f");
        for m in [&af, &bf] {
            sb.body(m, |bb| {
                bb.this_local();
                bb.ret(None);
            });
        }
        let main = sb.default_method(&file);
        sb.body(&main, |bb| {
            let o = bb.local("o", ArkType::Class(a.clone()));
            bb.assign_new(o, &c);
            bb.call_instance(None, o, &af, &[]);
        });
        let scene = sb.build();

        let mut cg = CallGraph::new();
        let reached = CallGraphBuilder::new(&mut cg, &scene)
            .build_class_hierarchy_call_graph(&[main.clone()]);

        let main_id = cg.func_id(&main).unwrap();
        let af_id = cg.func_id(&af).unwrap();
        let bf_id = cg.func_id(&bf).unwrap();
        assert_eq!(cg.callees(main_id), {
            let mut v = vec![af_id, bf_id];
            v.sort();
            v
        });
        assert!(reached.contains(&af_id));
        assert!(reached.contains(&bf_id));
        assert_eq!(cg.entries(), &[main_id]);
    }

    #[test]
    fn test_pointer_call_resolves_to_named_function() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let main = sb.default_method(&file);
        let cb = sb.add_function(&file, "cb");
        sb.body(&cb, |bb| {
            bb.ret(None);
        });
        sb.body(&main, |bb| {
            let fp = bb.local("fp", ArkType::Function(cb.clone()));
            bb.assign_function(fp, &cb);
            bb.call_pointer(None, fp, &cb, &[]);
        });
        let scene = sb.build();

        let mut cg = CallGraph::new();
        CallGraphBuilder::new(&mut cg, &scene).build_class_hierarchy_call_graph(&[main.clone()]);
        assert!(cg.has_edge(cg.func_id(&main).unwrap(), cg.func_id(&cb).unwrap()));
    }
}
