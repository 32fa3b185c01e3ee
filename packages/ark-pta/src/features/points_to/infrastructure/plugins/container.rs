//! Arrays, maps, sets and the SDK collections
//!
//! A container keeps all its contents in one element node living in the
//! container context, shared with `a[i]` accesses on the same object.

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::call_graph::domain::{CallGraphNodeKind, CallKind};
use crate::features::points_to::domain::{
    ContainerKind, FieldKey, NodeID, PagEdgeKind, PagNodeKind, PagValue, PointsToSet, SiteRef,
    SiteRole,
};
use crate::features::points_to::infrastructure::pag_builder::{CallBinding, PagBuilder};
use crate::shared::models::{ArkType, MethodSignature, Scene, ValueId};

/// Every argument is stored
const APPEND_METHODS: [&str; 8] =
    ["push", "unshift", "add", "offer", "append", "addFirst", "addLast", "fill"];

/// The last argument is stored, the others are keys or indices
const KEYED_STORE_METHODS: [&str; 4] = ["set", "put", "insert", "setValueAt"];

/// Result is an element
const LOAD_METHODS: [&str; 14] = [
    "pop", "shift", "get", "at", "find", "first", "last", "getFirst", "getLast", "peek", "poll",
    "getValueAt", "removeFirst", "removeLast",
];

/// Result is the receiver itself, reordered in place
const IN_PLACE_METHODS: [&str; 2] = ["reverse", "sort"];

/// Result is a new container holding the receiver's elements (and, for
/// `concat`, the arguments or their elements)
const COPY_METHODS: [&str; 3] = ["slice", "concat", "filter"];

/// First argument is a callback receiving elements
const CALLBACK_METHODS: [&str; 7] =
    ["forEach", "map", "filter", "some", "every", "find", "findIndex"];

#[derive(Debug, Default)]
pub struct ContainerPlugin;

impl ContainerPlugin {
    fn is_container_method(name: &str) -> bool {
        APPEND_METHODS.contains(&name)
            || KEYED_STORE_METHODS.contains(&name)
            || LOAD_METHODS.contains(&name)
            || IN_PLACE_METHODS.contains(&name)
            || COPY_METHODS.contains(&name)
            || CALLBACK_METHODS.contains(&name)
    }

    fn on_container(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        obj: NodeID,
    ) -> Result<()> {
        let scene = builder.scene();
        let cid = call.caller_cid;
        let name = call.invoke.method.name.as_str();
        let elem = builder.field_node(obj, FieldKey::Element, None);

        let stored: Vec<usize> = if APPEND_METHODS.contains(&name) {
            (0..call.invoke.args.len()).collect()
        } else if KEYED_STORE_METHODS.contains(&name) {
            call.invoke.args.len().checked_sub(1).into_iter().collect()
        } else {
            Vec::new()
        };
        for index in stored {
            if let Some(value) = call.local_arg(scene, index) {
                let src = builder.value_node(cid, value);
                builder.add_edge(PagEdgeKind::Copy, src, elem);
            }
        }

        if let Some(def) = call.def {
            if LOAD_METHODS.contains(&name) {
                let dst = builder.value_node(cid, def);
                builder.add_edge(PagEdgeKind::Copy, elem, dst);
            } else if IN_PLACE_METHODS.contains(&name) {
                if let Some(base) = call.invoke.base {
                    let src = builder.value_node(cid, base);
                    let dst = builder.value_node(cid, def);
                    builder.add_edge(PagEdgeKind::Copy, src, dst);
                }
            } else if COPY_METHODS.contains(&name) {
                self.copy_into_new_container(builder, call, elem, def);
            }
        }

        if CALLBACK_METHODS.contains(&name) {
            if let Some(callback) = call.local_arg(scene, 0) {
                let cb_node = builder.value_node(cid, callback);
                builder.register_site(
                    cb_node,
                    SiteRef {
                        stmt: call.stmt,
                        role: SiteRole::Arg(0),
                    },
                );
                let functions = builder
                    .pag()
                    .node(cb_node)
                    .map(|n| n.pts().to_sorted_vec())
                    .unwrap_or_default();
                for func in functions {
                    self.call_back(builder, call, func, elem)?;
                }
            }
        }
        Ok(())
    }

    /// `def = receiver.slice()` and friends: one array per call statement and
    /// context, whose element node is fed by `elem`
    fn copy_into_new_container(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        elem: NodeID,
        def: ValueId,
    ) {
        let scene = builder.scene();
        let cid = call.caller_cid;
        let copy = builder.new_node_with_kind(
            cid,
            PagValue::Synthetic {
                owner: "container",
                key: call.stmt.to_string(),
            },
            PagNodeKind::HeapObj {
                class: None,
                container: Some(ContainerKind::Array),
            },
        );
        let dst = builder.value_node(cid, def);
        builder.add_edge(PagEdgeKind::Address, copy, dst);
        let copy_elem = builder.field_node(copy, FieldKey::Element, None);
        builder.add_edge(PagEdgeKind::Copy, elem, copy_elem);

        if call.invoke.method.name != "concat" {
            return;
        }
        for index in 0..call.invoke.args.len() {
            let Some(arg) = call.local_arg(scene, index) else {
                continue;
            };
            let arg_node = builder.value_node(cid, arg);
            if matches!(scene.value(arg).ty(), ArkType::Array(_)) {
                // arrays are flattened into their elements
                let spread = builder.new_node_with_kind(
                    cid,
                    PagValue::Synthetic {
                        owner: "concat",
                        key: format!("{}#{}", call.stmt, index),
                    },
                    PagNodeKind::RefVar {
                        base: Some(arg_node),
                        field: FieldKey::Element,
                        clone_of: None,
                    },
                );
                builder.add_edge(PagEdgeKind::Load, spread, copy_elem);
            } else {
                builder.add_edge(PagEdgeKind::Copy, arg_node, copy_elem);
            }
        }
    }

    /// Runs `func` on the element node `elem`
    fn call_back(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        func: NodeID,
        elem: NodeID,
    ) -> Result<()> {
        let Some(fo) = builder.pag().node(func).and_then(|n| n.function()).cloned() else {
            return Ok(());
        };
        let callee = match fo.func {
            Some(f) => f,
            None => builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };
        let mut binding =
            CallBinding::new(call.stmt, call.call_site, call.caller, call.caller_cid, callee);
        binding.ctx_obj = Some(func);
        binding.this_src = fo.this_pt;
        binding.args = fo.bound_args.clone();
        binding.args.push((elem, fo.arg_offset));

        builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect);
        builder.connect_call(binding)?;
        Ok(())
    }
}

impl PtaPlugin for ContainerPlugin {
    fn name(&self) -> &'static str {
        "container"
    }

    fn can_handle(&self, _scene: &Scene, _callee: &MethodSignature) -> bool {
        false
    }

    fn process_call(
        &mut self,
        _builder: &mut PagBuilder<'_>,
        _call: &PluginCall<'_>,
    ) -> Result<bool> {
        Ok(false)
    }

    fn process_object(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        role: SiteRole,
        obj: NodeID,
    ) -> Result<bool> {
        if !Self::is_container_method(&call.invoke.method.name) {
            return Ok(false);
        }
        match role {
            SiteRole::Receiver | SiteRole::Unknown => {
                if !builder.pag().is_container(obj) {
                    return Ok(false);
                }
                self.on_container(builder, call, obj)?;
                Ok(true)
            }
            SiteRole::Arg(0) if CALLBACK_METHODS.contains(&call.invoke.method.name.as_str()) => {
                let Some(base) = call.invoke.base else {
                    return Ok(false);
                };
                let receiver = builder.value_node(call.caller_cid, base);
                let containers: Vec<NodeID> = builder
                    .pag()
                    .node(receiver)
                    .map(|n| n.pts().to_sorted_vec())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|&o| builder.pag().is_container(o))
                    .collect();
                if containers.is_empty() {
                    return Ok(false);
                }
                for container in containers {
                    let elem = builder.field_node(container, FieldKey::Element, None);
                    self.call_back(builder, call, obj, elem)?;
                }
                Ok(true)
            }
            SiteRole::Arg(_) => Ok(false),
        }
    }
}
