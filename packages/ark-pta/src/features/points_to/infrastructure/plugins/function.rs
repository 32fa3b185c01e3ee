//! `Function.prototype.call` / `apply` / `bind`

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::call_graph::domain::{CallGraphNodeKind, CallKind};
use crate::features::points_to::domain::{
    ContextID, FieldKey, FunctionObject, NodeID, PagEdgeKind, PagNodeKind, PagValue, SiteRole,
};
use crate::features::points_to::infrastructure::pag_builder::{CallBinding, PagBuilder};
use crate::shared::models::{MethodSignature, Scene};

#[derive(Debug, Default)]
pub struct FunctionPlugin;

impl FunctionPlugin {
    /// `f.call(thisArg, a, b)` and `f.apply(thisArg, [a, b])`
    fn invoke(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        obj: NodeID,
        fo: &FunctionObject,
        obj_cid: ContextID,
        is_apply: bool,
    ) -> Result<()> {
        let scene = builder.scene();
        let cid = call.caller_cid;
        let callee = match fo.func {
            Some(f) => f,
            None => builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };

        let mut binding = CallBinding::new(call.stmt, call.call_site, call.caller, cid, callee);
        binding.ctx_obj = Some(obj);
        binding.func_obj_cid = Some(obj_cid);
        binding.this_src = match fo.this_pt {
            Some(bound_this) => Some(bound_this),
            None => call.local_arg(scene, 0).map(|a| builder.value_node(cid, a)),
        };
        binding.args = fo.bound_args.clone();
        if is_apply {
            if let Some(array) = call.local_arg(scene, 1) {
                let base = builder.value_node(cid, array);
                let spread = builder.new_node_with_kind(
                    cid,
                    PagValue::Synthetic {
                        owner: "apply",
                        key: call.stmt.to_string(),
                    },
                    PagNodeKind::RefVar {
                        base: Some(base),
                        field: FieldKey::Element,
                        clone_of: None,
                    },
                );
                binding.spread_args = Some(spread);
            }
        } else if call.invoke.args.len() > 1 {
            let rest = builder.arg_nodes(cid, &call.invoke.args[1..], fo.arg_offset);
            binding.args.extend(rest);
        }
        binding.ret_dst = call.def.map(|d| builder.value_node(cid, d));

        builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect);
        builder.connect_call(binding)?;
        Ok(())
    }

    /// `g = f.bind(thisArg, a)`: a new function object remembering the receiver
    /// and the leading arguments
    fn bind(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        obj: NodeID,
        fo: &FunctionObject,
    ) -> Result<()> {
        let Some(def) = call.def else {
            return Ok(());
        };
        let scene = builder.scene();
        let cid = call.caller_cid;
        let func = match fo.func {
            Some(f) => f,
            None => builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };

        let this_pt = match fo.this_pt {
            Some(bound_this) => Some(bound_this),
            None => call.local_arg(scene, 0).map(|a| builder.value_node(cid, a)),
        };
        let mut bound_args = fo.bound_args.clone();
        let mut arg_offset = fo.arg_offset;
        if call.invoke.args.len() > 1 {
            let extra = &call.invoke.args[1..];
            bound_args.extend(builder.arg_nodes(cid, extra, arg_offset));
            arg_offset += extra.len();
        }

        let clone = builder.new_node_with_kind(
            cid,
            PagValue::BoundFunction {
                stmt: call.stmt,
                target: obj,
            },
            PagNodeKind::Function(FunctionObject {
                method: fo.method.clone(),
                func: Some(func),
                call_site: Some(call.stmt),
                this_pt,
                bound_args,
                arg_offset,
            }),
        );
        let dst = builder.value_node(cid, def);
        builder.add_edge(PagEdgeKind::Address, clone, dst);
        Ok(())
    }
}

impl PtaPlugin for FunctionPlugin {
    fn name(&self) -> &'static str {
        "function"
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
        if matches!(role, SiteRole::Arg(_)) {
            return Ok(false);
        }
        let Some((fo, obj_cid)) = builder
            .pag()
            .node(obj)
            .and_then(|n| n.function().map(|f| (f.clone(), n.cid)))
        else {
            return Ok(false);
        };
        match call.invoke.method.name.as_str() {
            "call" => self.invoke(builder, call, obj, &fo, obj_cid, false)?,
            "apply" => self.invoke(builder, call, obj, &fo, obj_cid, true)?,
            "bind" => self.bind(builder, call, obj, &fo)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
