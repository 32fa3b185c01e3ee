//! `taskpool.execute(fn, ...args)` and `new taskpool.Task(fn, ...args)`
//!
//! The function argument is watched; each function object reaching it is
//! called with the remaining arguments.

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::call_graph::domain::{CallGraphNodeKind, CallKind};
use crate::features::points_to::domain::{NodeID, SiteRef, SiteRole};
use crate::features::points_to::infrastructure::pag_builder::{CallBinding, PagBuilder};
use crate::shared::models::{MethodSignature, Scene};
use crate::shared::constants::names;

#[derive(Debug, Default)]
pub struct TaskPoolPlugin;

impl TaskPoolPlugin {
    fn is_execute(sig: &MethodSignature) -> bool {
        sig.class_name() == "taskpool" && sig.name == "execute"
    }

    fn is_task_constructor(sig: &MethodSignature) -> bool {
        sig.class_name() == "Task" && sig.name == names::CONSTRUCTOR
    }

    fn watch_function_arg(builder: &mut PagBuilder<'_>, call: &PluginCall<'_>) {
        let Some(func) = call.local_arg(builder.scene(), 0) else {
            return;
        };
        let node = builder.value_node(call.caller_cid, func);
        builder.register_site(
            node,
            SiteRef {
                stmt: call.stmt,
                role: SiteRole::Arg(0),
            },
        );
    }
}

impl PtaPlugin for TaskPoolPlugin {
    fn name(&self) -> &'static str {
        "taskpool"
    }

    fn can_handle(&self, _scene: &Scene, callee: &MethodSignature) -> bool {
        Self::is_execute(callee) || Self::is_task_constructor(callee)
    }

    fn process_call(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
    ) -> Result<bool> {
        Self::watch_function_arg(builder, call);
        Ok(true)
    }

    fn process_object(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        role: SiteRole,
        obj: NodeID,
    ) -> Result<bool> {
        let declared = &call.invoke.method;
        if !Self::is_execute(declared) && !Self::is_task_constructor(declared) {
            return Ok(false);
        }
        if role != SiteRole::Arg(0) {
            Self::watch_function_arg(builder, call);
            return Ok(true);
        }

        let Some(fo) = builder.pag().node(obj).and_then(|n| n.function()).cloned() else {
            return Ok(false);
        };
        let callee = match fo.func {
            Some(f) => f,
            None => builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };
        let cid = call.caller_cid;
        let mut binding = CallBinding::new(call.stmt, call.call_site, call.caller, cid, callee);
        binding.ctx_obj = Some(obj);
        binding.this_src = fo.this_pt;
        binding.args = fo.bound_args.clone();
        if call.invoke.args.len() > 1 {
            let rest = builder.arg_nodes(cid, &call.invoke.args[1..], fo.arg_offset);
            binding.args.extend(rest);
        }
        // the promise result is approximated by the task's return value
        if Self::is_execute(declared) {
            binding.ret_dst = call.def.map(|d| builder.value_node(cid, d));
        }

        builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect);
        builder.connect_call(binding)?;
        Ok(true)
    }
}
