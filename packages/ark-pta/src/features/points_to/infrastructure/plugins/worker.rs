//! Worker messaging
//!
//! All messages share one channel slot: `postMessage(msg)` copies into it and
//! every registered message handler receives it as its first parameter.

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::call_graph::domain::{CallGraphNodeKind, CallKind};
use crate::features::points_to::domain::{
    NodeID, PagEdgeKind, PagValue, SiteRef, SiteRole, DUMMY_CID,
};
use crate::features::points_to::infrastructure::pag_builder::{CallBinding, PagBuilder};
use crate::shared::models::{MethodSignature, Scene};

const WORKER_CLASSES: [&str; 5] =
    ["ThreadWorker", "Worker", "workerPort", "ThreadWorkerGlobalScope", "GlobalScope"];

const POST_METHODS: [&str; 2] = ["postMessage", "postMessageWithSharedSendable"];

const HANDLER_METHODS: [&str; 4] = ["onmessage", "onMessage", "addEventListener", "on"];

#[derive(Debug, Default)]
pub struct WorkerPlugin;

impl WorkerPlugin {
    fn is_worker_call(sig: &MethodSignature) -> bool {
        WORKER_CLASSES.contains(&sig.class_name())
            && (POST_METHODS.contains(&sig.name.as_str())
                || HANDLER_METHODS.contains(&sig.name.as_str()))
    }

    fn channel(builder: &mut PagBuilder<'_>) -> NodeID {
        builder.get_or_new_node(
            DUMMY_CID,
            PagValue::Synthetic {
                owner: "worker",
                key: "message".to_string(),
            },
        )
    }

    fn model(builder: &mut PagBuilder<'_>, call: &PluginCall<'_>) {
        let scene = builder.scene();
        let name = call.invoke.method.name.as_str();
        if POST_METHODS.contains(&name) {
            if let Some(msg) = call.local_arg(scene, 0) {
                let src = builder.value_node(call.caller_cid, msg);
                let channel = Self::channel(builder);
                builder.add_edge(PagEdgeKind::Copy, src, channel);
            }
            return;
        }
        // the handler is the last argument (`on('message', cb)`)
        let Some(index) = call.invoke.args.len().checked_sub(1) else {
            return;
        };
        if let Some(handler) = call.local_arg(scene, index) {
            let node = builder.value_node(call.caller_cid, handler);
            builder.register_site(
                node,
                SiteRef {
                    stmt: call.stmt,
                    role: SiteRole::Arg(index),
                },
            );
        }
    }
}

impl PtaPlugin for WorkerPlugin {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn can_handle(&self, _scene: &Scene, callee: &MethodSignature) -> bool {
        Self::is_worker_call(callee)
    }

    fn process_call(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
    ) -> Result<bool> {
        Self::model(builder, call);
        Ok(true)
    }

    fn process_object(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        role: SiteRole,
        obj: NodeID,
    ) -> Result<bool> {
        if !Self::is_worker_call(&call.invoke.method) {
            return Ok(false);
        }
        let SiteRole::Arg(_) = role else {
            Self::model(builder, call);
            return Ok(true);
        };

        let Some(fo) = builder.pag().node(obj).and_then(|n| n.function()).cloned() else {
            return Ok(false);
        };
        let callee = match fo.func {
            Some(f) => f,
            None => builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };
        let channel = Self::channel(builder);
        let mut binding =
            CallBinding::new(call.stmt, call.call_site, call.caller, call.caller_cid, callee);
        binding.ctx_obj = Some(obj);
        binding.this_src = fo.this_pt;
        binding.args = fo.bound_args.clone();
        binding.args.push((channel, fo.arg_offset));

        builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect);
        builder.connect_call(binding)?;
        Ok(true)
    }
}
