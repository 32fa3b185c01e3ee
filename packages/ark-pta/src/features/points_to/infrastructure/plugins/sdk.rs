//! Fallback for SDK calls
//!
//! The result of an SDK call is a fresh opaque object per call statement and
//! context. Function arguments are treated as callbacks and invoked without
//! arguments once their function objects are known.

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::call_graph::domain::{CallGraphNodeKind, CallKind};
use crate::features::points_to::domain::{NodeID, PagEdgeKind, PagValue, SiteRef, SiteRole};
use crate::features::points_to::infrastructure::pag_builder::{CallBinding, PagBuilder};
use crate::shared::models::{MethodSignature, Scene};

#[derive(Debug, Default)]
pub struct SdkPlugin;

impl SdkPlugin {
    fn is_sdk_call(scene: &Scene, callee: &MethodSignature) -> bool {
        scene.is_sdk_method(callee) && !scene.method(callee).is_some_and(|m| m.has_body())
    }

    fn model(builder: &mut PagBuilder<'_>, call: &PluginCall<'_>) {
        let scene = builder.scene();
        let cid = call.caller_cid;
        if let Some(def) = call.def {
            let obj = builder.get_or_new_node(cid, PagValue::SdkReturn(call.stmt));
            let dst = builder.value_node(cid, def);
            builder.add_edge(PagEdgeKind::Address, obj, dst);
        }
        for index in 0..call.invoke.args.len() {
            let Some(arg) = call.local_arg(scene, index) else {
                continue;
            };
            let node = builder.value_node(cid, arg);
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

impl PtaPlugin for SdkPlugin {
    fn name(&self) -> &'static str {
        "sdk"
    }

    fn can_handle(&self, scene: &Scene, callee: &MethodSignature) -> bool {
        Self::is_sdk_call(scene, callee)
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
        if !Self::is_sdk_call(builder.scene(), call.callee) {
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
        let mut binding =
            CallBinding::new(call.stmt, call.call_site, call.caller, call.caller_cid, callee);
        binding.ctx_obj = Some(obj);
        binding.this_src = fo.this_pt;
        binding.args = fo.bound_args.clone();

        builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect);
        builder.connect_call(binding)?;
        Ok(true)
    }
}
