//! Plugins modelling calls whose callee has no body in the Scene
//!
//! A plugin gets two chances at a call: when the call is met as a static
//! call site of a bodiless callee ([`PtaPlugin::process_call`]), and whenever
//! a new object reaches a node the call is tied to ([`PtaPlugin::process_object`]),
//! either as the receiver or as an argument the plugin asked to watch.
//!
//! Plugins are consulted in registration order; the first one that reports the
//! call as handled wins.

mod container;
mod function;
mod sdk;
mod storage;
mod task_pool;
mod worker;

pub use container::ContainerPlugin;
pub use function::FunctionPlugin;
pub use sdk::SdkPlugin;
pub use storage::StoragePlugin;
pub use task_pool::TaskPoolPlugin;
pub use worker::WorkerPlugin;

use tracing::debug;

use super::pag_builder::PagBuilder;
use crate::errors::Result;
use crate::features::call_graph::domain::{CallSiteID, FuncID};
use crate::features::points_to::domain::{ContextID, NodeID, SiteRole};
use crate::shared::models::{InvokeExpr, MethodSignature, Scene, StmtId, Value, ValueId};

/// A call handed to the plugins
#[derive(Debug, Clone, Copy)]
pub struct PluginCall<'c> {
    pub stmt: StmtId,
    pub caller: FuncID,
    pub caller_cid: ContextID,
    pub call_site: CallSiteID,
    /// Resolved callee, or the declared one when nothing better is known
    pub callee: &'c MethodSignature,
    pub invoke: &'c InvokeExpr,
    /// Local receiving the call's result
    pub def: Option<ValueId>,
}

impl PluginCall<'_> {
    /// Argument `index` when it is a local
    pub fn local_arg(&self, scene: &Scene, index: usize) -> Option<ValueId> {
        self.invoke
            .args
            .get(index)
            .copied()
            .filter(|&a| scene.value(a).is_local())
    }

    /// Text of a constant argument with surrounding quotes removed
    pub fn const_arg(&self, scene: &Scene, index: usize) -> Option<String> {
        match scene.value(*self.invoke.args.get(index)?) {
            Value::Constant { text, .. } => {
                Some(text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string())
            }
            _ => None,
        }
    }
}

pub trait PtaPlugin {
    fn name(&self) -> &'static str;

    /// Whether static calls of `callee` are modelled by this plugin
    fn can_handle(&self, scene: &Scene, callee: &MethodSignature) -> bool;

    /// Models a static call of a bodiless callee; returns true when handled
    fn process_call(&mut self, builder: &mut PagBuilder<'_>, call: &PluginCall<'_>) -> Result<bool>;

    /// Models `call` for one new object of the node the call is tied to
    fn process_object(
        &mut self,
        _builder: &mut PagBuilder<'_>,
        _call: &PluginCall<'_>,
        _role: SiteRole,
        _obj: NodeID,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Ordered plugin list
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn PtaPlugin>>,
}

impl PluginManager {
    /// The standard plugins: storage, function, taskpool, worker, container, SDK
    pub fn new() -> Self {
        let mut manager = Self::default();
        manager.register(Box::new(StoragePlugin));
        manager.register(Box::new(FunctionPlugin));
        manager.register(Box::new(TaskPoolPlugin));
        manager.register(Box::new(WorkerPlugin));
        manager.register(Box::new(ContainerPlugin));
        manager.register(Box::new(SdkPlugin));
        manager
    }

    pub fn register(&mut self, plugin: Box<dyn PtaPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn process_call(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
    ) -> Result<bool> {
        let scene = builder.scene();
        for plugin in &mut self.plugins {
            if plugin.can_handle(scene, call.callee) && plugin.process_call(builder, call)? {
                debug!(
                    plugin = plugin.name(),
                    callee = %call.callee,
                    stmt = %call.stmt,
                    "Call modelled by plugin"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn process_object(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        role: SiteRole,
        obj: NodeID,
    ) -> Result<bool> {
        for plugin in &mut self.plugins {
            if plugin.process_object(builder, call, role, obj)? {
                debug!(plugin = plugin.name(), stmt = %call.stmt, obj, "Object modelled by plugin");
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
