//! `AppStorage` / `LocalStorage` / `PersistentStorage` key-value stores
//!
//! Every `(store, key)` pair is one shared slot: writes copy the stored value
//! into the slot, reads copy the slot into the call's result.

use super::{PluginCall, PtaPlugin};
use crate::errors::Result;
use crate::features::points_to::domain::{
    NodeID, PagEdgeKind, PagNodeKind, PagValue, SiteRole, DUMMY_CID,
};
use crate::features::points_to::infrastructure::pag_builder::PagBuilder;
use crate::shared::models::{MethodSignature, Scene};

const STORAGE_CLASSES: [&str; 3] = ["AppStorage", "LocalStorage", "PersistentStorage"];

const WRITE_METHODS: [&str; 5] = ["set", "setOrCreate", "persistProp", "setAndLink", "setAndProp"];

const READ_METHODS: [&str; 5] = ["get", "link", "prop", "setAndLink", "setAndProp"];

#[derive(Debug, Default)]
pub struct StoragePlugin;

impl StoragePlugin {
    fn is_storage_class(name: &str) -> bool {
        STORAGE_CLASSES.contains(&name)
    }

    fn model(
        &self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
        store: &str,
    ) -> Result<bool> {
        let method = call.callee.name.as_str();
        let is_write = WRITE_METHODS.contains(&method);
        let is_read = READ_METHODS.contains(&method);
        if !is_write && !is_read {
            return Ok(false);
        }
        let scene = builder.scene();
        let Some(key) = call.const_arg(scene, 0) else {
            // dynamic keys are not tracked
            return Ok(true);
        };
        let slot = builder.get_or_new_node(
            DUMMY_CID,
            PagValue::Synthetic {
                owner: "storage",
                key: format!("{}::{}", store, key),
            },
        );
        if is_write {
            if let Some(value) = call.local_arg(scene, 1) {
                let src = builder.value_node(call.caller_cid, value);
                builder.add_edge(PagEdgeKind::Copy, src, slot);
            }
        }
        if is_read {
            if let Some(def) = call.def {
                let dst = builder.value_node(call.caller_cid, def);
                builder.add_edge(PagEdgeKind::Copy, slot, dst);
            }
        }
        Ok(true)
    }
}

impl PtaPlugin for StoragePlugin {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn can_handle(&self, _scene: &Scene, callee: &MethodSignature) -> bool {
        Self::is_storage_class(callee.class_name())
    }

    fn process_call(
        &mut self,
        builder: &mut PagBuilder<'_>,
        call: &PluginCall<'_>,
    ) -> Result<bool> {
        self.model(builder, call, call.callee.class_name())
    }

    /// Calls on a `LocalStorage` instance
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
        let store = match builder.pag().node(obj).map(|n| &n.kind) {
            Some(PagNodeKind::HeapObj { class: Some(class), .. })
                if Self::is_storage_class(&class.name) =>
            {
                class.name.clone()
            }
            _ => return Ok(false),
        };
        self.model(builder, call, &store)
    }
}
