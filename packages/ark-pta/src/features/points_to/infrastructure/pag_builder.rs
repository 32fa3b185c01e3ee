//! PAG construction
//!
//! Two phases per method:
//! - `build_func_pag`: context-independent summary of the method body
//!   ([`FuncPag`]), built once.
//! - `build_pag_from_func_pag`: instantiates a summary in one context, adding
//!   nodes and edges to the [`Pag`] and wiring the static calls it contains.
//!
//! Instantiation requests raised while another instantiation is in progress
//! are queued and drained iteratively, so deep or cyclic static call chains
//! never recurse. Every edge added here is also logged for the solver, which
//! seeds its worklist from the log.

use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use super::plugins::{PluginCall, PluginManager};
use crate::config::ValidatedPtaConfig;
use crate::errors::{PtaError, Result};
use crate::features::call_graph::domain::{
    CallGraph, CallGraphNodeKind, CallSite, CallSiteID, DynCallSite, FuncID,
};
use crate::features::call_graph::infrastructure::builder::node_for;
use crate::features::points_to::domain::{
    new_selector, ContainerKind, ContextID, ContextSelector, FieldKey, FreeValue, FuncPag,
    FunctionObject, NodeID, Pag, PagEdgeKind, PagNodeKind, PagValue, SiteRef, SiteRole, DUMMY_CID,
};
use crate::shared::constants::names;
use crate::shared::models::{ArkType, MethodSignature, Scene, StmtId, StmtKind, Value, ValueId};

/// Everything needed to wire one resolved call into the PAG
#[derive(Debug, Clone)]
pub struct CallBinding {
    pub stmt: StmtId,
    pub call_site: CallSiteID,
    pub caller: FuncID,
    pub caller_cid: ContextID,
    pub callee: FuncID,
    /// Receiver object, for object-sensitive contexts
    pub ctx_obj: Option<NodeID>,
    /// Node whose objects become the callee's `this`
    pub this_src: Option<NodeID>,
    /// Argument nodes with the parameter index they bind
    pub args: Vec<(NodeID, usize)>,
    /// Array whose elements feed every parameter (`apply`)
    pub spread_args: Option<NodeID>,
    /// Node receiving the callee's return values
    pub ret_dst: Option<NodeID>,
    /// Context of the function object being called, for arrow functions
    pub func_obj_cid: Option<ContextID>,
}

impl CallBinding {
    pub fn new(
        stmt: StmtId,
        call_site: CallSiteID,
        caller: FuncID,
        caller_cid: ContextID,
        callee: FuncID,
    ) -> Self {
        Self {
            stmt,
            call_site,
            caller,
            caller_cid,
            callee,
            ctx_obj: None,
            this_src: None,
            args: Vec::new(),
            spread_args: None,
            ret_dst: None,
            func_obj_cid: None,
        }
    }
}

pub struct PagBuilder<'a> {
    scene: &'a Scene,
    pag: Pag,
    cg: CallGraph,
    selector: Box<dyn ContextSelector>,
    plugins: PluginManager,

    func_pags: FxHashMap<FuncID, Rc<FuncPag>>,
    built: FxHashSet<(ContextID, FuncID)>,
    pending: VecDeque<(FuncID, ContextID)>,
    draining: bool,

    /// Edges every node of a value gets, including nodes created later
    value_links: FxHashMap<ValueId, Vec<(NodeID, PagEdgeKind)>>,
    singletons: FxHashMap<FuncID, bool>,
    unhandled: BTreeSet<MethodSignature>,

    new_edges: Vec<(NodeID, NodeID, PagEdgeKind)>,
    new_sites: Vec<(NodeID, SiteRef)>,
}

impl<'a> PagBuilder<'a> {
    pub fn new(scene: &'a Scene, cg: CallGraph, config: &ValidatedPtaConfig) -> Self {
        Self {
            scene,
            pag: Pag::new(config.pts_backing()),
            cg,
            selector: new_selector(config.context_type(), config.k_limit()),
            plugins: PluginManager::new(),
            func_pags: FxHashMap::default(),
            built: FxHashSet::default(),
            pending: VecDeque::new(),
            draining: false,
            value_links: FxHashMap::default(),
            singletons: FxHashMap::default(),
            unhandled: BTreeSet::new(),
            new_edges: Vec::new(),
            new_sites: Vec::new(),
        }
    }

    /// Replaces the standard plugin list
    pub fn with_plugins(mut self, plugins: PluginManager) -> Self {
        self.plugins = plugins;
        self
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn pag(&self) -> &Pag {
        &self.pag
    }

    pub(crate) fn pag_mut(&mut self) -> &mut Pag {
        &mut self.pag
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.cg
    }

    pub fn call_graph_mut(&mut self) -> &mut CallGraph {
        &mut self.cg
    }

    pub fn selector(&self) -> &dyn ContextSelector {
        self.selector.as_ref()
    }

    pub fn func_pag(&self, func: FuncID) -> Option<&FuncPag> {
        self.func_pags.get(&func).map(|fp| fp.as_ref())
    }

    pub fn func_pag_count(&self) -> usize {
        self.func_pags.len()
    }

    /// Methods instantiated in at least one context, sorted
    pub fn reached_funcs(&self) -> Vec<FuncID> {
        let mut funcs: Vec<FuncID> = self.built.iter().map(|&(_, f)| f).collect();
        funcs.sort_unstable();
        funcs.dedup();
        funcs
    }

    /// Number of `(context, method)` instantiations
    pub fn instantiation_count(&self) -> usize {
        self.built.len()
    }

    /// Bodiless callees no plugin modelled
    pub fn unhandled_funcs(&self) -> impl Iterator<Item = &MethodSignature> {
        self.unhandled.iter()
    }

    pub fn record_unhandled(&mut self, sig: &MethodSignature) {
        if self.unhandled.insert(sig.clone()) {
            debug!(callee = %sig, "Call not modelled by any plugin");
        }
    }

    /// Call-graph node of `sig`, created on demand
    pub fn func_id_for(
        &mut self,
        sig: &MethodSignature,
        missing_kind: CallGraphNodeKind,
    ) -> FuncID {
        node_for(&mut self.cg, self.scene, sig, missing_kind)
    }

    pub fn take_new_edges(&mut self) -> Vec<(NodeID, NodeID, PagEdgeKind)> {
        std::mem::take(&mut self.new_edges)
    }

    pub fn take_new_sites(&mut self) -> Vec<(NodeID, SiteRef)> {
        std::mem::take(&mut self.new_sites)
    }

    pub fn has_new_edges(&self) -> bool {
        !self.new_edges.is_empty()
    }

    pub fn has_new_sites(&self) -> bool {
        !self.new_sites.is_empty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Phase 1: FuncPag
    // ═══════════════════════════════════════════════════════════════════════

    /// Builds the summary of `func`; returns false when it already exists
    pub fn build_func_pag(&mut self, func: FuncID) -> Result<bool> {
        if self.func_pags.contains_key(&func) {
            return Ok(false);
        }
        let scene = self.scene;
        let sig = self
            .cg
            .method_of(func)
            .cloned()
            .ok_or_else(|| PtaError::missing_node(format!("call graph node f{}", func)))?;

        let mut fp = FuncPag::new(func);
        if let Some(method) = scene.method(&sig) {
            let mut refs: FxHashMap<(ValueId, FieldKey), ValueId> = FxHashMap::default();
            for &sid in method.stmts() {
                match &scene.stmt(sid).kind {
                    StmtKind::Assign { left, right } => {
                        if scene.value(*right).as_invoke().is_some() {
                            self.classify_call(&mut fp, sid);
                        } else {
                            self.classify_assign(&mut fp, &mut refs, sid, *left, *right)?;
                        }
                    }
                    StmtKind::Invoke { .. } => self.classify_call(&mut fp, sid),
                    StmtKind::Return { value: Some(v) } if scene.value(*v).is_local() => {
                        fp.add_return_value(*v)
                    }
                    _ => {}
                }
            }
            for &local in method.locals() {
                if let Some(free) = free_value(scene, local) {
                    fp.add_free_value(free);
                }
            }
        }

        debug!(
            method = %sig,
            edges = fp.internal_edges().len(),
            static_calls = fp.normal_call_sites().len(),
            dynamic_calls = fp.dynamic_call_sites().len(),
            unknown_calls = fp.unknown_call_sites().len(),
            "FuncPag built"
        );
        self.func_pags.insert(func, Rc::new(fp));
        Ok(true)
    }

    fn classify_assign(
        &mut self,
        fp: &mut FuncPag,
        refs: &mut FxHashMap<(ValueId, FieldKey), ValueId>,
        sid: StmtId,
        left: ValueId,
        right: ValueId,
    ) -> Result<()> {
        let scene = self.scene;
        let rv = scene.value(right);
        match scene.value(left) {
            Value::Local { .. } => {
                let (kind, src) = match rv {
                    v if v.is_allocation() => (PagEdgeKind::Address, object_value(scene, right)),
                    Value::Local { .. }
                    | Value::ParameterRef { .. }
                    | Value::ThisRef { .. }
                    | Value::ClosureFieldRef { .. } => (PagEdgeKind::Copy, PagValue::Value(right)),
                    Value::StaticFieldRef { field } => {
                        (PagEdgeKind::Copy, PagValue::StaticField(field.clone()))
                    }
                    Value::Cast { op, .. } if scene.value(*op).is_local() => {
                        (PagEdgeKind::Copy, PagValue::Value(*op))
                    }
                    Value::InstanceFieldRef { base, field } => (
                        PagEdgeKind::Load,
                        self.canonical_ref(refs, *base, FieldKey::of(field), right),
                    ),
                    Value::ArrayRef { base, .. } => (
                        PagEdgeKind::Load,
                        self.canonical_ref(refs, *base, FieldKey::Element, right),
                    ),
                    _ => return Ok(()),
                };
                fp.add_internal_edge(kind, src, PagValue::Value(left), sid);
            }
            Value::InstanceFieldRef { base, field } => {
                if rv.is_local() {
                    let dst = self.canonical_ref(refs, *base, FieldKey::of(field), left);
                    fp.add_internal_edge(PagEdgeKind::Write, PagValue::Value(right), dst, sid);
                }
            }
            Value::ArrayRef { base, .. } => {
                if rv.is_local() {
                    let dst = self.canonical_ref(refs, *base, FieldKey::Element, left);
                    fp.add_internal_edge(PagEdgeKind::Write, PagValue::Value(right), dst, sid);
                }
            }
            Value::StaticFieldRef { field } => {
                let dst = PagValue::StaticField(field.clone());
                if rv.is_local() {
                    fp.add_internal_edge(PagEdgeKind::Copy, PagValue::Value(right), dst, sid);
                } else if rv.is_allocation() {
                    let obj = object_value(scene, right);
                    fp.add_internal_edge(PagEdgeKind::Address, obj, dst, sid);
                }
            }
            Value::ClosureFieldRef { .. } => {
                trace!(stmt = %sid, "Write to a captured variable ignored");
            }
            other => {
                return Err(PtaError::invariant(format!(
                    "statement {} assigns to a non-lvalue {:?}",
                    sid, other
                )))
            }
        }
        Ok(())
    }

    /// One reference value per `(base, field)` within a method
    fn canonical_ref(
        &mut self,
        refs: &mut FxHashMap<(ValueId, FieldKey), ValueId>,
        base: ValueId,
        field: FieldKey,
        value: ValueId,
    ) -> PagValue {
        let canonical = *refs.entry((base, field)).or_insert(value);
        self.pag.record_base_ref(base, canonical);
        PagValue::Value(canonical)
    }

    fn classify_call(&self, fp: &mut FuncPag, sid: StmtId) {
        let scene = self.scene;
        let sites = self.cg.call_sites_by_stmt(sid);
        if !sites.is_empty() {
            for cs in sites {
                fp.add_normal_call_site(cs.clone());
            }
            return;
        }
        match self.cg.dyn_call_site_by_stmt(sid) {
            Some(dyn_cs) => {
                let declared = dyn_cs
                    .potential_callee
                    .and_then(|f| self.cg.method_of(f))
                    .is_some_and(|m| scene.method(m).is_some());
                if declared {
                    fp.add_dynamic_call_site(dyn_cs.clone());
                } else {
                    fp.add_unknown_call_site(dyn_cs.clone());
                }
            }
            None => debug!(stmt = %sid, "Call statement missing from the call graph"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Phase 2: instantiation
    // ═══════════════════════════════════════════════════════════════════════

    /// Instantiates `func` in `cid`. Requests made during another
    /// instantiation are queued and handled before the outermost call returns.
    pub fn build_pag_from_func_pag(&mut self, func: FuncID, cid: ContextID) -> Result<()> {
        self.pending.push_back((func, cid));
        if self.draining {
            return Ok(());
        }
        self.drain_pending()
    }

    /// Instantiates an entry method in its initial context
    pub fn entry(&mut self, func: FuncID) -> Result<ContextID> {
        let cid = self.selector.empty_context(func);
        self.build_pag_from_func_pag(func, cid)?;
        Ok(cid)
    }

    fn drain_pending(&mut self) -> Result<()> {
        self.draining = true;
        let result = self.drain_loop();
        self.draining = false;
        result
    }

    fn drain_loop(&mut self) -> Result<()> {
        while let Some((func, cid)) = self.pending.pop_front() {
            self.instantiate(func, cid)?;
        }
        Ok(())
    }

    fn instantiate(&mut self, func: FuncID, cid: ContextID) -> Result<()> {
        if !self.built.insert((cid, func)) {
            return Ok(());
        }
        self.build_func_pag(func)?;
        let Some(fp) = self.func_pags.get(&func).cloned() else {
            return Ok(());
        };

        for e in fp.internal_edges() {
            let src = self.get_or_new_node(cid, e.src.clone());
            let dst = self.get_or_new_node(cid, e.dst.clone());
            self.add_edge(e.kind, src, dst);
        }
        for free in fp.free_values() {
            self.link_free_value(cid, free)?;
        }
        for cs in fp.normal_call_sites() {
            self.wire_static_call(cid, cs)?;
        }
        for cs in fp.dynamic_call_sites() {
            self.register_dyn_site(cid, cs, SiteRole::Receiver);
        }
        for cs in fp.unknown_call_sites() {
            self.register_dyn_site(cid, cs, SiteRole::Unknown);
        }

        trace!(func, cid, "Method instantiated");
        Ok(())
    }

    fn link_free_value(&mut self, cid: ContextID, free: &FreeValue) -> Result<()> {
        let scene = self.scene;
        let local = self.value_node(cid, free.local);
        match &free.export {
            None => self.link_value(free.decl, local, PagEdgeKind::InterProceduralCopy),
            Some((file, name)) => {
                let export = self.get_or_new_node(
                    DUMMY_CID,
                    PagValue::Export {
                        file: file.clone(),
                        name: name.clone(),
                    },
                );
                self.link_value(free.decl, export, PagEdgeKind::Copy);
                self.add_edge(PagEdgeKind::InterProceduralCopy, export, local);
            }
        }
        // file-scope code that initialises the declaration
        if let Value::Local { method, .. } = scene.value(free.decl) {
            let init = self.func_id_for(method, CallGraphNodeKind::Blank);
            let init_cid = self.selector.empty_context(init);
            self.build_pag_from_func_pag(init, init_cid)?;
        }
        Ok(())
    }

    fn wire_static_call(&mut self, cid: ContextID, cs: &CallSite) -> Result<()> {
        let scene = self.scene;
        let Some(invoke) = scene.invoke_of(cs.call_stmt) else {
            return Ok(());
        };
        let callee_sig = self
            .cg
            .method_of(cs.callee)
            .cloned()
            .ok_or_else(|| PtaError::missing_node(format!("call graph node f{}", cs.callee)))?;
        let def = scene.stmt(cs.call_stmt).def_value();

        if scene.method(&callee_sig).is_some_and(|m| m.has_body()) {
            let mut binding = CallBinding::new(cs.call_stmt, cs.id, cs.caller, cid, cs.callee);
            binding.args = self.arg_nodes(cid, &invoke.args, 0);
            binding.this_src = invoke.base.map(|b| self.value_node(cid, dealias(scene, b)));
            binding.ret_dst = def.map(|d| self.value_node(cid, d));
            self.connect_call(binding)?;
            return Ok(());
        }

        let call = PluginCall {
            stmt: cs.call_stmt,
            caller: cs.caller,
            caller_cid: cid,
            call_site: cs.id,
            callee: &callee_sig,
            invoke,
            def,
        };
        if !self.run_plugins_on_call(&call)? {
            self.record_unhandled(&callee_sig);
        }
        Ok(())
    }

    fn register_dyn_site(&mut self, cid: ContextID, cs: &DynCallSite, role: SiteRole) {
        let Some(base) = self.scene.invoke_of(cs.call_stmt).and_then(|i| i.base) else {
            debug!(stmt = %cs.call_stmt, "Dynamic call without receiver");
            return;
        };
        let node = self.value_node(cid, base);
        self.register_site(
            node,
            SiteRef {
                stmt: cs.call_stmt,
                role,
            },
        );
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Calls
    // ═══════════════════════════════════════════════════════════════════════

    /// Wires a resolved call: arguments to parameters, returns to the result,
    /// the receiver to `this`. Returns the callee's context, or `None` when the
    /// callee has no body.
    pub fn connect_call(&mut self, binding: CallBinding) -> Result<Option<ContextID>> {
        let scene = self.scene;
        let callee_sig = self
            .cg
            .method_of(binding.callee)
            .cloned()
            .ok_or_else(|| PtaError::missing_node(format!("call graph node f{}", binding.callee)))?;
        let Some(method) = scene.method(&callee_sig).filter(|m| m.has_body()) else {
            return Ok(None);
        };

        let callee_cid = if self.is_singleton_function(binding.callee)? {
            DUMMY_CID
        } else {
            self.selector.select_context(
                binding.caller_cid,
                binding.call_site,
                binding.ctx_obj,
                binding.callee,
            )
        };
        self.build_pag_from_func_pag(binding.callee, callee_cid)?;

        let params = scene.param_refs(&callee_sig);
        for &(src, index) in &binding.args {
            if let Some(&(_, param)) = params.iter().find(|(i, _)| *i == index) {
                let dst = self.value_node(callee_cid, param);
                self.add_edge(PagEdgeKind::Copy, src, dst);
            }
        }
        if let Some(spread) = binding.spread_args {
            for &(_, param) in &params {
                let dst = self.value_node(callee_cid, param);
                self.add_edge(PagEdgeKind::Load, spread, dst);
            }
        }
        if let Some(ret_dst) = binding.ret_dst {
            for ret in scene.return_values(&callee_sig) {
                let src = self.value_node(callee_cid, ret);
                self.add_edge(PagEdgeKind::Copy, src, ret_dst);
            }
        }
        if let Some(this_ref) = scene.this_ref(&callee_sig) {
            let this_dst = self.value_node(callee_cid, this_ref);
            if let Some(src) = binding.this_src {
                self.add_edge(PagEdgeKind::This, src, this_dst);
            }
            // arrow functions see the receiver of their enclosing method
            if callee_sig.is_arrow_function() {
                let outer_this = method.outer_method.as_ref().and_then(|o| scene.this_local(o));
                if let Some(outer_this) = outer_this {
                    let outer_cid = binding.func_obj_cid.unwrap_or(binding.caller_cid);
                    let src = self.value_node(outer_cid, outer_this);
                    self.add_edge(PagEdgeKind::This, src, this_dst);
                }
            }
        }

        trace!(
            caller = binding.caller,
            callee = %callee_sig,
            callee_cid,
            args = binding.args.len(),
            "Call connected"
        );
        Ok(Some(callee_cid))
    }

    /// Nodes of the local arguments in `args`, bound to parameter `i + offset`
    pub fn arg_nodes(
        &mut self,
        cid: ContextID,
        args: &[ValueId],
        offset: usize,
    ) -> Vec<(NodeID, usize)> {
        let scene = self.scene;
        args.iter()
            .enumerate()
            .filter(|(_, &a)| scene.value(a).is_local())
            .map(|(i, &a)| (self.value_node(cid, a), i + offset))
            .collect()
    }

    /// A static method whose fresh allocation is both stored in a static field
    /// (or a field of `globalThis`) and returned. Such methods are analysed in
    /// a single context.
    pub fn is_singleton_function(&mut self, func: FuncID) -> Result<bool> {
        if let Some(&known) = self.singletons.get(&func) {
            return Ok(known);
        }
        let scene = self.scene;
        let is_static = self
            .cg
            .method_of(func)
            .and_then(|sig| scene.method(sig))
            .is_some_and(|m| m.is_static && m.has_body());
        let singleton = if is_static {
            self.build_func_pag(func)?;
            self.func_pags
                .get(&func)
                .is_some_and(|fp| returns_shared_allocation(scene, fp))
        } else {
            false
        };
        if singleton {
            debug!(func, "Singleton function analysed context-insensitively");
        }
        self.singletons.insert(func, singleton);
        Ok(singleton)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Plugins
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) fn run_plugins_on_call(&mut self, call: &PluginCall<'_>) -> Result<bool> {
        self.using_plugins(|plugins, builder| plugins.process_call(builder, call))
    }

    pub(crate) fn run_plugins_on_object(
        &mut self,
        call: &PluginCall<'_>,
        role: SiteRole,
        obj: NodeID,
    ) -> Result<bool> {
        self.using_plugins(|plugins, builder| plugins.process_object(builder, call, role, obj))
    }

    /// Runs `f` with the plugin list moved out of the builder. Instantiations
    /// requested by plugins are queued until the plugins are back in place.
    fn using_plugins<R>(
        &mut self,
        f: impl FnOnce(&mut PluginManager, &mut Self) -> Result<R>,
    ) -> Result<R> {
        let mut plugins = std::mem::take(&mut self.plugins);
        let was_draining = std::mem::replace(&mut self.draining, true);
        let result = f(&mut plugins, self);
        self.plugins = plugins;
        self.draining = was_draining;
        let result = result?;
        if !was_draining && !self.pending.is_empty() {
            self.drain_pending()?;
        }
        Ok(result)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Nodes and edges
    // ═══════════════════════════════════════════════════════════════════════

    /// Node of a Scene value in `cid`
    pub fn value_node(&mut self, cid: ContextID, value: ValueId) -> NodeID {
        let key = match self.scene.value(value) {
            Value::GlobalThis => PagValue::GlobalThis,
            Value::StaticFieldRef { field } => PagValue::StaticField(field.clone()),
            _ => PagValue::Value(value),
        };
        self.get_or_new_node(cid, key)
    }

    /// Node of `(cid, value)`; shared values are moved to their fixed context
    pub fn get_or_new_node(&mut self, cid: ContextID, value: PagValue) -> NodeID {
        let cid = self.node_context(cid, &value);
        if let Some(id) = self.pag.get_node(cid, &value) {
            return id;
        }
        let kind = self.node_kind(cid, &value);
        let (id, is_new) = self.pag.add_node(cid, value, kind);
        if is_new {
            self.on_new_node(id);
        }
        id
    }

    /// Node with an explicit kind, for plugin-owned nodes
    pub fn new_node_with_kind(
        &mut self,
        cid: ContextID,
        value: PagValue,
        kind: PagNodeKind,
    ) -> NodeID {
        let (id, is_new) = self.pag.add_node(cid, value, kind);
        if is_new {
            self.on_new_node(id);
        }
        id
    }

    /// Concrete field node of an object
    pub fn field_node(&mut self, obj: NodeID, field: FieldKey, clone_of: Option<NodeID>) -> NodeID {
        let cid = self.pag.field_context(obj);
        let value = PagValue::ObjField {
            obj,
            field: field.clone(),
        };
        if let Some(id) = self.pag.get_node(cid, &value) {
            return id;
        }
        let kind = PagNodeKind::RefVar {
            base: Some(obj),
            field,
            clone_of,
        };
        self.pag.add_node(cid, value, kind).0
    }

    /// Adds an edge and logs it for the solver; false for duplicates
    pub fn add_edge(&mut self, kind: PagEdgeKind, src: NodeID, dst: NodeID) -> bool {
        if !self.pag.add_edge(kind, src, dst) {
            return false;
        }
        self.new_edges.push((src, dst, kind));
        true
    }

    /// Ties a call site to a node and logs it for the solver
    pub fn register_site(&mut self, node: NodeID, site: SiteRef) -> bool {
        if !self.pag.register_site(node, site) {
            return false;
        }
        self.new_sites.push((node, site));
        true
    }

    /// Adds `node -> target` for every node of `value`, now and later
    fn link_value(&mut self, value: ValueId, target: NodeID, kind: PagEdgeKind) {
        let links = self.value_links.entry(value).or_default();
        if links.contains(&(target, kind)) {
            return;
        }
        links.push((target, kind));
        let existing = self.pag.nodes_of_value(value).to_vec();
        for node in existing {
            self.add_edge(kind, node, target);
        }
    }

    fn node_context(&self, cid: ContextID, value: &PagValue) -> ContextID {
        match value {
            PagValue::StaticField(_) | PagValue::GlobalThis | PagValue::Export { .. } => DUMMY_CID,
            PagValue::ObjField { obj, .. } => self.pag.field_context(*obj),
            _ => cid,
        }
    }

    fn node_kind(&mut self, cid: ContextID, value: &PagValue) -> PagNodeKind {
        let scene = self.scene;
        match value {
            PagValue::Value(v) => match scene.value(*v) {
                Value::ParameterRef { index, .. } => PagNodeKind::Param { index: *index },
                Value::ThisRef { .. } => PagNodeKind::ThisRef,
                Value::NewObject { class } => PagNodeKind::HeapObj {
                    class: Some(class.clone()),
                    container: ContainerKind::of_class(class),
                },
                Value::NewArray { .. } => PagNodeKind::HeapObj {
                    class: None,
                    container: Some(ContainerKind::Array),
                },
                Value::FunctionRef { method } => {
                    let func = self.func_id_for(method, CallGraphNodeKind::Blank);
                    PagNodeKind::Function(FunctionObject::new(method.clone(), Some(func)))
                }
                Value::GlobalThis => PagNodeKind::GlobalThis,
                Value::InstanceFieldRef { base, field } => PagNodeKind::RefVar {
                    base: Some(self.value_node(cid, *base)),
                    field: FieldKey::of(field),
                    clone_of: None,
                },
                Value::ArrayRef { base, .. } => PagNodeKind::RefVar {
                    base: Some(self.value_node(cid, *base)),
                    field: FieldKey::Element,
                    clone_of: None,
                },
                Value::StaticFieldRef { field } => PagNodeKind::RefVar {
                    base: None,
                    field: FieldKey::of(field),
                    clone_of: None,
                },
                Value::ClosureFieldRef { field_name, .. } => PagNodeKind::RefVar {
                    base: None,
                    field: FieldKey::Named(field_name.clone()),
                    clone_of: None,
                },
                _ => PagNodeKind::LocalVar,
            },
            PagValue::StaticField(field) => PagNodeKind::RefVar {
                base: None,
                field: FieldKey::of(field),
                clone_of: None,
            },
            PagValue::ObjField { obj, field } => PagNodeKind::RefVar {
                base: Some(*obj),
                field: field.clone(),
                clone_of: None,
            },
            PagValue::GlobalThis => PagNodeKind::GlobalThis,
            PagValue::Export { .. } => PagNodeKind::ExportInfo,
            PagValue::SdkReturn(_) => PagNodeKind::HeapObj {
                class: None,
                container: None,
            },
            PagValue::BoundFunction { .. } | PagValue::Synthetic { .. } => PagNodeKind::LocalVar,
        }
    }

    fn on_new_node(&mut self, id: NodeID) {
        let Some(PagValue::Value(v)) = self.pag.node(id).map(|n| n.value.clone()) else {
            return;
        };
        let scene = self.scene;
        if let Value::ClosureFieldRef { base, field_name } = scene.value(v) {
            match captured_local(scene, *base, field_name) {
                Some(captured) => self.link_value(captured, id, PagEdgeKind::InterProceduralCopy),
                None => debug!(
                    env = %base,
                    name = %field_name,
                    "Captured variable not found in lexical env"
                ),
            }
        }
        if let Some(links) = self.value_links.get(&v).cloned() {
            for (target, kind) in links {
                self.add_edge(kind, id, target);
            }
        }
    }
}

impl std::fmt::Debug for PagBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagBuilder")
            .field("nodes", &self.pag.node_count())
            .field("edges", &self.pag.total_edge_count())
            .field("func_pags", &self.func_pags.len())
            .field("instantiations", &self.built.len())
            .field("plugins", &self.plugins)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn object_value(scene: &Scene, value: ValueId) -> PagValue {
    match scene.value(value) {
        Value::GlobalThis => PagValue::GlobalThis,
        _ => PagValue::Value(value),
    }
}

/// Follows `a = b` chains of single-definition locals back to their source
pub(crate) fn dealias(scene: &Scene, value: ValueId) -> ValueId {
    let mut current = value;
    let mut seen = FxHashSet::default();
    while seen.insert(current) {
        let [sid] = scene.defining_stmts(current) else {
            break;
        };
        match &scene.stmt(*sid).kind {
            StmtKind::Assign { right, .. } if scene.value(*right).is_local() => current = *right,
            _ => break,
        }
    }
    current
}

fn free_value(scene: &Scene, local: ValueId) -> Option<FreeValue> {
    let decl = scene.resolve_free_local(local)?;
    let Value::Local { name, method, .. } = scene.value(local) else {
        return None;
    };
    let Value::Local { method: decl_method, .. } = scene.value(decl) else {
        return None;
    };
    let export = if decl_method.class.file == method.class.file {
        None
    } else {
        scene
            .file(&method.class.file)?
            .imports
            .iter()
            .find(|i| &i.local_name == name)
            .map(|i| (i.from.clone(), i.imported_name.clone()))
    };
    Some(FreeValue { local, decl, export })
}

/// Outer local captured by `env` under `name`
fn captured_local(scene: &Scene, env: ValueId, name: &str) -> Option<ValueId> {
    let ArkType::LexicalEnv(env_ty) = scene.value(env).ty() else {
        return None;
    };
    env_ty
        .closures
        .iter()
        .copied()
        .find(|&c| scene.value(c).local_name() == Some(name))
}

fn is_global_this_local(scene: &Scene, local: ValueId) -> bool {
    scene.value(local).local_name() == Some(names::GLOBAL_THIS)
        || scene.defining_stmts(local).iter().any(|&sid| {
            matches!(
                &scene.stmt(sid).kind,
                StmtKind::Assign { right, .. } if matches!(scene.value(*right), Value::GlobalThis)
            )
        })
}

fn is_shared_slot(value: &PagValue) -> bool {
    matches!(value, PagValue::StaticField(_))
        || matches!(value, PagValue::Synthetic { owner, .. } if *owner == names::GLOBAL_THIS)
}

/// Whether one fresh allocation of the method is both stored in a shared slot
/// and returned, following its intra-procedural edges. Each allocation is
/// traced on its own so that a cached object and a separately returned one do
/// not combine.
fn returns_shared_allocation(scene: &Scene, fp: &FuncPag) -> bool {
    let slot = |value: &PagValue| -> PagValue {
        if let PagValue::Value(v) = value {
            if let Value::InstanceFieldRef { base, field } = scene.value(*v) {
                if is_global_this_local(scene, *base) {
                    return PagValue::Synthetic {
                        owner: names::GLOBAL_THIS,
                        key: field.name.clone(),
                    };
                }
            }
        }
        value.clone()
    };

    let mut succ: FxHashMap<PagValue, Vec<PagValue>> = FxHashMap::default();
    let mut allocations: Vec<PagValue> = Vec::new();
    for e in fp.internal_edges() {
        let (src, dst) = (slot(&e.src), slot(&e.dst));
        match e.kind {
            PagEdgeKind::Address => {
                let fresh = match &e.src {
                    PagValue::Value(v) => matches!(scene.value(*v), Value::NewObject { .. }),
                    _ => false,
                };
                if fresh {
                    allocations.push(dst);
                }
            }
            PagEdgeKind::Copy | PagEdgeKind::InterProceduralCopy => {
                succ.entry(src).or_default().push(dst)
            }
            PagEdgeKind::Write if is_shared_slot(&dst) => succ.entry(src).or_default().push(dst),
            PagEdgeKind::Load if is_shared_slot(&src) => succ.entry(src).or_default().push(dst),
            _ => {}
        }
    }

    let returns: FxHashSet<PagValue> =
        fp.return_values().iter().map(|&r| PagValue::Value(r)).collect();
    allocations.into_iter().any(|target| {
        let mut reached: FxHashSet<PagValue> = FxHashSet::default();
        let mut stack = vec![target];
        while let Some(v) = stack.pop() {
            if !reached.insert(v.clone()) {
                continue;
            }
            if let Some(next) = succ.get(&v) {
                stack.extend(next.iter().cloned());
            }
        }
        reached.iter().any(is_shared_slot) && reached.iter().any(|v| returns.contains(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::call_graph::infrastructure::CallGraphBuilder;
    use crate::shared::models::{ClassSignature, SceneBuilder};
    use pretty_assertions::assert_eq;

    fn builder_for(scene: &Scene) -> PagBuilder<'_> {
        let mut cg = CallGraph::new();
        CallGraphBuilder::new(&mut cg, scene).build_direct_call_graph_for_scene();
        PagBuilder::new(scene, cg, &ValidatedPtaConfig::default())
    }

    fn class_type(c: &ClassSignature) -> ArkType {
        ArkType::Class(c.clone())
    }

    #[test]
    fn test_func_pag_edge_kinds() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let main = sb.default_method(&file);
        sb.body(&main, |bb| {
            let x = bb.local("x", class_type(&a));
            let y = bb.local("y", class_type(&a));
            let z = bb.local("z", class_type(&a));
            bb.assign_new(x, &a);
            bb.assign(y, x);
            bb.store_field(y, "f", x);
            bb.load_field(z, y, "f");
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);
        let func = builder.call_graph().func_id(&main).unwrap();

        assert!(builder.build_func_pag(func).unwrap());
        assert!(!builder.build_func_pag(func).unwrap());

        let fp = builder.func_pag(func).unwrap();
        assert_eq!(fp.edge_count(PagEdgeKind::Address), 1);
        assert_eq!(fp.edge_count(PagEdgeKind::Copy), 1);
        assert_eq!(fp.edge_count(PagEdgeKind::Write), 1);
        assert_eq!(fp.edge_count(PagEdgeKind::Load), 1);

        // y.f is written and read through the same reference
        let write = fp.internal_edges().iter().find(|e| e.kind == PagEdgeKind::Write).unwrap();
        let load = fp.internal_edges().iter().find(|e| e.kind == PagEdgeKind::Load).unwrap();
        assert_eq!(write.dst, load.src);
    }

    #[test]
    fn test_non_lvalue_assignment_is_rejected() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let main = sb.default_method(&file);
        sb.body(&main, |bb| {
            let c = bb.constant("1", ArkType::primitive("number"));
            let x = bb.local("x", ArkType::Any);
            bb.assign(c, x);
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);
        let func = builder.call_graph().func_id(&main).unwrap();

        let err = builder.build_func_pag(func).unwrap_err();
        assert!(matches!(err, PtaError::InvariantViolation(_)));
    }

    #[test]
    fn test_unknown_func_is_missing_node() {
        let scene = SceneBuilder::new("p").build();
        let mut builder = builder_for(&scene);
        assert!(matches!(builder.build_func_pag(42), Err(PtaError::MissingNode(_))));
    }

    #[test]
    fn test_instantiation_is_memoized_per_context() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let main = sb.default_method(&file);
        sb.body(&main, |bb| {
            let x = bb.local("x", class_type(&a));
            bb.assign_new(x, &a);
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);
        let func = builder.call_graph().func_id(&main).unwrap();

        builder.build_pag_from_func_pag(func, DUMMY_CID).unwrap();
        let edges = builder.take_new_edges();
        builder.build_pag_from_func_pag(func, DUMMY_CID).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(builder.take_new_edges().is_empty());
        assert_eq!(builder.instantiation_count(), 1);
        assert_eq!(builder.reached_funcs(), vec![func]);
    }

    #[test]
    fn test_static_call_binds_args_and_returns() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let id = sb.add_function(&file, "id");
        sb.body(&id, |bb| {
            let p = bb.param(0, "p", class_type(&a));
            bb.ret(Some(p));
        });
        let main = sb.default_method(&file);
        let (x, y) = sb.body(&main, |bb| {
            let x = bb.local("x", class_type(&a));
            let y = bb.local("y", class_type(&a));
            bb.assign_new(x, &a);
            bb.call_static(Some(y), &id, &[x]);
            (x, y)
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);
        let main_id = builder.call_graph().func_id(&main).unwrap();
        let cid = builder.entry(main_id).unwrap();

        let x_node = builder.pag().get_node(cid, &PagValue::Value(x)).unwrap();
        let y_node = builder.pag().get_node(cid, &PagValue::Value(y)).unwrap();
        let pag = builder.pag();
        let copy_targets = pag.node(x_node).unwrap().out_edges(PagEdgeKind::Copy);
        assert_eq!(copy_targets.len(), 1);
        assert!(matches!(pag.node(copy_targets[0]).unwrap().kind, PagNodeKind::Param { index: 0 }));
        assert_eq!(pag.node(y_node).unwrap().in_edges(PagEdgeKind::Copy).len(), 1);
        assert_eq!(builder.reached_funcs().len(), 2);
    }

    #[test]
    fn test_bodiless_calls_go_through_the_plugin_list() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let main = sb.default_method(&file);
        let get = MethodSignature::builtin("AppStorage", "get");
        sb.body(&main, |bb| {
            let key = bb.constant("'theme'", ArkType::primitive("string"));
            let x = bb.local("x", ArkType::Any);
            bb.call_static(Some(x), &get, &[key]);
        });
        let scene = sb.build();

        let mut standard = builder_for(&scene);
        let main_id = standard.call_graph().func_id(&main).unwrap();
        standard.entry(main_id).unwrap();
        assert_eq!(standard.unhandled_funcs().count(), 0);

        let mut bare = builder_for(&scene).with_plugins(PluginManager::default());
        bare.entry(main_id).unwrap();
        assert_eq!(bare.unhandled_funcs().cloned().collect::<Vec<_>>(), vec![get]);
    }

    #[test]
    fn test_singleton_detection() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let get = sb.add_static_method(&a, "getInstance");
        sb.body(&get, |bb| {
            let x = bb.local("x", class_type(&a));
            bb.assign_new(x, &a);
            bb.store_static(&a, "instance", x);
            bb.ret(Some(x));
        });
        let make = sb.add_static_method(&a, "make");
        sb.body(&make, |bb| {
            let x = bb.local("x", class_type(&a));
            bb.assign_new(x, &a);
            bb.ret(Some(x));
        });
        // caches one object but returns another
        let cache_and_make = sb.add_static_method(&a, "cacheAndMake");
        sb.body(&cache_and_make, |bb| {
            let x = bb.local("x", class_type(&a));
            let y = bb.local("y", class_type(&a));
            bb.assign_new(x, &a);
            bb.store_static(&a, "cache", x);
            bb.assign_new(y, &a);
            bb.ret(Some(y));
        });
        // returns the cached object read back from the static field
        let cached = sb.add_static_method(&a, "cached");
        sb.body(&cached, |bb| {
            let x = bb.local("x", class_type(&a));
            let y = bb.local("y", class_type(&a));
            bb.assign_new(x, &a);
            bb.store_static(&a, "current", x);
            bb.load_static(y, &a, "current");
            bb.ret(Some(y));
        });
        let via_global = sb.add_function(&file, "shared");
        sb.body(&via_global, |bb| {
            let g = bb.local("g", ArkType::Any);
            let x = bb.local("x", class_type(&a));
            bb.assign_global_this(g);
            bb.assign_new(x, &a);
            bb.store_field(g, "inst", x);
            bb.ret(Some(x));
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);

        let get_id = builder.call_graph().func_id(&get).unwrap();
        let make_id = builder.call_graph().func_id(&make).unwrap();
        let global_id = builder.call_graph().func_id(&via_global).unwrap();
        assert!(builder.is_singleton_function(get_id).unwrap());
        assert!(!builder.is_singleton_function(make_id).unwrap());
        assert!(builder.is_singleton_function(global_id).unwrap());

        let cache_and_make_id = builder.call_graph().func_id(&cache_and_make).unwrap();
        let cached_id = builder.call_graph().func_id(&cached).unwrap();
        assert!(!builder.is_singleton_function(cache_and_make_id).unwrap());
        assert!(builder.is_singleton_function(cached_id).unwrap());
    }

    #[test]
    fn test_free_local_links_to_file_scope_declaration() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let main = sb.default_method(&file);
        let f = sb.add_function(&file, "f");
        let inner = sb.body(&f, |bb| {
            let shared = bb.local("shared", class_type(&a));
            let y = bb.local("y", class_type(&a));
            bb.assign(y, shared);
            shared
        });
        let decl = sb.body(&main, |bb| {
            let shared = bb.local("shared", class_type(&a));
            bb.assign_new(shared, &a);
            bb.call_static(None, &f, &[]);
            shared
        });
        let scene = sb.build();
        let mut builder = builder_for(&scene);
        let main_id = builder.call_graph().func_id(&main).unwrap();
        builder.entry(main_id).unwrap();

        let pag = builder.pag();
        let decl_node = pag.nodes_of_value(decl)[0];
        let inner_node = pag.nodes_of_value(inner)[0];
        assert!(pag.has_edge(PagEdgeKind::InterProceduralCopy, decl_node, inner_node));
    }

    #[test]
    fn test_dealias_follows_single_copies() {
        let mut sb = SceneBuilder::new("p");
        let file = sb.add_file("a.ts");
        let a = sb.add_class(&file, "A", None);
        let main = sb.default_method(&file);
        let (x, z) = sb.body(&main, |bb| {
            let x = bb.local("x", class_type(&a));
            let y = bb.local("y", class_type(&a));
            let z = bb.local("z", class_type(&a));
            bb.assign_new(x, &a);
            bb.assign(y, x);
            bb.assign(z, y);
            (x, z)
        });
        let scene = sb.build();
        assert_eq!(dealias(&scene, z), x);
        assert_eq!(dealias(&scene, x), x);
    }
}
