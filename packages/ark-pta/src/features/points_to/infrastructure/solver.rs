//! Inclusion-based worklist solver with on-the-fly call resolution
//!
//! # Algorithm
//! ```text
//! instantiate entries
//! loop:
//!   seed the worklist from the edges added since the last round
//!   propagate diff sets until the worklist is empty
//!   resolve dynamic calls for the objects that reached their receivers
//!   stop when a round adds no edge and resolves nothing
//! ```
//!
//! Points-to sets are kept in a [`DiffPTData`]: only the objects a node has not
//! yet forwarded are pushed along its edges.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use super::pag_builder::{dealias, CallBinding, PagBuilder};
use super::plugins::PluginCall;
use crate::config::{AnalysisScale, ValidatedPtaConfig};
use crate::errors::{PtaError, Result};
use crate::features::call_graph::domain::{CallGraph, CallGraphNodeKind, CallKind, FuncID};
use crate::features::call_graph::infrastructure::abstract_analysis::is_super_receiver;
use crate::features::call_graph::infrastructure::CallGraphBuilder;
use crate::features::points_to::domain::{
    ContextID, DiffPTData, FunctionObject, NodeID, Pag, PagEdgeKind, PagNodeKind, PagValue,
    PointsToSet, PtsSet, SiteRef, SiteRole,
};
use crate::shared::models::{
    ArkType, ClassSignature, InvokeExpr, InvokeKind, MethodSignature, Scene, Value,
};

/// Statistics of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PtaStats {
    pub address_edges: usize,
    pub copy_edges: usize,
    pub load_edges: usize,
    pub write_edges: usize,
    pub this_edges: usize,
    pub inter_procedural_edges: usize,
    pub nodes: usize,
    pub contexts: usize,
    pub reached_methods: usize,
    pub call_graph_edges: usize,
    pub iterations: usize,
    pub propagations: usize,
    pub dyn_calls_resolved: usize,
    pub unhandled_funcs: usize,
    pub duration_ms: f64,
}

/// Target of a dynamic call for one receiver object
enum Resolution {
    Method(MethodSignature, Option<FunctionObject>),
    Plugins,
}

pub struct PointerAnalysis<'a> {
    scene: &'a Scene,
    config: ValidatedPtaConfig,
    builder: PagBuilder<'a>,
    pt_data: DiffPTData<NodeID, PtsSet>,
    worklist: VecDeque<NodeID>,
    /// Objects newly propagated to nodes with related call sites
    pending_objs: Vec<(NodeID, Vec<NodeID>)>,
    stats: PtaStats,
}

impl<'a> PointerAnalysis<'a> {
    /// Analysis over the direct call graph of the whole Scene
    pub fn new(scene: &'a Scene, config: ValidatedPtaConfig) -> Self {
        let mut cg = CallGraph::new();
        CallGraphBuilder::new(&mut cg, scene).build_direct_call_graph_for_scene();
        Self::with_call_graph(scene, cg, config)
    }

    /// Analysis over a prebuilt call graph; static call sites must already be
    /// recorded in it
    pub fn with_call_graph(scene: &'a Scene, cg: CallGraph, config: ValidatedPtaConfig) -> Self {
        let builder = PagBuilder::new(scene, cg, &config);
        let pt_data = DiffPTData::new(PtsSet::new(config.pts_backing()));
        Self {
            scene,
            config,
            builder,
            pt_data,
            worklist: VecDeque::new(),
            pending_objs: Vec::new(),
            stats: PtaStats::default(),
        }
    }

    pub fn set_entries(&mut self, entries: &[MethodSignature]) -> Vec<FuncID> {
        let scene = self.scene;
        CallGraphBuilder::new(self.builder.call_graph_mut(), scene).set_entries(entries)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn scene(&self) -> &'a Scene {
        self.scene
    }

    pub fn config(&self) -> &ValidatedPtaConfig {
        &self.config
    }

    pub fn pag(&self) -> &Pag {
        self.builder.pag()
    }

    pub fn call_graph(&self) -> &CallGraph {
        self.builder.call_graph()
    }

    pub fn builder(&self) -> &PagBuilder<'a> {
        &self.builder
    }

    pub fn stats(&self) -> &PtaStats {
        &self.stats
    }

    /// Bodiless callees that no plugin modelled
    pub fn unhandled_funcs(&self) -> Vec<MethodSignature> {
        self.builder.unhandled_funcs().cloned().collect()
    }

    /// Human-readable context, e.g. `[cs3->f2]`
    pub fn describe_context(&self, cid: ContextID) -> String {
        self.builder.selector().table().describe(cid)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Driver
    // ═══════════════════════════════════════════════════════════════════════

    /// Runs the analysis to its fixpoint
    pub fn start(&mut self) -> Result<()> {
        let start = Instant::now();
        let entries = self.call_graph().entries().to_vec();
        if entries.is_empty() {
            warn!("Pointer analysis started without entry methods");
        }
        for func in entries {
            let cid = self.builder.entry(func)?;
            debug!(func, cid, "Entry instantiated");
        }

        loop {
            self.stats.iterations += 1;
            let seeded = self.init_worklist();
            self.solve_worklist()?;

            let resolve = self.config.analysis_scale() == AnalysisScale::WholeProgram
                || self.stats.iterations == 1;
            let discovered = if resolve {
                self.on_the_fly()?
            } else {
                self.pending_objs.clear();
                self.builder.take_new_sites();
                false
            };
            trace!(iteration = self.stats.iterations, seeded, discovered, "Round finished");
            if !seeded && !discovered {
                break;
            }
        }

        self.collect_stats(start);
        info!(
            nodes = self.stats.nodes,
            reached_methods = self.stats.reached_methods,
            call_graph_edges = self.stats.call_graph_edges,
            iterations = self.stats.iterations,
            duration_ms = self.stats.duration_ms,
            "Pointer analysis finished"
        );

        if self.config.dump().is_enabled() {
            super::dump::write_dumps(self)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Worklist seeding
    // ═══════════════════════════════════════════════════════════════════════

    /// Seeds the worklist from the edges added since the last round; returns
    /// whether there were any
    fn init_worklist(&mut self) -> bool {
        let edges = self.builder.take_new_edges();
        for &(src, dst, kind) in &edges {
            match kind {
                PagEdgeKind::Address => {
                    if self.pt_data.add_pts(dst, src) {
                        self.worklist.push_back(dst);
                    }
                }
                PagEdgeKind::Load => {
                    if let Some(base) = self.ref_base(src) {
                        self.reseed(base);
                    }
                }
                PagEdgeKind::Write => {
                    if let Some(base) = self.ref_base(dst) {
                        self.reseed(base);
                    }
                }
                _ => self.reseed(src),
            }
        }
        !edges.is_empty()
    }

    fn ref_base(&self, node: NodeID) -> Option<NodeID> {
        self.pag().node(node).and_then(|n| n.ref_field()).and_then(|(base, _)| base)
    }

    /// Re-propagates everything `node` already holds
    fn reseed(&mut self, node: NodeID) {
        self.pt_data.reset_elem(node);
        if self.pt_data.has_diff(node) {
            self.worklist.push_back(node);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Propagation
    // ═══════════════════════════════════════════════════════════════════════

    fn solve_worklist(&mut self) -> Result<()> {
        while let Some(node) = self.worklist.pop_front() {
            if !self.pt_data.has_diff(node) {
                continue;
            }
            self.handle_this(node);
            self.handle_load_write(node)?;
            self.handle_copy(node);
            self.handle_pt(node)?;
        }
        Ok(())
    }

    fn diff_of(&self, node: NodeID) -> Option<PtsSet> {
        self.pt_data.get_diff_pts(node).filter(|d| !d.is_empty()).cloned()
    }

    /// Receivers flow into `this` only when their class fits the method's class
    fn handle_this(&mut self, node: NodeID) {
        let targets = match self.pag().node(node) {
            Some(n) => n.out_edges(PagEdgeKind::This).to_vec(),
            None => return,
        };
        if targets.is_empty() {
            return;
        }
        let Some(diff) = self.diff_of(node) else {
            return;
        };
        for dst in targets {
            let mut accepted = diff.clone();
            for obj in diff.iter() {
                if !self.fits_this(obj, dst) {
                    accepted.remove(obj);
                }
            }
            self.stats.propagations += 1;
            if self.pt_data.union_pts_to(dst, &mut accepted) {
                self.worklist.push_back(dst);
            }
        }
    }

    fn fits_this(&self, obj: NodeID, this_node: NodeID) -> bool {
        let scene = self.scene;
        let this_class = match self.pag().node(this_node).map(|n| &n.value) {
            Some(PagValue::Value(v)) => match scene.value(*v) {
                Value::ThisRef { ty: ArkType::Class(c) } => c.clone(),
                _ => return true,
            },
            _ => return true,
        };
        match self.pag().node(obj).map(|n| &n.kind) {
            Some(PagNodeKind::HeapObj { class: Some(c), .. }) => {
                scene.class(c).is_none()
                    || scene.class(&this_class).is_none()
                    || scene.is_sub_class_of(c, &this_class)
            }
            _ => true,
        }
    }

    /// Materializes the field nodes of newly reached objects for every field
    /// reference based on `node`
    fn handle_load_write(&mut self, node: NodeID) -> Result<()> {
        let refs = match self.pag().node(node) {
            Some(n) => n.ref_nodes().to_vec(),
            None => return Err(PtaError::missing_node(format!("n{}", node))),
        };
        if refs.is_empty() {
            return Ok(());
        }
        let Some(diff) = self.diff_of(node) else {
            return Ok(());
        };

        for obj in diff.to_sorted_vec() {
            if !self.pag().node(obj).is_some_and(|n| n.kind.is_object()) {
                continue;
            }
            for &r in &refs {
                let (field, loads, writes) = match self.pag().node(r) {
                    Some(n) => match n.ref_field() {
                        Some((_, field)) => (
                            field.clone(),
                            n.out_edges(PagEdgeKind::Load).to_vec(),
                            n.in_edges(PagEdgeKind::Write).to_vec(),
                        ),
                        None => continue,
                    },
                    None => return Err(PtaError::missing_node(format!("n{}", r))),
                };
                let field_node = self.builder.field_node(obj, field, Some(r));
                for dst in loads {
                    if self.builder.pag_mut().add_edge(PagEdgeKind::Copy, field_node, dst) {
                        self.stats.propagations += 1;
                        if self.pt_data.union_pts(dst, field_node) {
                            self.worklist.push_back(dst);
                        }
                    }
                }
                for src in writes {
                    if self.builder.pag_mut().add_edge(PagEdgeKind::Copy, src, field_node) {
                        self.stats.propagations += 1;
                        if self.pt_data.union_pts(field_node, src) {
                            self.worklist.push_back(field_node);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_copy(&mut self, node: NodeID) {
        let targets: Vec<NodeID> = match self.pag().node(node) {
            Some(n) => n
                .out_edges(PagEdgeKind::Copy)
                .iter()
                .chain(n.out_edges(PagEdgeKind::InterProceduralCopy))
                .copied()
                .collect(),
            None => return,
        };
        if targets.is_empty() {
            return;
        }
        let Some(diff) = self.diff_of(node) else {
            return;
        };
        for dst in targets {
            let mut pts = diff.clone();
            self.stats.propagations += 1;
            if self.pt_data.union_pts_to(dst, &mut pts) {
                self.worklist.push_back(dst);
            }
        }
    }

    /// Moves the diff set into the propagated set and exposes it on the node
    fn handle_pt(&mut self, node: NodeID) -> Result<()> {
        let Some(diff) = self.diff_of(node) else {
            return Ok(());
        };
        self.pt_data.flush(node);
        let n = self
            .builder
            .pag_mut()
            .node_mut(node)
            .ok_or_else(|| PtaError::missing_node(format!("n{}", node)))?;
        n.pts_mut().union_with(&diff);
        if !n.related_sites().is_empty() {
            self.pending_objs.push((node, diff.to_sorted_vec()));
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // On-the-fly call resolution
    // ═══════════════════════════════════════════════════════════════════════

    /// Resolves the call sites reached by new objects; returns whether the
    /// PAG grew
    fn on_the_fly(&mut self) -> Result<bool> {
        let pending = std::mem::take(&mut self.pending_objs);
        for (node, objs) in pending {
            let sites = match self.pag().node(node) {
                Some(n) => n.related_sites().to_vec(),
                None => continue,
            };
            for site in sites {
                for &obj in &objs {
                    self.process_site(node, site, obj)?;
                }
            }
        }

        // sites registered on nodes that already hold objects
        for (node, site) in self.builder.take_new_sites() {
            let objs = match self.pag().node(node) {
                Some(n) => n.pts().to_sorted_vec(),
                None => continue,
            };
            for obj in objs {
                self.process_site(node, site, obj)?;
            }
        }

        Ok(self.builder.has_new_edges() || self.builder.has_new_sites())
    }

    fn process_site(&mut self, node: NodeID, site: SiteRef, obj: NodeID) -> Result<()> {
        let scene = self.scene;
        let stmt = site.stmt;
        let Some(invoke) = scene.invoke_of(stmt) else {
            return Ok(());
        };
        let caller_cid = self
            .pag()
            .node(node)
            .map(|n| n.cid)
            .ok_or_else(|| PtaError::missing_node(format!("n{}", node)))?;
        let caller_sig = &scene.stmt(stmt).method;
        let caller = self.builder.func_id_for(caller_sig, CallGraphNodeKind::Blank);
        let cg = self.call_graph();
        let call_site = cg
            .dyn_call_site_by_stmt(stmt)
            .map(|d| d.id)
            .or_else(|| cg.call_sites_by_stmt(stmt).first().map(|c| c.id))
            .unwrap_or_default();
        let def = scene.stmt(stmt).def_value();

        let call = PluginCall {
            stmt,
            caller,
            caller_cid,
            call_site,
            callee: &invoke.method,
            invoke,
            def,
        };

        if let SiteRole::Arg(index) = site.role {
            if !self.builder.run_plugins_on_object(&call, site.role, obj)? {
                self.invoke_callback(&call, index, obj)?;
            }
            return Ok(());
        }

        match self.resolve(invoke, obj) {
            Resolution::Method(sig, fo) => {
                if scene.method(&sig).is_some_and(|m| m.has_body()) {
                    return self.call_resolved(&call, node, obj, &sig, fo);
                }
                let resolved = PluginCall { callee: &sig, ..call };
                if !self.builder.run_plugins_on_object(&resolved, site.role, obj)? {
                    self.builder.record_unhandled(&sig);
                }
                Ok(())
            }
            Resolution::Plugins => {
                if self.builder.run_plugins_on_object(&call, site.role, obj)? {
                    return Ok(());
                }
                self.builder.record_unhandled(&invoke.method);
                // function arguments of an unmodelled call may still run
                for index in 0..invoke.args.len() {
                    let Some(arg) = call.local_arg(scene, index) else {
                        continue;
                    };
                    let arg_node = self.builder.value_node(caller_cid, arg);
                    self.builder.register_site(
                        arg_node,
                        SiteRef {
                            stmt,
                            role: SiteRole::Arg(index),
                        },
                    );
                }
                Ok(())
            }
        }
    }

    fn resolve(&self, invoke: &InvokeExpr, obj: NodeID) -> Resolution {
        let scene = self.scene;
        let declared = &invoke.method;
        match (invoke.kind, self.pag().node(obj).map(|n| &n.kind)) {
            (InvokeKind::Pointer, Some(PagNodeKind::Function(fo))) => {
                Resolution::Method(fo.method.clone(), Some(fo.clone()))
            }
            (InvokeKind::Instance, Some(PagNodeKind::HeapObj { class: Some(class), .. })) => {
                let lookup =
                    |owner: &ClassSignature| scene.find_method_in_chain(owner, &declared.name);
                // `super.m()` binds to the statically named class, constructors prefer it
                let target = if is_super_receiver(scene, invoke.base) {
                    lookup(&declared.class)
                } else if declared.is_constructor() {
                    lookup(&declared.class).or_else(|| lookup(class))
                } else {
                    lookup(class)
                };
                match target {
                    Some(m) => Resolution::Method(m.clone(), None),
                    None => Resolution::Plugins,
                }
            }
            _ => Resolution::Plugins,
        }
    }

    fn call_resolved(
        &mut self,
        call: &PluginCall<'_>,
        node: NodeID,
        obj: NodeID,
        sig: &MethodSignature,
        fo: Option<FunctionObject>,
    ) -> Result<()> {
        let scene = self.scene;
        let callee = match fo.as_ref().and_then(|f| f.func) {
            Some(f) => f,
            None => self.builder.func_id_for(sig, CallGraphNodeKind::Virtual),
        };
        let cg = self.builder.call_graph_mut();
        let recursive = callee == call.caller || cg.reachable(callee, call.caller);
        if cg.add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect) {
            self.stats.dyn_calls_resolved += 1;
        }
        if recursive {
            debug!(
                caller = call.caller,
                callee,
                stmt = %call.stmt,
                "Recursive dynamic call not expanded"
            );
            return Ok(());
        }

        let cid = call.caller_cid;
        let mut binding = CallBinding::new(call.stmt, call.call_site, call.caller, cid, callee);
        binding.ctx_obj = Some(obj);
        let offset = match &fo {
            Some(f) => {
                binding.args = f.bound_args.clone();
                binding.this_src = f.this_pt;
                binding.func_obj_cid = self.pag().node(obj).map(|n| n.cid);
                f.arg_offset
            }
            None => {
                let receiver = match call.invoke.base {
                    Some(base) => self.builder.value_node(cid, dealias(scene, base)),
                    None => node,
                };
                binding.this_src = Some(receiver);
                0
            }
        };
        let args = self.builder.arg_nodes(cid, &call.invoke.args, offset);
        binding.args.extend(args);
        binding.ret_dst = call.def.map(|d| self.builder.value_node(cid, d));
        self.builder.connect_call(binding)?;
        Ok(())
    }

    /// Calls a function object passed to a call nothing modelled
    fn invoke_callback(&mut self, call: &PluginCall<'_>, index: usize, obj: NodeID) -> Result<()> {
        let Some(fo) = self.pag().node(obj).and_then(|n| n.function()).cloned() else {
            return Ok(());
        };
        let callee = match fo.func {
            Some(f) => f,
            None => self.builder.func_id_for(&fo.method, CallGraphNodeKind::Virtual),
        };
        trace!(stmt = %call.stmt, index, callee, "Callback invoked");
        if self
            .builder
            .call_graph_mut()
            .add_call_edge(call.caller, callee, call.stmt, CallKind::Indirect)
        {
            self.stats.dyn_calls_resolved += 1;
        }
        let mut binding =
            CallBinding::new(call.stmt, call.call_site, call.caller, call.caller_cid, callee);
        binding.ctx_obj = Some(obj);
        binding.this_src = fo.this_pt;
        binding.args = fo.bound_args.clone();
        self.builder.connect_call(binding)?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statistics
    // ═══════════════════════════════════════════════════════════════════════

    fn collect_stats(&mut self, start: Instant) {
        let pag = self.builder.pag();
        let stats = &mut self.stats;
        stats.address_edges = pag.edge_count(PagEdgeKind::Address);
        stats.copy_edges = pag.edge_count(PagEdgeKind::Copy);
        stats.load_edges = pag.edge_count(PagEdgeKind::Load);
        stats.write_edges = pag.edge_count(PagEdgeKind::Write);
        stats.this_edges = pag.edge_count(PagEdgeKind::This);
        stats.inter_procedural_edges = pag.edge_count(PagEdgeKind::InterProceduralCopy);
        stats.nodes = pag.node_count();
        stats.contexts = self.builder.selector().table().context_count();
        stats.reached_methods = self.builder.reached_funcs().len();
        stats.call_graph_edges = self.builder.call_graph().edge_count();
        stats.unhandled_funcs = self.builder.unhandled_funcs().count();
        stats.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    }
}

impl std::fmt::Debug for PointerAnalysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointerAnalysis")
            .field("config", &self.config.describe())
            .field("builder", &self.builder)
            .field("stats", &self.stats)
            .finish()
    }
}
