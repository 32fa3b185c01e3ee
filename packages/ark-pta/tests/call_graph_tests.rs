//! Call-graph discovery: virtual dispatch, seeds, singletons, recursion

mod common;

use ark_pta::config::{AnalysisScale, ContextType, PtaConfig};
use ark_pta::shared::models::{ArkType, SceneBuilder};
use ark_pta::{analyze, analyze_with_seed, CallGraphSeed, PointerAnalysis, ValidatedPtaConfig};
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_virtual_dispatch_targets_runtime_class() {
    init_tracing();
    let p = dispatch_program();
    let pta = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &p.main, &p.b_f);
    assert_no_call_edge(&pta, &p.main, &p.a_f);
    assert_reached(&pta, &p.b_f);
    assert_may_alias(&pta, p.result, p.receiver);
    assert_eq!(pta.stats().dyn_calls_resolved, 1);
}

#[test]
fn test_seeds_keep_their_edges() {
    let p = dispatch_program();
    let entries = [p.main.clone()];

    let config = ValidatedPtaConfig::default;
    let cha =
        analyze_with_seed(&p.scene, &entries, config(), CallGraphSeed::ClassHierarchy).unwrap();
    assert_call_edge(&cha, &p.main, &p.a_f);
    assert_call_edge(&cha, &p.main, &p.b_f);

    let rta = analyze_with_seed(&p.scene, &entries, config(), CallGraphSeed::RapidType).unwrap();
    assert_call_edge(&rta, &p.main, &p.b_f);
    assert_no_call_edge(&rta, &p.main, &p.a_f);

    // the points-to result does not depend on the seed
    assert_may_alias(&cha, p.result, p.receiver);
    assert_may_alias(&rta, p.result, p.receiver);
}

#[test]
fn test_singleton_shares_one_object_across_call_sites() {
    let p = singleton_program();
    let config = PtaConfig::default()
        .context_type(ContextType::CallSite)
        .k_limit(1)
        .build()
        .unwrap();
    let pta = analyze(&p.scene, &[p.main.clone()], config).unwrap();

    assert_may_alias(&pta, p.instances.0, p.instances.1);
    assert_pts_len(&pta, p.instances.0, 1);
    // a plain factory allocates per calling context
    assert_no_alias(&pta, p.created.0, p.created.1);
}

#[test]
fn test_context_insensitive_merges_factory_results() {
    let p = singleton_program();
    let config = PtaConfig::default().k_limit(0).build().unwrap();
    let pta = analyze(&p.scene, &[p.main.clone()], config).unwrap();

    assert_may_alias(&pta, p.created.0, p.created.1);
}

#[test]
fn test_recursive_dynamic_call_terminates() {
    let mut sb = SceneBuilder::new("recursion");
    let file = sb.add_file("main.ts");
    let node = sb.add_class(&file, "Node", None);
    let visit = sb.add_method(&node, "visit");
    sb.body(&visit, |bb| {
        let this = bb.this_local();
        let next = bb.local("next", class_type(&node));
        bb.load_field(next, this, "next");
        bb.call_instance(None, next, &visit, &[]);
        bb.ret(None);
    });
    let main = sb.default_method(&file);
    sb.body(&main, |bb| {
        let head = bb.local("head", class_type(&node));
        let tail = bb.local("tail", class_type(&node));
        bb.assign_new(head, &node);
        bb.assign_new(tail, &node);
        bb.store_field(head, "next", tail);
        bb.store_field(tail, "next", head);
        bb.call_instance(None, head, &visit, &[]);
    });
    let scene = sb.build();

    for context_type in [ContextType::CallSite, ContextType::Object, ContextType::Function] {
        let config = PtaConfig::default().context_type(context_type).k_limit(2).build().unwrap();
        let pta = analyze(&scene, &[main.clone()], config).unwrap();
        assert_call_edge(&pta, &main, &visit);
        assert_call_edge(&pta, &visit, &visit);
    }
}

#[test]
fn test_method_level_scale_only_resolves_the_entry() {
    let mut sb = SceneBuilder::new("scale");
    let file = sb.add_file("main.ts");
    let svc = sb.add_class(&file, "Service", None);
    let start = sb.add_method(&svc, "start");
    let stop = sb.add_method(&svc, "stop");
    sb.body(&stop, |bb| {
        bb.this_local();
        bb.ret(None);
    });
    sb.body(&start, |bb| {
        let this = bb.this_local();
        bb.call_instance(None, this, &stop, &[]);
    });
    let main = sb.default_method(&file);
    sb.body(&main, |bb| {
        let s = bb.local("s", class_type(&svc));
        bb.assign_new(s, &svc);
        bb.call_instance(None, s, &start, &[]);
    });
    let scene = sb.build();

    let local = PtaConfig::default().analysis_scale(AnalysisScale::MethodLevel).build().unwrap();
    let mut pta = PointerAnalysis::new(&scene, local);
    let entries = pta.set_entries(&[main.clone()]);
    assert_eq!(entries.len(), 1);
    pta.start().unwrap();
    assert_call_edge(&pta, &main, &start);
    assert_no_call_edge(&pta, &start, &stop);

    let whole = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();
    assert_call_edge(&whole, &start, &stop);
}

#[test]
fn test_unresolved_receiver_is_not_an_error() {
    let mut sb = SceneBuilder::new("unresolved");
    let file = sb.add_file("main.ts");
    let svc = sb.add_class(&file, "Service", None);
    let run = sb.add_method(&svc, "run");
    sb.body(&run, |bb| {
        bb.this_local();
        bb.ret(None);
    });
    let main = sb.default_method(&file);
    sb.body(&main, |bb| {
        let s = bb.local("s", ArkType::Unknown);
        bb.call_instance(None, s, &run, &[]);
    });
    let scene = sb.build();

    let pta = analyze(&scene, &[main.clone()], ValidatedPtaConfig::default()).unwrap();
    assert_no_call_edge(&pta, &main, &run);
    assert_eq!(pta.stats().dyn_calls_resolved, 0);
}
