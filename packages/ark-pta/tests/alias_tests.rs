//! Alias queries over finished analyses

mod common;

use ark_pta::config::{PtaConfig, PtsBacking};
use ark_pta::features::points_to::PointsToSet;
use ark_pta::shared::models::{ArkType, SceneBuilder};
use ark_pta::{analyze, ValidatedPtaConfig};
use common::*;
use pretty_assertions::assert_eq;

#[test]
fn test_copy_aliases_and_fresh_objects_do_not() {
    init_tracing();
    let p = alias_program();
    let pta = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, p.a, p.b);
    assert!(!pta.no_alias(p.a, p.b));
    assert_no_alias(&pta, p.a, p.c);
    assert_pts_len(&pta, p.b, 1);
}

#[test]
fn test_both_backings_agree() {
    let p = alias_program();
    let hash = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();
    let bits_config = PtaConfig::default().pts_backing(PtsBacking::BitVector).build().unwrap();
    let bits = analyze(&p.scene, &[p.main.clone()], bits_config).unwrap();

    for v in [p.a, p.b, p.c] {
        assert_eq!(hash.points_to(v).to_sorted_vec(), bits.points_to(v).to_sorted_vec());
    }
    assert_eq!(hash.stats().copy_edges, bits.stats().copy_edges);
}

#[test]
fn test_closure_reads_outer_local() {
    init_tracing();
    let p = closure_program();
    let pta = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &p.main, &p.arrow);
    assert_may_alias(&pta, p.captured, p.x);
    assert_may_alias(&pta, p.result, p.x);

    let related = pta.related_values(p.captured);
    assert!(related.contains(&p.x), "captured value not related to x: {:?}", related);
    let related_nodes = pta.get_related_nodes(p.captured);
    for node in pta.nodes_of(p.x) {
        assert!(related_nodes.contains(node));
    }
}

/// ```text
/// class Counter { tick() { const f = () => this; return f(); } }
/// let o = new Counter(); let r = o.tick();
/// ```
#[test]
fn test_arrow_function_sees_enclosing_this() {
    let mut sb = SceneBuilder::new("arrows");
    let file = sb.add_file("main.ts");
    let counter = sb.add_class(&file, "Counter", None);
    let tick = sb.add_method(&counter, "tick");
    let arrow = sb.add_arrow_function(&tick, 0);
    sb.body(&arrow, |bb| {
        let this = bb.this_local();
        bb.ret(Some(this));
    });
    sb.body(&tick, |bb| {
        bb.this_local();
        let f = bb.local("f", ArkType::Function(arrow.clone()));
        let r = bb.local("r", class_type(&counter));
        bb.assign_function(f, &arrow);
        bb.call_pointer(Some(r), f, &arrow, &[]);
        bb.ret(Some(r));
    });
    let main = sb.default_method(&file);
    let (o, r) = sb.body(&main, |bb| {
        let o = bb.local("o", class_type(&counter));
        let r = bb.local("r", class_type(&counter));
        bb.assign_new(o, &counter);
        bb.call_instance(Some(r), o, &tick, &[]);
        (o, r)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &tick, &arrow);
    assert_pts_len(&pta, o, 1);
    assert_eq!(pta.points_to(r).to_sorted_vec(), pta.points_to(o).to_sorted_vec());
}

#[test]
fn test_field_store_and_load_through_alias() {
    let mut sb = SceneBuilder::new("fields");
    let file = sb.add_file("main.ts");
    let holder = sb.add_class(&file, "Holder", None);
    let main = sb.default_method(&file);
    let (item, loaded, other) = sb.body(&main, |bb| {
        let h = bb.local("h", class_type(&holder));
        let alias = bb.local("alias", class_type(&holder));
        let item = bb.local("item", ArkType::Any);
        let loaded = bb.local("loaded", ArkType::Any);
        let other = bb.local("other", ArkType::Any);
        bb.assign_new(h, &holder);
        bb.assign(alias, h);
        bb.assign_new(item, &object_class());
        bb.store_field(alias, "value", item);
        bb.load_field(loaded, h, "value");
        bb.load_field(other, h, "missing");
        (item, loaded, other)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, item, loaded);
    assert_pts_len(&pta, other, 0);
    assert_no_alias(&pta, item, other);
}

#[test]
fn test_array_elements_are_shared() {
    let mut sb = SceneBuilder::new("arrays");
    let file = sb.add_file("main.ts");
    let main = sb.default_method(&file);
    let (item, read) = sb.body(&main, |bb| {
        let arr = bb.local("arr", ArkType::Array(Box::new(ArkType::Any)));
        let i = bb.constant("0", ArkType::primitive("number"));
        let j = bb.constant("1", ArkType::primitive("number"));
        let item = bb.local("item", ArkType::Any);
        let read = bb.local("read", ArkType::Any);
        bb.assign_new_array(arr, ArkType::Any);
        bb.assign_new(item, &object_class());
        bb.store_index(arr, i, item);
        bb.load_index(read, arr, j);
        (item, read)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, item, read);
}

#[test]
fn test_unknown_value_has_no_nodes() {
    let p = alias_program();
    let pta = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();
    let unused = ark_pta::shared::models::ValueId(p.scene.value_count() as u32 + 10);

    assert!(pta.nodes_of(unused).is_empty());
    assert!(pta.points_to(unused).is_empty());
    assert!(pta.no_alias(unused, p.a));
    assert!(pta.get_related_nodes(unused).is_empty());
}
