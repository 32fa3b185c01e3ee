//! Custom assertions over finished analyses

use ark_pta::features::points_to::PointsToSet;
use ark_pta::shared::models::{MethodSignature, ValueId};
use ark_pta::PointerAnalysis;

/// Assert that the call graph has an edge between two methods
pub fn assert_call_edge(
    pta: &PointerAnalysis<'_>,
    caller: &MethodSignature,
    callee: &MethodSignature,
) {
    let cg = pta.call_graph();
    let (Some(src), Some(dst)) = (cg.func_id(caller), cg.func_id(callee)) else {
        panic!("Expected call graph nodes for {} and {}", caller, callee);
    };
    assert!(cg.has_edge(src, dst), "Expected call edge {} -> {}", caller, callee);
}

/// Assert that the call graph has no edge between two methods
pub fn assert_no_call_edge(
    pta: &PointerAnalysis<'_>,
    caller: &MethodSignature,
    callee: &MethodSignature,
) {
    let cg = pta.call_graph();
    if let (Some(src), Some(dst)) = (cg.func_id(caller), cg.func_id(callee)) {
        assert!(!cg.has_edge(src, dst), "Unexpected call edge {} -> {}", caller, callee);
    }
}

pub fn assert_may_alias(pta: &PointerAnalysis<'_>, a: ValueId, b: ValueId) {
    assert!(
        pta.may_alias(a, b),
        "Expected {} and {} to alias; pts {:?} vs {:?}",
        a,
        b,
        pta.points_to(a).to_sorted_vec(),
        pta.points_to(b).to_sorted_vec()
    );
}

pub fn assert_no_alias(pta: &PointerAnalysis<'_>, a: ValueId, b: ValueId) {
    assert!(
        pta.no_alias(a, b),
        "Expected {} and {} not to alias; pts {:?} vs {:?}",
        a,
        b,
        pta.points_to(a).to_sorted_vec(),
        pta.points_to(b).to_sorted_vec()
    );
}

/// Assert that a value points to exactly `expected` objects
pub fn assert_pts_len(pta: &PointerAnalysis<'_>, value: ValueId, expected: usize) {
    let pts = pta.points_to(value).to_sorted_vec();
    assert_eq!(pts.len(), expected, "Unexpected points-to set for {}: {:?}", value, pts);
}

/// Assert that `method` was instantiated by the analysis
pub fn assert_reached(pta: &PointerAnalysis<'_>, method: &MethodSignature) {
    let id = pta
        .call_graph()
        .func_id(method)
        .unwrap_or_else(|| panic!("Expected call graph node for {}", method));
    assert!(pta.builder().reached_funcs().contains(&id), "Expected {} to be reached", method);
}
