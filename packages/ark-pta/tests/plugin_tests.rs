//! Built-in models for calls without analysable bodies

mod common;

use ark_pta::features::points_to::PluginManager;
use ark_pta::shared::models::{ArkType, ClassSignature, MethodSignature, SceneBuilder, ValueId};
use ark_pta::{analyze, ValidatedPtaConfig};
use common::*;
use pretty_assertions::assert_eq;

fn builtin(class: &str, name: &str) -> MethodSignature {
    MethodSignature::builtin(class, name)
}

fn string(bb: &mut ark_pta::shared::models::BodyBuilder<'_>, text: &str) -> ValueId {
    bb.constant(&format!("'{}'", text), ArkType::primitive("string"))
}

#[test]
fn test_standard_plugin_order() {
    assert_eq!(
        PluginManager::new().names(),
        vec!["storage", "function", "taskpool", "worker", "container", "sdk"]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Containers
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_array_push_pop_and_for_each() {
    init_tracing();
    let mut sb = SceneBuilder::new("containers");
    let file = sb.add_file("main.ts");
    let visit = sb.add_function(&file, "visit");
    let seen = sb.body(&visit, |bb| {
        let item = bb.param(0, "item", ArkType::Any);
        bb.ret(None);
        item
    });
    let main = sb.default_method(&file);
    let (item, popped) = sb.body(&main, |bb| {
        let arr = bb.local("arr", ArkType::Array(Box::new(ArkType::Any)));
        let item = bb.local("item", ArkType::Any);
        let popped = bb.local("popped", ArkType::Any);
        let cb = bb.local("cb", ArkType::Function(visit.clone()));
        bb.assign_new_array(arr, ArkType::Any);
        bb.assign_new(item, &object_class());
        bb.assign_function(cb, &visit);
        bb.call_instance(None, arr, &builtin("Array", "push"), &[item]);
        bb.call_instance(Some(popped), arr, &builtin("Array", "pop"), &[]);
        bb.call_instance(None, arr, &builtin("Array", "forEach"), &[cb]);
        (item, popped)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, item, popped);
    assert_call_edge(&pta, &main, &visit);
    assert_may_alias(&pta, seen, item);
    assert!(pta.unhandled_funcs().is_empty());
}

#[test]
fn test_slice_and_concat_build_new_arrays() {
    let mut sb = SceneBuilder::new("containers");
    let file = sb.add_file("main.ts");
    let main = sb.default_method(&file);
    let array = || ArkType::Array(Box::new(ArkType::Any));
    let (arr, item, copy, other, from_copy, from_arr, extra, from_joined, sorted) =
        sb.body(&main, |bb| {
            let arr = bb.local("arr", array());
            let more = bb.local("more", array());
            let copy = bb.local("copy", array());
            let joined = bb.local("joined", array());
            let sorted = bb.local("sorted", array());
            let item = bb.local("item", ArkType::Any);
            let other = bb.local("other", ArkType::Any);
            let extra = bb.local("extra", ArkType::Any);
            let from_copy = bb.local("fromCopy", ArkType::Any);
            let from_arr = bb.local("fromArr", ArkType::Any);
            let from_joined = bb.local("fromJoined", ArkType::Any);

            bb.assign_new_array(arr, ArkType::Any);
            bb.assign_new_array(more, ArkType::Any);
            bb.assign_new(item, &object_class());
            bb.assign_new(other, &object_class());
            bb.assign_new(extra, &object_class());
            bb.call_instance(None, arr, &builtin("Array", "push"), &[item]);
            bb.call_instance(None, more, &builtin("Array", "push"), &[extra]);

            bb.call_instance(Some(copy), arr, &builtin("Array", "slice"), &[]);
            bb.call_instance(None, copy, &builtin("Array", "push"), &[other]);
            bb.call_instance(Some(from_copy), copy, &builtin("Array", "pop"), &[]);
            bb.call_instance(Some(from_arr), arr, &builtin("Array", "pop"), &[]);

            bb.call_instance(Some(joined), arr, &builtin("Array", "concat"), &[more]);
            bb.call_instance(Some(from_joined), joined, &builtin("Array", "pop"), &[]);

            bb.call_instance(Some(sorted), arr, &builtin("Array", "sort"), &[]);
            (arr, item, copy, other, from_copy, from_arr, extra, from_joined, sorted)
        });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    // the copy is a distinct array seeded with the receiver's elements
    assert_no_alias(&pta, arr, copy);
    assert_may_alias(&pta, from_copy, item);
    assert_may_alias(&pta, from_copy, other);
    assert_pts_len(&pta, from_arr, 1);
    assert_no_alias(&pta, from_arr, other);

    // concat flattens array arguments
    assert_may_alias(&pta, from_joined, item);
    assert_may_alias(&pta, from_joined, extra);

    // sort reorders in place
    assert_may_alias(&pta, sorted, arr);
}

#[test]
fn test_map_set_get() {
    let mut sb = SceneBuilder::new("containers");
    let file = sb.add_file("main.ts");
    let main = sb.default_method(&file);
    let map_class = ClassSignature::builtin("Map");
    let (value, got) = sb.body(&main, |bb| {
        let m = bb.local("m", ArkType::Class(map_class.clone()));
        let value = bb.local("value", ArkType::Any);
        let got = bb.local("got", ArkType::Any);
        let key = string(bb, "k");
        bb.assign_new(m, &map_class);
        bb.assign_new(value, &object_class());
        bb.call_instance(None, m, &builtin("Map", "set"), &[key, value]);
        bb.call_instance(Some(got), m, &builtin("Map", "get"), &[key]);
        (value, got)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, value, got);
    assert_pts_len(&pta, got, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// call / apply / bind
// ═══════════════════════════════════════════════════════════════════════════

struct FunctionProgram {
    scene: ark_pta::Scene,
    main: MethodSignature,
    identity: MethodSignature,
    item: ValueId,
    via_call: ValueId,
    via_apply: ValueId,
    via_bind: ValueId,
}

/// ```text
/// function identity(p) { return p; }
/// let f = identity;
/// let via_call = f.call(t, item);
/// let via_apply = f.apply(t, [item]);
/// let g = f.bind(t, item);
/// let via_bind = g();
/// ```
fn function_program() -> FunctionProgram {
    let mut sb = SceneBuilder::new("functions");
    let file = sb.add_file("main.ts");
    let identity = sb.add_function(&file, "identity");
    sb.body(&identity, |bb| {
        let p = bb.param(0, "p", ArkType::Any);
        bb.ret(Some(p));
    });
    let main = sb.default_method(&file);
    let (item, via_call, via_apply, via_bind) = sb.body(&main, |bb| {
        let f = bb.local("f", ArkType::Function(identity.clone()));
        let t = bb.local("t", ArkType::Any);
        let item = bb.local("item", ArkType::Any);
        let args = bb.local("args", ArkType::Array(Box::new(ArkType::Any)));
        let g = bb.local("g", ArkType::Function(identity.clone()));
        let via_call = bb.local("via_call", ArkType::Any);
        let via_apply = bb.local("via_apply", ArkType::Any);
        let via_bind = bb.local("via_bind", ArkType::Any);
        let zero = bb.constant("0", ArkType::primitive("number"));

        bb.assign_function(f, &identity);
        bb.assign_new(t, &object_class());
        bb.assign_new(item, &object_class());
        bb.assign_new_array(args, ArkType::Any);
        bb.store_index(args, zero, item);

        bb.call_instance(Some(via_call), f, &builtin("Function", "call"), &[t, item]);
        bb.call_instance(Some(via_apply), f, &builtin("Function", "apply"), &[t, args]);
        bb.call_instance(Some(g), f, &builtin("Function", "bind"), &[t, item]);
        bb.call_pointer(Some(via_bind), g, &identity, &[]);
        (item, via_call, via_apply, via_bind)
    });
    FunctionProgram {
        scene: sb.build(),
        main,
        identity,
        item,
        via_call,
        via_apply,
        via_bind,
    }
}

#[test]
fn test_function_call_apply_bind() {
    init_tracing();
    let p = function_program();
    let pta = analyze(&p.scene, &[p.main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &p.main, &p.identity);
    assert_may_alias(&pta, p.via_call, p.item);
    assert_may_alias(&pta, p.via_apply, p.item);
    assert_may_alias(&pta, p.via_bind, p.item);
}

// ═══════════════════════════════════════════════════════════════════════════
// Storage
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_app_storage_keys() {
    let mut sb = SceneBuilder::new("storage");
    let file = sb.add_file("main.ts");
    let main = sb.default_method(&file);
    let (token, read, other) = sb.body(&main, |bb| {
        let token = bb.local("token", ArkType::Any);
        let read = bb.local("read", ArkType::Any);
        let other = bb.local("other", ArkType::Any);
        let key = string(bb, "token");
        let key_again = string(bb, "token");
        let other_key = string(bb, "theme");
        bb.assign_new(token, &object_class());
        bb.call_static(None, &builtin("AppStorage", "setOrCreate"), &[key, token]);
        bb.call_static(Some(read), &builtin("AppStorage", "get"), &[key_again]);
        bb.call_static(Some(other), &builtin("AppStorage", "get"), &[other_key]);
        (token, read, other)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_may_alias(&pta, token, read);
    assert_pts_len(&pta, other, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Task pool and workers
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_taskpool_execute_runs_the_task() {
    let mut sb = SceneBuilder::new("tasks");
    let file = sb.add_file("main.ts");
    let task = sb.add_function(&file, "task");
    sb.body(&task, |bb| {
        let input = bb.param(0, "input", ArkType::Any);
        bb.ret(Some(input));
    });
    let main = sb.default_method(&file);
    let (input, result) = sb.body(&main, |bb| {
        let f = bb.local("f", ArkType::Function(task.clone()));
        let input = bb.local("input", ArkType::Any);
        let result = bb.local("result", ArkType::Any);
        bb.assign_function(f, &task);
        bb.assign_new(input, &object_class());
        bb.call_static(Some(result), &builtin("taskpool", "execute"), &[f, input]);
        (input, result)
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &main, &task);
    assert_may_alias(&pta, result, input);
}

#[test]
fn test_worker_message_reaches_handler() {
    let mut sb = SceneBuilder::new("workers");
    let file = sb.add_file("main.ts");
    let handler = sb.add_function(&file, "onMessage");
    let event = sb.body(&handler, |bb| {
        let e = bb.param(0, "e", ArkType::Any);
        bb.ret(None);
        e
    });
    let main = sb.default_method(&file);
    let worker_class = ClassSignature::builtin("ThreadWorker");
    let msg = sb.body(&main, |bb| {
        let w = bb.local("w", ArkType::Class(worker_class.clone()));
        let cb = bb.local("cb", ArkType::Function(handler.clone()));
        let msg = bb.local("msg", ArkType::Any);
        bb.assign_new(w, &worker_class);
        bb.assign_function(cb, &handler);
        bb.assign_new(msg, &object_class());
        bb.call_instance(None, w, &builtin("ThreadWorker", "onMessage"), &[cb]);
        bb.call_instance(None, w, &builtin("ThreadWorker", "postMessage"), &[msg]);
        msg
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &main, &handler);
    assert_may_alias(&pta, event, msg);
}

// ═══════════════════════════════════════════════════════════════════════════
// SDK and unmodelled calls
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_sdk_callback_and_opaque_result() {
    let mut sb = SceneBuilder::new("sdk");
    let sdk = sb.add_sdk_file("emitter.d.ts");
    let emitter = sb.add_class(&sdk, "Emitter", None);
    let subscribe = sb.add_static_method(&emitter, "subscribe");

    let file = sb.add_file("main.ts");
    let listener = sb.add_function(&file, "listener");
    let local = sb.body(&listener, |bb| {
        let x = bb.local("x", ArkType::Any);
        bb.assign_new(x, &object_class());
        bb.ret(None);
        x
    });
    let main = sb.default_method(&file);
    let handle = sb.body(&main, |bb| {
        let cb = bb.local("cb", ArkType::Function(listener.clone()));
        let handle = bb.local("handle", ArkType::Any);
        bb.assign_function(cb, &listener);
        bb.call_static(Some(handle), &subscribe, &[cb]);
        handle
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main.clone()], ValidatedPtaConfig::default()).unwrap();

    assert_call_edge(&pta, &main, &listener);
    assert_reached(&pta, &listener);
    assert_pts_len(&pta, local, 1);
    assert_pts_len(&pta, handle, 1);
    assert!(pta.unhandled_funcs().is_empty());
}

#[test]
fn test_bodiless_project_method_is_reported() {
    let mut sb = SceneBuilder::new("unhandled");
    let file = sb.add_file("main.ts");
    let native = sb.add_function(&file, "nativeHelper");
    let main = sb.default_method(&file);
    sb.body(&main, |bb| {
        let x = bb.local("x", ArkType::Any);
        bb.call_static(Some(x), &native, &[]);
    });
    let scene = sb.build();
    let pta = analyze(&scene, &[main], ValidatedPtaConfig::default()).unwrap();

    assert_eq!(pta.unhandled_funcs(), vec![native]);
    assert_eq!(pta.stats().unhandled_funcs, 1);
}
