//! Test programs
//!
//! Each fixture builds a small Scene with `SceneBuilder` and returns the
//! handles the tests query.

use ark_pta::shared::models::{
    ArkType, ClassSignature, MethodSignature, Scene, SceneBuilder, ValueId,
};

pub fn class_type(class: &ClassSignature) -> ArkType {
    ArkType::Class(class.clone())
}

pub fn object_class() -> ClassSignature {
    ClassSignature::builtin("Object")
}

// ═══════════════════════════════════════════════════════════════════════════
// Alias
// ═══════════════════════════════════════════════════════════════════════════

pub struct AliasProgram {
    pub scene: Scene,
    pub main: MethodSignature,
    pub a: ValueId,
    pub b: ValueId,
    pub c: ValueId,
}

/// `let a = {}; let b = a; let c = {};`
pub fn alias_program() -> AliasProgram {
    let mut sb = SceneBuilder::new("alias");
    let file = sb.add_file("main.ts");
    let main = sb.default_method(&file);
    let (a, b, c) = sb.body(&main, |bb| {
        let a = bb.local("a", ArkType::Any);
        let b = bb.local("b", ArkType::Any);
        let c = bb.local("c", ArkType::Any);
        bb.assign_new(a, &object_class());
        bb.assign(b, a);
        bb.assign_new(c, &object_class());
        (a, b, c)
    });
    AliasProgram {
        scene: sb.build(),
        main,
        a,
        b,
        c,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Closure
// ═══════════════════════════════════════════════════════════════════════════

pub struct ClosureProgram {
    pub scene: Scene,
    pub main: MethodSignature,
    pub outer: MethodSignature,
    pub arrow: MethodSignature,
    /// `x` of `outer`
    pub x: ValueId,
    /// The arrow's copy of the captured `x`
    pub captured: ValueId,
    /// `r` in `r = outer()()`
    pub result: ValueId,
}

/// ```text
/// function outer() { let x = new Object(); return () => x; }
/// let g = outer();
/// let r = g();
/// ```
pub fn closure_program() -> ClosureProgram {
    let mut sb = SceneBuilder::new("closure");
    let file = sb.add_file("main.ts");
    let outer = sb.add_function(&file, "outer");
    let arrow = sb.add_arrow_function(&outer, 0);

    let x = sb.body(&outer, |bb| {
        let x = bb.local("x", class_type(&object_class()));
        let f = bb.local("f", ArkType::Function(arrow.clone()));
        bb.assign_new(x, &object_class());
        bb.assign_function(f, &arrow);
        bb.ret(Some(f));
        x
    });
    let captured = sb.body(&arrow, |bb| {
        let env = bb.closure_env("%closures0", &arrow, &[x]);
        let y = bb.local("x", class_type(&object_class()));
        bb.load_closure(y, env, "x");
        bb.ret(Some(y));
        y
    });

    let main = sb.default_method(&file);
    let result = sb.body(&main, |bb| {
        let g = bb.local("g", ArkType::Function(arrow.clone()));
        let r = bb.local("r", ArkType::Any);
        bb.call_static(Some(g), &outer, &[]);
        bb.call_pointer(Some(r), g, &arrow, &[]);
        r
    });

    ClosureProgram {
        scene: sb.build(),
        main,
        outer,
        arrow,
        x,
        captured,
        result,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Virtual dispatch
// ═══════════════════════════════════════════════════════════════════════════

pub struct DispatchProgram {
    pub scene: Scene,
    pub main: MethodSignature,
    pub a_f: MethodSignature,
    pub b_f: MethodSignature,
    pub receiver: ValueId,
    pub result: ValueId,
}

/// ```text
/// class A { f() { return this; } }
/// class B extends A { f() { return this; } }
/// let o: A = new B();
/// let r = o.f();
/// ```
pub fn dispatch_program() -> DispatchProgram {
    let mut sb = SceneBuilder::new("dispatch");
    let file = sb.add_file("main.ts");
    let a = sb.add_class(&file, "A", None);
    let b = sb.add_class(&file, "B", Some(&a));
    let a_f = sb.add_method(&a, "f");
    let b_f = sb.add_method(&b, "f");
    for m in [&a_f, &b_f] {
        sb.body(m, |bb| {
            let this = bb.this_local();
            bb.ret(Some(this));
        });
    }
    let main = sb.default_method(&file);
    let (receiver, result) = sb.body(&main, |bb| {
        let o = bb.local("o", class_type(&a));
        let r = bb.local("r", class_type(&a));
        bb.assign_new(o, &b);
        bb.call_instance(Some(r), o, &a_f, &[]);
        (o, r)
    });
    DispatchProgram {
        scene: sb.build(),
        main,
        a_f,
        b_f,
        receiver,
        result,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Singleton
// ═══════════════════════════════════════════════════════════════════════════

pub struct SingletonProgram {
    pub scene: Scene,
    pub main: MethodSignature,
    /// Results of two `Registry.getInstance()` calls
    pub instances: (ValueId, ValueId),
    /// Results of two `Registry.create()` calls
    pub created: (ValueId, ValueId),
}

/// ```text
/// class Registry {
///   static getInstance() { let r = new Registry(); Registry.instance = r; return r; }
///   static create() { let r = new Registry(); return r; }
/// }
/// ```
/// each called from two sites
pub fn singleton_program() -> SingletonProgram {
    let mut sb = SceneBuilder::new("singleton");
    let file = sb.add_file("main.ts");
    let registry = sb.add_class(&file, "Registry", None);
    let get = sb.add_static_method(&registry, "getInstance");
    sb.body(&get, |bb| {
        let r = bb.local("r", class_type(&registry));
        bb.assign_new(r, &registry);
        bb.store_static(&registry, "instance", r);
        bb.ret(Some(r));
    });
    let create = sb.add_static_method(&registry, "create");
    sb.body(&create, |bb| {
        let r = bb.local("r", class_type(&registry));
        bb.assign_new(r, &registry);
        bb.ret(Some(r));
    });

    let main = sb.default_method(&file);
    let (instances, created) = sb.body(&main, |bb| {
        let i1 = bb.local("i1", class_type(&registry));
        let i2 = bb.local("i2", class_type(&registry));
        let c1 = bb.local("c1", class_type(&registry));
        let c2 = bb.local("c2", class_type(&registry));
        bb.call_static(Some(i1), &get, &[]);
        bb.call_static(Some(i2), &get, &[]);
        bb.call_static(Some(c1), &create, &[]);
        bb.call_static(Some(c2), &create, &[]);
        ((i1, i2), (c1, c2))
    });
    SingletonProgram {
        scene: sb.build(),
        main,
        instances,
        created,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Three files
// ═══════════════════════════════════════════════════════════════════════════

pub struct ThreeFileProgram {
    pub scene: Scene,
    pub run: MethodSignature,
    pub shape_area: MethodSignature,
    pub circle_area: MethodSignature,
    pub reader: MethodSignature,
    /// `shared` as declared in factory.ts
    pub shared_decl: ValueId,
    /// `shared` as used in main.ts
    pub shared_use: ValueId,
    /// `r = shared.area()`
    pub area_result: ValueId,
    /// `x` captured by the reader closure
    pub captured: ValueId,
    /// `v = makeReader()()`
    pub read_result: ValueId,
}

/// ```text
/// // shapes.ts
/// class Shape { area() { return this; } }
/// class Circle extends Shape { area() { return this; } }
///
/// // factory.ts
/// export let shared = new Circle();
/// function makeReader() { let x = new Shape(); return () => x; }
///
/// // main.ts
/// import { shared } from './factory';
/// function run() { let r = shared.area(); let g = makeReader(); let v = g(); }
/// ```
pub fn three_file_program() -> ThreeFileProgram {
    let mut sb = SceneBuilder::new("e2e");

    let shapes = sb.add_file("shapes.ts");
    let shape = sb.add_class(&shapes, "Shape", None);
    let circle = sb.add_class(&shapes, "Circle", Some(&shape));
    let shape_area = sb.add_method(&shape, "area");
    let circle_area = sb.add_method(&circle, "area");
    for m in [&shape_area, &circle_area] {
        sb.body(m, |bb| {
            let this = bb.this_local();
            bb.ret(Some(this));
        });
    }

    let factory = sb.add_file("factory.ts");
    let factory_init = sb.default_method(&factory);
    let shared_decl = sb.body(&factory_init, |bb| {
        let shared = bb.local("shared", class_type(&shape));
        bb.assign_new(shared, &circle);
        shared
    });
    sb.add_export(&factory, "shared", shared_decl);

    let make_reader = sb.add_function(&factory, "makeReader");
    let reader = sb.add_arrow_function(&make_reader, 0);
    let captured = sb.body(&make_reader, |bb| {
        let x = bb.local("x", class_type(&shape));
        let f = bb.local("f", ArkType::Function(reader.clone()));
        bb.assign_new(x, &shape);
        bb.assign_function(f, &reader);
        bb.ret(Some(f));
        x
    });
    sb.body(&reader, |bb| {
        let env = bb.closure_env("%closures0", &reader, &[captured]);
        let y = bb.local("x", class_type(&shape));
        bb.load_closure(y, env, "x");
        bb.ret(Some(y));
    });

    let main = sb.add_file("main.ts");
    sb.add_import(&main, "shared", &factory, "shared");
    let run = sb.add_function(&main, "run");
    let (shared_use, area_result, read_result) = sb.body(&run, |bb| {
        let shared = bb.local("shared", class_type(&shape));
        let r = bb.local("r", class_type(&shape));
        let g = bb.local("g", ArkType::Function(reader.clone()));
        let v = bb.local("v", class_type(&shape));
        bb.call_instance(Some(r), shared, &shape_area, &[]);
        bb.call_static(Some(g), &make_reader, &[]);
        bb.call_pointer(Some(v), g, &reader, &[]);
        (shared, r, v)
    });

    ThreeFileProgram {
        scene: sb.build(),
        run,
        shape_area,
        circle_area,
        reader,
        shared_decl,
        shared_use,
        area_result,
        captured,
        read_result,
    }
}
