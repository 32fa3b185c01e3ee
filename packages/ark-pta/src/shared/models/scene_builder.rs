//! Fluent construction of a [`Scene`]
//!
//! Front-end adapters lower their ASTs through this builder; tests use it to write
//! small programs by hand.
//!
//! ```text
//! let mut sb = SceneBuilder::new("demo");
//! let file = sb.add_file("main.ts");
//! let main = sb.default_method(&file);
//! sb.body(&main, |b| {
//!     let a = b.local("a", ArkType::Unknown);
//!     let bb = b.local("b", ArkType::Unknown);
//!     b.assign_new(a, &ClassSignature::builtin("Object"));
//!     b.assign(bb, a);
//! });
//! let scene = sb.build();
//! ```

use rustc_hash::FxHashMap;

use super::scene::{ArkClass, ArkFile, ArkMethod, Body, ExportInfo, ImportInfo, Scene};
use super::signature::{ClassSignature, FieldSignature, FileSignature, MethodSignature};
use super::stmt::{Stmt, StmtId, StmtKind};
use super::types::{ArkType, LexicalEnvType};
use super::value::{InvokeExpr, InvokeKind, Value, ValueId};
use crate::shared::constants::names;

#[derive(Debug, Default)]
pub struct SceneBuilder {
    project: String,
    scene: Scene,
}

impl SceneBuilder {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            scene: Scene::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Declarations
    // ═══════════════════════════════════════════════════════════════════════

    /// Adds a file together with its `%dflt` class and method
    pub fn add_file(&mut self, file_name: &str) -> FileSignature {
        self.add_file_inner(file_name, false)
    }

    /// Adds an SDK declaration file; its methods are treated as bodiless
    pub fn add_sdk_file(&mut self, file_name: &str) -> FileSignature {
        self.add_file_inner(file_name, true)
    }

    fn add_file_inner(&mut self, file_name: &str, is_sdk: bool) -> FileSignature {
        let sig = FileSignature::new(self.project.clone(), file_name);
        if self.scene.file_index.contains_key(&sig) {
            return sig;
        }
        self.scene.file_index.insert(sig.clone(), self.scene.files.len());
        self.scene.files.push(ArkFile {
            signature: sig.clone(),
            classes: Vec::new(),
            imports: Vec::new(),
            exports: Vec::new(),
            is_sdk,
        });
        let dflt = self.add_class(&sig, names::DEFAULT_CLASS, None);
        self.add_static_method(&dflt, names::DEFAULT_METHOD);
        sig
    }

    pub fn add_class(
        &mut self,
        file: &FileSignature,
        name: &str,
        super_class: Option<&ClassSignature>,
    ) -> ClassSignature {
        let sig = ClassSignature::new(file.clone(), name);
        if self.scene.class_index.contains_key(&sig) {
            return sig;
        }
        self.scene.class_index.insert(sig.clone(), self.scene.classes.len());
        self.scene.classes.push(ArkClass {
            signature: sig.clone(),
            super_class: super_class.cloned(),
            methods: Vec::new(),
        });
        if let Some(&fi) = self.scene.file_index.get(file) {
            self.scene.files[fi].classes.push(sig.clone());
        }
        sig
    }

    pub fn add_method(&mut self, class: &ClassSignature, name: &str) -> MethodSignature {
        self.add_method_inner(class, name, false, None)
    }

    pub fn add_static_method(&mut self, class: &ClassSignature, name: &str) -> MethodSignature {
        self.add_method_inner(class, name, true, None)
    }

    /// Top-level function of a file (a static method of its `%dflt` class)
    pub fn add_function(&mut self, file: &FileSignature, name: &str) -> MethodSignature {
        let dflt = ClassSignature::new(file.clone(), names::DEFAULT_CLASS);
        self.add_method_inner(&dflt, name, true, None)
    }

    /// Function nested in `outer`; captured variables reach it through a
    /// lexical environment parameter
    pub fn add_nested_function(&mut self, outer: &MethodSignature, name: &str) -> MethodSignature {
        self.add_method_inner(&outer.class.clone(), name, true, Some(outer.clone()))
    }

    /// Arrow function nested in `outer`, named `%AM<index>$<outer>`
    pub fn add_arrow_function(&mut self, outer: &MethodSignature, index: usize) -> MethodSignature {
        let name = format!("{}{}${}", names::ARROW_FUNCTION_PREFIX, index, outer.name);
        self.add_method_inner(&outer.class.clone(), &name, false, Some(outer.clone()))
    }

    fn add_method_inner(
        &mut self,
        class: &ClassSignature,
        name: &str,
        is_static: bool,
        outer_method: Option<MethodSignature>,
    ) -> MethodSignature {
        let sig = MethodSignature::new(class.clone(), name);
        if self.scene.method_index.contains_key(&sig) {
            return sig;
        }
        self.scene.method_index.insert(sig.clone(), self.scene.methods.len());
        self.scene.methods.push(ArkMethod {
            signature: sig.clone(),
            is_static,
            is_generated: false,
            outer_method,
            body: None,
        });
        if let Some(&ci) = self.scene.class_index.get(class) {
            self.scene.classes[ci].methods.push(sig.clone());
        }
        sig
    }

    pub fn set_generated(&mut self, method: &MethodSignature) {
        if let Some(&i) = self.scene.method_index.get(method) {
            self.scene.methods[i].is_generated = true;
        }
    }

    /// The `%dflt` method of a file
    pub fn default_method(&self, file: &FileSignature) -> MethodSignature {
        MethodSignature::new(
            ClassSignature::new(file.clone(), names::DEFAULT_CLASS),
            names::DEFAULT_METHOD,
        )
    }

    pub fn add_import(
        &mut self,
        file: &FileSignature,
        local_name: &str,
        from: &FileSignature,
        imported_name: &str,
    ) {
        if let Some(&fi) = self.scene.file_index.get(file) {
            self.scene.files[fi].imports.push(ImportInfo {
                local_name: local_name.to_string(),
                from: from.clone(),
                imported_name: imported_name.to_string(),
            });
        }
    }

    pub fn add_export(&mut self, file: &FileSignature, name: &str, value: ValueId) {
        if let Some(&fi) = self.scene.file_index.get(file) {
            self.scene.files[fi].exports.push(ExportInfo {
                name: name.to_string(),
                value,
            });
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Bodies
    // ═══════════════════════════════════════════════════════════════════════

    /// Builds (or extends) the body of `method`
    pub fn body<R>(
        &mut self,
        method: &MethodSignature,
        f: impl FnOnce(&mut BodyBuilder<'_>) -> R,
    ) -> R {
        let existing = self
            .scene
            .method_index
            .get(method)
            .and_then(|&i| self.scene.methods[i].body.take())
            .unwrap_or_default();
        let mut builder = BodyBuilder {
            scene: &mut self.scene,
            method: method.clone(),
            locals_by_name: FxHashMap::default(),
            body: existing,
        };
        builder.reindex_locals();
        let result = f(&mut builder);
        let body = builder.finish();
        if let Some(&i) = self.scene.method_index.get(method) {
            self.scene.methods[i].body = Some(body);
        }
        result
    }

    /// Freezes the Scene and computes its derived indexes
    pub fn build(mut self) -> Scene {
        let mut sub_classes: FxHashMap<ClassSignature, Vec<ClassSignature>> = FxHashMap::default();
        for class in &self.scene.classes {
            if let Some(sup) = &class.super_class {
                sub_classes
                    .entry(sup.clone())
                    .or_default()
                    .push(class.signature.clone());
            }
        }
        self.scene.sub_classes = sub_classes;

        let mut defs: FxHashMap<ValueId, Vec<StmtId>> = FxHashMap::default();
        for stmt in &self.scene.stmts {
            if let StmtKind::Assign { left, .. } = &stmt.kind {
                if self.scene.values[left.index()].is_local() {
                    defs.entry(*left).or_default().push(stmt.id);
                }
            }
        }
        self.scene.defs = defs;
        self.scene
    }
}

/// Appends locals and statements to one method body
pub struct BodyBuilder<'s> {
    scene: &'s mut Scene,
    method: MethodSignature,
    locals_by_name: FxHashMap<String, ValueId>,
    body: Body,
}

impl<'s> BodyBuilder<'s> {
    fn reindex_locals(&mut self) {
        self.locals_by_name.clear();
        for &v in &self.body.locals {
            if let Value::Local { name, .. } = &self.scene.values[v.index()] {
                self.locals_by_name.insert(name.clone(), v);
            }
        }
    }

    fn finish(self) -> Body {
        self.body
    }

    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    fn new_value(&mut self, value: Value) -> ValueId {
        let id = ValueId(self.scene.values.len() as u32);
        self.scene.values.push(value);
        id
    }

    fn push_stmt(&mut self, kind: StmtKind) -> StmtId {
        let id = StmtId(self.scene.stmts.len() as u32);
        self.scene.stmts.push(Stmt {
            id,
            method: self.method.clone(),
            kind,
        });
        self.body.stmts.push(id);
        id
    }

    fn ty_of(&self, v: ValueId) -> ArkType {
        self.scene.values[v.index()].ty()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════════

    /// Returns the local named `name`, declaring it on first use
    pub fn local(&mut self, name: &str, ty: ArkType) -> ValueId {
        if let Some(&v) = self.locals_by_name.get(name) {
            return v;
        }
        let v = self.new_value(Value::Local {
            name: name.to_string(),
            ty,
            method: self.method.clone(),
        });
        self.body.locals.push(v);
        self.locals_by_name.insert(name.to_string(), v);
        v
    }

    pub fn constant(&mut self, text: &str, ty: ArkType) -> ValueId {
        self.new_value(Value::Constant {
            ty,
            text: text.to_string(),
        })
    }

    /// Local holding the captured variables of this method for `nested`
    pub fn closure_env(
        &mut self,
        name: &str,
        nested: &MethodSignature,
        captured: &[ValueId],
    ) -> ValueId {
        let ty = ArkType::LexicalEnv(LexicalEnvType {
            nested_method: nested.clone(),
            closures: captured.to_vec(),
        });
        self.local(name, ty)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    /// `name = ParameterRef(index)`
    pub fn param(&mut self, index: usize, name: &str, ty: ArkType) -> ValueId {
        let local = self.local(name, ty.clone());
        let param = self.new_value(Value::ParameterRef { index, ty });
        self.push_stmt(StmtKind::Assign { left: local, right: param });
        local
    }

    /// `this = ThisRef`
    pub fn this_local(&mut self) -> ValueId {
        let ty = ArkType::Class(self.method.class.clone());
        let local = self.local(names::THIS, ty.clone());
        let this_ref = self.new_value(Value::ThisRef { ty });
        self.push_stmt(StmtKind::Assign { left: local, right: this_ref });
        local
    }

    pub fn assign(&mut self, dst: ValueId, src: ValueId) -> StmtId {
        self.push_stmt(StmtKind::Assign { left: dst, right: src })
    }

    /// `dst = new class()`; returns the allocation site
    pub fn assign_new(&mut self, dst: ValueId, class: &ClassSignature) -> ValueId {
        let alloc = self.new_value(Value::NewObject { class: class.clone() });
        self.assign(dst, alloc);
        alloc
    }

    /// `dst = []`; returns the allocation site
    pub fn assign_new_array(&mut self, dst: ValueId, elem_ty: ArkType) -> ValueId {
        let alloc = self.new_value(Value::NewArray { elem_ty });
        self.assign(dst, alloc);
        alloc
    }

    /// `dst = <function literal>`
    pub fn assign_function(&mut self, dst: ValueId, method: &MethodSignature) -> ValueId {
        let f = self.new_value(Value::FunctionRef { method: method.clone() });
        self.assign(dst, f);
        f
    }

    /// `dst = globalThis`
    pub fn assign_global_this(&mut self, dst: ValueId) -> ValueId {
        let g = self.new_value(Value::GlobalThis);
        self.assign(dst, g);
        g
    }

    fn instance_field(&mut self, base: ValueId, field: &str) -> ValueId {
        let class = self.ty_of(base).class_signature().cloned();
        self.new_value(Value::InstanceFieldRef {
            base,
            field: FieldSignature::instance(class, field),
        })
    }

    /// `dst = base.field`
    pub fn load_field(&mut self, dst: ValueId, base: ValueId, field: &str) -> ValueId {
        let r = self.instance_field(base, field);
        self.assign(dst, r);
        r
    }

    /// `base.field = src`
    pub fn store_field(&mut self, base: ValueId, field: &str, src: ValueId) -> ValueId {
        let r = self.instance_field(base, field);
        self.assign(r, src);
        r
    }

    /// `dst = class.field`
    pub fn load_static(&mut self, dst: ValueId, class: &ClassSignature, field: &str) -> ValueId {
        let r = self.new_value(Value::StaticFieldRef {
            field: FieldSignature::static_field(class.clone(), field),
        });
        self.assign(dst, r);
        r
    }

    /// `class.field = src`
    pub fn store_static(&mut self, class: &ClassSignature, field: &str, src: ValueId) -> ValueId {
        let r = self.new_value(Value::StaticFieldRef {
            field: FieldSignature::static_field(class.clone(), field),
        });
        self.assign(r, src);
        r
    }

    /// `dst = base[index]`
    pub fn load_index(&mut self, dst: ValueId, base: ValueId, index: ValueId) -> ValueId {
        let r = self.new_value(Value::ArrayRef { base, index });
        self.assign(dst, r);
        r
    }

    /// `base[index] = src`
    pub fn store_index(&mut self, base: ValueId, index: ValueId, src: ValueId) -> ValueId {
        let r = self.new_value(Value::ArrayRef { base, index });
        self.assign(r, src);
        r
    }

    /// `dst = env.name` for a captured variable
    pub fn load_closure(&mut self, dst: ValueId, env: ValueId, name: &str) -> ValueId {
        let r = self.new_value(Value::ClosureFieldRef {
            base: env,
            field_name: name.to_string(),
        });
        self.assign(dst, r);
        r
    }

    /// `dst = src as ty`
    pub fn cast(&mut self, dst: ValueId, src: ValueId, ty: ArkType) -> StmtId {
        let c = self.new_value(Value::Cast { op: src, ty });
        self.assign(dst, c)
    }

    /// `dst = op(operands...)` for arithmetic and other pointer-free expressions
    pub fn expr(&mut self, dst: ValueId, operands: &[ValueId]) -> StmtId {
        let e = self.new_value(Value::Expr { operands: operands.to_vec() });
        self.assign(dst, e)
    }

    fn call(&mut self, dst: Option<ValueId>, expr: InvokeExpr) -> StmtId {
        let invoke = self.new_value(Value::Invoke(expr));
        match dst {
            Some(left) => self.push_stmt(StmtKind::Assign { left, right: invoke }),
            None => self.push_stmt(StmtKind::Invoke { expr: invoke }),
        }
    }

    /// `[dst =] method(args)`
    pub fn call_static(
        &mut self,
        dst: Option<ValueId>,
        method: &MethodSignature,
        args: &[ValueId],
    ) -> StmtId {
        self.call(
            dst,
            InvokeExpr {
                kind: InvokeKind::Static,
                method: method.clone(),
                base: None,
                args: args.to_vec(),
            },
        )
    }

    /// `[dst =] base.method(args)`
    pub fn call_instance(
        &mut self,
        dst: Option<ValueId>,
        base: ValueId,
        method: &MethodSignature,
        args: &[ValueId],
    ) -> StmtId {
        self.call(
            dst,
            InvokeExpr {
                kind: InvokeKind::Instance,
                method: method.clone(),
                base: Some(base),
                args: args.to_vec(),
            },
        )
    }

    /// `base.constructor(args)` dispatched statically to `method`
    pub fn call_constructor(
        &mut self,
        base: ValueId,
        method: &MethodSignature,
        args: &[ValueId],
    ) -> StmtId {
        self.call(
            None,
            InvokeExpr {
                kind: InvokeKind::Static,
                method: method.clone(),
                base: Some(base),
                args: args.to_vec(),
            },
        )
    }

    /// `[dst =] fp(args)`; `method` is the statically declared target
    pub fn call_pointer(
        &mut self,
        dst: Option<ValueId>,
        fp: ValueId,
        method: &MethodSignature,
        args: &[ValueId],
    ) -> StmtId {
        self.call(
            dst,
            InvokeExpr {
                kind: InvokeKind::Pointer,
                method: method.clone(),
                base: Some(fp),
                args: args.to_vec(),
            },
        )
    }

    pub fn ret(&mut self, value: Option<ValueId>) -> StmtId {
        self.push_stmt(StmtKind::Return { value })
    }

    pub fn nop(&mut self) -> StmtId {
        self.push_stmt(StmtKind::Nop)
    }
}
