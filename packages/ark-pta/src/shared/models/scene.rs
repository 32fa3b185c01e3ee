//! Scene: the immutable program database consumed by the analyses
//!
//! The front-end lowers source files into files → classes → methods → statements and
//! values. The pointer analysis only reads the Scene; it never mutates it.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::signature::{ClassSignature, FileSignature, MethodSignature};
use super::stmt::{Stmt, StmtId, StmtKind};
use super::value::{InvokeExpr, Value, ValueId};
use crate::shared::constants::names;

/// Method body: locals and statements in control-flow order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Body {
    pub locals: Vec<ValueId>,
    pub stmts: Vec<StmtId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkMethod {
    pub signature: MethodSignature,
    pub is_static: bool,
    /// Synthesized by the front-end rather than written by the user
    pub is_generated: bool,
    /// Lexically enclosing method for nested functions and arrow functions
    pub outer_method: Option<MethodSignature>,
    pub body: Option<Body>,
}

impl ArkMethod {
    #[inline]
    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    #[inline]
    pub fn stmts(&self) -> &[StmtId] {
        self.body.as_ref().map(|b| b.stmts.as_slice()).unwrap_or(&[])
    }

    #[inline]
    pub fn locals(&self) -> &[ValueId] {
        self.body.as_ref().map(|b| b.locals.as_slice()).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkClass {
    pub signature: ClassSignature,
    pub super_class: Option<ClassSignature>,
    pub methods: Vec<MethodSignature>,
}

impl ArkClass {
    pub fn method_named(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// `import { exported_name as local_name } from 'from'`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportInfo {
    pub local_name: String,
    pub from: FileSignature,
    pub imported_name: String,
}

/// `export { name }` of a file-scope local
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportInfo {
    pub name: String,
    /// Exported local of the file's default method
    pub value: ValueId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArkFile {
    pub signature: FileSignature,
    pub classes: Vec<ClassSignature>,
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<ExportInfo>,
    /// Declaration file of an SDK (bodies are not analyzable)
    pub is_sdk: bool,
}

impl ArkFile {
    pub fn default_class(&self) -> ClassSignature {
        ClassSignature::new(self.signature.clone(), names::DEFAULT_CLASS)
    }

    pub fn default_method(&self) -> MethodSignature {
        MethodSignature::new(self.default_class(), names::DEFAULT_METHOD)
    }
}

/// Immutable program database
#[derive(Debug, Default)]
pub struct Scene {
    pub(crate) files: Vec<ArkFile>,
    pub(crate) file_index: FxHashMap<FileSignature, usize>,
    pub(crate) classes: Vec<ArkClass>,
    pub(crate) class_index: FxHashMap<ClassSignature, usize>,
    pub(crate) methods: Vec<ArkMethod>,
    pub(crate) method_index: FxHashMap<MethodSignature, usize>,
    pub(crate) values: Vec<Value>,
    pub(crate) stmts: Vec<Stmt>,

    /// Direct subclasses of each class
    pub(crate) sub_classes: FxHashMap<ClassSignature, Vec<ClassSignature>>,
    /// Statements assigning to each local
    pub(crate) defs: FxHashMap<ValueId, Vec<StmtId>>,
}

impl Scene {
    // ═══════════════════════════════════════════════════════════════════════
    // Arena access
    // ═══════════════════════════════════════════════════════════════════════

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.index()]
    }

    #[inline]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn files(&self) -> impl Iterator<Item = &ArkFile> {
        self.files.iter()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ArkClass> {
        self.classes.iter()
    }

    pub fn methods(&self) -> impl Iterator<Item = &ArkMethod> {
        self.methods.iter()
    }

    pub fn file(&self, sig: &FileSignature) -> Option<&ArkFile> {
        self.file_index.get(sig).map(|&i| &self.files[i])
    }

    pub fn class(&self, sig: &ClassSignature) -> Option<&ArkClass> {
        self.class_index.get(sig).map(|&i| &self.classes[i])
    }

    pub fn method(&self, sig: &MethodSignature) -> Option<&ArkMethod> {
        self.method_index.get(sig).map(|&i| &self.methods[i])
    }

    /// Invoke expression evaluated by a statement
    pub fn invoke_of(&self, stmt: StmtId) -> Option<&InvokeExpr> {
        self.stmt(stmt)
            .invoke_value()
            .and_then(|v| self.value(v).as_invoke())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Class hierarchy
    // ═══════════════════════════════════════════════════════════════════════

    pub fn super_class(&self, sig: &ClassSignature) -> Option<&ArkClass> {
        self.class(sig)
            .and_then(|c| c.super_class.as_ref())
            .and_then(|s| self.class(s))
    }

    pub fn direct_sub_classes(&self, sig: &ClassSignature) -> &[ClassSignature] {
        self.sub_classes
            .get(sig)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The class itself followed by all transitive subclasses
    pub fn class_and_sub_classes(&self, sig: &ClassSignature) -> Vec<ClassSignature> {
        let mut result = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![sig.clone()];
        while let Some(cls) = stack.pop() {
            if !seen.insert(cls.clone()) {
                continue;
            }
            stack.extend(self.direct_sub_classes(&cls).iter().cloned());
            result.push(cls);
        }
        result
    }

    /// Walks `sig` and its superclasses for a method named `name`
    pub fn find_method_in_chain(
        &self,
        sig: &ClassSignature,
        name: &str,
    ) -> Option<&MethodSignature> {
        let mut seen = FxHashSet::default();
        let mut current = self.class(sig);
        while let Some(cls) = current {
            if !seen.insert(&cls.signature) {
                break;
            }
            if let Some(m) = cls.method_named(name) {
                return Some(m);
            }
            current = cls.super_class.as_ref().and_then(|s| self.class(s));
        }
        None
    }

    /// True if `sub` is `sup` or inherits from it
    pub fn is_sub_class_of(&self, sub: &ClassSignature, sup: &ClassSignature) -> bool {
        let mut seen = FxHashSet::default();
        let mut current = Some(sub.clone());
        while let Some(cls) = current {
            if &cls == sup {
                return true;
            }
            if !seen.insert(cls.clone()) {
                return false;
            }
            current = self.class(&cls).and_then(|c| c.super_class.clone());
        }
        false
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Method queries
    // ═══════════════════════════════════════════════════════════════════════

    /// SDK methods are declared in SDK files or not declared at all
    pub fn is_sdk_method(&self, sig: &MethodSignature) -> bool {
        match self.method(sig) {
            Some(_) => self.file(&sig.class.file).map(|f| f.is_sdk).unwrap_or(true),
            None => true,
        }
    }

    /// Local of `method` named `name`
    pub fn local_named(&self, method: &MethodSignature, name: &str) -> Option<ValueId> {
        self.method(method)?
            .locals()
            .iter()
            .copied()
            .find(|&v| self.value(v).local_name() == Some(name))
    }

    /// Statements assigning to `local`
    pub fn defining_stmts(&self, local: ValueId) -> &[StmtId] {
        self.defs.get(&local).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// The local bound by the unique `this = ThisRef` statement of a method
    pub fn this_local(&self, sig: &MethodSignature) -> Option<ValueId> {
        let method = self.method(sig)?;
        let mut found = None;
        for &sid in method.stmts() {
            if let StmtKind::Assign { left, right } = &self.stmt(sid).kind {
                if matches!(self.value(*right), Value::ThisRef { .. }) {
                    if found.is_some() {
                        return None;
                    }
                    found = Some(*left);
                }
            }
        }
        found
    }

    /// The `ThisRef` value of a method
    pub fn this_ref(&self, sig: &MethodSignature) -> Option<ValueId> {
        let method = self.method(sig)?;
        method.stmts().iter().find_map(|&sid| match &self.stmt(sid).kind {
            StmtKind::Assign { right, .. }
                if matches!(self.value(*right), Value::ThisRef { .. }) =>
            {
                Some(*right)
            }
            _ => None,
        })
    }

    /// `ParameterRef` values of a method ordered by index
    pub fn param_refs(&self, sig: &MethodSignature) -> Vec<(usize, ValueId)> {
        let Some(method) = self.method(sig) else {
            return Vec::new();
        };
        let mut params: Vec<(usize, ValueId)> = method
            .stmts()
            .iter()
            .filter_map(|&sid| match &self.stmt(sid).kind {
                StmtKind::Assign { right, .. } => match self.value(*right) {
                    Value::ParameterRef { index, .. } => Some((*index, *right)),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        params.sort_by_key(|(i, _)| *i);
        params
    }

    /// Values returned by a method
    pub fn return_values(&self, sig: &MethodSignature) -> Vec<ValueId> {
        let Some(method) = self.method(sig) else {
            return Vec::new();
        };
        method
            .stmts()
            .iter()
            .filter_map(|&sid| match &self.stmt(sid).kind {
                StmtKind::Return { value } => *value,
                _ => None,
            })
            .filter(|&v| self.value(v).is_local())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cross-scope resolution
    // ═══════════════════════════════════════════════════════════════════════

    /// Resolves a free local to its declaration at file scope.
    ///
    /// A local is free when its method neither assigns it nor is the file's
    /// default method. The declaration is the same-named local of the default
    /// method of the file, or the exported local named by a matching import.
    pub fn resolve_free_local(&self, local: ValueId) -> Option<ValueId> {
        let Value::Local { name, method, .. } = self.value(local) else {
            return None;
        };
        if method.is_default_method() || !self.defining_stmts(local).is_empty() {
            return None;
        }
        if name == names::THIS || name == names::GLOBAL_THIS {
            return None;
        }
        let file = self.file(&method.class.file)?;

        let default_method = file.default_method();
        if let Some(dflt) = self.method(&default_method) {
            let found = dflt
                .locals()
                .iter()
                .copied()
                .find(|&v| self.value(v).local_name() == Some(name.as_str()));
            if found.is_some() {
                return found;
            }
        }

        let import = file.imports.iter().find(|i| &i.local_name == name)?;
        self.resolve_export(&import.from, &import.imported_name)
    }

    /// Exported local of `file` named `name`
    pub fn resolve_export(&self, file: &FileSignature, name: &str) -> Option<ValueId> {
        self.file(file)?
            .exports
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value)
    }
}
