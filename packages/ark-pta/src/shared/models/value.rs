//! IR values
//!
//! Every value of the program lives in one Scene-wide arena and is addressed by a
//! dense [`ValueId`]. Locals are values too, so the same id is used wherever a
//! statement reads or writes the local.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::signature::{ClassSignature, FieldSignature, MethodSignature};
use super::types::ArkType;

/// Dense handle of a value in the Scene arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Dispatch flavor of a call expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeKind {
    /// `foo()` / `A.staticMethod()`: the callee is named statically
    Static,
    /// `base.m()`: dispatched on the receiver
    Instance,
    /// `fp()`: call through a function-typed local
    Pointer,
}

/// A call expression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeExpr {
    pub kind: InvokeKind,
    /// Statically declared callee
    pub method: MethodSignature,
    /// Receiver for instance invokes, function pointer for pointer invokes
    pub base: Option<ValueId>,
    pub args: Vec<ValueId>,
}

impl InvokeExpr {
    #[inline]
    pub fn is_static(&self) -> bool {
        self.kind == InvokeKind::Static
    }
}

/// Value variants of the IR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// A local variable. `method` is the declaring method.
    Local {
        name: String,
        ty: ArkType,
        method: MethodSignature,
    },
    /// Literal constant; never carries pointers
    Constant { ty: ArkType, text: String },
    /// `new C()` allocation site
    NewObject { class: ClassSignature },
    /// `new Array()` / `[...]` allocation site
    NewArray { elem_ty: ArkType },
    /// Function literal / reference to a method used as a value
    FunctionRef { method: MethodSignature },
    /// The `globalThis` object
    GlobalThis,
    /// `base.field`
    InstanceFieldRef { base: ValueId, field: FieldSignature },
    /// `C.field`
    StaticFieldRef { field: FieldSignature },
    /// `base[index]`
    ArrayRef { base: ValueId, index: ValueId },
    /// The `index`-th formal parameter
    ParameterRef { index: usize, ty: ArkType },
    /// The receiver of the method
    ThisRef { ty: ArkType },
    /// Read of a captured variable through the lexical environment `base`
    ClosureFieldRef { base: ValueId, field_name: String },
    /// `<T>op` / `op as T`
    Cast { op: ValueId, ty: ArkType },
    /// Arithmetic, comparison, typeof, ... (never carries pointers)
    Expr { operands: Vec<ValueId> },
    Invoke(InvokeExpr),
}

impl Value {
    #[inline]
    pub fn is_local(&self) -> bool {
        matches!(self, Value::Local { .. })
    }

    /// Values that create an abstract object when assigned
    #[inline]
    pub fn is_allocation(&self) -> bool {
        matches!(
            self,
            Value::NewObject { .. }
                | Value::NewArray { .. }
                | Value::FunctionRef { .. }
                | Value::GlobalThis
        )
    }

    #[inline]
    pub fn is_field_like(&self) -> bool {
        matches!(
            self,
            Value::InstanceFieldRef { .. } | Value::ArrayRef { .. }
        )
    }

    #[inline]
    pub fn as_invoke(&self) -> Option<&InvokeExpr> {
        match self {
            Value::Invoke(expr) => Some(expr),
            _ => None,
        }
    }

    /// Name of a local, `None` for other values
    #[inline]
    pub fn local_name(&self) -> Option<&str> {
        match self {
            Value::Local { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Static type of the value when one is recorded
    pub fn ty(&self) -> ArkType {
        match self {
            Value::Local { ty, .. }
            | Value::Constant { ty, .. }
            | Value::ParameterRef { ty, .. }
            | Value::ThisRef { ty }
            | Value::Cast { ty, .. } => ty.clone(),
            Value::NewObject { class } => ArkType::Class(class.clone()),
            Value::NewArray { elem_ty } => ArkType::Array(Box::new(elem_ty.clone())),
            Value::FunctionRef { method } => ArkType::Function(method.clone()),
            _ => ArkType::Unknown,
        }
    }
}
