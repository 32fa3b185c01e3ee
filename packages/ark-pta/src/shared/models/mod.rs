//! Shared models: the program IR the analyses consume

mod scene;
mod scene_builder;
mod signature;
mod stmt;
mod types;
mod value;

pub use scene::{ArkClass, ArkFile, ArkMethod, Body, ExportInfo, ImportInfo, Scene};
pub use scene_builder::{BodyBuilder, SceneBuilder};
pub use signature::{ClassSignature, FieldSignature, FileSignature, MethodSignature};
pub use stmt::{Stmt, StmtId, StmtKind};
pub use types::{ArkType, LexicalEnvType};
pub use value::{InvokeExpr, InvokeKind, Value, ValueId};
