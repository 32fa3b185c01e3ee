//! Static types attached to IR values

use serde::{Deserialize, Serialize};

use super::signature::{ClassSignature, MethodSignature};
use super::value::ValueId;

/// Static type of a value as inferred by the front-end
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArkType {
    Unknown,
    Any,
    /// number, string, boolean, void, undefined, ...
    Primitive(String),
    Class(ClassSignature),
    /// Function-typed value whose target is known statically
    Function(MethodSignature),
    Array(Box<ArkType>),
    /// Environment record passed to a nested method: the captured locals of the
    /// enclosing method, in declaration order
    LexicalEnv(LexicalEnvType),
}

impl ArkType {
    pub fn primitive(name: impl Into<String>) -> Self {
        ArkType::Primitive(name.into())
    }

    #[inline]
    pub fn class_signature(&self) -> Option<&ClassSignature> {
        match self {
            ArkType::Class(sig) => Some(sig),
            _ => None,
        }
    }

    #[inline]
    pub fn function_signature(&self) -> Option<&MethodSignature> {
        match self {
            ArkType::Function(sig) => Some(sig),
            _ => None,
        }
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, ArkType::Function(_))
    }

    #[inline]
    pub fn is_primitive(&self) -> bool {
        matches!(self, ArkType::Primitive(_))
    }
}

impl Default for ArkType {
    fn default() -> Self {
        ArkType::Unknown
    }
}

/// Captured locals of one lexical environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LexicalEnvType {
    /// Nested method the environment is passed to
    pub nested_method: MethodSignature,
    /// Captured locals (ids of `Value::Local` in the enclosing method)
    pub closures: Vec<ValueId>,
}
