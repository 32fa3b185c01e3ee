//! IR statements

use serde::{Deserialize, Serialize};
use std::fmt;

use super::signature::MethodSignature;
use super::value::ValueId;

/// Dense handle of a statement in the Scene arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StmtId(pub u32);

impl StmtId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `left = right`; `right` may be an invoke expression
    Assign { left: ValueId, right: ValueId },
    /// Call whose result is discarded
    Invoke { expr: ValueId },
    Return { value: Option<ValueId> },
    /// Control flow and other statements irrelevant to pointer flow
    Nop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: StmtId,
    /// Declaring method
    pub method: MethodSignature,
    pub kind: StmtKind,
}

impl Stmt {
    /// The invoke expression this statement evaluates, if any. The caller decides
    /// whether the referenced value really is an invoke.
    #[inline]
    pub fn invoke_value(&self) -> Option<ValueId> {
        match &self.kind {
            StmtKind::Assign { right, .. } => Some(*right),
            StmtKind::Invoke { expr } => Some(*expr),
            _ => None,
        }
    }

    /// Local receiving the call result (`x = f()`)
    #[inline]
    pub fn def_value(&self) -> Option<ValueId> {
        match &self.kind {
            StmtKind::Assign { left, .. } => Some(*left),
            _ => None,
        }
    }
}
