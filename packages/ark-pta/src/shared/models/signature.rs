//! Program signatures
//!
//! Files, classes, methods and fields are identified structurally. Two signatures
//! compare equal iff every component is equal, so they can be used directly as
//! map keys by the call graph and the PAG builder.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::constants::names;

/// Identity of a source file inside the Scene
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileSignature {
    pub project: String,
    pub file_name: String,
}

impl FileSignature {
    pub fn new(project: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            file_name: file_name.into(),
        }
    }

    /// Signature used for built-in and SDK declarations with no source file
    pub fn builtin() -> Self {
        Self::new(names::BUILTIN_PROJECT, names::BUILTIN_FILE)
    }
}

impl fmt::Display for FileSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.project, self.file_name)
    }
}

/// Identity of a class (including the synthetic per-file `%dflt` class)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassSignature {
    pub file: FileSignature,
    pub name: String,
}

impl ClassSignature {
    pub fn new(file: FileSignature, name: impl Into<String>) -> Self {
        Self {
            file,
            name: name.into(),
        }
    }

    /// Class declared outside the Scene (e.g. `Array`, `AppStorage`)
    pub fn builtin(name: impl Into<String>) -> Self {
        Self::new(FileSignature::builtin(), name)
    }

    #[inline]
    pub fn is_default_class(&self) -> bool {
        self.name == names::DEFAULT_CLASS
    }

    #[inline]
    pub fn is_builtin(&self) -> bool {
        self.file == FileSignature::builtin()
    }
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file, self.name)
    }
}

/// Identity of a method: declaring class plus name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    pub class: ClassSignature,
    pub name: String,
}

impl MethodSignature {
    pub fn new(class: ClassSignature, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
        }
    }

    /// Method of a built-in class, e.g. `Array.push`
    pub fn builtin(class: &str, name: impl Into<String>) -> Self {
        Self::new(ClassSignature::builtin(class), name)
    }

    #[inline]
    pub fn is_constructor(&self) -> bool {
        self.name == names::CONSTRUCTOR
    }

    /// Arrow functions are lowered to methods named `%AM<n>$<outer>`
    #[inline]
    pub fn is_arrow_function(&self) -> bool {
        self.name.starts_with(names::ARROW_FUNCTION_PREFIX)
    }

    #[inline]
    pub fn is_default_method(&self) -> bool {
        self.name == names::DEFAULT_METHOD
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class.name
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}.{}()>", self.class, self.name)
    }
}

/// Identity of a field. `class` is `None` when the declaring class is unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldSignature {
    pub class: Option<ClassSignature>,
    pub name: String,
    pub is_static: bool,
}

impl FieldSignature {
    pub fn instance(class: Option<ClassSignature>, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            is_static: false,
        }
    }

    pub fn static_field(class: ClassSignature, name: impl Into<String>) -> Self {
        Self {
            class: Some(class),
            name: name.into(),
            is_static: true,
        }
    }
}

impl fmt::Display for FieldSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "<{}.{}>", class, self.name),
            None => write!(f, "<_.{}>", self.name),
        }
    }
}
