//! Call-graph construction and resolution

pub mod abstract_analysis;
pub mod builder;
pub mod cha;
pub mod rta;

pub use abstract_analysis::AbstractAnalysis;
pub use builder::CallGraphBuilder;
pub use cha::ClassHierarchyAnalysis;
pub use rta::RapidTypeAnalysis;
