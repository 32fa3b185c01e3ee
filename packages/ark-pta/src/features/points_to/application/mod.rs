//! Entry points for consumers of the analysis
//!
//! - `analyzer`: seed call graph + solver in one call
//! - `queries`: alias queries on a finished
//!   [`PointerAnalysis`](super::infrastructure::PointerAnalysis)

pub mod analyzer;
pub mod queries;

pub use analyzer::{analyze, analyze_with_seed, CallGraphSeed};
