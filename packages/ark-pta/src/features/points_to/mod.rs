//! Context-sensitive pointer analysis
//!
//! Methods are summarised once into a [`FuncPag`](domain::FuncPag) and
//! instantiated per context into the global [`Pag`](domain::Pag). The solver
//! propagates points-to sets over the PAG and discovers call edges as
//! receiver objects become known.
//!
//! ## Usage
//! ```text
//! use ark_pta::features::points_to::PointerAnalysis;
//!
//! let mut pta = PointerAnalysis::new(&scene, config);
//! pta.set_entries(&[main]);
//! pta.start()?;
//! let objs = pta.points_to(x);
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{analyze, analyze_with_seed, CallGraphSeed};
pub use domain::{
    ContextID, DiffPTData, FuncPag, NodeID, Pag, PagEdgeKind, PagNode, PagNodeKind, PagValue,
    PointsToSet, PtsSet, DUMMY_CID,
};
pub use infrastructure::{PagBuilder, PluginManager, PointerAnalysis, PtaPlugin, PtaStats};
