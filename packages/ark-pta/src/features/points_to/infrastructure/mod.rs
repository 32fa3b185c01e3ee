//! Points-to infrastructure
//!
//! - `pag_builder`: FuncPag construction and per-context instantiation
//! - `plugins`: models for calls without analysable bodies
//! - `solver`: worklist propagation with on-the-fly call resolution
//! - `dump`: dot / JSON artifacts of a finished run

pub mod dump;
pub mod pag_builder;
pub mod plugins;
pub mod solver;

pub use dump::write_dumps;
pub use pag_builder::{CallBinding, PagBuilder};
pub use plugins::{PluginCall, PluginManager, PtaPlugin};
pub use solver::{PointerAnalysis, PtaStats};
