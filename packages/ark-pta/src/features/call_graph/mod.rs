//! Call graph
//!
//! - `domain`: nodes, aggregated edges, call sites
//! - `infrastructure`: direct builder and the CHA / RTA resolvers

pub mod domain;
pub mod infrastructure;

pub use domain::*;
pub use infrastructure::*;
