//! Analysis features (vertical slices)
//!
//! - `call_graph`: call-graph model, direct builder, CHA and RTA
//! - `points_to`: PAG construction and the points-to solver

pub mod call_graph;
pub mod points_to;
