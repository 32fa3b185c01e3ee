//! Shared module - Program IR and constants
//!
//! Types here are consumed by every feature. Nothing in this module depends on
//! the call graph or the pointer analysis.

pub mod constants;
pub mod models;

pub use models::*;
