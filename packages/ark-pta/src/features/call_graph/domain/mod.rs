//! Call graph domain model

pub mod call_graph;

pub use call_graph::{
    CallGraph, CallGraphEdge, CallGraphNode, CallGraphNodeKind, CallKind, CallSite, CallSiteID,
    CallSiteManager, DynCallSite, FuncID,
};
