//! One-call pointer analysis
//!
//! # Usage
//! ```text
//! use ark_pta::config::{PtaConfig, Preset};
//! use ark_pta::features::points_to::application::analyze;
//!
//! let config = PtaConfig::from_preset(Preset::Balanced).build()?;
//! let pta = analyze(&scene, &[main], config)?;
//! assert!(pta.may_alias(a, b));
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ValidatedPtaConfig;
use crate::errors::Result;
use crate::features::call_graph::domain::CallGraph;
use crate::features::call_graph::infrastructure::CallGraphBuilder;
use crate::features::points_to::infrastructure::PointerAnalysis;
use crate::shared::models::{MethodSignature, Scene};

/// Call graph the solver starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallGraphSeed {
    /// Static calls only; every dynamic call is left to the solver
    #[default]
    Direct,

    /// Dynamic calls pre-resolved by class hierarchy
    ClassHierarchy,

    /// Dynamic calls pre-resolved against instantiated classes
    RapidType,
}

/// Builds the seed call graph, sets `entries` and runs the solver to its
/// fixpoint
pub fn analyze<'a>(
    scene: &'a Scene,
    entries: &[MethodSignature],
    config: ValidatedPtaConfig,
) -> Result<PointerAnalysis<'a>> {
    analyze_with_seed(scene, entries, config, CallGraphSeed::Direct)
}

pub fn analyze_with_seed<'a>(
    scene: &'a Scene,
    entries: &[MethodSignature],
    config: ValidatedPtaConfig,
    seed: CallGraphSeed,
) -> Result<PointerAnalysis<'a>> {
    info!(
        entries = entries.len(),
        seed = ?seed,
        config = %config.describe(),
        "Pointer analysis requested"
    );

    let mut cg = CallGraph::new();
    {
        let mut builder = CallGraphBuilder::new(&mut cg, scene);
        match seed {
            CallGraphSeed::Direct => {
                builder.build_direct_call_graph_for_scene();
                builder.set_entries(entries);
            }
            CallGraphSeed::ClassHierarchy => {
                builder.build_class_hierarchy_call_graph(entries);
            }
            CallGraphSeed::RapidType => {
                builder.build_rapid_type_call_graph(entries);
            }
        }
    }

    let mut pta = PointerAnalysis::with_call_graph(scene, cg, config);
    pta.start()?;
    Ok(pta)
}
