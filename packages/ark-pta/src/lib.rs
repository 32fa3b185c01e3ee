/*
 * ark-pta - Pointer Analysis for ArkTS / TypeScript programs
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Program IR (Scene, signatures, statements, values)
 * - features/    : Vertical slices (call_graph → points_to)
 * - config/      : Presets, builder, YAML overrides
 * - errors       : Crate error type
 *
 * Analysis:
 * - Call graph seeded directly, by CHA or by RTA
 * - Context-sensitive PAG (k-limited call-site / object / function contexts)
 * - Worklist solver with on-the-fly call-graph discovery
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Call bindings carry many ids
#![allow(clippy::type_complexity)] // Edge logs are tuples of ids
#![allow(clippy::collapsible_if)] // Readability over brevity
#![allow(clippy::collapsible_else_if)] // else if clarity
#![allow(clippy::single_match)] // Single match for readability
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::upper_case_acronyms)] // PAG, CHA, RTA naming

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared program IR
pub mod shared;

/// Feature modules (vertical slices)
pub mod features;

/// Pointer-analysis configuration
pub mod config;

/// Crate error type
pub mod errors;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{AnalysisScale, ContextType, Preset, PtaConfig, PtsBacking, ValidatedPtaConfig};
pub use errors::{PtaError, Result};
pub use features::call_graph::{CallGraph, CallGraphBuilder, FuncID};
pub use features::points_to::{analyze, analyze_with_seed, CallGraphSeed, PointerAnalysis, PtaStats};
pub use shared::models::{Scene, SceneBuilder};
