//! Pointer-analysis configuration
//!
//! Two-tier configuration:
//! - Level 1: Preset - simple one-liner
//! - Level 2: Builder / YAML overrides on top of the preset
//!
//! # Examples
//!
//! ```rust,ignore
//! use ark_pta::config::{ContextType, PtaConfig, Preset};
//!
//! let config = PtaConfig::from_preset(Preset::Balanced).build()?;
//!
//! let config = PtaConfig::from_preset(Preset::Thorough)
//!     .context_type(ContextType::CallSite)
//!     .k_limit(3)
//!     .build()?;
//!
//! let config = PtaConfig::from_yaml("pta.yaml")?;
//! ```
//!
//! The configuration is an explicit value handed to the analysis; there is no
//! process-wide instance.

pub mod error;
pub mod patch;
pub mod preset;
pub mod pta_config;

pub use error::{ConfigError, ConfigResult};
pub use patch::PtaConfigPatch;
pub use preset::Preset;
pub use pta_config::{
    AnalysisScale, ContextType, DumpConfig, PtaConfig, PtsBacking, ValidatedPtaConfig,
};
