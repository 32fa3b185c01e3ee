//! Partial overrides applied on top of a preset
//!
//! YAML files and FFI callers describe only the fields they change; everything
//! else comes from the preset.

use serde::{Deserialize, Serialize};

use super::pta_config::{AnalysisScale, ContextType, DumpConfig, PtaConfig, PtsBacking};

/// Patch type for PtaConfig
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PtaConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_type: Option<ContextType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_scale: Option<AnalysisScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pts_backing: Option<PtsBacking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<DumpConfig>,
}

impl PtaConfigPatch {
    /// Full patch reproducing `config` on any preset
    pub fn from_config(config: &PtaConfig) -> Self {
        Self {
            context_type: Some(config.context_type),
            k_limit: Some(config.k_limit),
            analysis_scale: Some(config.analysis_scale),
            pts_backing: Some(config.pts_backing),
            dump: Some(config.dump.clone()),
        }
    }
}

impl PtaConfig {
    /// Apply PTA patch
    pub fn patch(mut self, patch: PtaConfigPatch) -> Self {
        if let Some(v) = patch.context_type {
            self.context_type = v;
        }
        if let Some(v) = patch.k_limit {
            self.k_limit = v;
        }
        if let Some(v) = patch.analysis_scale {
            self.analysis_scale = v;
        }
        if let Some(v) = patch.pts_backing {
            self.pts_backing = v;
        }
        if let Some(v) = patch.dump {
            self.dump = v;
        }
        self
    }
}
