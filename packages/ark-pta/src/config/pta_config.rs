//! Pointer-analysis configuration
//!
//! Preset-based defaults, builder overrides, validation and YAML I/O.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{
    error::{ConfigError, ConfigResult},
    patch::PtaConfigPatch,
    preset::Preset,
};
use crate::shared::constants::context::MAX_K_LIMIT;

/// Flavor of context items appended at each call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    /// k-call-site sensitivity
    CallSite,
    /// k-object (allocation-site) sensitivity
    Object,
    /// k-function sensitivity
    Function,
}

/// Whole-program closure or a local query around the entry methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisScale {
    WholeProgram,
    /// On-the-fly call resolution stops after the first round
    MethodLevel,
}

/// Backing of the points-to sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtsBacking {
    HashSet,
    BitVector,
}

/// Debug artifacts written after the fixpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Output directory; nothing is written when unset
    pub dir: Option<PathBuf>,

    /// Graphviz renderings of the PAG and call graph
    pub dot_graphs: bool,

    /// JSON list of bodiless callees no plugin handled
    pub unhandled_funcs: bool,
}

impl DumpConfig {
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some() && (self.dot_graphs || self.unhandled_funcs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtaConfig {
    pub context_type: ContextType,

    /// Maximum context length (0 = context-insensitive)
    pub k_limit: usize,

    pub analysis_scale: AnalysisScale,

    pub pts_backing: PtsBacking,

    pub dump: DumpConfig,

    preset: Preset,
}

impl PtaConfig {
    /// Get preset configuration
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                context_type: ContextType::CallSite,
                k_limit: 0,
                analysis_scale: AnalysisScale::MethodLevel,
                pts_backing: PtsBacking::HashSet,
                dump: DumpConfig::default(),
                preset,
            },
            Preset::Balanced => Self {
                context_type: ContextType::CallSite,
                k_limit: 1,
                analysis_scale: AnalysisScale::WholeProgram,
                pts_backing: PtsBacking::HashSet,
                dump: DumpConfig::default(),
                preset,
            },
            Preset::Thorough => Self {
                context_type: ContextType::Object,
                k_limit: 2,
                analysis_scale: AnalysisScale::WholeProgram,
                pts_backing: PtsBacking::BitVector,
                dump: DumpConfig::default(),
                preset,
            },
        }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.k_limit > MAX_K_LIMIT {
            return Err(ConfigError::range_with_hint(
                "k_limit",
                self.k_limit,
                0,
                MAX_K_LIMIT,
                "Longer contexts explode the PAG; use object sensitivity for more precision",
            ));
        }

        if self.dump.dir.is_none() && (self.dump.dot_graphs || self.dump.unhandled_funcs) {
            return Err(ConfigError::Conflict {
                issue: "dump artifacts requested without an output directory".to_string(),
                fix: "set dump.dir or disable dot_graphs/unhandled_funcs".to_string(),
            });
        }

        Ok(())
    }

    /// Builder: Set context_type
    pub fn context_type(mut self, v: ContextType) -> Self {
        self.context_type = v;
        self
    }

    /// Builder: Set k_limit
    pub fn k_limit(mut self, v: usize) -> Self {
        self.k_limit = v;
        self
    }

    /// Builder: Set analysis_scale
    pub fn analysis_scale(mut self, v: AnalysisScale) -> Self {
        self.analysis_scale = v;
        self
    }

    /// Builder: Set pts_backing
    pub fn pts_backing(mut self, v: PtsBacking) -> Self {
        self.pts_backing = v;
        self
    }

    /// Builder: Write dumps under `dir`
    pub fn dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump.dir = Some(dir.into());
        self
    }

    /// Builder: Set dump.dot_graphs
    pub fn dot_graphs(mut self, v: bool) -> Self {
        self.dump.dot_graphs = v;
        self
    }

    /// Builder: Set dump.unhandled_funcs
    pub fn unhandled_funcs(mut self, v: bool) -> Self {
        self.dump.unhandled_funcs = v;
        self
    }

    /// Build and validate configuration
    pub fn build(self) -> ConfigResult<ValidatedPtaConfig> {
        self.validate()?;
        Ok(ValidatedPtaConfig(self))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // YAML I/O
    // ═══════════════════════════════════════════════════════════════════════

    /// Export as YAML (schema v1)
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let export = PtaConfigExportV1 {
            version: 1,
            preset: self.preset.to_string(),
            pta: Some(PtaConfigPatch::from_config(self)),
        };
        serde_yaml::to_string(&export).map_err(ConfigError::Yaml)
    }

    /// Parse YAML (schema v1). Fields missing from `pta` come from the preset.
    pub fn from_yaml_str(content: &str) -> ConfigResult<ValidatedPtaConfig> {
        let export: PtaConfigExportV1 = serde_yaml::from_str(content)?;

        if export.version != 1 {
            return Err(ConfigError::UnsupportedVersion {
                found: export.version,
                supported: vec![1],
            });
        }

        let preset: Preset = export.preset.parse()?;

        let mut config = Self::from_preset(preset);
        if let Some(overrides) = export.pta {
            config = config.patch(overrides);
        }
        config.build()
    }

    /// Load a YAML configuration file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<ValidatedPtaConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

impl Default for PtaConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PtaConfigExportV1 {
    version: u32,
    preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pta: Option<PtaConfigPatch>,
}

/// Configuration that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedPtaConfig(PtaConfig);

impl ValidatedPtaConfig {
    /// Unwrap the validated config to get the inner PtaConfig
    pub fn into_inner(self) -> PtaConfig {
        self.0
    }

    /// Get a reference to the inner PtaConfig
    pub fn as_inner(&self) -> &PtaConfig {
        &self.0
    }

    pub fn context_type(&self) -> ContextType {
        self.0.context_type
    }

    pub fn k_limit(&self) -> usize {
        self.0.k_limit
    }

    pub fn analysis_scale(&self) -> AnalysisScale {
        self.0.analysis_scale
    }

    pub fn pts_backing(&self) -> PtsBacking {
        self.0.pts_backing
    }

    pub fn dump(&self) -> &DumpConfig {
        &self.0.dump
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        self.0.to_yaml()
    }

    /// Get a human-readable description of the configuration
    pub fn describe(&self) -> String {
        format!(
            "preset={} context={:?} k={} scale={:?} pts={:?}",
            self.0.preset,
            self.0.context_type,
            self.0.k_limit,
            self.0.analysis_scale,
            self.0.pts_backing
        )
    }
}

impl Default for ValidatedPtaConfig {
    fn default() -> Self {
        ValidatedPtaConfig(PtaConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough] {
            assert!(PtaConfig::from_preset(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_k_limit_range() {
        assert!(PtaConfig::default().k_limit(5).build().is_ok());

        let err = PtaConfig::default().k_limit(6).build().unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));
        assert!(err.to_string().contains("k_limit"));
    }

    #[test]
    fn test_dump_requires_dir() {
        let err = PtaConfig::default().dot_graphs(true).build().unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));

        let ok = PtaConfig::default()
            .dump_dir("/tmp/pta")
            .dot_graphs(true)
            .build()
            .unwrap();
        assert!(ok.dump().is_enabled());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PtaConfig::from_preset(Preset::Thorough).k_limit(3);
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("preset: thorough"));
        assert!(yaml.contains("k_limit: 3"));
        assert!(yaml.contains("context_type: object"));

        let loaded = PtaConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(loaded.as_inner(), &config);
    }

    #[test]
    fn test_yaml_partial_override() {
        let yaml = r#"
version: 1
preset: thorough
pta:
  k_limit: 1
  pts_backing: hash_set
"#;
        let config = PtaConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.k_limit(), 1);
        assert_eq!(config.pts_backing(), PtsBacking::HashSet);
        assert_eq!(config.context_type(), ContextType::Object);
    }

    #[test]
    fn test_yaml_preset_only() {
        let config = PtaConfig::from_yaml_str("version: 1\npreset: fast\n").unwrap();
        assert_eq!(config.analysis_scale(), AnalysisScale::MethodLevel);
        assert_eq!(config.k_limit(), 0);
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = PtaConfig::from_yaml_str("version: 2\npreset: fast\n");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::UnsupportedVersion { .. }
        ));
    }

    #[test]
    fn test_yaml_unknown_preset() {
        let result = PtaConfig::from_yaml_str("version: 1\npreset: turbo\n");
        assert!(matches!(result.unwrap_err(), ConfigError::UnknownPreset(_)));
    }

    #[test]
    fn test_yaml_rejects_large_k() {
        let yaml = "version: 1\npreset: balanced\npta:\n  k_limit: 9\n";
        assert!(PtaConfig::from_yaml_str(yaml).is_err());
    }
}
