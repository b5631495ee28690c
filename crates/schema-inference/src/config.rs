//! Run configuration (§6): the dynamic-key detection config and the
//! profiler config, deserializable from a JSON/YAML file and overridable
//! from CLI flags for the common knobs.

use doc::{CustomPatternSpec, DynamicKeyConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum SizeProxy {
    LeafFieldCount,
    ArrayLengthSum,
    ByteSize,
}

impl From<SizeProxy> for doc::SizeProxy {
    fn from(value: SizeProxy) -> Self {
        match value {
            SizeProxy::LeafFieldCount => doc::SizeProxy::LeafFieldCount,
            SizeProxy::ArrayLengthSum => doc::SizeProxy::ArrayLengthSum,
            SizeProxy::ByteSize => doc::SizeProxy::ByteSize,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ArrayLenPolicy {
    PercentileClamp,
    ExactDistribution,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilerConfig {
    #[serde(default = "default_array_len_policy")]
    pub array_len_policy: ArrayLenPolicy,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    pub clamp_range: Option<(f64, f64)>,
    #[serde(default = "default_size_proxy")]
    pub size_proxy: SizeProxy,
}

fn default_array_len_policy() -> ArrayLenPolicy {
    ArrayLenPolicy::PercentileClamp
}

fn default_percentiles() -> Vec<f64> {
    vec![0.5, 0.95]
}

fn default_size_proxy() -> SizeProxy {
    SizeProxy::LeafFieldCount
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        ProfilerConfig {
            array_len_policy: default_array_len_policy(),
            percentiles: default_percentiles(),
            clamp_range: None,
            size_proxy: default_size_proxy(),
        }
    }
}

impl ProfilerConfig {
    /// `array_len_policy`, `percentiles`, and `clamp_range` are accepted for
    /// forward compatibility but the profiler always replays the full
    /// empirical distribution regardless of their value (DESIGN.md Open
    /// Question 5). Warn once per run if a config file set any of them away
    /// from their default so a run relying on percentile clamping doesn't
    /// silently get exact-histogram replay instead.
    pub fn warn_if_inert_knobs_set(&self) {
        let default = ProfilerConfig::default();
        if self.array_len_policy != default.array_len_policy {
            tracing::warn!(
                policy = ?self.array_len_policy,
                "array_len_policy is configured but not yet consulted; the profiler always replays the full empirical array-length distribution",
            );
        }
        if self.percentiles != default.percentiles {
            tracing::warn!(
                percentiles = ?self.percentiles,
                "profiler.percentiles is configured but not yet consulted; numeric bounds always use percentile(0.0)/percentile(1.0)",
            );
        }
        if self.clamp_range.is_some() {
            tracing::warn!(
                clamp_range = ?self.clamp_range,
                "profiler.clampRange is configured but not yet consulted",
            );
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicKeyConfigFile {
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    #[serde(default)]
    pub patterns: Vec<NamedPattern>,
    #[serde(default = "default_min_pattern_match")]
    pub min_pattern_match: f64,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(default)]
    pub force_static_paths: BTreeSet<String>,
    #[serde(default)]
    pub force_dynamic_paths: BTreeSet<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedPattern {
    pub name: String,
    pub regex: String,
}

fn default_threshold() -> u32 {
    100
}
fn default_min_pattern_match() -> f64 {
    0.8
}
fn default_confidence_threshold() -> f64 {
    0.7
}

impl Default for DynamicKeyConfigFile {
    fn default() -> Self {
        DynamicKeyConfigFile {
            threshold: default_threshold(),
            patterns: Vec::new(),
            min_pattern_match: default_min_pattern_match(),
            confidence_threshold: default_confidence_threshold(),
            force_static_paths: BTreeSet::new(),
            force_dynamic_paths: BTreeSet::new(),
        }
    }
}

impl DynamicKeyConfigFile {
    pub fn into_dynamic_key_config(self) -> DynamicKeyConfig {
        DynamicKeyConfig {
            threshold: self.threshold,
            min_pattern_match: self.min_pattern_match,
            confidence_threshold: self.confidence_threshold,
            custom_patterns: self
                .patterns
                .into_iter()
                .map(|p| CustomPatternSpec { name: p.name, regex: p.regex })
                .collect(),
            force_dynamic_paths: self.force_dynamic_paths,
            force_static_paths: self.force_static_paths,
        }
    }
}

/// The run's full configuration, as loaded from a JSON or YAML file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub dynamic_keys: DynamicKeyConfigFile,
    #[serde(default)]
    pub profiler: ProfilerConfig,
    /// A field whose presence is treated as the document's primary key for
    /// uniqueness checks (§4.7, §4.9); defaults to `_id`.
    #[serde(default = "default_key_field")]
    pub key_field: String,
}

fn default_key_field() -> String {
    "_id".to_string()
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::error::Error> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&text)?),
            _ => Ok(serde_json::from_str(&text)?),
        }
    }

    /// Validates the configuration, fatal at startup per §7.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        self.clone()
            .dynamic_keys
            .into_dynamic_key_config()
            .validate()
            .map_err(crate::error::Error::DynamicKeyConfig)
    }
}
