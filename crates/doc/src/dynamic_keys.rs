//! Dynamic-key detection (§4.4): decides which object paths are actually
//! maps keyed by generated identifiers (MongoDB ObjectId-keyed maps and
//! similar) and rewrites their field paths from literal keys to a single
//! wildcard (`*`) segment.
//!
//! The accumulator runs as its own pass over the document stream, ahead of
//! the field inferencer: it tallies, for every object-typed path, the set of
//! literal keys observed there. Once the stream is exhausted, `finalize`
//! walks paths shallowest-first (so a promotion at `byId` is visible before
//! its former children are considered) and produces a [`PathResolver`] that
//! the inferencer consults to canonicalize a literal path to its
//! post-promotion form.

use crate::freq::FrequencyDistribution;
use crate::patterns::{
    detect_dynamic_keys, CustomPatternSpec, DetectionResult, DetectionThresholds, PatternCatalog,
};
use crate::path::FieldPath;
use crate::value::Document;
use std::collections::{BTreeMap, BTreeSet};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DynamicKeyConfigError {
    #[error("threshold must be at least 2, got {0}")]
    ThresholdTooLow(u32),
    #[error("minPatternMatch must be in [0, 1], got {0}")]
    InvalidPatternMatch(f64),
    #[error("confidenceThreshold must be in [0, 1], got {0}")]
    InvalidConfidenceThreshold(f64),
    #[error("duplicate custom pattern name {0:?}")]
    DuplicatePatternName(String),
    #[error("invalid regex for custom pattern {name:?}: {source}")]
    InvalidRegex { name: String, source: String },
    #[error("path {0:?} appears in both forceDynamicPaths and forceStaticPaths")]
    ForceListOverlap(String),
}

/// Configuration for a single dynamic-key detection run (§6).
#[derive(Clone, Debug)]
pub struct DynamicKeyConfig {
    pub threshold: u32,
    pub min_pattern_match: f64,
    pub confidence_threshold: f64,
    pub custom_patterns: Vec<CustomPatternSpec>,
    pub force_dynamic_paths: BTreeSet<String>,
    pub force_static_paths: BTreeSet<String>,
}

impl Default for DynamicKeyConfig {
    fn default() -> Self {
        DynamicKeyConfig {
            threshold: 100,
            min_pattern_match: 0.8,
            confidence_threshold: 0.7,
            custom_patterns: Vec::new(),
            force_dynamic_paths: BTreeSet::new(),
            force_static_paths: BTreeSet::new(),
        }
    }
}

impl DynamicKeyConfig {
    pub fn validate(&self) -> Result<(), DynamicKeyConfigError> {
        if self.threshold < 2 {
            return Err(DynamicKeyConfigError::ThresholdTooLow(self.threshold));
        }
        if !(0.0..=1.0).contains(&self.min_pattern_match) {
            return Err(DynamicKeyConfigError::InvalidPatternMatch(
                self.min_pattern_match,
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DynamicKeyConfigError::InvalidConfidenceThreshold(
                self.confidence_threshold,
            ));
        }
        let mut seen = BTreeSet::new();
        for custom in &self.custom_patterns {
            if !seen.insert(custom.name.clone()) {
                return Err(DynamicKeyConfigError::DuplicatePatternName(
                    custom.name.clone(),
                ));
            }
            if let Err(e) = regex::Regex::new(&custom.regex) {
                return Err(DynamicKeyConfigError::InvalidRegex {
                    name: custom.name.clone(),
                    source: e.to_string(),
                });
            }
        }
        if let Some(overlap) = self
            .force_dynamic_paths
            .intersection(&self.force_static_paths)
            .next()
        {
            return Err(DynamicKeyConfigError::ForceListOverlap(overlap.clone()));
        }
        Ok(())
    }

    fn thresholds(&self) -> DetectionThresholds {
        DetectionThresholds {
            threshold: self.threshold,
            min_pattern_match: self.min_pattern_match,
            confidence_threshold: self.confidence_threshold,
        }
    }

    fn catalog(&self) -> PatternCatalog {
        PatternCatalog::with_custom(&self.custom_patterns)
            .expect("validated during DynamicKeyConfig::validate")
    }
}

/// Memory guard on the retained per-path key sample (§4.4 "Sample cap").
/// Promotion thresholds are tens to hundreds of keys, so a 2000-key sample
/// is always enough to run the pattern detector and report example keys
/// long before the cap is ever reached in a path that should promote.
const UNIQUE_KEYS_SAMPLE_CAP: usize = 2000;

/// Accumulated observations of the literal keys seen at one object-typed
/// path, across every document that had an object there.
///
/// `keys_sample` is capped at [`UNIQUE_KEYS_SAMPLE_CAP`] entries; once full,
/// `total_unique_keys` keeps incrementing on every key not already in the
/// sample, which over-approximates the true unique count above the cap
/// (§4.4: "an over-approximation; acceptable because promotion thresholds
/// are tens-hundreds").
#[derive(Debug, Default, Clone)]
struct KeyObservation {
    keys_sample: BTreeSet<String>,
    total_unique_keys: u64,
    doc_count: u64,
    key_count_per_doc: FrequencyDistribution,
}

impl KeyObservation {
    fn observe_key(&mut self, key: &str) {
        if self.keys_sample.contains(key) {
            return;
        }
        if self.keys_sample.len() < UNIQUE_KEYS_SAMPLE_CAP {
            self.keys_sample.insert(key.to_string());
        }
        self.total_unique_keys += 1;
    }

    fn distinct_keys(&self) -> Vec<String> {
        self.keys_sample.iter().cloned().collect()
    }

    /// Merges another path's observations into this one when promotion
    /// migrates a literal-keyed child into its wildcard parent. Per Design
    /// Note §9 ("Path-migration merge of totalUniqueKeys uses max rather
    /// than a precise union count"), the merged unique-key count is the max
    /// of the two sides rather than their sum, since the two samples may
    /// overlap and neither tracks true set membership past its cap.
    fn merge(&mut self, other: &KeyObservation) {
        for key in &other.keys_sample {
            if self.keys_sample.len() >= UNIQUE_KEYS_SAMPLE_CAP {
                break;
            }
            self.keys_sample.insert(key.clone());
        }
        self.total_unique_keys = self.total_unique_keys.max(other.total_unique_keys);
        self.doc_count += other.doc_count;
        self.key_count_per_doc.merge(&other.key_count_per_doc);
    }
}

/// Per-path detection metadata retained after promotion, describing the
/// shape of the collapsed key space (§4.4 `DynamicKeyMetadata`).
#[derive(Debug, Clone)]
pub struct DynamicKeyMetadata {
    pub detection: DetectionResult,
    pub doc_count: u64,
    pub total_unique_keys: u64,
    pub key_count_histogram: FrequencyDistribution,
    pub example_keys: Vec<String>,
}

fn depth(path: &FieldPath) -> usize {
    path.as_str().chars().filter(|c| *c == '.' || *c == '[').count()
}

/// Tallies per-path key observations across a document stream.
pub struct DynamicKeyAccumulator {
    config: DynamicKeyConfig,
    observations: BTreeMap<FieldPath, KeyObservation>,
}

impl DynamicKeyAccumulator {
    pub fn new(config: DynamicKeyConfig) -> Result<Self, DynamicKeyConfigError> {
        config.validate()?;
        Ok(DynamicKeyAccumulator {
            config,
            observations: BTreeMap::new(),
        })
    }

    pub fn observe(&mut self, doc: &Document) {
        self.visit(&FieldPath::root(), doc);
    }

    fn visit(&mut self, path: &FieldPath, doc: &Document) {
        match doc {
            Document::Object(map) => {
                let entry = self.observations.entry(path.clone()).or_default();
                entry.doc_count += 1;
                entry.key_count_per_doc.update(map.len().to_string());
                for k in map.keys() {
                    entry.observe_key(k);
                }
                for (k, v) in map {
                    let child = path.push_key(k);
                    self.visit(&child, v);
                }
            }
            Document::Array(items) => {
                let child = path.push_array();
                for item in items {
                    self.visit(&child, item);
                }
            }
            _ => {}
        }
    }

    /// Runs the promotion decision shallowest-first and migrates the
    /// literal-keyed statistics of every promoted path into its wildcard
    /// form, returning a resolver the inferencer can use to canonicalize
    /// paths and the retained per-promotion metadata.
    /// Promotion can cascade: a map keyed by generated identifiers can
    /// itself contain another such map one level down, whose path only
    /// comes into existence (as `parent.*...`) after `parent` is promoted.
    /// So this runs to a fixed point, shallowest-first within each round,
    /// stopping once a round promotes nothing new.
    pub fn finalize(mut self) -> PathResolver {
        let catalog = self.config.catalog();
        let thresholds = self.config.thresholds();
        let mut promoted: BTreeMap<String, DynamicKeyMetadata> = BTreeMap::new();
        let mut decided: BTreeSet<String> = BTreeSet::new();

        loop {
            let mut paths: Vec<FieldPath> = self
                .observations
                .keys()
                .filter(|p| !decided.contains(p.as_str()))
                .cloned()
                .collect();
            if paths.is_empty() {
                break;
            }
            paths.sort_by_key(|p| (depth(p), p.as_str().to_string()));

            let mut any_promotion = false;
            for path in paths {
                let path_str = path.as_str().to_string();
                decided.insert(path_str.clone());
                if path.is_root() {
                    continue;
                }
                let Some(obs) = self.observations.get(&path) else {
                    continue;
                };

                if self.config.force_static_paths.contains(&path_str) {
                    continue;
                }

                let forced = self.config.force_dynamic_paths.contains(&path_str);
                let keys = obs.distinct_keys();
                let detection = detect_dynamic_keys(&keys, &catalog, &thresholds);

                if forced || detection.detected {
                    let metadata = DynamicKeyMetadata {
                        detection,
                        doc_count: obs.doc_count,
                        total_unique_keys: obs.total_unique_keys,
                        key_count_histogram: obs.key_count_per_doc.clone(),
                        example_keys: keys.into_iter().take(10).collect(),
                    };
                    self.migrate(&path);
                    promoted.insert(path_str, metadata);
                    any_promotion = true;
                }
            }
            if !any_promotion {
                break;
            }
        }

        PathResolver {
            promoted_prefixes: promoted.keys().cloned().collect(),
            metadata: promoted,
        }
    }

    /// Merges every descendant path's statistics under `parent.<key>...`
    /// into `parent.*...`, then drops the now-collapsed literal entries.
    fn migrate(&mut self, parent: &FieldPath) {
        let prefix = parent.child_prefix();
        let to_merge: Vec<FieldPath> = self
            .observations
            .keys()
            .filter(|p| p.as_str().starts_with(&prefix))
            .cloned()
            .collect();

        for child in to_merge {
            let rewritten = child.rewrite_first_child_to_wildcard(parent.as_str());
            let obs = self.observations.remove(&child).expect("just matched");
            let target = self.observations.entry(rewritten).or_default();
            target.merge(&obs);
        }
    }
}

/// Produced by [`DynamicKeyAccumulator::finalize`]: resolves a literal
/// field path to its post-promotion canonical form, and exposes retained
/// metadata for every promoted path.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    promoted_prefixes: BTreeSet<String>,
    metadata: BTreeMap<String, DynamicKeyMetadata>,
}

impl PathResolver {
    /// Rewrites `path` so that any promoted ancestor's literal key segment
    /// becomes `*`. Applies at most one rewrite per promoted ancestor,
    /// walking from the root down so nested promotions compose correctly.
    pub fn resolve(&self, path: &FieldPath) -> FieldPath {
        let mut current = path.clone();
        for prefix in &self.promoted_prefixes {
            if current.as_str().starts_with(prefix.as_str())
                && current.as_str().len() > prefix.len()
            {
                current = current.rewrite_first_child_to_wildcard(prefix);
            }
        }
        current
    }

    pub fn is_promoted(&self, path: &str) -> bool {
        self.metadata.contains_key(path)
    }

    pub fn metadata(&self, path: &str) -> Option<&DynamicKeyMetadata> {
        self.metadata.get(path)
    }

    pub fn promoted_paths(&self) -> impl Iterator<Item = &str> {
        self.metadata.keys().map(|s| s.as_str())
    }
}
