//! Document value model and streaming statistical profiler.
//!
//! This crate owns the shared vocabulary used across the inference
//! pipeline: the recursive [`value::Document`] type, frequency-map
//! primitives, identifier-pattern and semantic-type detectors, and the
//! dynamic-key promotion pass that collapses generated-identifier-keyed
//! maps to a single wildcard path.

pub mod dynamic_keys;
pub mod freq;
pub mod inference;
pub mod patterns;
pub mod path;
pub mod profiler;
pub mod semantic;
pub mod value;

pub use dynamic_keys::{DynamicKeyAccumulator, DynamicKeyConfig, DynamicKeyConfigError, PathResolver};
pub use freq::{FreqError, FrequencyDistribution, Stats};
pub use inference::{InferredField, InferredSchema, Inferencer, TypeRecord};
pub use patterns::{ConfidenceLevel, CustomPatternSpec, DetectionResult, PatternCatalog, PatternTag};
pub use path::FieldPath;
pub use profiler::{ConstraintsProfile, DocumentProfiler, SizeBucket, SizeProxy};
pub use semantic::{SemanticLabel, SemanticStatsAccumulator};
pub use value::{Document, TypeTag};
