//! Crate-level error and warning types (§7).

use doc::DynamicKeyConfigError;

/// A fatal error, propagated out of its stage and cancelling the pipeline.
/// Variant maps to the CLI exit codes of §6: `Configuration` → 2,
/// `Source` → 3, `Validation` → 4.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid dynamic-key configuration: {0}")]
    DynamicKeyConfig(#[from] DynamicKeyConfigError),

    #[error("document source error: {0}")]
    Source(String),

    #[error("schema validation failed: {0}")]
    Validation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// The process exit code a fatal error of this kind maps to (§6).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Configuration(_) | Error::DynamicKeyConfig(_) => 2,
            Error::Source(_) => 3,
            Error::Validation(_) => 4,
            Error::Io(_) | Error::Json(_) | Error::Yaml(_) => 2,
        }
    }
}

/// Non-fatal conditions surfaced in a run's final report rather than
/// aborting the pipeline (§7).
#[derive(Debug, Clone)]
pub enum Warning {
    /// A traversal-time value could not be normalized as its declared
    /// vendor type and was coerced to a fallback representation.
    Traversal { path: String, detail: String },
    /// A dynamic key's uniqueness-retry budget (`10 × count`) was
    /// exhausted; generation returned the largest unique set obtained.
    UniquenessRetryExhausted { path: String, requested: usize, produced: usize },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Traversal { path, detail } => {
                write!(f, "traversal warning at {path}: {detail}")
            }
            Warning::UniquenessRetryExhausted { path, requested, produced } => {
                write!(
                    f,
                    "uniqueness retry exhausted at {path}: wanted {requested} unique keys, produced {produced}"
                )
            }
        }
    }
}

/// Accumulated non-fatal findings from a single pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub warnings: Vec<Warning>,
}

impl RunReport {
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!(%warning, "pipeline warning");
        self.warnings.push(warning);
    }
}
