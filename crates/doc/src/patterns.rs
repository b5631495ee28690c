//! Pattern catalog (§4.2): regular-expression-based classifiers for
//! identifier formats, and the `DetectDynamicKeys` decision procedure used
//! by the dynamic-key subsystem's promotion rule.

use regex::Regex;
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter};

/// A named identifier-format pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum PatternTag {
    #[strum(serialize = "UUID")]
    Uuid,
    #[strum(serialize = "MONGODB_OBJECTID")]
    MongodbObjectId,
    #[strum(serialize = "ULID")]
    Ulid,
    #[strum(serialize = "NUMERIC_ID")]
    Numeric,
    #[strum(serialize = "PREFIXED_ID")]
    Prefixed,
    #[strum(serialize = "CUSTOM")]
    Custom,
}

/// One catalog entry: a name and a compiled, anchored full-string match.
#[derive(Clone)]
pub struct Pattern {
    pub tag: PatternTag,
    pub name: String,
    regex: Regex,
}

impl Pattern {
    pub fn matches(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

fn anchored(re: &str) -> Regex {
    Regex::new(&format!("^(?:{re})$")).expect("catalog pattern is a valid regex")
}

fn builtin_catalog() -> &'static Vec<Pattern> {
    static CATALOG: OnceLock<Vec<Pattern>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            Pattern {
                tag: PatternTag::Uuid,
                name: "UUID".to_string(),
                regex: anchored(
                    r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                ),
            },
            Pattern {
                tag: PatternTag::MongodbObjectId,
                name: "MONGODB_OBJECTID".to_string(),
                regex: anchored(r"[0-9a-fA-F]{24}"),
            },
            Pattern {
                tag: PatternTag::Ulid,
                name: "ULID".to_string(),
                regex: anchored(r"[0-7][0-9A-HJKMNP-TV-Z]{25}"),
            },
            Pattern {
                tag: PatternTag::Numeric,
                name: "NUMERIC_ID".to_string(),
                regex: anchored(r"[0-9]+"),
            },
            Pattern {
                tag: PatternTag::Prefixed,
                name: "PREFIXED_ID".to_string(),
                regex: anchored(r"[a-zA-Z]+[_-][0-9a-zA-Z]+"),
            },
        ]
    })
}

/// A user-supplied `{name, regex}` pattern (§6 Configuration), reported
/// under the `CUSTOM` tag.
#[derive(Clone, Debug)]
pub struct CustomPatternSpec {
    pub name: String,
    pub regex: String,
}

/// The pattern catalog used by a single dynamic-key detection config:
/// the five built-ins plus any caller-supplied custom patterns.
#[derive(Clone)]
pub struct PatternCatalog {
    patterns: Vec<Pattern>,
}

impl PatternCatalog {
    pub fn builtin() -> Self {
        PatternCatalog {
            patterns: builtin_catalog().clone(),
        }
    }

    pub fn with_custom(customs: &[CustomPatternSpec]) -> Result<Self, regex::Error> {
        let mut patterns = builtin_catalog().clone();
        for custom in customs {
            patterns.push(Pattern {
                tag: PatternTag::Custom,
                name: custom.name.clone(),
                regex: anchored(&custom.regex),
            });
        }
        Ok(PatternCatalog { patterns })
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Computes the match ratio of `keys` against each cataloged pattern
    /// and returns the best-matching pattern (if any keys were given) along
    /// with its ratio.
    fn best_match(&self, keys: &[String]) -> (Option<&Pattern>, f64) {
        if keys.is_empty() {
            return (None, 0.0);
        }
        self.patterns
            .iter()
            .map(|p| {
                let matched = keys.iter().filter(|k| p.matches(k)).count();
                (Some(p), matched as f64 / keys.len() as f64)
            })
            .fold((None, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.8 {
            ConfidenceLevel::High
        } else if confidence >= 0.6 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// The `DetectDynamicKeys` result (§4.2 steps 1–8).
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub detected: bool,
    pub confidence: f64,
    pub level: ConfidenceLevel,
    pub pattern: Option<PatternTag>,
    pub pattern_name: Option<String>,
    /// Set to `"HIGH_CARDINALITY"` when detection was driven by key count
    /// alone, per step 6.
    pub custom_pattern: Option<String>,
    pub match_ratio: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct DetectionThresholds {
    pub threshold: u32,
    pub min_pattern_match: f64,
    pub confidence_threshold: f64,
}

/// Implements the §4.2 decision procedure.
pub fn detect_dynamic_keys(
    keys: &[String],
    catalog: &PatternCatalog,
    config: &DetectionThresholds,
) -> DetectionResult {
    let (best, match_ratio) = catalog.best_match(keys);
    let len = keys.len();

    let meets_count = len as u32 >= config.threshold;
    let meets_pattern = match_ratio >= config.min_pattern_match;

    let mut pattern = best.map(|p| p.tag);
    let mut pattern_name = best.map(|p| p.name.clone());
    let mut custom_pattern = None;

    let confidence = if !meets_count && !meets_pattern {
        match_ratio
    } else if meets_count && meets_pattern {
        let ratio = len as f64 / config.threshold as f64;
        if ratio > 2.0 {
            match_ratio + (0.1f64).min((ratio - 2.0) * 0.02)
        } else {
            match_ratio
        }
    } else if meets_pattern {
        (match_ratio + 0.05).min(1.0)
    } else {
        // Only the count condition holds: high cardinality without a
        // recognized identifier shape.
        let ratio = len as f64 / config.threshold as f64;
        pattern = None;
        pattern_name = None;
        custom_pattern = Some("HIGH_CARDINALITY".to_string());
        (config.confidence_threshold + ratio.log10() * 0.2).min(0.9)
    };

    let detected = confidence >= config.confidence_threshold;
    DetectionResult {
        detected,
        confidence,
        level: ConfidenceLevel::from_confidence(confidence),
        pattern,
        pattern_name,
        custom_pattern,
        match_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> DetectionThresholds {
        DetectionThresholds {
            threshold: 100,
            min_pattern_match: 0.8,
            confidence_threshold: 0.7,
        }
    }

    fn hex24_keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:024x}", i)).collect()
    }

    #[test]
    fn detects_mongodb_objectid_pattern() {
        let catalog = PatternCatalog::builtin();
        let keys = hex24_keys(1_200);
        let result = detect_dynamic_keys(&keys, &catalog, &thresholds());
        assert!(result.detected);
        assert_eq!(result.pattern, Some(PatternTag::MongodbObjectId));
        assert!(result.confidence >= 0.8);
        assert_eq!(result.level, ConfidenceLevel::High);
    }

    #[test]
    fn neither_condition_does_not_promote() {
        let catalog = PatternCatalog::builtin();
        let keys: Vec<String> = vec!["foo".into(), "bar".into(), "baz".into()];
        let result = detect_dynamic_keys(&keys, &catalog, &thresholds());
        assert!(!result.detected);
    }

    #[test]
    fn high_cardinality_without_pattern_match() {
        let catalog = PatternCatalog::builtin();
        // Plenty of keys, but not matching any identifier pattern as a
        // whole (mixed natural-language words).
        let keys: Vec<String> = (0..500)
            .map(|i| format!("some natural key phrase {i}"))
            .collect();
        let result = detect_dynamic_keys(&keys, &catalog, &thresholds());
        assert_eq!(result.custom_pattern.as_deref(), Some("HIGH_CARDINALITY"));
        assert!(result.pattern.is_none());
    }

    #[test]
    fn confidence_level_thresholds() {
        assert_eq!(ConfidenceLevel::from_confidence(0.81), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(0.65), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.1), ConfidenceLevel::Low);
    }
}
