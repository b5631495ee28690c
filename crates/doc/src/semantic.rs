//! Semantic detector catalog (§4.3): field-name and value validators for
//! Email, URL, UUID, Phone, PersonName, and IP address, each with a
//! priority and a minimum confidence.

use regex::Regex;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::OnceLock;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum SemanticLabel {
    Email,
    Url,
    Uuid,
    Phone,
    PersonName,
    IpAddress,
}

pub struct SemanticDetector {
    pub label: SemanticLabel,
    /// Matched against the *field name*, not its value.
    name_patterns: Vec<Regex>,
    /// Minimum fraction of sampled values that must validate for this
    /// detector to win.
    pub min_confidence: f64,
    /// Lower priority value wins when multiple detectors' name patterns
    /// match the same field.
    pub priority: u8,
    validate: fn(&str) -> bool,
}

impl SemanticDetector {
    pub fn name_matches(&self, field_name: &str) -> bool {
        self.name_patterns.iter().any(|re| re.is_match(field_name))
    }

    pub fn validate_value(&self, value: &str) -> bool {
        (self.validate)(value)
    }
}

fn name_res(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid semantic name pattern"))
        .collect()
}

fn validate_email(v: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
    });
    re.is_match(v)
}

fn validate_url(v: &str) -> bool {
    url::Url::parse(v)
        .map(|u| matches!(u.scheme(), "http" | "https" | "ftp"))
        .unwrap_or(false)
}

fn validate_uuid(v: &str) -> bool {
    Uuid::from_str(v).is_ok()
}

fn validate_phone(v: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^\+?[0-9][0-9\-\s\.\(\)]{6,18}[0-9]$").expect("valid phone regex")
    });
    re.is_match(v)
}

fn validate_person_name(v: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^[A-Z][a-zA-Z'\-]+(?: [A-Z][a-zA-Z'\-]+)+$").expect("valid name regex")
    });
    re.is_match(v)
}

fn validate_ip_address(v: &str) -> bool {
    v.parse::<std::net::IpAddr>().is_ok()
}

fn catalog() -> &'static Vec<SemanticDetector> {
    static CATALOG: OnceLock<Vec<SemanticDetector>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            SemanticDetector {
                label: SemanticLabel::Email,
                name_patterns: name_res(&["email", "e_?mail"]),
                min_confidence: 0.8,
                priority: 0,
                validate: validate_email,
            },
            SemanticDetector {
                label: SemanticLabel::Uuid,
                name_patterns: name_res(&["uuid", "guid"]),
                min_confidence: 0.8,
                priority: 1,
                validate: validate_uuid,
            },
            SemanticDetector {
                label: SemanticLabel::IpAddress,
                name_patterns: name_res(&["ip_?address", "^ip$", "ip_?addr"]),
                min_confidence: 0.8,
                priority: 2,
                validate: validate_ip_address,
            },
            SemanticDetector {
                label: SemanticLabel::Url,
                name_patterns: name_res(&["url", "website", "homepage", "link"]),
                min_confidence: 0.7,
                priority: 3,
                validate: validate_url,
            },
            SemanticDetector {
                label: SemanticLabel::Phone,
                name_patterns: name_res(&["phone", "mobile", "tel(ephone)?"]),
                min_confidence: 0.7,
                priority: 4,
                validate: validate_phone,
            },
            SemanticDetector {
                label: SemanticLabel::PersonName,
                name_patterns: name_res(&["^name$", "full_?name", "person_?name", "display_?name"]),
                min_confidence: 0.6,
                priority: 5,
                validate: validate_person_name,
            },
        ]
    })
}

/// Scans detectors in priority order for a single string-typed field;
/// the first detector whose name pattern matches the field name AND whose
/// validator passes on ≥ `min_confidence` fraction of `samples` wins.
pub fn detect_semantic_label(field_name: &str, samples: &[String]) -> Option<(SemanticLabel, f64)> {
    if samples.is_empty() {
        return None;
    }
    let mut candidates: Vec<&SemanticDetector> = catalog()
        .iter()
        .filter(|d| d.name_matches(field_name))
        .collect();
    candidates.sort_by_key(|d| d.priority);

    for detector in candidates {
        let hits = samples.iter().filter(|v| detector.validate_value(v)).count();
        let confidence = hits as f64 / samples.len() as f64;
        if confidence >= detector.min_confidence {
            return Some((detector.label, confidence));
        }
    }
    None
}

/// Independently tallies per-path validator hits to decide the best
/// semantic type (§2 item 6), decoupled from field-name matching so the
/// inferencer's post-processing pass can query it directly.
#[derive(Debug, Default, Clone)]
pub struct SemanticStatsAccumulator {
    hits: BTreeMap<String, BTreeMap<SemanticLabel, (u64, u64)>>, // path -> label -> (hits, total)
}

impl SemanticStatsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, path: &str, value: &str) {
        let entry = self.hits.entry(path.to_string()).or_default();
        for detector in catalog() {
            let slot = entry.entry(detector.label).or_insert((0, 0));
            slot.1 += 1;
            if detector.validate_value(value) {
                slot.0 += 1;
            }
        }
    }

    /// Best semantic label at `path`, if any detector clears its
    /// `min_confidence` bar.
    pub fn best_label(&self, path: &str, field_name: &str) -> Option<(SemanticLabel, f64)> {
        let entry = self.hits.get(path)?;
        let mut candidates: Vec<&SemanticDetector> = catalog()
            .iter()
            .filter(|d| d.name_matches(field_name))
            .collect();
        candidates.sort_by_key(|d| d.priority);

        for detector in candidates {
            if let Some((hits, total)) = entry.get(&detector.label) {
                if *total == 0 {
                    continue;
                }
                let confidence = *hits as f64 / *total as f64;
                if confidence >= detector.min_confidence {
                    return Some((detector.label, confidence));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_email_field() {
        let samples = vec!["a@b.com".to_string(), "c@d.org".to_string()];
        let result = detect_semantic_label("email", &samples);
        assert_eq!(result.unwrap().0, SemanticLabel::Email);
    }

    #[test]
    fn name_must_match_for_detector_to_apply() {
        // Values validate as emails but field name doesn't match any
        // detector's name pattern.
        let samples = vec!["a@b.com".to_string()];
        assert_eq!(detect_semantic_label("contact_info", &samples), None);
    }

    #[test]
    fn low_value_confidence_fails_detector() {
        let samples = vec!["a@b.com".to_string(), "not-an-email".to_string()];
        // Only 50% pass validation; min_confidence for email is 0.8.
        assert_eq!(detect_semantic_label("email", &samples), None);
    }

    #[test]
    fn accumulator_tracks_hits_independent_of_name() {
        let mut acc = SemanticStatsAccumulator::new();
        acc.observe("contact.email", "a@b.com");
        acc.observe("contact.email", "c@d.org");
        let (label, confidence) = acc.best_label("contact.email", "email").unwrap();
        assert_eq!(label, SemanticLabel::Email);
        assert_eq!(confidence, 1.0);
    }
}
