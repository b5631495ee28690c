//! The generator (§4.8): walks a generation schema and produces synthetic
//! documents, the same way the teacher's shape walk recurses over a
//! `serde_json::Value` tree, reusing [`doc::FrequencyDistribution`] for
//! weighted sampling instead of inventing a second distribution type.

pub mod keys;

use crate::error::{RunReport, Warning};
use doc::FrequencyDistribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

pub struct GenerateConfig {
    pub seed: u64,
    pub key_field: String,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        GenerateConfig {
            seed: 0,
            key_field: "_id".to_string(),
        }
    }
}

/// Synthesizes documents from a generation schema tree. Each document's RNG
/// is reseeded from `seed + counter` (§4.8 implementation note) so any one
/// document in a run can be reproduced in isolation given its index.
pub struct Generator {
    schema: Value,
    config: GenerateConfig,
    rng: StdRng,
    counter: u64,
    seen_key_values: HashSet<String>,
}

impl Generator {
    pub fn new(schema: Value, config: GenerateConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Generator {
            schema,
            config,
            rng,
            counter: 0,
            seen_key_values: HashSet::new(),
        }
    }

    /// Builds a generator whose per-document counter starts at
    /// `start_counter` instead of `0`, so a worker pool can partition the
    /// counter space (§5 "a worker pool for generation") while keeping
    /// every document's RNG seed (`seed + counter`) a pure function of its
    /// global index rather than of which worker produced it.
    pub fn with_start_counter(schema: Value, config: GenerateConfig, start_counter: u64) -> Self {
        let mut generator = Self::new(schema, config);
        generator.counter = start_counter;
        generator
    }

    pub fn generate(&mut self, count: usize, report: &mut RunReport) -> Vec<Value> {
        (0..count).map(|_| self.generate_one(report)).collect()
    }

    pub fn generate_one(&mut self, report: &mut RunReport) -> Value {
        self.rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(self.counter));
        self.counter += 1;
        let root = self.schema.clone();
        let mut doc = self.generate_node(&root, "", report);
        self.enforce_key_uniqueness(&mut doc, report);
        doc
    }

    /// The root `_id`-style field is regenerated (bounded at 10 attempts,
    /// §4.8.1 "set-based rejection loop") whenever it collides with an
    /// earlier document's value in this run.
    fn enforce_key_uniqueness(&mut self, doc: &mut Value, report: &mut RunReport) {
        let key_field = self.config.key_field.clone();
        let Some(current) = doc
            .as_object()
            .and_then(|o| o.get(&key_field))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return;
        };
        if self.seen_key_values.insert(current) {
            return;
        }
        let key_schema = self
            .schema
            .get("properties")
            .and_then(|p| p.get(&key_field))
            .cloned();
        let max_attempts = 10;
        for attempt in 0..max_attempts {
            let replacement = match &key_schema {
                Some(node) => self.generate_node(node, &key_field, report),
                None => json!(keys::generic_id(&mut self.rng)),
            };
            if let Some(s) = replacement.as_str() {
                if self.seen_key_values.insert(s.to_string()) {
                    if let Some(obj) = doc.as_object_mut() {
                        obj.insert(key_field, replacement);
                    }
                    return;
                }
            }
            if attempt + 1 == max_attempts {
                report.push(Warning::UniquenessRetryExhausted {
                    path: key_field.clone(),
                    requested: 1,
                    produced: 0,
                });
            }
        }
    }

    fn generate_node(&mut self, node: &Value, path: &str, report: &mut RunReport) -> Value {
        if let Some(variants) = node.get("anyOf").and_then(Value::as_array) {
            if variants.is_empty() {
                return Value::Null;
            }
            let idx = self.rng.gen_range(0..variants.len());
            return self.generate_node(&variants[idx].clone(), path, report);
        }

        if node
            .get("x-dynamic-keys")
            .and_then(|d| d.get("enabled"))
            .and_then(Value::as_bool)
            == Some(true)
        {
            return self.generate_dynamic_object(node, path, report);
        }

        let candidates: Vec<String> = match node.get("type") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(arr)) => arr.iter().filter_map(Value::as_str).map(str::to_string).collect(),
            _ => vec!["null".to_string()],
        };
        let chosen = if candidates.len() <= 1 {
            candidates.first().cloned().unwrap_or_else(|| "null".to_string())
        } else {
            candidates[self.rng.gen_range(0..candidates.len())].clone()
        };

        match chosen.as_str() {
            "boolean" => json!(self.rng.gen::<bool>()),
            "object" => self.generate_object(node, path, report),
            "array" => self.generate_array(node, path, report),
            "string" => self.generate_string(node),
            "integer" => self.generate_integer(node),
            "number" => self.generate_number(node),
            _ => Value::Null,
        }
    }

    fn generate_object(&mut self, node: &Value, path: &str, report: &mut RunReport) -> Value {
        let mut out = Map::new();
        let required: HashSet<&str> = node
            .get("required")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let properties = node
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for (name, child) in properties {
            let include = if required.contains(name.as_str()) {
                true
            } else {
                let presence = child.get("x-presence").and_then(Value::as_f64).unwrap_or(0.5);
                self.rng.gen::<f64>() < presence
            };
            if !include {
                continue;
            }
            let child_path = if path.is_empty() { name.clone() } else { format!("{path}.{name}") };
            let value = self.generate_node(&child, &child_path, report);
            out.insert(name, value);
        }
        Value::Object(out)
    }

    fn generate_array(&mut self, node: &Value, path: &str, report: &mut RunReport) -> Value {
        let length = match node.get("x-array-length-distribution").and_then(Value::as_object) {
            Some(obj) => self.sample_length(obj),
            None => self.rng.gen_range(0..3usize),
        };
        let items_schema = node.get("items").cloned().unwrap_or_else(|| json!({}));
        let values: Vec<Value> = (0..length)
            .map(|_| self.generate_node(&items_schema, path, report))
            .collect();
        Value::Array(values)
    }

    fn generate_string(&mut self, node: &Value) -> Value {
        if let Some(obj) = node.get("x-gen.enum.distribution").and_then(Value::as_object) {
            if let Some(v) = self.sample_enum_string(obj) {
                return json!(v);
            }
        }
        match node.get("format").and_then(Value::as_str) {
            Some("objectid") => json!(keys::mongodb_object_id(&mut self.rng)),
            Some("date-time") => json!(random_timestamp(&mut self.rng)),
            Some("base64") => json!(random_base64(&mut self.rng)),
            Some("decimal") => json!(random_decimal(&mut self.rng)),
            Some("email") => json!(random_email(&mut self.rng)),
            Some("uri") => json!(random_uri(&mut self.rng)),
            Some("uuid") => json!(keys::uuid_v4(&mut self.rng)),
            Some("phone") => json!(random_phone(&mut self.rng)),
            Some("name") => json!(random_person_name(&mut self.rng)),
            Some("ip-address") => json!(random_ip_address(&mut self.rng)),
            _ => json!(random_string(&mut self.rng, 8)),
        }
    }

    fn generate_integer(&mut self, node: &Value) -> Value {
        if let Some(obj) = node.get("x-gen.enum.distribution").and_then(Value::as_object) {
            if let Some(v) = self.sample_enum_string(obj).and_then(|s| s.parse::<i64>().ok()) {
                return json!(v);
            }
        }
        let (lo, hi) = numeric_bounds(node);
        let v = if hi > lo {
            self.rng.gen_range(lo as i64..=hi as i64)
        } else {
            lo as i64
        };
        json!(v)
    }

    fn generate_number(&mut self, node: &Value) -> Value {
        if let Some(obj) = node.get("x-gen.enum.distribution").and_then(Value::as_object) {
            if let Some(v) = self.sample_enum_string(obj).and_then(|s| s.parse::<f64>().ok()) {
                return json!(v);
            }
        }
        let (lo, hi) = numeric_bounds(node);
        let v = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
        json!(v)
    }

    fn generate_dynamic_object(&mut self, node: &Value, path: &str, report: &mut RunReport) -> Value {
        let metadata = &node["x-dynamic-keys"]["metadata"];
        let pattern_name = metadata.get("patternName").and_then(Value::as_str).map(str::to_string);
        let value_schema = node["x-dynamic-keys"]["valueSchema"].clone();

        let target = match metadata.get("countDistribution").and_then(Value::as_object) {
            Some(obj) => self.sample_length(obj),
            None => 0,
        };

        let mut out = Map::new();
        let mut seen = HashSet::new();
        let max_attempts = (target * 10).max(10);
        let mut attempts = 0usize;
        while out.len() < target && attempts < max_attempts {
            attempts += 1;
            let key = keys::generate_key(pattern_name.as_deref(), &mut self.rng);
            if !seen.insert(key.clone()) {
                continue;
            }
            let value = self.generate_node(&value_schema, path, report);
            out.insert(key, value);
        }
        if out.len() < target {
            report.push(Warning::UniquenessRetryExhausted {
                path: path.to_string(),
                requested: target,
                produced: out.len(),
            });
        }
        Value::Object(out)
    }

    fn sample_length(&mut self, obj: &Map<String, Value>) -> usize {
        let counts = parse_counts(obj);
        let dist = FrequencyDistribution::from_counts(counts);
        let r = self.rng.gen::<f64>();
        dist.sample(r).ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(0)
    }

    fn sample_enum_string(&mut self, obj: &Map<String, Value>) -> Option<String> {
        let counts = parse_counts(obj);
        let dist = FrequencyDistribution::from_counts(counts);
        let r = self.rng.gen::<f64>();
        dist.sample(r).ok().map(str::to_string)
    }
}

fn parse_counts(obj: &Map<String, Value>) -> BTreeMap<String, u64> {
    obj.iter().filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n))).collect()
}

fn numeric_bounds(node: &Value) -> (f64, f64) {
    let min = node.get("minimum").and_then(Value::as_f64).unwrap_or(0.0);
    let max = node.get("maximum").and_then(Value::as_f64).unwrap_or(min + 1.0);
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    const CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..len).map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char).collect()
}

fn random_timestamp(rng: &mut impl Rng) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let offset = rng.gen_range(-31_536_000i64..31_536_000i64);
    let ts = time::OffsetDateTime::from_unix_timestamp(now + offset).unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
    ts.format(&time::format_description::well_known::Rfc3339).unwrap_or_default()
}

fn random_base64(rng: &mut impl Rng) -> String {
    let bytes: [u8; 16] = rng.gen();
    base64::encode(bytes)
}

fn random_decimal(rng: &mut impl Rng) -> String {
    let whole: i64 = rng.gen_range(0..1_000_000);
    let frac: u32 = rng.gen_range(0..100);
    format!("{whole}.{frac:02}")
}

fn random_email(rng: &mut impl Rng) -> String {
    format!("{}@{}", random_string(rng, 8).to_lowercase(), random_domain(rng))
}

fn random_uri(rng: &mut impl Rng) -> String {
    format!("https://{}/{}", random_domain(rng), random_string(rng, 6).to_lowercase())
}

fn random_domain(rng: &mut impl Rng) -> String {
    const TLDS: &[&str] = &["com", "net", "org", "io"];
    format!("{}.{}", random_string(rng, 6).to_lowercase(), TLDS[rng.gen_range(0..TLDS.len())])
}

fn random_phone(rng: &mut impl Rng) -> String {
    let area: u32 = rng.gen_range(200..999);
    let exchange: u32 = rng.gen_range(200..999);
    let line: u32 = rng.gen_range(0..9999);
    format!("+1-{area}-{exchange}-{line:04}")
}

fn random_person_name(rng: &mut impl Rng) -> String {
    const FIRST: &[&str] = &["Alex", "Jordan", "Taylor", "Morgan", "Casey", "Riley"];
    const LAST: &[&str] = &["Smith", "Johnson", "Lee", "Brown", "Garcia", "Patel"];
    format!("{} {}", FIRST[rng.gen_range(0..FIRST.len())], LAST[rng.gen_range(0..LAST.len())])
}

fn random_ip_address(rng: &mut impl Rng) -> String {
    let octets: [u8; 4] = rng.gen();
    format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "_id": {"type": "string", "format": "objectid", "x-unique": true},
                "status": {
                    "type": "string",
                    "x-gen.enum.distribution": {"A": 50, "B": 50},
                },
                "nickname": {"type": "string", "x-presence": 0.0},
            },
            "required": ["_id", "status"],
            "additionalProperties": false,
        })
    }

    #[test]
    fn required_fields_always_present_optional_respects_presence() {
        let mut report = RunReport::default();
        let mut gen = Generator::new(object_schema(), GenerateConfig::default());
        for _ in 0..20 {
            let doc = gen.generate_one(&mut report);
            let obj = doc.as_object().unwrap();
            assert!(obj.contains_key("_id"));
            assert!(obj.contains_key("status"));
            assert!(!obj.contains_key("nickname"));
        }
    }

    #[test]
    fn generated_id_fields_are_unique_across_a_run() {
        let mut report = RunReport::default();
        let mut gen = Generator::new(object_schema(), GenerateConfig::default());
        let docs = gen.generate(500, &mut report);
        let ids: HashSet<String> = docs
            .iter()
            .map(|d| d["_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids.len(), docs.len());
    }

    #[test]
    fn enum_distribution_only_produces_cataloged_values() {
        let mut report = RunReport::default();
        let mut gen = Generator::new(object_schema(), GenerateConfig::default());
        for doc in gen.generate(30, &mut report) {
            let status = doc["status"].as_str().unwrap();
            assert!(status == "A" || status == "B");
        }
    }

    #[test]
    fn dynamic_keys_schema_produces_sampled_key_count() {
        let schema = json!({
            "type": "object",
            "properties": {
                "byId": {
                    "type": "object",
                    "properties": {},
                    "additionalProperties": {"type": "string"},
                    "x-dynamic-keys": {
                        "enabled": true,
                        "metadata": {
                            "patternName": "MONGODB_OBJECTID",
                            "countDistribution": {"3": 10},
                        },
                        "valueSchema": {"type": "string"},
                    },
                },
            },
            "required": ["byId"],
            "additionalProperties": false,
        });
        let mut report = RunReport::default();
        let mut gen = Generator::new(schema, GenerateConfig::default());
        let doc = gen.generate_one(&mut report);
        let by_id = doc["byId"].as_object().unwrap();
        assert_eq!(by_id.len(), 3);
        for key in by_id.keys() {
            assert_eq!(key.len(), 24);
        }
    }

    #[test]
    fn semantic_formats_produce_matching_values() {
        let schema = json!({
            "type": "object",
            "properties": {
                "email": {"type": "string", "format": "email"},
                "homepage": {"type": "string", "format": "uri"},
                "sessionId": {"type": "string", "format": "uuid"},
                "phone": {"type": "string", "format": "phone"},
                "name": {"type": "string", "format": "name"},
                "ip": {"type": "string", "format": "ip-address"},
            },
            "required": ["email", "homepage", "sessionId", "phone", "name", "ip"],
            "additionalProperties": false,
        });
        let mut report = RunReport::default();
        let mut gen = Generator::new(schema, GenerateConfig::default());
        let doc = gen.generate_one(&mut report);
        assert!(doc["email"].as_str().unwrap().contains('@'));
        assert!(doc["homepage"].as_str().unwrap().starts_with("https://"));
        assert!(uuid::Uuid::parse_str(doc["sessionId"].as_str().unwrap()).is_ok());
        assert!(doc["phone"].as_str().unwrap().starts_with('+'));
        assert!(doc["name"].as_str().unwrap().contains(' '));
        assert!(doc["ip"].as_str().unwrap().parse::<std::net::IpAddr>().is_ok());
    }

    #[test]
    fn array_length_follows_distribution_support() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "items": {"type": "integer", "minimum": 0.0, "maximum": 5.0},
                    "x-array-length-distribution": {"2": 5, "3": 5},
                },
            },
            "required": ["tags"],
            "additionalProperties": false,
        });
        let mut report = RunReport::default();
        let mut gen = Generator::new(schema, GenerateConfig::default());
        for doc in gen.generate(20, &mut report) {
            let len = doc["tags"].as_array().unwrap().len();
            assert!(len == 2 || len == 3);
        }
    }
}
