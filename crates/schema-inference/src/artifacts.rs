//! Persisted artifacts (§6): `inferred.schema.json`, `generation.schema.json`,
//! and `constraints.json`, each written as pretty-printed JSON.

use crate::error::Error;
use doc::inference::TypeRecord;
use doc::{ConstraintsProfile, InferredSchema};
use serde_json::{json, Map, Value};
use std::path::Path;

/// `{ count, fields: { name -> InferredSchemaField } }` (§6), built the
/// same way the generation schema is: a plain `serde_json::Value` tree
/// rather than a typed `Serialize` impl, since the field shape is a
/// polymorphic sum over type records (§9 "Polymorphic field records").
pub fn inferred_schema_to_json(schema: &InferredSchema) -> Value {
    let mut fields = Map::new();
    for (path, field) in &schema.fields {
        if path.is_root() {
            continue;
        }
        let mut node = Map::new();
        node.insert("path".to_string(), json!(path.as_str()));
        node.insert("totalObservations".to_string(), json!(field.total_count()));
        node.insert("required".to_string(), json!(schema.is_required(path)));
        node.insert("nullable".to_string(), json!(field.is_nullable()));

        let total = field.total_count().max(1) as f64;
        let mut types = Map::new();
        for (tag, record) in field.records() {
            types.insert(
                tag.to_string(),
                json!({
                    "count": record_count(record),
                    "probability": record_count(record) as f64 / total,
                }),
            );
        }
        node.insert("types".to_string(), Value::Object(types));

        if let Some((label, confidence)) = schema.semantic.best_label(path.as_str(), path.leaf_name()) {
            node.insert(
                "semantic".to_string(),
                json!({"label": label.to_string(), "confidence": confidence}),
            );
        }

        if schema.resolver.is_promoted(path.as_str()) {
            if let Some(metadata) = schema.resolver.metadata(path.as_str()) {
                node.insert(
                    "dynamicKeys".to_string(),
                    json!({
                        "pattern": metadata.detection.pattern.map(|p| p.to_string()),
                        "confidence": metadata.detection.confidence,
                        "docCount": metadata.doc_count,
                        "totalUniqueKeys": metadata.total_unique_keys,
                        "exampleKeys": metadata.example_keys,
                    }),
                );
            }
        }

        fields.insert(path.as_str().to_string(), Value::Object(node));
    }

    json!({
        "count": schema.total_docs,
        "fields": fields,
    })
}

fn record_count(record: &TypeRecord) -> u64 {
    match record {
        TypeRecord::Scalar(s) => s.values.total(),
        TypeRecord::Array(a) => a.length.total(),
        TypeRecord::Object(o) => o.count,
    }
}

/// `constraints.json` (§3 `ConstraintsProfile`, §6 persisted form).
pub fn constraints_profile_to_json(
    profile: &ConstraintsProfile,
    size_proxy: doc::SizeProxy,
    key_field: &str,
) -> Value {
    fn stats_json(stats: &Result<doc::Stats, doc::FreqError>) -> Value {
        match stats {
            Ok(s) => json!(s),
            Err(_) => Value::Null,
        }
    }
    let buckets = profile.size_buckets(size_proxy, None);
    json!({
        "totalDocuments": profile.total_docs,
        "documentSize": {
            "leafCount": stats_json(&profile.leaf_count),
            "arrayLengthTotal": stats_json(&profile.array_length_total),
            "byteSize": stats_json(&profile.byte_size),
            "buckets": buckets,
        },
        "keyField": key_field,
    })
}

pub fn write_pretty(path: &Path, value: &Value) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<Value, Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Paths of the three artifacts this run persists, rooted at `dir`.
pub struct ArtifactPaths {
    pub inferred_schema: std::path::PathBuf,
    pub generation_schema: std::path::PathBuf,
    pub constraints: std::path::PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        ArtifactPaths {
            inferred_schema: dir.join("inferred.schema.json"),
            generation_schema: dir.join("generation.schema.json"),
            constraints: dir.join("constraints.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc::{Document, DynamicKeyAccumulator, DynamicKeyConfig, Inferencer};

    fn obj(pairs: Vec<(&str, Document)>) -> doc::Document {
        Document::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn inferred_schema_surfaces_semantic_label() {
        let mut docs = Vec::new();
        for addr in ["a@example.com", "b@example.com"] {
            for _ in 0..10 {
                docs.push(obj(vec![("email", Document::String(addr.to_string()))]));
            }
        }
        let mut acc = DynamicKeyAccumulator::new(DynamicKeyConfig::default()).unwrap();
        for d in &docs {
            acc.observe(d);
        }
        let resolver = acc.finalize();
        let mut inf = Inferencer::new(resolver);
        for d in &docs {
            inf.ingest(d);
        }
        let schema = inf.finalize();
        let rendered = inferred_schema_to_json(&schema);
        assert_eq!(rendered["fields"]["email"]["semantic"]["label"], json!("Email"));
        assert!(rendered["fields"]["email"]["semantic"]["confidence"].as_f64().unwrap() >= 0.8);
    }
}

