//! End-to-end coverage of the testable properties (§8): a document stream
//! goes in through [`schema_inference::pipeline::run_profile`], the
//! resulting generation schema goes straight into
//! [`schema_inference::pipeline::run_generate`], and the synthetic output
//! is checked against the same statistical properties the source exhibited.

use schema_inference::config::Config;
use schema_inference::emit::EmitFormat;
use schema_inference::generate::GenerateConfig;
use schema_inference::pipeline;
use schema_inference::source::DocumentSource;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};

async fn profile(docs: Vec<Value>) -> pipeline::ProfileOutcome {
    let source: DocumentSource<tokio::io::BufReader<&[u8]>> = DocumentSource::from_vec(docs);
    let config = Config::default();
    let (_tx, rx) = pipeline::cancellation();
    pipeline::run_profile(source, &config, rx)
        .await
        .expect("profiling a well-formed in-memory stream never fails")
}

async fn generate(schema: Value, count: usize, seed: u64) -> Vec<Value> {
    let (_tx, rx) = pipeline::cancellation();
    let (docs, _report) = pipeline::run_generate(
        schema,
        count,
        GenerateConfig { seed, key_field: "_id".to_string() },
        1,
        rx,
    )
    .await;
    docs
}

#[tokio::test]
async fn e1_enum_preservation() {
    let mut docs = Vec::new();
    docs.extend((0..50).map(|_| json!({"status": "A"})));
    docs.extend((0..30).map(|_| json!({"status": "B"})));
    docs.extend((0..20).map(|_| json!({"status": "C"})));

    let outcome = profile(docs).await;
    let dist = &outcome.generation_schema["properties"]["status"]["x-gen.enum.distribution"];
    assert_eq!(dist["A"], json!(50));
    assert_eq!(dist["B"], json!(30));
    assert_eq!(dist["C"], json!(20));

    let generated = generate(outcome.generation_schema, 1000, 999).await;
    let mut counts: HashMap<String, u32> = HashMap::new();
    for doc in &generated {
        *counts.entry(doc["status"].as_str().unwrap().to_string()).or_default() += 1;
    }
    let within_tolerance = |count: u32, expected: f64| ((count as f64 - expected).abs() / expected) <= 0.10;
    assert!(within_tolerance(*counts.get("A").unwrap_or(&0), 500.0));
    assert!(within_tolerance(*counts.get("B").unwrap_or(&0), 300.0));
    assert!(within_tolerance(*counts.get("C").unwrap_or(&0), 200.0));
}

#[tokio::test]
async fn e2_numeric_enum() {
    let mut docs = Vec::new();
    docs.extend((0..50).map(|_| json!({"rank": 1})));
    docs.extend((0..50).map(|_| json!({"rank": 2})));

    let outcome = profile(docs).await;
    assert_eq!(outcome.generation_schema["properties"]["rank"]["type"], json!("integer"));
    let dist = &outcome.generation_schema["properties"]["rank"]["x-gen.enum.distribution"];
    assert_eq!(dist["1"], json!(50));
    assert_eq!(dist["2"], json!(50));

    let generated = generate(outcome.generation_schema, 100, 1).await;
    let ones = generated.iter().filter(|d| d["rank"] == json!(1)).count();
    assert!((ones as i64 - 50).abs() <= 10);
}

#[tokio::test]
async fn e3_dynamic_key_detection() {
    let mut docs = Vec::new();
    let mut next_key = 0usize;
    for _ in 0..100 {
        let mut by_id = serde_json::Map::new();
        for _ in 0..12 {
            by_id.insert(format!("{:024x}", next_key), json!({"name": "item"}));
            next_key += 1;
        }
        docs.push(json!({"byId": by_id}));
    }
    assert_eq!(next_key, 1200);

    let outcome = profile(docs).await;
    let by_id_schema = &outcome.generation_schema["properties"]["byId"];
    assert_eq!(by_id_schema["x-dynamic-keys"]["metadata"]["pattern"], json!("MONGODB_OBJECTID"));
    let confidence = by_id_schema["x-dynamic-keys"]["metadata"]["confidence"].as_f64().unwrap();
    assert!(confidence >= 0.8, "confidence {confidence} below 0.8");
    assert_eq!(by_id_schema["properties"], json!({}));

    let generated = generate(outcome.generation_schema, 50, 7).await;
    let hex_re = regex::Regex::new("^[0-9a-f]{24}$").unwrap();
    for doc in &generated {
        let by_id = doc["byId"].as_object().unwrap();
        let mut seen = HashSet::new();
        for key in by_id.keys() {
            assert!(hex_re.is_match(key), "{key} is not a 24-hex key");
            assert!(seen.insert(key.clone()), "duplicate key {key} within one document");
        }
    }
}

#[tokio::test]
async fn e4_array_length_distribution() {
    let docs = vec![
        json!({"tags": [1, 2]}),
        json!({"tags": [1, 2, 3]}),
        json!({"tags": [1, 2, 3]}),
        json!({"tags": [1, 2, 3, 4]}),
    ];
    let outcome = profile(docs).await;
    let generated = generate(outcome.generation_schema, 1000, 42).await;

    let mut histogram: BTreeMap<usize, u32> = BTreeMap::new();
    for doc in &generated {
        *histogram.entry(doc["tags"].as_array().unwrap().len()).or_default() += 1;
    }
    let total: u32 = histogram.values().sum();
    // Source weights: 2 -> 25%, 3 -> 50%, 4 -> 25%; every bucket clears the
    // >=5% floor so every bucket's tolerance is checked.
    let expected = [(2usize, 0.25), (3, 0.50), (4, 0.25)];
    for (length, weight) in expected {
        let observed = *histogram.get(&length).unwrap_or(&0) as f64 / total as f64;
        assert!(
            (observed - weight).abs() <= 0.10,
            "length {length}: observed {observed}, expected {weight}"
        );
    }
}

#[tokio::test]
async fn e5_id_uniqueness_at_scale() {
    let docs: Vec<Value> = (0..200).map(|i| json!({"_id": format!("seed-{i}"), "n": i})).collect();
    let outcome = profile(docs).await;
    let generated = generate(outcome.generation_schema, 10_000, 2024).await;
    let ids: HashSet<&str> = generated.iter().map(|d| d["_id"].as_str().unwrap()).collect();
    assert_eq!(ids.len(), generated.len());
}

#[tokio::test]
async fn e6_ndjson_round_trip() {
    let docs = vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})];
    let sink = pipeline::emit_documents(&docs, Vec::new(), EmitFormat::Ndjson).await.unwrap();
    let text = String::from_utf8(sink).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), docs.len());
    assert!(text.ends_with('\n'));
    for (line, original) in lines.iter().zip(&docs) {
        let parsed: Value = serde_json::from_str(line).unwrap();
        assert_eq!(&parsed, original);
        let reserialized = serde_json::to_string(&parsed).unwrap();
        let reparsed: Value = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(&reparsed, original);
    }
}
