//! The synthesizer (§4.7): merges an inferred schema and its constraints
//! profile into a generation schema — a JSON-Schema-draft-07 document
//! annotated with the vendor `x-*` directives of §3.
//!
//! Schema nodes are built the way the teacher's shape-to-schema converter
//! builds them: a `serde_json::Map` assembled field by field, not a typed
//! builder, so every directive is a plain, inspectable JSON keyword.

use doc::inference::{InferredField, TypeRecord};
use doc::{ConstraintsProfile, Document, FieldPath, InferredSchema, SemanticLabel, TypeTag};
use serde_json::{json, Map, Value};

pub struct SynthesizeConfig {
    /// The field treated as the document's unique primary key (§4.7).
    pub key_field: String,
}

impl Default for SynthesizeConfig {
    fn default() -> Self {
        SynthesizeConfig {
            key_field: "_id".to_string(),
        }
    }
}

/// Produces the root generation schema document.
pub fn synthesize(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
) -> Value {
    let mut root = object_schema(schema, profile, config, &FieldPath::root());
    root.insert(
        "$schema".to_string(),
        json!("http://json-schema.org/draft-07/schema#"),
    );
    Value::Object(root)
}

fn direct_children<'a>(schema: &'a InferredSchema, parent: &FieldPath) -> Vec<&'a FieldPath> {
    schema
        .fields
        .keys()
        .filter(|p| p.is_direct_child_of(parent.as_str()))
        .collect()
}

/// Builds an object-type schema node (`properties`/`required`/
/// `additionalProperties: false`) from `path`'s direct children.
fn object_schema(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
    path: &FieldPath,
) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));

    let mut properties = Map::new();
    let mut required = Vec::new();
    for child in direct_children(schema, path) {
        let name = child.leaf_name().to_string();
        properties.insert(name.clone(), Value::Object(field_schema(schema, profile, config, child)));
        if schema.is_required(child) {
            required.push(json!(name));
        }
    }
    out.insert("properties".to_string(), Value::Object(properties));
    out.insert("additionalProperties".to_string(), json!(false));
    if !required.is_empty() {
        out.insert("required".to_string(), Value::Array(required));
    }
    out
}

/// Builds the schema node for a single field, dispatching on its observed
/// type(s) and dynamic-key status.
fn field_schema(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
    path: &FieldPath,
) -> Map<String, Value> {
    let field = schema.fields.get(path).expect("path came from schema.fields");

    if schema.resolver.is_promoted(path.as_str()) {
        let mut node = dynamic_keys_schema(schema, profile, config, path);
        if !schema.is_required(path) {
            node.insert("x-presence".to_string(), json!(schema.presence_ratio(path)));
        }
        return node;
    }

    let non_null_types: Vec<TypeTag> = field
        .type_tags()
        .copied()
        .filter(|t| *t != TypeTag::Null)
        .collect();

    let mut node = match non_null_types.as_slice() {
        [] => Map::from_iter([("type".to_string(), json!("null"))]),
        [single] => type_node(schema, profile, config, path, field, *single),
        _many => {
            let variants: Vec<Value> = non_null_types
                .iter()
                .map(|t| Value::Object(type_node(schema, profile, config, path, field, *t)))
                .collect();
            Map::from_iter([("anyOf".to_string(), Value::Array(variants))])
        }
    };

    if non_null_types.contains(&TypeTag::String) {
        if let Some((label, confidence)) = schema.semantic.best_label(path.as_str(), path.leaf_name()) {
            apply_semantic_label(&mut node, label, confidence);
        }
    }

    if field.is_nullable() {
        promote_nullable(&mut node);
    }

    if path.leaf_name() == config.key_field && path.parent().map(|p| p.is_root()).unwrap_or(false)
    {
        node.insert("format".to_string(), json!("objectid"));
        node.insert("x-unique".to_string(), json!(true));
    }

    if !schema.is_required(path) {
        node.insert("x-presence".to_string(), json!(schema.presence_ratio(path)));
    }

    node
}

/// Widens a `"type"` keyword (or each branch of an `anyOf`) to also accept
/// `null`, used when a field was observed to be nullable.
fn promote_nullable(node: &mut Map<String, Value>) {
    if let Some(Value::String(t)) = node.get("type").cloned() {
        node.insert("type".to_string(), json!([t, "null"]));
    } else if node.contains_key("anyOf") {
        node.insert(
            "anyOf".to_string(),
            {
                let mut variants = match node.remove("anyOf") {
                    Some(Value::Array(v)) => v,
                    _ => Vec::new(),
                };
                variants.push(json!({"type": "null"}));
                Value::Array(variants)
            },
        );
    }
}

/// Applies a detected semantic label (§4.3/§4.7 "If semantic label is
/// present, set `format` and remove conflicting constraints") to a string
/// schema node, whichever of the single-type or `anyOf` shapes it's in.
fn apply_semantic_label(node: &mut Map<String, Value>, label: SemanticLabel, confidence: f64) {
    if node.get("type").and_then(Value::as_str) == Some("string") {
        set_semantic_format(node, label, confidence);
        return;
    }
    if let Some(Value::Array(variants)) = node.get_mut("anyOf") {
        for variant in variants.iter_mut() {
            if let Value::Object(obj) = variant {
                if obj.get("type").and_then(Value::as_str) == Some("string") {
                    set_semantic_format(obj, label, confidence);
                    break;
                }
            }
        }
    }
}

fn set_semantic_format(node: &mut Map<String, Value>, label: SemanticLabel, confidence: f64) {
    // A semantic format supersedes an enum-distribution reading of the same
    // string values; emitting both would give the generator conflicting
    // instructions for the same field.
    node.remove("x-gen.enum.distribution");
    node.insert("format".to_string(), json!(semantic_format_name(label)));
    node.insert(
        "x-semantic".to_string(),
        json!({"label": label.to_string(), "confidence": confidence}),
    );
}

fn semantic_format_name(label: SemanticLabel) -> &'static str {
    match label {
        SemanticLabel::Email => "email",
        SemanticLabel::Url => "uri",
        SemanticLabel::Uuid => "uuid",
        SemanticLabel::Phone => "phone",
        SemanticLabel::PersonName => "name",
        SemanticLabel::IpAddress => "ip-address",
    }
}

fn type_node(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
    path: &FieldPath,
    field: &InferredField,
    tag: TypeTag,
) -> Map<String, Value> {
    match tag {
        TypeTag::Bool => Map::from_iter([("type".to_string(), json!("boolean"))]),
        TypeTag::Integer => numeric_node(field, "integer"),
        TypeTag::Float => numeric_node(field, "number"),
        TypeTag::Decimal => {
            let mut node = numeric_node(field, "number");
            node.insert("type".to_string(), json!("string"));
            node.insert("format".to_string(), json!("decimal"));
            node
        }
        TypeTag::String => string_node(field),
        TypeTag::ObjectId => {
            Map::from_iter([("type".to_string(), json!("string")), ("format".to_string(), json!("objectid"))])
        }
        TypeTag::Timestamp => {
            Map::from_iter([("type".to_string(), json!("string")), ("format".to_string(), json!("date-time"))])
        }
        TypeTag::Binary => {
            Map::from_iter([("type".to_string(), json!("string")), ("format".to_string(), json!("base64"))])
        }
        TypeTag::Array => array_node(schema, profile, config, path, field),
        TypeTag::Object => object_schema(schema, profile, config, path),
        TypeTag::Null => Map::from_iter([("type".to_string(), json!("null"))]),
    }
}

/// Enum heuristic (§4.7, Open Question 1): a scalar field whose observed
/// cardinality is small relative to its observation count is treated as an
/// enum candidate and its whole value distribution is carried as a
/// generator directive instead of open-ended bounds.
fn is_enum_candidate(total: u64, unique: usize) -> bool {
    unique as u64 <= total.div_ceil(10)
}

fn string_node(field: &InferredField) -> Map<String, Value> {
    let mut node = Map::from_iter([("type".to_string(), json!("string"))]);
    if let Some(TypeRecord::Scalar(record)) = field.record(TypeTag::String) {
        let total = record.values.total();
        let unique = record.values.unique();
        if unique > 0 && is_enum_candidate(total, unique) {
            node.insert(
                "x-gen.enum.distribution".to_string(),
                serde_json::to_value(record.values.counts()).unwrap_or(json!({})),
            );
        }
    }
    node
}

fn numeric_node(field: &InferredField, json_type: &str) -> Map<String, Value> {
    let mut node = Map::from_iter([("type".to_string(), json!(json_type))]);
    let tag = match json_type {
        "integer" => TypeTag::Integer,
        _ => TypeTag::Float,
    };
    if let Some(TypeRecord::Scalar(record)) = field.record(tag) {
        let total = record.values.total();
        let unique = record.values.unique();
        if unique > 0 && is_enum_candidate(total, unique) {
            node.insert(
                "x-gen.enum.distribution".to_string(),
                serde_json::to_value(record.values.counts()).unwrap_or(json!({})),
            );
            return node;
        }
        if let Ok(min) = record.values.percentile(0.0) {
            node.insert("minimum".to_string(), json!(min));
        }
        if let Ok(max) = record.values.percentile(1.0) {
            node.insert("maximum".to_string(), json!(max));
        }
    }
    node
}

fn array_node(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
    path: &FieldPath,
    field: &InferredField,
) -> Map<String, Value> {
    let mut node = Map::from_iter([("type".to_string(), json!("array"))]);
    let element_path = path.push_array();
    if schema.fields.contains_key(&element_path) {
        node.insert(
            "items".to_string(),
            Value::Object(field_schema(schema, profile, config, &element_path)),
        );
    }
    if let Some(TypeRecord::Array(record)) = field.record(TypeTag::Array) {
        if !record.length.is_empty() {
            node.insert(
                "x-array-length-distribution".to_string(),
                serde_json::to_value(record.length.counts()).unwrap_or(json!({})),
            );
        }
    }
    node
}

/// Builds the `x-dynamic-keys` directive for a promoted path (§4.4
/// `BuildValueSchema`, §4.7 "properties is cleared").
fn dynamic_keys_schema(
    schema: &InferredSchema,
    profile: &ConstraintsProfile,
    config: &SynthesizeConfig,
    path: &FieldPath,
) -> Map<String, Value> {
    let metadata = schema
        .resolver
        .metadata(path.as_str())
        .expect("is_promoted implies metadata is present");
    let value_path = path.push_wildcard();
    let value_schema = if schema.fields.contains_key(&value_path) {
        Value::Object(field_schema(schema, profile, config, &value_path))
    } else {
        json!({})
    };

    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));
    out.insert("properties".to_string(), json!({}));
    out.insert("additionalProperties".to_string(), value_schema.clone());
    out.insert(
        "x-dynamic-keys".to_string(),
        json!({
            "enabled": true,
            "metadata": {
                "pattern": metadata.detection.pattern.map(|p| p.to_string()),
                "patternName": metadata.detection.pattern_name,
                "customPattern": metadata.detection.custom_pattern,
                "confidence": metadata.detection.confidence,
                "confidenceLevel": metadata.detection.level.to_string(),
                "docCount": metadata.doc_count,
                "totalUniqueKeys": metadata.total_unique_keys,
                "countDistribution": metadata.key_count_histogram.counts(),
                "exampleKeys": metadata.example_keys,
            },
            "valueSchema": value_schema,
        }),
    );
    out
}
