//! Streaming field inference (§4.5): walks the normalized document stream,
//! resolving each value's path through the dynamic-key [`PathResolver`],
//! and accumulates a polymorphic per-path shape record.
//!
//! A field is not forced into a single type the way a hand-written schema
//! would be: real documents are polymorphic, so [`InferredField`] keeps one
//! [`TypeRecord`] per distinct [`TypeTag`] observed at a path (Design Note
//! "Polymorphic field records" — a tagged variant, not inheritance).

use crate::dynamic_keys::PathResolver;
use crate::freq::FrequencyDistribution;
use crate::path::FieldPath;
use crate::semantic::{SemanticLabel, SemanticStatsAccumulator};
use crate::value::{Document, TypeTag};
use std::collections::BTreeMap;

/// The per-type shape observed at a path, keyed by [`TypeTag`] in
/// [`InferredField::records`].
#[derive(Debug, Clone)]
pub enum TypeRecord {
    Scalar(ScalarRecord),
    Array(ArrayRecord),
    Object(ObjectRecord),
}

#[derive(Debug, Clone, Default)]
pub struct ScalarRecord {
    pub values: FrequencyDistribution,
}

#[derive(Debug, Clone, Default)]
pub struct ArrayRecord {
    pub length: FrequencyDistribution,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectRecord {
    pub count: u64,
}

impl TypeRecord {
    fn count(&self) -> u64 {
        match self {
            TypeRecord::Scalar(s) => s.values.total(),
            TypeRecord::Array(a) => a.length.total(),
            TypeRecord::Object(o) => o.count,
        }
    }
}

/// Accumulated shape of a single canonical field path.
#[derive(Debug, Clone)]
pub struct InferredField {
    pub path: FieldPath,
    records: BTreeMap<TypeTag, TypeRecord>,
}

impl InferredField {
    fn new(path: FieldPath) -> Self {
        InferredField {
            path,
            records: BTreeMap::new(),
        }
    }

    fn observe(&mut self, doc: &Document) {
        match doc {
            Document::Array(items) => {
                let entry = self
                    .records
                    .entry(TypeTag::Array)
                    .or_insert_with(|| TypeRecord::Array(ArrayRecord::default()));
                if let TypeRecord::Array(a) = entry {
                    a.length.update(items.len().to_string());
                }
            }
            Document::Object(_) => {
                let entry = self
                    .records
                    .entry(TypeTag::Object)
                    .or_insert_with(|| TypeRecord::Object(ObjectRecord::default()));
                if let TypeRecord::Object(o) = entry {
                    o.count += 1;
                }
            }
            other => {
                let entry = self
                    .records
                    .entry(other.type_tag())
                    .or_insert_with(|| TypeRecord::Scalar(ScalarRecord::default()));
                if let TypeRecord::Scalar(s) = entry {
                    s.values.update(other.stringify());
                }
            }
        }
    }

    pub fn total_count(&self) -> u64 {
        self.records.values().map(TypeRecord::count).sum()
    }

    pub fn is_nullable(&self) -> bool {
        self.records.contains_key(&TypeTag::Null)
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.records.keys()
    }

    pub fn record(&self, tag: TypeTag) -> Option<&TypeRecord> {
        self.records.get(&tag)
    }

    pub fn records(&self) -> &BTreeMap<TypeTag, TypeRecord> {
        &self.records
    }

    /// The most frequently observed non-null type, used to pick the
    /// "primary" schema type when a field is otherwise monomorphic.
    pub fn dominant_type(&self) -> Option<TypeTag> {
        self.records
            .iter()
            .filter(|(tag, _)| **tag != TypeTag::Null)
            .max_by_key(|(_, record)| record.count())
            .map(|(tag, _)| *tag)
    }
}

/// The full set of inferred fields over a document stream, plus the
/// dynamic-key resolver used to canonicalize their paths.
pub struct InferredSchema {
    pub total_docs: u64,
    pub fields: BTreeMap<FieldPath, InferredField>,
    pub resolver: PathResolver,
    pub semantic: SemanticStatsAccumulator,
}

impl InferredSchema {
    /// The denominator a field's presence is measured against: the number of
    /// times its parent object occurred at all (the root's own document
    /// count, for top-level fields).
    fn parent_occurrences(&self, path: &FieldPath) -> u64 {
        let Some(parent) = path.parent() else {
            return self.total_docs;
        };
        if parent.is_root() {
            self.total_docs
        } else {
            match self.fields.get(&parent) {
                Some(parent_field) => match parent_field.record(TypeTag::Object) {
                    Some(TypeRecord::Object(o)) => o.count,
                    _ => 0,
                },
                None => 0,
            }
        }
    }

    /// Whether the field at `path` is required (present on every document
    /// its parent object occurred in) or optional.
    pub fn is_required(&self, path: &FieldPath) -> bool {
        let Some(field) = self.fields.get(path) else {
            return false;
        };
        if path.parent().is_none() {
            return true; // root is always present
        }
        let denom = self.parent_occurrences(path);
        denom > 0 && field.total_count() >= denom
    }

    /// The fraction of the field's parent occurrences where this field was
    /// present, used by the synthesizer to decide how often to emit an
    /// optional field (§4.8 "include each with its presence probability").
    pub fn presence_ratio(&self, path: &FieldPath) -> f64 {
        let Some(field) = self.fields.get(path) else {
            return 0.0;
        };
        if path.parent().is_none() {
            return 1.0;
        }
        let denom = self.parent_occurrences(path);
        if denom == 0 {
            return 0.0;
        }
        (field.total_count() as f64 / denom as f64).min(1.0)
    }
}

/// Streaming accumulator: feed documents with [`Inferencer::ingest`], then
/// call [`Inferencer::finalize`] once the dynamic-key pass's [`PathResolver`]
/// is known and the stream has been exhausted.
pub struct Inferencer {
    resolver: PathResolver,
    total_docs: u64,
    fields: BTreeMap<FieldPath, InferredField>,
    semantic: SemanticStatsAccumulator,
}

impl Inferencer {
    pub fn new(resolver: PathResolver) -> Self {
        Inferencer {
            resolver,
            total_docs: 0,
            fields: BTreeMap::new(),
            semantic: SemanticStatsAccumulator::new(),
        }
    }

    pub fn ingest(&mut self, doc: &Document) {
        self.total_docs += 1;
        self.visit(&FieldPath::root(), doc);
    }

    fn visit(&mut self, literal_path: &FieldPath, doc: &Document) {
        let resolved = self.resolver.resolve(literal_path);
        let field = self
            .fields
            .entry(resolved.clone())
            .or_insert_with(|| InferredField::new(resolved.clone()));
        field.observe(doc);

        if let Document::String(s) = doc {
            self.semantic.observe(resolved.as_str(), s);
        }

        match doc {
            Document::Object(map) => {
                let dynamic = self.resolver.is_promoted(literal_path.as_str());
                for (k, v) in map {
                    let child = if dynamic {
                        literal_path.push_wildcard()
                    } else {
                        literal_path.push_key(k)
                    };
                    self.visit(&child, v);
                }
            }
            Document::Array(items) => {
                let child = literal_path.push_array();
                for item in items {
                    self.visit(&child, item);
                }
            }
            _ => {}
        }
    }

    pub fn finalize(self) -> InferredSchema {
        InferredSchema {
            total_docs: self.total_docs,
            fields: self.fields,
            resolver: self.resolver,
            semantic: self.semantic,
        }
    }
}

/// Looks up the best semantic label for a resolved path, given the literal
/// field name used at that position (semantic detectors match on name, see
/// [`semantic::detect_semantic_label`]).
pub fn semantic_label_for(
    schema: &InferredSchema,
    path: &FieldPath,
    field_name: &str,
) -> Option<(SemanticLabel, f64)> {
    schema.semantic.best_label(path.as_str(), field_name)
}
