//! Document-level constraint profiling (§4.6): size and shape statistics
//! computed over whole documents (leaf count, array-length totals, a
//! serialized-byte-size proxy), plus a helper for deriving a field's
//! numeric range from its inferred scalar records.

use crate::freq::{FreqError, FrequencyDistribution, Stats};
use crate::inference::{InferredField, TypeRecord};
use crate::value::{Document, TypeTag};

/// The size proxy a document-size bucket policy is computed against (§6
/// Profiler config `sizeProxy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeProxy {
    LeafFieldCount,
    ArrayLengthSum,
    ByteSize,
}

/// One document-size bucket: a half-open `[min, max)` range over the chosen
/// size proxy (the last bucket is closed on both ends), the count of
/// documents falling in it, and its probability (§4.6 "probabilities are
/// count/total").
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SizeBucket {
    pub min: f64,
    pub max: f64,
    pub count: u64,
    pub probability: f64,
}

/// Whole-document size and shape statistics, accumulated independently of
/// per-field inference.
#[derive(Debug, Clone)]
pub struct ConstraintsProfile {
    pub total_docs: u64,
    pub leaf_count: Result<Stats, FreqError>,
    pub array_length_total: Result<Stats, FreqError>,
    pub byte_size: Result<Stats, FreqError>,
    leaf_count_dist: FrequencyDistribution,
    array_length_total_dist: FrequencyDistribution,
    byte_size_dist: FrequencyDistribution,
}

impl ConstraintsProfile {
    fn distribution(&self, proxy: SizeProxy) -> &FrequencyDistribution {
        match proxy {
            SizeProxy::LeafFieldCount => &self.leaf_count_dist,
            SizeProxy::ArrayLengthSum => &self.array_length_total_dist,
            SizeProxy::ByteSize => &self.byte_size_dist,
        }
    }

    /// Buckets the chosen size proxy's observed values. `explicit_ranges`,
    /// when given, are used verbatim (caller-supplied buckets, §6 "Buckets
    /// may be supplied"); otherwise three equal-width buckets spanning
    /// `[min, max]` are derived automatically (§4.6 "three equal thirds").
    pub fn size_buckets(
        &self,
        proxy: SizeProxy,
        explicit_ranges: Option<&[(f64, f64)]>,
    ) -> Vec<SizeBucket> {
        let dist = self.distribution(proxy);
        if dist.is_empty() {
            return Vec::new();
        }
        let values: Vec<(f64, u64)> = dist
            .counts()
            .iter()
            .filter_map(|(k, c)| k.parse::<f64>().ok().map(|v| (v, *c)))
            .collect();
        let total: u64 = values.iter().map(|(_, c)| c).sum();
        if total == 0 {
            return Vec::new();
        }

        let ranges: Vec<(f64, f64)> = match explicit_ranges {
            Some(ranges) => ranges.to_vec(),
            None => {
                let min = values.iter().map(|(v, _)| *v).fold(f64::INFINITY, f64::min);
                let max = values.iter().map(|(v, _)| *v).fold(f64::NEG_INFINITY, f64::max);
                let width = (max - min) / 3.0;
                if width <= 0.0 {
                    vec![(min, max)]
                } else {
                    vec![
                        (min, min + width),
                        (min + width, min + 2.0 * width),
                        (min + 2.0 * width, max),
                    ]
                }
            }
        };

        let last = ranges.len().saturating_sub(1);
        ranges
            .into_iter()
            .enumerate()
            .map(|(i, (lo, hi))| {
                let count: u64 = values
                    .iter()
                    .filter(|(v, _)| {
                        if i == last {
                            *v >= lo && *v <= hi
                        } else {
                            *v >= lo && *v < hi
                        }
                    })
                    .map(|(_, c)| c)
                    .sum();
                SizeBucket {
                    min: lo,
                    max: hi,
                    count,
                    probability: count as f64 / total as f64,
                }
            })
            .collect()
    }
}

/// Streaming accumulator for [`ConstraintsProfile`].
#[derive(Debug, Default)]
pub struct DocumentProfiler {
    leaf_count: FrequencyDistribution,
    array_length_total: FrequencyDistribution,
    byte_size: FrequencyDistribution,
    total_docs: u64,
}

impl DocumentProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, doc: &Document) {
        self.total_docs += 1;
        let mut leaves = 0u64;
        let mut array_elements = 0u64;
        Self::walk(doc, &mut leaves, &mut array_elements);
        self.leaf_count.update(leaves.to_string());
        self.array_length_total.update(array_elements.to_string());

        let bytes = serde_json::to_vec(&doc.to_tagged_json())
            .map(|v| v.len())
            .unwrap_or(0);
        self.byte_size.update(bytes.to_string());
    }

    fn walk(doc: &Document, leaves: &mut u64, array_elements: &mut u64) {
        match doc {
            Document::Object(map) => {
                for v in map.values() {
                    Self::walk(v, leaves, array_elements);
                }
            }
            Document::Array(items) => {
                *array_elements += items.len() as u64;
                for item in items {
                    Self::walk(item, leaves, array_elements);
                }
            }
            _ => *leaves += 1,
        }
    }

    pub fn finalize(self) -> ConstraintsProfile {
        ConstraintsProfile {
            total_docs: self.total_docs,
            leaf_count: self.leaf_count.stats(),
            array_length_total: self.array_length_total.stats(),
            byte_size: self.byte_size.stats(),
            leaf_count_dist: self.leaf_count,
            array_length_total_dist: self.array_length_total,
            byte_size_dist: self.byte_size,
        }
    }
}

/// The observed `[min, max]` of a field's numeric occurrences (Integer,
/// Float, and Decimal scalar records merged), or `None` if the field was
/// never observed as numeric.
pub fn numeric_range(field: &InferredField) -> Option<(f64, f64)> {
    let mut merged = FrequencyDistribution::new();
    for tag in [TypeTag::Integer, TypeTag::Float, TypeTag::Decimal] {
        if let Some(TypeRecord::Scalar(record)) = field.record(tag) {
            merged.merge(&record.values);
        }
    }
    if merged.is_empty() {
        return None;
    }
    let min = merged.percentile(0.0).ok()?;
    let max = merged.percentile(1.0).ok()?;
    Some((min, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic_keys::{DynamicKeyAccumulator, DynamicKeyConfig};
    use crate::inference::Inferencer;
    use crate::path::FieldPath;

    fn obj(pairs: Vec<(&str, Document)>) -> Document {
        Document::Object(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn profiles_leaf_count_and_array_length() {
        let mut profiler = DocumentProfiler::new();
        profiler.ingest(&obj(vec![
            ("a", Document::Integer(1)),
            ("tags", Document::Array(vec![Document::String("x".into()), Document::String("y".into())])),
        ]));
        profiler.ingest(&obj(vec![("a", Document::Integer(2))]));

        let profile = profiler.finalize();
        assert_eq!(profile.total_docs, 2);
        let leaves = profile.leaf_count.unwrap();
        assert_eq!(leaves.min, 1.0);
        assert_eq!(leaves.max, 3.0);
        let arrays = profile.array_length_total.unwrap();
        assert_eq!(arrays.min, 0.0);
        assert_eq!(arrays.max, 2.0);
    }

    #[test]
    fn auto_derived_buckets_are_three_equal_thirds() {
        let mut profiler = DocumentProfiler::new();
        for leaves in [1u64, 1, 2, 5, 8, 9, 9] {
            profiler.ingest(&Document::Array(vec![Document::Integer(0); leaves as usize]));
        }
        let profile = profiler.finalize();
        let buckets = profile.size_buckets(SizeProxy::ArrayLengthSum, None);
        assert_eq!(buckets.len(), 3);
        let total: u64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 7);
        let width = (9.0 - 1.0) / 3.0;
        assert_eq!(buckets[0].min, 1.0);
        assert!((buckets[0].max - (1.0 + width)).abs() < 1e-9);
        assert_eq!(buckets.last().unwrap().max, 9.0);
        for b in &buckets {
            assert_eq!(b.probability, b.count as f64 / 7.0);
        }
    }

    #[test]
    fn explicit_ranges_are_used_verbatim() {
        let mut profiler = DocumentProfiler::new();
        for leaves in [1u64, 4, 10] {
            profiler.ingest(&Document::Array(vec![Document::Integer(0); leaves as usize]));
        }
        let profile = profiler.finalize();
        let buckets = profile.size_buckets(SizeProxy::ArrayLengthSum, Some(&[(0.0, 5.0), (5.0, 20.0)]));
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn empty_profiler_reports_empty_errors() {
        let profile = DocumentProfiler::new().finalize();
        assert_eq!(profile.total_docs, 0);
        assert!(profile.leaf_count.is_err());
    }

    #[test]
    fn numeric_range_merges_integer_and_float() {
        let docs = vec![
            obj(vec![("price", Document::Integer(10))]),
            obj(vec![("price", Document::Float(2.5))]),
            obj(vec![("price", Document::Integer(99))]),
        ];
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
        let field = schema.fields.get(&FieldPath::from("price")).unwrap();
        let (min, max) = numeric_range(field).unwrap();
        assert_eq!(min, 2.5);
        assert_eq!(max, 99.0);
    }

    #[test]
    fn non_numeric_field_has_no_range() {
        let doc = obj(vec![("name", Document::String("x".into()))]);
        let mut acc = DynamicKeyAccumulator::new(DynamicKeyConfig::default()).unwrap();
        acc.observe(&doc);
        let resolver = acc.finalize();
        let mut inf = Inferencer::new(resolver);
        inf.ingest(&doc);
        let schema = inf.finalize();
        let field = schema.fields.get(&FieldPath::from("name")).unwrap();
        assert!(numeric_range(field).is_none());
    }
}
