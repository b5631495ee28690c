//! The recursive document value model (§3 of the design) and the vendor
//! scalar normalizer (§2 item 4 / §6) that maps tagged wire values into it.

use bigdecimal::BigDecimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum_macros::{Display, EnumIter};
use time::OffsetDateTime;

/// A recursive document value: null, boolean, integer, floating-point,
/// string, opaque 12-byte identifier, timestamp, ordered sequence, or a
/// mapping from string to Document.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    ObjectId([u8; 12]),
    Timestamp(OffsetDateTime),
    Decimal(BigDecimal),
    Binary(Vec<u8>),
    Array(Vec<Document>),
    Object(BTreeMap<String, Document>),
}

/// The tag of a [`Document`] variant. Used pervasively as the key of
/// per-type maps throughout the inferencer and dynamic-key subsystem
/// (Design Note "Polymorphic field records": a tagged variant, not
/// inheritance).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum TypeTag {
    Null,
    Bool,
    Integer,
    Float,
    String,
    ObjectId,
    Timestamp,
    Decimal,
    Binary,
    Array,
    Object,
}

impl Document {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Document::Null => TypeTag::Null,
            Document::Bool(_) => TypeTag::Bool,
            Document::Integer(_) => TypeTag::Integer,
            Document::Float(_) => TypeTag::Float,
            Document::String(_) => TypeTag::String,
            Document::ObjectId(_) => TypeTag::ObjectId,
            Document::Timestamp(_) => TypeTag::Timestamp,
            Document::Decimal(_) => TypeTag::Decimal,
            Document::Binary(_) => TypeTag::Binary,
            Document::Array(_) => TypeTag::Array,
            Document::Object(_) => TypeTag::Object,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Document>> {
        match self {
            Document::Object(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Document]> {
        match self {
            Document::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Document::String(s) => Some(s),
            _ => None,
        }
    }

    /// Stringifies a value the way frequency distributions key their
    /// counts: the canonical `String(v)` of the spec's frequency-map
    /// primitives (§4.1).
    pub fn stringify(&self) -> String {
        match self {
            Document::Null => "null".to_string(),
            Document::Bool(b) => b.to_string(),
            Document::Integer(i) => i.to_string(),
            Document::Float(f) => {
                // Render integral floats without a trailing ".0" so that
                // frequency keys agree with integer renderings of the same
                // numeric value (percentile sorting parses back to f64
                // regardless, but stable string keys keep distributions
                // from splitting a single logical value into two bins).
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{}", *f as i64)
                } else {
                    f.to_string()
                }
            }
            Document::String(s) => s.clone(),
            Document::ObjectId(bytes) => hex::encode(bytes),
            Document::Timestamp(t) => t
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_else(|_| t.unix_timestamp().to_string()),
            Document::Decimal(d) => d.to_string(),
            Document::Binary(b) => base64::encode(b),
            Document::Array(_) | Document::Object(_) => {
                serde_json::to_string(&self.to_tagged_json()).unwrap_or_default()
            }
        }
    }

    /// Parses this document as an `f64`, where meaningful (used by
    /// `Percentile`'s numeric sort, §4.1).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Document::Integer(i) => Some(*i as f64),
            Document::Float(f) => Some(*f),
            Document::Decimal(d) => d.to_string().parse().ok(),
            Document::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Normalizes a tagged JSON wire value (§6) into a `Document`. Vendor
    /// scalar types surface as `{ kind: "oid" | "timestamp" | "decimal" |
    /// "binary", ... }`. Malformed or unrecognized vendor tags fall back to
    /// a `String` representation with a warning rather than aborting the
    /// stream (§4.4 traversal failure semantics, §7 traversal warnings).
    pub fn from_tagged_json(value: &serde_json::Value) -> Document {
        use serde_json::Value as J;
        match value {
            J::Null => Document::Null,
            J::Bool(b) => Document::Bool(*b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Document::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    if f.is_finite() {
                        Document::Float(f)
                    } else {
                        tracing::warn!("non-finite number encountered during normalization");
                        Document::Null
                    }
                } else {
                    Document::Null
                }
            }
            J::Array(items) => Document::Array(items.iter().map(Document::from_tagged_json).collect()),
            J::Object(map) => {
                if let Some(tagged) = Self::from_vendor_tag(map) {
                    return tagged;
                }
                Document::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), Document::from_tagged_json(v)))
                        .collect(),
                )
            }
            J::String(s) => Document::String(s.clone()),
        }
    }

    fn from_vendor_tag(map: &serde_json::Map<String, serde_json::Value>) -> Option<Document> {
        let kind = map.get("kind")?.as_str()?;
        match kind {
            "oid" => {
                let bytes: Vec<u8> = map
                    .get("bytes")?
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_u64().map(|n| n as u8))
                    .collect();
                if bytes.len() != 12 {
                    tracing::warn!(len = bytes.len(), "malformed oid, expected 12 bytes");
                    return Some(Document::String(hex::encode(&bytes)));
                }
                let mut arr = [0u8; 12];
                arr.copy_from_slice(&bytes);
                Some(Document::ObjectId(arr))
            }
            "timestamp" => {
                let epoch_ms = map.get("epochMs")?.as_i64()?;
                match OffsetDateTime::from_unix_timestamp_nanos(epoch_ms as i128 * 1_000_000) {
                    Ok(t) => Some(Document::Timestamp(t)),
                    Err(_) => {
                        tracing::warn!(epoch_ms, "malformed timestamp");
                        Some(Document::Null)
                    }
                }
            }
            "decimal" => {
                let text = map.get("text")?.as_str()?;
                match BigDecimal::from_str(text) {
                    Ok(d) => Some(Document::Decimal(d)),
                    Err(_) => {
                        tracing::warn!(text, "malformed decimal");
                        Some(Document::String(text.to_string()))
                    }
                }
            }
            "binary" => {
                let b64 = map.get("base64")?.as_str()?;
                match base64::decode(b64) {
                    Ok(bytes) => Some(Document::Binary(bytes)),
                    Err(_) => {
                        tracing::warn!(b64, "malformed binary");
                        Some(Document::String(b64.to_string()))
                    }
                }
            }
            _ => None,
        }
    }

    /// Denormalizes this `Document` back into the tagged JSON wire form of
    /// §6. `Normalize ∘ Denormalize` is required to be the identity for
    /// every vendor type (§8 round-trip property 6).
    pub fn to_tagged_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Document::Null => serde_json::Value::Null,
            Document::Bool(b) => json!(b),
            Document::Integer(i) => json!(i),
            Document::Float(f) => json!(f),
            Document::String(s) => json!(s),
            Document::ObjectId(bytes) => json!({
                "kind": "oid",
                "bytes": bytes.to_vec(),
            }),
            Document::Timestamp(t) => json!({
                "kind": "timestamp",
                "epochMs": t.unix_timestamp_nanos() / 1_000_000,
            }),
            Document::Decimal(d) => json!({
                "kind": "decimal",
                "text": d.to_string(),
            }),
            Document::Binary(b) => json!({
                "kind": "binary",
                "base64": base64::encode(b),
            }),
            Document::Array(items) => {
                serde_json::Value::Array(items.iter().map(Document::to_tagged_json).collect())
            }
            Document::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_tagged_json()))
                    .collect(),
            ),
        }
    }

    /// The plain, untagged JSON rendering used for synthetic output
    /// (§6 emitter): vendor scalars are rendered in their natural textual
    /// form rather than the `{kind: ...}` wire envelope, since the
    /// generator's output is meant to be consumed as ordinary JSON/NDJSON.
    pub fn to_plain_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Document::Null => serde_json::Value::Null,
            Document::Bool(b) => json!(b),
            Document::Integer(i) => json!(i),
            Document::Float(f) => json!(f),
            Document::String(s) => json!(s),
            Document::ObjectId(bytes) => json!(hex::encode(bytes)),
            Document::Timestamp(t) => json!(t
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default()),
            Document::Decimal(d) => json!(d.to_string()),
            Document::Binary(b) => json!(base64::encode(b)),
            Document::Array(items) => {
                serde_json::Value::Array(items.iter().map(Document::to_plain_json).collect())
            }
            Document::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_plain_json()))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oid_round_trips() {
        let tagged = json!({"kind": "oid", "bytes": [1,2,3,4,5,6,7,8,9,10,11,12]});
        let doc = Document::from_tagged_json(&tagged);
        assert_eq!(doc.type_tag(), TypeTag::ObjectId);
        assert_eq!(doc.to_tagged_json(), tagged);
    }

    #[test]
    fn timestamp_round_trips() {
        let tagged = json!({"kind": "timestamp", "epochMs": 1_700_000_000_000i64});
        let doc = Document::from_tagged_json(&tagged);
        assert_eq!(doc.type_tag(), TypeTag::Timestamp);
        assert_eq!(doc.to_tagged_json(), tagged);
    }

    #[test]
    fn decimal_round_trips() {
        let tagged = json!({"kind": "decimal", "text": "12345.6789"});
        let doc = Document::from_tagged_json(&tagged);
        assert_eq!(doc.type_tag(), TypeTag::Decimal);
        assert_eq!(doc.to_tagged_json(), tagged);
    }

    #[test]
    fn binary_round_trips() {
        let tagged = json!({"kind": "binary", "base64": base64::encode(b"some bytes")});
        let doc = Document::from_tagged_json(&tagged);
        assert_eq!(doc.type_tag(), TypeTag::Binary);
        assert_eq!(doc.to_tagged_json(), tagged);
    }

    #[test]
    fn nested_object_normalizes_recursively() {
        let tagged = json!({
            "a": {"kind": "oid", "bytes": [0,0,0,0,0,0,0,0,0,0,0,1]},
            "b": [1, 2, {"kind": "decimal", "text": "1.5"}],
        });
        let doc = Document::from_tagged_json(&tagged);
        let obj = doc.as_object().unwrap();
        assert_eq!(obj["a"].type_tag(), TypeTag::ObjectId);
        assert_eq!(obj["b"].as_array().unwrap()[2].type_tag(), TypeTag::Decimal);
    }

    #[test]
    fn malformed_oid_falls_back_without_aborting() {
        let tagged = json!({"kind": "oid", "bytes": [1,2,3]});
        let doc = Document::from_tagged_json(&tagged);
        assert_eq!(doc.type_tag(), TypeTag::String);
    }
}
