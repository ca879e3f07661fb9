// Document store types.
// Defines point-read snapshots, the cached document shape, and Firestore wire decoding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::path::DocumentPath;

/// Result of a point read against the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Whether a document exists at the path.
    pub exists: bool,
    /// Id reported by the store (final path segment).
    pub id: String,
    /// Document fields; empty when the document does not exist.
    pub fields: Map<String, Value>,
}

impl Snapshot {
    pub fn found(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            exists: true,
            id: id.into(),
            fields,
        }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            exists: false,
            id: id.into(),
            fields: Map::new(),
        }
    }
}

/// A document as served to consumers: its id plus opaque fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Build a document from a snapshot read at `path`.
    ///
    /// The id always comes from the lookup path, even if the stored fields
    /// contain an `id` key of their own.
    pub fn from_snapshot(path: &DocumentPath, snapshot: Snapshot) -> Self {
        let mut fields = snapshot.fields;
        fields.remove("id");
        Self {
            id: path.id().to_string(),
            fields,
        }
    }

    /// Get a field by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a string field by name.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Document resource returned by the Firestore REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    /// Full resource name, ending in `/documents/{path}`.
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, RawValue>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl RawDocument {
    /// Final segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// Convert typed fields into plain JSON values.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
            .into_iter()
            .map(|(name, value)| (name, value.into_json()))
            .collect()
    }
}

/// Typed field value as encoded by the Firestore REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawValue {
    NullValue,
    BooleanValue(bool),
    /// Int64 values are sent as decimal strings.
    IntegerValue(String),
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    /// Base64-encoded bytes.
    BytesValue(String),
    ReferenceValue(String),
    GeoPointValue(GeoPoint),
    ArrayValue(RawArray),
    MapValue(RawMap),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArray {
    #[serde(default)]
    pub values: Vec<RawValue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMap {
    #[serde(default)]
    pub fields: HashMap<String, RawValue>,
}

impl RawValue {
    /// Convert into an untyped JSON value.
    ///
    /// Timestamps, references and bytes stay in their string form.
    pub fn into_json(self) -> Value {
        match self {
            RawValue::NullValue => Value::Null,
            RawValue::BooleanValue(b) => Value::Bool(b),
            RawValue::IntegerValue(s) => match s.parse::<i64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => Value::String(s),
            },
            RawValue::DoubleValue(d) => Number::from_f64(d).map_or(Value::Null, Value::Number),
            RawValue::TimestampValue(s)
            | RawValue::StringValue(s)
            | RawValue::BytesValue(s)
            | RawValue::ReferenceValue(s) => Value::String(s),
            RawValue::GeoPointValue(point) => serde_json::json!({
                "latitude": point.latitude,
                "longitude": point.longitude,
            }),
            RawValue::ArrayValue(array) => {
                Value::Array(array.values.into_iter().map(RawValue::into_json).collect())
            }
            RawValue::MapValue(map) => Value::Object(
                map.fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect(),
            ),
        }
    }
}
