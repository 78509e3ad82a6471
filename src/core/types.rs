use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// A stored field value. Scalars, vectors and nested arrays of scalars, plus
/// structured sub-documents for things like calculator parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    /// Canonical name of this value's kind, shared by the type inferencer and
    /// the histogram engine.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }

    /// Plain JSON rendition, dates as RFC 3339 strings. This is the document
    /// form backends store and filters compare against.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => json!(b),
            Value::Int(i) => json!(i),
            Value::Float(f) => json!(f),
            Value::Str(s) => json!(s),
            Value::Date(d) => json!(d.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Dict(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Which of the per-record key-sets a field name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldCategory {
    Info,
    Arrays,
    Derived,
}

impl FieldCategory {
    /// The key-set path inside the `derived` side-table.
    pub fn key_set(&self) -> &'static str {
        match self {
            FieldCategory::Info => "info_keys",
            FieldCategory::Arrays => "arrays_keys",
            FieldCategory::Derived => "derived_keys",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldCategory::Info => "info",
            FieldCategory::Arrays => "arrays",
            FieldCategory::Derived => "derived",
        }
    }

    pub const ALL: [FieldCategory; 3] = [
        FieldCategory::Info,
        FieldCategory::Arrays,
        FieldCategory::Derived,
    ];
}

/// Per-record classification side-table, populated at ingestion time.
/// A field name appears in at most one of the three sets; the core only
/// reads these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Derived {
    pub info_keys: BTreeSet<String>,
    pub arrays_keys: BTreeSet<String>,
    pub derived_keys: BTreeSet<String>,
}

impl Derived {
    pub fn keys(&self, category: FieldCategory) -> &BTreeSet<String> {
        match category {
            FieldCategory::Info => &self.info_keys,
            FieldCategory::Arrays => &self.arrays_keys,
            FieldCategory::Derived => &self.derived_keys,
        }
    }
}

/// One stored scientific entry: arbitrary named fields plus the `derived`
/// classification side-table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub fields: BTreeMap<String, Value>,
    pub derived: Derived,
}

impl Record {
    pub fn new() -> Self {
        Record::default()
    }

    /// Inserts a field and tags it under `category` in the side-table.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        category: FieldCategory,
    ) {
        let name = name.into();
        match category {
            FieldCategory::Info => self.derived.info_keys.insert(name.clone()),
            FieldCategory::Arrays => self.derived.arrays_keys.insert(name.clone()),
            FieldCategory::Derived => self.derived.derived_keys.insert(name.clone()),
        };
        self.fields.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The JSON document form, with the side-table nested under `derived`.
    pub fn to_document(&self) -> serde_json::Value {
        let mut doc: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        doc.insert(
            "derived".to_string(),
            serde_json::to_value(&self.derived).unwrap_or_default(),
        );
        serde_json::Value::Object(doc)
    }
}
