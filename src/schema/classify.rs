//! Field classification from per-record key-sets. Category membership is
//! read from the `derived` side-table written at ingestion, never inferred
//! from value shape.

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{Backend, Predicate, existence_filter, lower_predicate};
use crate::core::error::{Error, Result};
use crate::core::types::FieldCategory;
use crate::schema::infer::infer_dtype;

/// Per-field summary returned by [`count_fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStats {
    /// Matching records in which the field is present.
    pub count: u64,
    pub category: FieldCategory,
    pub dtype: String,
}

/// For each category, the field names at least one matching record tags
/// under that category's key-set. BTree containers keep the result
/// independent of backend result ordering.
pub fn classify_fields<B: Backend>(
    backend: &B,
    predicate: &Predicate,
) -> Result<BTreeMap<FieldCategory, BTreeSet<String>>> {
    let filter = lower_predicate(predicate, backend.dialect())?;

    let mut categories = BTreeMap::new();
    for category in FieldCategory::ALL {
        categories.insert(category, backend.aggregate_distinct(category, &filter)?);
    }
    Ok(categories)
}

/// Per-field presence counts plus category and inferred dtype. A field
/// tagged under several categories across records resolves to the last
/// category in info, derived, arrays order.
pub fn count_fields<B: Backend>(
    backend: &B,
    predicate: &Predicate,
) -> Result<BTreeMap<String, FieldStats>> {
    let dialect = backend.dialect();
    let filter = lower_predicate(predicate, dialect)?;

    let mut fields = BTreeMap::new();
    for category in [
        FieldCategory::Info,
        FieldCategory::Derived,
        FieldCategory::Arrays,
    ] {
        for field in backend.aggregate_distinct(category, &filter)? {
            let count = backend.count(&existence_filter(predicate, &field, dialect)?)?;
            let dtype = match infer_dtype(backend, &field, category) {
                Ok(dtype) => dtype,
                Err(Error::UnsupportedShape(reason)) => {
                    log::warn!("{field}: cannot describe shape ({reason})");
                    "unsupported".to_string()
                }
                Err(err) => return Err(err),
            };
            fields.insert(
                field,
                FieldStats {
                    count,
                    category,
                    dtype,
                },
            );
        }
    }
    Ok(fields)
}
