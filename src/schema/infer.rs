//! Type/shape inference from a single sampled record.

use crate::backend::{Backend, Predicate, existence_filter};
use crate::core::error::{Error, Result};
use crate::core::types::{FieldCategory, Value};

/// Samples one record carrying `field` and derives a human-readable shape
/// descriptor: `scalar(T)`, `vector(T)` / `vector(T, N)`, `array(T)` /
/// `array(T, N×M)`. Fails with `Error::FieldNotFound` when no record has
/// the field present.
pub fn infer_dtype<B: Backend>(
    backend: &B,
    field: &str,
    category: FieldCategory,
) -> Result<String> {
    let filter = existence_filter(&Predicate::All, field, backend.dialect())?;
    let record = backend.sample_one(&filter).map_err(|err| match err {
        Error::NotFound => Error::FieldNotFound(field.to_string()),
        other => other,
    })?;
    let value = record
        .get(field)
        .ok_or_else(|| Error::FieldNotFound(field.to_string()))?;
    describe(value, category)
}

fn describe(value: &Value, category: FieldCategory) -> Result<String> {
    if category == FieldCategory::Arrays {
        return describe_array_field(value);
    }

    match value {
        Value::List(items) => {
            let first = first_element(items)?;
            match first {
                Value::List(inner) => {
                    let element = first_element(inner)?;
                    if matches!(element, Value::List(_)) {
                        // Three or more nesting levels are not further
                        // classified; callers get a static marker.
                        Ok("list(list(...))".to_string())
                    } else {
                        Ok(format!("array({})", element.kind_name()))
                    }
                }
                scalar => Ok(format!("vector({})", scalar.kind_name())),
            }
        }
        scalar => Ok(format!("scalar({})", scalar.kind_name())),
    }
}

/// Fields in the arrays category are per-constituent data: one row per
/// constituent, each row a scalar or a fixed-width inner vector.
fn describe_array_field(value: &Value) -> Result<String> {
    let Value::List(rows) = value else {
        return Err(Error::UnsupportedShape(format!(
            "arrays-category value is {}, expected a sequence",
            value.kind_name()
        )));
    };
    let first = first_element(rows)?;
    match first {
        Value::List(inner) => {
            let element = first_element(inner)?;
            Ok(format!(
                "array({}, {}×{})",
                element.kind_name(),
                rows.len(),
                inner.len()
            ))
        }
        scalar => Ok(format!("vector({}, {})", scalar.kind_name(), rows.len())),
    }
}

fn first_element(items: &[Value]) -> Result<&Value> {
    items
        .first()
        .ok_or_else(|| Error::UnsupportedShape("empty sequence".to_string()))
}
