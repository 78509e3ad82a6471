//! In-memory backend evaluating document-store filters against records
//! serialized to their JSON document form. Stands in for a real persistence
//! client in tests and small interactive sessions.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use regex::Regex;
use serde_json::Value as Json;

use crate::backend::{Backend, Dialect};
use crate::core::error::{Error, Result};
use crate::core::types::{FieldCategory, Record};

#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Vec<Record>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    pub fn insert(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Batched insert; one call per ingestion batch rather than per record.
    pub fn insert_many(&mut self, records: impl IntoIterator<Item = Record>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn matching<'a>(&'a self, filter: &'a Json) -> impl Iterator<Item = Result<&'a Record>> + 'a {
        self.records.iter().filter_map(move |record| {
            match eval_filter(filter, &record.to_document()) {
                Ok(true) => Some(Ok(record)),
                Ok(false) => None,
                Err(err) => Some(Err(err)),
            }
        })
    }
}

impl Backend for MemoryBackend {
    fn dialect(&self) -> Dialect {
        Dialect::DocumentStore
    }

    fn find(&self, filter: &Json) -> Result<Vec<Record>> {
        self.matching(filter)
            .map(|record| record.map(Record::clone))
            .collect()
    }

    fn count(&self, filter: &Json) -> Result<u64> {
        let mut count = 0u64;
        for record in self.matching(filter) {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn aggregate_distinct(
        &self,
        category: FieldCategory,
        filter: &Json,
    ) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for record in self.matching(filter) {
            names.extend(record?.derived.keys(category).iter().cloned());
        }
        Ok(names)
    }

    fn sample_one(&self, filter: &Json) -> Result<Record> {
        match self.matching(filter).next() {
            Some(record) => Ok(record?.clone()),
            None => Err(Error::NotFound),
        }
    }
}

/// Evaluates a document-store filter against one JSON document. A filter
/// object is an implicit conjunction of its entries.
pub fn eval_filter(filter: &Json, doc: &Json) -> Result<bool> {
    let entries = filter
        .as_object()
        .ok_or_else(|| Error::InvalidFilter(format!("filter must be an object: {filter}")))?;

    for (key, condition) in entries {
        let matched = match key.as_str() {
            "$and" => eval_combinator(condition, doc)?.iter().all(|m| *m),
            "$or" => eval_combinator(condition, doc)?.iter().any(|m| *m),
            field => eval_field(doc.get(field), condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_combinator(children: &Json, doc: &Json) -> Result<Vec<bool>> {
    children
        .as_array()
        .ok_or_else(|| Error::InvalidFilter(format!("combinator expects an array: {children}")))?
        .iter()
        .map(|child| eval_filter(child, doc))
        .collect()
}

fn eval_field(value: Option<&Json>, condition: &Json) -> Result<bool> {
    if let Some(ops) = condition.as_object()
        && ops.keys().any(|k| k.starts_with('$'))
    {
        for (op, operand) in ops {
            let matched = match op.as_str() {
                "$exists" => {
                    let expected = operand.as_bool().ok_or_else(|| {
                        Error::InvalidFilter(format!("$exists expects a boolean: {operand}"))
                    })?;
                    value.is_some() == expected
                }
                "$ne" => !value.is_some_and(|v| equals(v, operand)),
                "$gt" => compares(value, operand, Ordering::Greater, false),
                "$gte" => compares(value, operand, Ordering::Greater, true),
                "$lt" => compares(value, operand, Ordering::Less, false),
                "$lte" => compares(value, operand, Ordering::Less, true),
                "$regex" => {
                    let pattern = operand.as_str().ok_or_else(|| {
                        Error::InvalidFilter(format!("$regex expects a string: {operand}"))
                    })?;
                    let regex = Regex::new(pattern)
                        .map_err(|err| Error::InvalidFilter(format!("bad $regex: {err}")))?;
                    value.is_some_and(|v| regex_matches(&regex, v))
                }
                "$in" => {
                    let candidates = operand.as_array().ok_or_else(|| {
                        Error::InvalidFilter(format!("$in expects an array: {operand}"))
                    })?;
                    value.is_some_and(|v| candidates.iter().any(|c| equals_or_contains(v, c)))
                }
                other => {
                    return Err(Error::InvalidFilter(format!("unknown operator '{other}'")));
                }
            };
            if !matched {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    Ok(value.is_some_and(|v| equals_or_contains(v, condition)))
}

/// Scalar equality with numeric unification: `8` and `8.0` compare equal.
fn equals(a: &Json, b: &Json) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Equality that, like the document store, also matches a list field when
/// any of its elements equals the literal.
fn equals_or_contains(value: &Json, literal: &Json) -> bool {
    if equals(value, literal) {
        return true;
    }
    match value.as_array() {
        Some(items) if !literal.is_array() => items.iter().any(|item| equals(item, literal)),
        _ => false,
    }
}

fn compares(value: Option<&Json>, operand: &Json, wanted: Ordering, or_equal: bool) -> bool {
    let Some(value) = value else {
        return false;
    };
    match compare(value, operand) {
        Some(ordering) => ordering == wanted || (or_equal && ordering == Ordering::Equal),
        None => false,
    }
}

/// Type-preserving comparison: numbers with numbers, strings with strings
/// (dates are RFC 3339 strings, which order chronologically). Cross-type
/// comparisons never match.
fn compare(a: &Json, b: &Json) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

fn regex_matches(regex: &Regex, value: &Json) -> bool {
    match value {
        Json::String(s) => regex.is_match(s),
        Json::Array(items) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| regex.is_match(s))),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::lower;
    use crate::core::types::Value;
    use crate::query::parser::compile;
    use serde_json::json;

    fn fixture() -> MemoryBackend {
        let mut backend = MemoryBackend::new();

        let mut water = Record::new();
        water.set("formula", "H2O", FieldCategory::Info);
        water.set("n_atoms", 3, FieldCategory::Info);
        water.set("energy", -14.2, FieldCategory::Info);
        water.set(
            "positions",
            Value::List(vec![
                Value::List(vec![Value::Float(0.0), Value::Float(0.0), Value::Float(0.0)]),
                Value::List(vec![Value::Float(0.7), Value::Float(0.0), Value::Float(0.0)]),
                Value::List(vec![Value::Float(0.0), Value::Float(0.7), Value::Float(0.0)]),
            ]),
            FieldCategory::Arrays,
        );

        let mut methane = Record::new();
        methane.set("formula", "CH4", FieldCategory::Info);
        methane.set("n_atoms", 5, FieldCategory::Info);
        methane.set("volume", 17.3, FieldCategory::Derived);

        backend.insert_many([water, methane]);
        backend
    }

    fn query(backend: &MemoryBackend, text: &str) -> Vec<Record> {
        let filter = lower(&compile(text).unwrap(), Dialect::DocumentStore).unwrap();
        backend.find(&filter).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let backend = fixture();
        assert_eq!(backend.count(&json!({})).unwrap(), 2);
    }

    #[test]
    fn existence_and_absence_filters() {
        let backend = fixture();
        assert_eq!(query(&backend, "energy").len(), 1);
        assert_eq!(query(&backend, "not energy").len(), 1);
        assert_eq!(query(&backend, "formula").len(), 2);
    }

    #[test]
    fn comparison_filters() {
        let backend = fixture();
        assert_eq!(query(&backend, "n_atoms > 3").len(), 1);
        assert_eq!(query(&backend, "n_atoms >= 3").len(), 2);
        assert_eq!(query(&backend, "energy < 0").len(), 1);
        assert_eq!(query(&backend, "formula = \"H2O\"").len(), 1);
        assert_eq!(query(&backend, "formula != \"H2O\"").len(), 1);
    }

    #[test]
    fn integer_literal_matches_float_value() {
        let backend = fixture();
        assert_eq!(query(&backend, "volume > 17").len(), 1);
    }

    #[test]
    fn boolean_and_membership_filters() {
        let backend = fixture();
        assert_eq!(query(&backend, "formula and n_atoms < 4").len(), 1);
        assert_eq!(query(&backend, "n_atoms = 3 or n_atoms = 5").len(), 2);
        assert_eq!(query(&backend, "n_atoms in [3, 7]").len(), 1);
    }

    #[test]
    fn regex_filter() {
        let backend = fixture();
        assert_eq!(query(&backend, "formula ~= /^H2/").len(), 1);
        assert_eq!(query(&backend, "formula ~= /H/").len(), 2);
    }

    #[test]
    fn aggregate_distinct_respects_filter_and_category() {
        let backend = fixture();
        let info = backend
            .aggregate_distinct(FieldCategory::Info, &json!({}))
            .unwrap();
        assert!(info.contains("formula"));
        assert!(!info.contains("positions"));

        let arrays = backend
            .aggregate_distinct(
                FieldCategory::Arrays,
                &json!({"formula": "CH4"}),
            )
            .unwrap();
        assert!(arrays.is_empty());
    }

    #[test]
    fn sample_one_fails_on_empty_match_set() {
        let backend = fixture();
        let filter = json!({"missing": {"$exists": true}});
        assert!(matches!(backend.sample_one(&filter), Err(Error::NotFound)));
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let backend = fixture();
        assert!(matches!(
            backend.count(&json!({"n_atoms": {"$near": 3}})),
            Err(Error::InvalidFilter(_))
        ));
    }
}
