//! End-to-end tests of the database facade, plus the dialect-equivalence
//! property: every compiled predicate selects the same record set through
//! the document-store filter and the search-index filter. The search side
//! runs against a small evaluator for the bool/term/range vocabulary,
//! standing in for a real index the way the document evaluator stands in
//! for a real document store.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value as Json;

use scidb::backend::memory::MemoryBackend;
use scidb::backend::{Backend, Dialect, Predicate};
use scidb::core::database::Database;
use scidb::core::error::{Error, Result};
use scidb::core::types::{FieldCategory, Record, Value};
use scidb::query::parser::compile;
use scidb::stats::histogram::{Histogram, HistogramOptions};

fn date(text: &str) -> DateTime<Utc> {
    text.parse().unwrap()
}

fn dataset() -> Vec<Record> {
    let rows: [(&str, i64, f64, bool, &str); 4] = [
        ("H2O", 3, -14.2, true, "2023-01-02T00:00:00Z"),
        ("CH4", 5, -18.1, false, "2023-01-05T00:00:00Z"),
        ("H2O2", 4, -12.0, true, "2023-02-01T00:00:00Z"),
        ("O2", 2, -9.9, false, "2023-03-01T00:00:00Z"),
    ];

    rows.iter()
        .map(|&(formula, n_atoms, energy, periodic, uploaded)| {
            let mut record = Record::new();
            record.set("formula", formula, FieldCategory::Info);
            record.set("n_atoms", n_atoms, FieldCategory::Info);
            record.set("energy", energy, FieldCategory::Info);
            record.set("periodic", periodic, FieldCategory::Info);
            record.set("uploaded", date(uploaded), FieldCategory::Derived);
            if n_atoms > 2 {
                record.set(
                    "positions",
                    Value::List(
                        (0..n_atoms)
                            .map(|i| {
                                Value::List(vec![
                                    Value::Float(i as f64),
                                    Value::Float(0.0),
                                    Value::Float(0.0),
                                ])
                            })
                            .collect(),
                    ),
                    FieldCategory::Arrays,
                );
            }
            record
        })
        .collect()
}

fn document_db() -> Database<MemoryBackend> {
    let mut backend = MemoryBackend::new();
    backend.insert_many(dataset());
    Database::new(backend)
}

#[test]
fn count_and_items() {
    let db = document_db();
    assert_eq!(db.count(&Predicate::All).unwrap(), 4);
    assert_eq!(db.count(&Predicate::from("n_atoms >= 4")).unwrap(), 2);
    assert_eq!(db.items(&Predicate::from("not positions")).unwrap().len(), 1);
}

#[test]
fn properties_groups_fields_by_category() {
    let db = document_db();
    let categories = db.properties(&Predicate::All).unwrap();

    assert!(categories[&FieldCategory::Info].contains("energy"));
    assert!(categories[&FieldCategory::Arrays].contains("positions"));
    assert!(categories[&FieldCategory::Derived].contains("uploaded"));
    assert!(!categories[&FieldCategory::Info].contains("positions"));
}

#[test]
fn count_properties_reports_counts_categories_and_dtypes() {
    let db = document_db();
    let fields = db.count_properties(&Predicate::All).unwrap();

    assert_eq!(fields["formula"].count, 4);
    assert_eq!(fields["positions"].count, 3);
    assert_eq!(fields["positions"].category, FieldCategory::Arrays);
    assert_eq!(fields["positions"].dtype, "array(float, 3×3)");
    assert_eq!(fields["uploaded"].dtype, "scalar(date)");

    // Filtered: only the two-atom record, which has no positions.
    let fields = db
        .count_properties(&Predicate::from("n_atoms < 3"))
        .unwrap();
    assert!(!fields.contains_key("positions"));
    assert_eq!(fields["formula"].count, 1);
}

#[test]
fn property_dtype_samples_one_record() {
    let db = document_db();
    assert_eq!(
        db.property_dtype("positions", FieldCategory::Arrays).unwrap(),
        "array(float, 3×3)"
    );
    assert!(matches!(
        db.property_dtype("missing", FieldCategory::Info),
        Err(Error::FieldNotFound(_))
    ));
}

#[test]
fn hist_over_string_and_date_fields() {
    let db = document_db();

    let Some(Histogram::Str(h)) = db
        .hist("formula", &Predicate::All, &HistogramOptions::default())
        .unwrap()
    else {
        panic!("expected string histogram");
    };
    assert_eq!(h.total, 4);
    assert_eq!(h.unique, 4);

    let Some(Histogram::Date(h)) = db
        .hist(
            "uploaded",
            &Predicate::from("energy < -10"),
            &HistogramOptions {
                bins: 3,
                ..Default::default()
            },
        )
        .unwrap()
    else {
        panic!("expected date histogram");
    };
    assert_eq!(h.counts.iter().sum::<u64>(), 3);
    assert_eq!(h.min, date("2023-01-02T00:00:00Z"));
    assert_eq!(h.max, date("2023-02-01T00:00:00Z"));
}

#[test]
fn syntax_errors_abort_facade_operations() {
    let db = document_db();
    assert!(matches!(
        db.count(&Predicate::from("energy >")),
        Err(Error::Syntax { .. })
    ));
}

// ---------------------------------------------------------------------------
// Dialect equivalence
// ---------------------------------------------------------------------------

/// Test double for the search-index engine: evaluates the bool/term/range
/// filter vocabulary against the same documents the memory backend holds.
struct SearchBackend {
    records: Vec<Record>,
}

impl SearchBackend {
    fn matching(&self, filter: &Json) -> Result<Vec<&Record>> {
        let mut matched = Vec::new();
        for record in &self.records {
            if eval_search(filter, &record.to_document())? {
                matched.push(record);
            }
        }
        Ok(matched)
    }
}

impl Backend for SearchBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SearchIndex
    }

    fn find(&self, filter: &Json) -> Result<Vec<Record>> {
        Ok(self.matching(filter)?.into_iter().cloned().collect())
    }

    fn count(&self, filter: &Json) -> Result<u64> {
        Ok(self.matching(filter)?.len() as u64)
    }

    fn aggregate_distinct(
        &self,
        category: FieldCategory,
        filter: &Json,
    ) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for record in self.matching(filter)? {
            names.extend(record.derived.keys(category).iter().cloned());
        }
        Ok(names)
    }

    fn sample_one(&self, filter: &Json) -> Result<Record> {
        self.matching(filter)?
            .first()
            .map(|record| (*record).clone())
            .ok_or(Error::NotFound)
    }
}

fn eval_search(filter: &Json, doc: &Json) -> Result<bool> {
    let entries = filter
        .as_object()
        .ok_or_else(|| Error::InvalidFilter(format!("filter must be an object: {filter}")))?;
    let (kind, body) = entries
        .iter()
        .next()
        .ok_or_else(|| Error::InvalidFilter("empty filter".into()))?;

    match kind.as_str() {
        "match_all" => Ok(true),
        "exists" => Ok(body["field"].as_str().is_some_and(|f| doc.get(f).is_some())),
        "bool" => {
            for clause in body["must"].as_array().into_iter().flatten() {
                if !eval_search(clause, doc)? {
                    return Ok(false);
                }
            }
            for clause in body["must_not"].as_array().into_iter().flatten() {
                if eval_search(clause, doc)? {
                    return Ok(false);
                }
            }
            if let Some(should) = body["should"].as_array() {
                let needed = body["minimum_should_match"].as_u64().unwrap_or(1) as usize;
                let mut matched = 0;
                for clause in should {
                    if eval_search(clause, doc)? {
                        matched += 1;
                    }
                }
                if matched < needed {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "term" => {
            let (field, value) = single_entry(body)?;
            Ok(doc.get(field).is_some_and(|v| equals_or_contains(v, value)))
        }
        "terms" => {
            let (field, values) = single_entry(body)?;
            let values = values
                .as_array()
                .ok_or_else(|| Error::InvalidFilter("terms expects an array".into()))?;
            Ok(doc
                .get(field)
                .is_some_and(|v| values.iter().any(|c| equals_or_contains(v, c))))
        }
        "range" => {
            let (field, bounds) = single_entry(body)?;
            let Some(value) = doc.get(field) else {
                return Ok(false);
            };
            let bounds = bounds
                .as_object()
                .ok_or_else(|| Error::InvalidFilter("range expects an object".into()))?;
            for (op, operand) in bounds {
                let ordering = compare(value, operand);
                let matched = match op.as_str() {
                    "gt" => ordering == Some(Ordering::Greater),
                    "gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    "lt" => ordering == Some(Ordering::Less),
                    "lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    other => {
                        return Err(Error::InvalidFilter(format!("unknown bound '{other}'")));
                    }
                };
                if !matched {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "regexp" => {
            let (field, pattern) = single_entry(body)?;
            let pattern = pattern
                .as_str()
                .ok_or_else(|| Error::InvalidFilter("regexp expects a string".into()))?;
            // The search engine matches the whole value.
            let regex = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|err| Error::InvalidFilter(format!("bad regexp: {err}")))?;
            Ok(doc
                .get(field)
                .and_then(Json::as_str)
                .is_some_and(|s| regex.is_match(s)))
        }
        other => Err(Error::InvalidFilter(format!("unknown filter '{other}'"))),
    }
}

fn single_entry(body: &Json) -> Result<(&String, &Json)> {
    body.as_object()
        .and_then(|o| o.iter().next())
        .ok_or_else(|| Error::InvalidFilter(format!("expected one field entry: {body}")))
}

fn equals(a: &Json, b: &Json) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn equals_or_contains(value: &Json, literal: &Json) -> bool {
    if equals(value, literal) {
        return true;
    }
    match value.as_array() {
        Some(items) if !literal.is_array() => items.iter().any(|item| equals(item, literal)),
        _ => false,
    }
}

fn compare(a: &Json, b: &Json) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

fn search_db() -> Database<SearchBackend> {
    Database::new(SearchBackend { records: dataset() })
}

fn formulas<B: Backend>(db: &Database<B>, predicate: &Predicate) -> BTreeSet<String> {
    db.items(predicate)
        .unwrap()
        .into_iter()
        .filter_map(|record| match record.get("formula") {
            Some(Value::Str(s)) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn both_dialects_select_the_same_record_sets() {
    let document = document_db();
    let search = search_db();

    let queries = [
        "energy",
        "not positions",
        "n_atoms = 3",
        "n_atoms != 3",
        "energy > -13",
        "energy >= -12.0",
        "n_atoms < 4",
        "n_atoms <= 4",
        "periodic = true",
        "formula = \"H2O\"",
        "formula ~= /H2/",
        "formula ~= /^H2/",
        "formula ~= /O2$/",
        "formula ~= /H2O|CH4/",
        "formula ~= /O2|CH4/",
        "n_atoms in [2, 5]",
        "energy < -10 and n_atoms > 3",
        "n_atoms = 2 or formula = \"H2O\"",
        "periodic = true and (n_atoms = 4 or energy < -14)",
        "uploaded >= 2023-02-01",
        "uploaded < 2023-01-10T00:00:00Z",
    ];

    for query in queries {
        let predicate = Predicate::from(query);
        assert_eq!(
            formulas(&document, &predicate),
            formulas(&search, &predicate),
            "record sets diverge for query: {query}"
        );
    }
}

#[test]
fn facade_results_match_across_dialects() {
    let document = document_db();
    let search = search_db();
    let predicate = Predicate::from("energy < -10");

    assert_eq!(
        document.count(&predicate).unwrap(),
        search.count(&predicate).unwrap()
    );
    assert_eq!(
        document.properties(&predicate).unwrap(),
        search.properties(&predicate).unwrap()
    );
    assert_eq!(
        document.count_properties(&predicate).unwrap(),
        search.count_properties(&predicate).unwrap()
    );
    assert_eq!(
        document
            .hist("n_atoms", &predicate, &HistogramOptions::default())
            .unwrap(),
        search
            .hist("n_atoms", &predicate, &HistogramOptions::default())
            .unwrap()
    );
}

#[test]
fn general_negation_is_unsupported_on_both_dialects() {
    let node = compile("not (energy and positions)").unwrap();
    for db_result in [
        document_db().count(&Predicate::Node(node.clone())),
        search_db().count(&Predicate::Node(node.clone())),
    ] {
        assert!(matches!(db_result, Err(Error::UnsupportedPredicate(_))));
    }
}
