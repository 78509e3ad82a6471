use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::backend::{Backend, Dialect, Predicate, existence_filter, match_all};
use crate::core::error::Result;
use crate::core::types::{FieldCategory, Record, Value};
use crate::schema::classify::{FieldStats, classify_fields, count_fields};
use crate::schema::infer::infer_dtype;
use crate::stats::histogram::{Histogram, HistogramOptions, histogram};

/// Wrapper to make data-access operations easy: one backend connection plus
/// the query, schema and statistics subsystems behind a single surface.
/// Stateless between calls; every operation is one backend round-trip plus
/// core-side post-processing.
pub struct Database<B: Backend> {
    backend: B,
}

impl<B: Backend> Database<B> {
    pub fn new(backend: B) -> Self {
        Database { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Records matching the predicate.
    pub fn items(&self, predicate: &Predicate) -> Result<Vec<Record>> {
        let filter = crate::backend::lower_predicate(predicate, self.backend.dialect())?;
        self.backend.find(&filter)
    }

    pub fn count(&self, predicate: &Predicate) -> Result<u64> {
        let filter = crate::backend::lower_predicate(predicate, self.backend.dialect())?;
        self.backend.count(&filter)
    }

    /// Values of `name` across matching records that carry it.
    pub fn property(&self, name: &str, predicate: &Predicate) -> Result<Vec<Value>> {
        let filter = existence_filter(predicate, name, self.backend.dialect())?;
        let values = self
            .backend
            .find(&filter)?
            .into_iter()
            .filter_map(|mut record| record.fields.remove(name))
            .collect();
        Ok(values)
    }

    /// Field names grouped by category across the matching set.
    pub fn properties(
        &self,
        predicate: &Predicate,
    ) -> Result<BTreeMap<FieldCategory, BTreeSet<String>>> {
        classify_fields(&self.backend, predicate)
    }

    /// Per-field presence counts, category and inferred dtype.
    pub fn count_properties(&self, predicate: &Predicate) -> Result<BTreeMap<String, FieldStats>> {
        count_fields(&self.backend, predicate)
    }

    pub fn property_dtype(&self, name: &str, category: FieldCategory) -> Result<String> {
        infer_dtype(&self.backend, name, category)
    }

    /// Distribution summary of one field over the matching set. Data-shape
    /// anomalies yield `Ok(None)`; only predicate and backend failures abort.
    pub fn hist(
        &self,
        name: &str,
        predicate: &Predicate,
        options: &HistogramOptions,
    ) -> Result<Option<Histogram>> {
        let values = self.property(name, predicate)?;
        Ok(histogram(name, &values, options))
    }

    /// Basic information about the connected database.
    pub fn info(&self) -> Result<DatabaseInfo> {
        let dialect = self.backend.dialect();
        Ok(DatabaseInfo {
            dialect,
            records: self.backend.count(&match_all(dialect))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub dialect: Dialect,
    pub records: u64,
}

impl fmt::Display for DatabaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.dialect {
            Dialect::DocumentStore => "document store",
            Dialect::SearchIndex => "search index",
        };
        write!(f, "{:>10}: {}", "type", kind)?;
        writeln!(f)?;
        write!(f, "{:>10}: {}", "records", self.records)
    }
}
