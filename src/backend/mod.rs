pub mod document;
pub mod memory;
pub mod search;

use std::collections::BTreeSet;

use serde_json::{Value as Json, json};

use crate::core::error::Result;
use crate::core::types::{FieldCategory, Record};
use crate::query::ast::Node;
use crate::query::parser::compile;

/// Native filter vocabulary of a storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Document store with `$`-operator filters and pipeline aggregations.
    DocumentStore,
    /// Search index with bool/term/range filters and bucket aggregations.
    SearchIndex,
}

/// What callers hand the data-access layer as a selection criterion.
/// Query text and AST nodes are lowered per dialect; a native filter is
/// passed through to the backend untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    All,
    Text(String),
    Node(Node),
    Native(Json),
}

impl From<&str> for Predicate {
    fn from(text: &str) -> Self {
        Predicate::Text(text.to_string())
    }
}

impl From<Node> for Predicate {
    fn from(node: Node) -> Self {
        Predicate::Node(node)
    }
}

impl From<Option<&str>> for Predicate {
    fn from(text: Option<&str>) -> Self {
        match text {
            Some(text) => Predicate::Text(text.to_string()),
            None => Predicate::All,
        }
    }
}

/// Lowers an AST into the dialect's native filter. Pure, no I/O.
pub fn lower(node: &Node, dialect: Dialect) -> Result<Json> {
    match dialect {
        Dialect::DocumentStore => document::lower(node),
        Dialect::SearchIndex => search::lower(node),
    }
}

/// The dialect's match-everything filter, used for empty/absent predicates.
pub fn match_all(dialect: Dialect) -> Json {
    match dialect {
        Dialect::DocumentStore => json!({}),
        Dialect::SearchIndex => json!({"match_all": {}}),
    }
}

/// Normalizes a caller-supplied predicate to a native filter: compiles query
/// text when needed, maps empty predicates to match-all.
pub fn lower_predicate(predicate: &Predicate, dialect: Dialect) -> Result<Json> {
    let filter = match predicate {
        Predicate::All => match_all(dialect),
        Predicate::Text(text) if text.trim().is_empty() => match_all(dialect),
        Predicate::Text(text) => lower(&compile(text)?, dialect)?,
        Predicate::Node(node) => lower(node, dialect)?,
        Predicate::Native(filter) => filter.clone(),
    };
    log::debug!("lowered predicate to {dialect:?} filter: {filter}");
    Ok(filter)
}

/// Lowers `predicate AND field exists`, the filter shape behind projection,
/// per-field counting and single-record sampling. Composes at the native
/// level so pre-lowered `Predicate::Native` filters participate too.
pub fn existence_filter(predicate: &Predicate, field: &str, dialect: Dialect) -> Result<Json> {
    let base = lower_predicate(predicate, dialect)?;
    let exists = lower(&Node::Name(field.to_string()), dialect)?;
    Ok(match dialect {
        Dialect::DocumentStore => {
            if base.as_object().is_some_and(|o| o.is_empty()) {
                exists
            } else {
                json!({"$and": [base, exists]})
            }
        }
        Dialect::SearchIndex => json!({"bool": {"must": [base, exists]}}),
    })
}

/// Narrow contract a storage engine must offer the core. Implementations own
/// all connectivity, retry and timeout policy; the core issues exactly one
/// round-trip per operation.
pub trait Backend {
    fn dialect(&self) -> Dialect;

    /// All records matching the filter. Finite; restartable by calling again.
    fn find(&self, filter: &Json) -> Result<Vec<Record>>;

    fn count(&self, filter: &Json) -> Result<u64>;

    /// Distinct field names listed under `category`'s key-set across records
    /// matching the filter.
    fn aggregate_distinct(&self, category: FieldCategory, filter: &Json)
    -> Result<BTreeSet<String>>;

    /// One record matching the filter, `Error::NotFound` when none does.
    fn sample_one(&self, filter: &Json) -> Result<Record>;
}
