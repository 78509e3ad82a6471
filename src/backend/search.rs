//! Lowering into the search index's bool/term/range filter language.

use serde_json::{Value as Json, json};

use crate::core::error::{Error, Result};
use crate::query::ast::Node;

pub fn lower(node: &Node) -> Result<Json> {
    match node {
        Node::Name(field) => Ok(exists(field)),
        Node::Not(inner) => match inner.as_ref() {
            Node::Name(field) => Ok(json!({"bool": {"must_not": [exists(field)]}})),
            other => Err(Error::UnsupportedPredicate(format!(
                "negation of non-existence predicate: {other:?}"
            ))),
        },
        Node::And(children) => Ok(json!({"bool": {"must": lower_all(children)?}})),
        Node::Or(children) => Ok(json!({"bool": {
            "should": lower_all(children)?,
            "minimum_should_match": 1,
        }})),
        Node::Eq(field, value) => Ok(json!({"term": { field: value.to_json() }})),
        Node::Ne(field, value) => Ok(json!({"bool": {
            "must_not": [{"term": { field: value.to_json() }}],
        }})),
        Node::Gt(field, value) => Ok(range(field, "gt", value.to_json())),
        Node::Gte(field, value) => Ok(range(field, "gte", value.to_json())),
        Node::Lt(field, value) => Ok(range(field, "lt", value.to_json())),
        Node::Lte(field, value) => Ok(range(field, "lte", value.to_json())),
        Node::Regex(field, pattern) => {
            Ok(json!({"regexp": { field: normalize_pattern(pattern) }}))
        }
        Node::In(field, values) => {
            let values: Vec<Json> = values.iter().map(|v| v.to_json()).collect();
            Ok(json!({"terms": { field: values }}))
        }
    }
}

fn lower_all(children: &[Node]) -> Result<Vec<Json>> {
    children.iter().map(lower).collect()
}

fn exists(field: &str) -> Json {
    json!({"exists": {"field": field}})
}

fn range(field: &str, op: &str, value: Json) -> Json {
    json!({"range": { field: { op: value } }})
}

/// The document dialect matches substrings and honors `^`/`$` anchors; the
/// search dialect anchors implicitly and has no anchor metacharacters. Strip
/// explicit anchors and pad the unanchored sides with `.*` so the same
/// pattern selects the same value set on both backends. The stripped pattern
/// is wrapped in a non-capturing group first, otherwise a top-level
/// alternation would bind tighter than the padding.
fn normalize_pattern(pattern: &str) -> String {
    let (pattern, anchored_start) = match pattern.strip_prefix('^') {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    let (pattern, anchored_end) = match pattern.strip_suffix('$') {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    if anchored_start && anchored_end {
        return pattern.to_string();
    }

    let mut out = String::new();
    if !anchored_start {
        out.push_str(".*");
    }
    out.push_str("(?:");
    out.push_str(pattern);
    out.push(')');
    if !anchored_end {
        out.push_str(".*");
    }
    out
}
