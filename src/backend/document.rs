//! Lowering into the document store's `$`-operator filter language.

use serde_json::{Value as Json, json};

use crate::core::error::{Error, Result};
use crate::query::ast::Node;

pub fn lower(node: &Node) -> Result<Json> {
    match node {
        Node::Name(field) => Ok(json!({ field: {"$exists": true} })),
        // Negation is defined over existence tests only; a general negation
        // combinator is not part of the grammar's semantic model.
        Node::Not(inner) => match inner.as_ref() {
            Node::Name(field) => Ok(json!({ field: {"$exists": false} })),
            other => Err(Error::UnsupportedPredicate(format!(
                "negation of non-existence predicate: {other:?}"
            ))),
        },
        Node::And(children) => Ok(json!({"$and": lower_all(children)?})),
        Node::Or(children) => Ok(json!({"$or": lower_all(children)?})),
        Node::Eq(field, value) => Ok(json!({ field: value.to_json() })),
        Node::Ne(field, value) => Ok(json!({ field: {"$ne": value.to_json()} })),
        Node::Gt(field, value) => Ok(json!({ field: {"$gt": value.to_json()} })),
        Node::Gte(field, value) => Ok(json!({ field: {"$gte": value.to_json()} })),
        Node::Lt(field, value) => Ok(json!({ field: {"$lt": value.to_json()} })),
        Node::Lte(field, value) => Ok(json!({ field: {"$lte": value.to_json()} })),
        Node::Regex(field, pattern) => Ok(json!({ field: {"$regex": pattern} })),
        Node::In(field, values) => {
            let values: Vec<Json> = values.iter().map(|v| v.to_json()).collect();
            Ok(json!({ field: {"$in": values} }))
        }
    }
}

fn lower_all(children: &[Node]) -> Result<Vec<Json>> {
    children.iter().map(lower).collect()
}
