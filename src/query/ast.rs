use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;

/// A literal on the right-hand side of a comparison or membership predicate.
/// Closed set of kinds shared by the compiler and both dialect lowerings.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<Utc>),
}

impl Literal {
    /// JSON form used inside native filters. Numbers stay numbers, dates
    /// become RFC 3339 strings; no cross-kind coercion.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Literal::Bool(b) => json!(b),
            Literal::Int(i) => json!(i),
            Literal::Float(f) => json!(f),
            Literal::Str(s) => json!(s),
            Literal::Date(d) => json!(d.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

/// Engine-independent predicate representation.
///
/// `And`/`Or` carry at least one child; the compiler never produces empty
/// combinators. `Not` is only lowerable over `Name` (absent-field test),
/// anything else is rejected at lowering time.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Field existence test.
    Name(String),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
    Eq(String, Literal),
    Ne(String, Literal),
    Gt(String, Literal),
    Gte(String, Literal),
    Lt(String, Literal),
    Lte(String, Literal),
    Regex(String, String),
    In(String, Vec<Literal>),
}
