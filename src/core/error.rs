use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed query text. `position` is a byte offset into the input.
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    /// The AST contains a construct the target dialect cannot express.
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    /// Type inference was asked about a field no matching record carries.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// A single-record sample matched nothing.
    #[error("no matching record")]
    NotFound,

    /// A value shape the inferencer or histogram engine does not recognize.
    /// Bulk introspection recovers from this locally instead of aborting.
    #[error("unsupported shape: {0}")]
    UnsupportedShape(String),

    /// A backend handed the core a native filter it cannot evaluate.
    #[error("invalid native filter: {0}")]
    InvalidFilter(String),

    /// Connectivity or execution failure inside a backend collaborator,
    /// propagated unchanged.
    #[error("backend error: {0}")]
    Backend(String),
}

impl Error {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
