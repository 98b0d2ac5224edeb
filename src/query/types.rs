//! Query types and result structures

use std::collections::BTreeMap;
use thiserror::Error;

/// Direction for edge traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Follow facts from subject to object
    #[default]
    Outgoing,
    /// Follow facts from object back to subject
    Incoming,
    /// Follow facts in both directions
    Both,
}

/// Errors raised while parsing or evaluating a traversal expression
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown traversal step '{0}'")]
    UnknownStep(String),

    #[error("invalid arguments to {step}: expected {expected}")]
    BadArguments { step: String, expected: &'static str },

    #[error("traversal must start with g.V(...)")]
    MissingStart,
}

/// One result row of a traversal.
///
/// `node` is the vertex the path ended on; scalar results such as `Count()`
/// carry a `value` instead. `tags` holds every vertex named with `Tag`/`As`,
/// plus predicate names bound by the tag argument of `Out`/`In`/`Both`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    pub node: Option<String>,
    pub value: Option<String>,
    pub tags: BTreeMap<String, String>,
}

impl Binding {
    pub fn node(node: impl Into<String>) -> Self {
        Self {
            node: Some(node.into()),
            ..Self::default()
        }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Look up a tagged vertex or predicate
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}
