//! Fact representation: subject–predicate–object triples

use serde::{Deserialize, Serialize};

/// A single `(subject, predicate, object)` edge in the behavior graph.
///
/// Facts are opaque strings. Duplicates are allowed and become parallel
/// edges in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

impl<S, P, O> From<(S, P, O)> for Fact
where
    S: Into<String>,
    P: Into<String>,
    O: Into<String>,
{
    fn from((subject, predicate, object): (S, P, O)) -> Self {
        Self::new(subject, predicate, object)
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

/// A fact read back through `query_triplets`, bound from the
/// `subject`/`predicate`/`object` tags of a traversal.
pub type Triplet = Fact;
