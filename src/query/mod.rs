//! Traversal queries over fact stores
//!
//! Expressions are chained steps starting at `g.V(...)`. Results bind the
//! final vertex of each path plus any named tags, which is what the facade's
//! `query` and `query_triplets` read back.

mod parse;
mod traverse;
mod types;

pub use traverse::TraversalQuery;
pub use types::{Binding, Direction, QueryError};
