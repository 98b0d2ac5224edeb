//! The behavior graph and its facts

mod engine;
mod fact;


pub use engine::{BehaviorGraph, GraphError, GraphResult};
pub use fact::{Fact, Triplet};
