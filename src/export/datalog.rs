use super::quote;
use crate::graph::Triplet;
use std::collections::HashSet;
use std::fmt::Write;

/// Traversal that binds every fact in the store as a triplet
pub const TRIPLET_QUERY: &str = "g.V().Tag('subject').Out(null, 'predicate').Tag('object').All()";

/// Datalog relation name for a predicate: non-identifier characters become `_`
fn relation(predicate: &str) -> String {
    let mut name: String = predicate
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert_str(0, "r_");
    }
    name
}

/// Render triplets as Soufflé-style Datalog.
///
/// Each relation is declared right before its first fact.
pub fn to_datalog(triplets: &[Triplet]) -> String {
    let mut declared = HashSet::new();
    let mut out = String::new();

    for t in triplets {
        let rel = relation(&t.predicate);
        if declared.insert(rel.clone()) {
            let _ = writeln!(out, ".decl {}(from: symbol, to: symbol)", rel);
        }
        let _ = writeln!(out, "{}({}, {}).", rel, quote(&t.subject), quote(&t.object));
    }
    out
}
