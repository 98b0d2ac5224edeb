use super::quote;
use crate::graph::Triplet;
use std::collections::HashMap;
use std::fmt::Write;

/// Render triplets as a Graphviz digraph.
///
/// One node per distinct subject or object (numbered in first-seen order),
/// one labelled edge per triplet.
pub fn to_dot(triplets: &[Triplet]) -> String {
    let mut ids: HashMap<&str, usize> = HashMap::new();
    let mut nodes = String::new();
    let mut edges = String::new();

    for t in triplets {
        let from = node_id(&mut ids, &mut nodes, &t.subject);
        let to = node_id(&mut ids, &mut nodes, &t.object);
        let _ = writeln!(edges, "  n{} -> n{} [label={}];", from, to, quote(&t.predicate));
    }

    format!(
        "digraph pbg {{\n  size=\"7.75,10.25\";\n  ratio=compress;\n{}{}}}\n",
        nodes, edges
    )
}

fn node_id<'a>(ids: &mut HashMap<&'a str, usize>, nodes: &mut String, name: &'a str) -> usize {
    if let Some(id) = ids.get(name) {
        return *id;
    }
    let id = ids.len();
    ids.insert(name, id);
    let _ = writeln!(nodes, "  n{} [label={}];", id, quote(name));
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_nodes_between_edges() {
        let triplets = vec![
            Triplet::new("main", "calls", "init"),
            Triplet::new("main", "calls", "run"),
            Triplet::new("run", "calls", "init"),
        ];
        let dot = to_dot(&triplets);

        assert!(dot.starts_with("digraph pbg {\n"));
        assert_eq!(dot.matches("[label=\"calls\"]").count(), 3);
        assert!(dot.contains("  n0 [label=\"main\"];\n"));
        assert!(dot.contains("  n2 [label=\"run\"];\n"));
        assert!(dot.contains("  n2 -> n1 [label=\"calls\"];\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn empty_input_renders_empty_graph() {
        assert_eq!(
            to_dot(&[]),
            "digraph pbg {\n  size=\"7.75,10.25\";\n  ratio=compress;\n}\n"
        );
    }
}
