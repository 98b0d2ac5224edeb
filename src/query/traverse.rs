//! Traversal evaluation over a fact store
//!
//! A traversal starts from a vertex set and applies each step to the
//! current set of paths. Following an edge forks one path per matching
//! fact, so parallel (duplicate) facts yield parallel results.

use std::collections::{BTreeMap, HashSet};

use super::parse;
use super::types::{Binding, Direction, QueryError};
use crate::storage::{FactStore, StorageResult};

/// A single traversal step
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    /// Move along facts; `tag` binds the predicate that was followed
    Follow {
        direction: Direction,
        predicate: Option<String>,
        tag: Option<String>,
    },
    /// Move to the distinct predicates leaving each vertex
    OutPredicates,
    /// Keep vertices with a `(vertex, predicate, object)` fact
    Has { predicate: String, object: String },
    /// Keep vertices in the set
    Is(Vec<String>),
    /// Name the current vertex
    Tag(String),
    /// Return to a previously tagged vertex
    Back(String),
    Unique,
    Skip(usize),
    Limit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminal {
    All,
    Count,
}

#[derive(Debug, Clone)]
struct Path {
    node: String,
    tags: BTreeMap<String, String>,
}

/// A parsed traversal, ready to run against any `FactStore`
#[derive(Debug, Clone)]
pub struct TraversalQuery {
    pub(crate) start: Vec<String>,
    pub(crate) steps: Vec<Step>,
    pub(crate) terminal: Terminal,
}

impl TraversalQuery {
    /// Parse a traversal expression
    pub fn parse(expr: &str) -> Result<Self, QueryError> {
        parse::parse(expr)
    }

    /// Run the traversal, returning at most `limit` bindings.
    ///
    /// Rows beyond `limit` are dropped without error. The cap also bounds
    /// the steps that only feed order-preserving steps (`Tag`, `Skip`,
    /// `Limit`) on the way to `All`, so those stop forking once enough
    /// paths exist. `Count` always sees every path.
    pub fn execute<S: FactStore + ?Sized>(
        &self,
        store: &S,
        limit: usize,
    ) -> StorageResult<Vec<Binding>> {
        let (start_cap, caps) = self.step_caps(limit);
        let mut paths = self.start_paths(store, start_cap)?;

        for (step, cap) in self.steps.iter().zip(caps) {
            paths = apply(step, paths, store, cap)?;
        }

        let bindings = match self.terminal {
            Terminal::All => paths
                .into_iter()
                .take(limit)
                .map(|p| Binding {
                    node: Some(p.node),
                    value: None,
                    tags: p.tags,
                })
                .collect(),
            Terminal::Count => vec![Binding::value(paths.len().to_string())],
        };

        Ok(bindings)
    }

    /// How many paths the start set and each step need to produce.
    ///
    /// Walks back from the terminal; any step that can drop or reorder
    /// paths lifts the cap for everything before it.
    fn step_caps(&self, limit: usize) -> (usize, Vec<usize>) {
        let mut cap = match self.terminal {
            Terminal::All => limit,
            Terminal::Count => usize::MAX,
        };
        let mut caps = vec![usize::MAX; self.steps.len()];
        for (i, step) in self.steps.iter().enumerate().rev() {
            caps[i] = cap;
            cap = match step {
                Step::Tag(_) => cap,
                Step::Limit(n) => cap.min(*n),
                Step::Skip(n) => cap.saturating_add(*n),
                _ => usize::MAX,
            };
        }
        (cap, caps)
    }

    fn start_paths<S: FactStore + ?Sized>(&self, store: &S, cap: usize) -> StorageResult<Vec<Path>> {
        let nodes = if self.start.is_empty() {
            let mut nodes = store.nodes()?;
            nodes.truncate(cap);
            nodes
        } else {
            let mut present = Vec::with_capacity(self.start.len().min(cap));
            for id in &self.start {
                if present.len() >= cap {
                    break;
                }
                if !store.outgoing(id, None)?.is_empty() || !store.incoming(id, None)?.is_empty() {
                    present.push(id.clone());
                }
            }
            present
        };

        Ok(nodes
            .into_iter()
            .map(|node| Path {
                node,
                tags: BTreeMap::new(),
            })
            .collect())
    }
}

/// Apply one step, producing at most `cap` paths
fn apply<S: FactStore + ?Sized>(
    step: &Step,
    paths: Vec<Path>,
    store: &S,
    cap: usize,
) -> StorageResult<Vec<Path>> {
    let mut next = match step {
        Step::Follow {
            direction,
            predicate,
            tag,
        } => {
            let mut next = Vec::new();
            let pred = predicate.as_deref();
            for path in &paths {
                if next.len() >= cap {
                    break;
                }
                if matches!(direction, Direction::Outgoing | Direction::Both) {
                    for fact in store.outgoing(&path.node, pred)? {
                        next.push(fork(path, fact.object, tag.as_deref(), &fact.predicate));
                    }
                }
                if next.len() < cap && matches!(direction, Direction::Incoming | Direction::Both) {
                    for fact in store.incoming(&path.node, pred)? {
                        next.push(fork(path, fact.subject, tag.as_deref(), &fact.predicate));
                    }
                }
            }
            next
        }
        Step::OutPredicates => {
            let mut next = Vec::new();
            for path in &paths {
                if next.len() >= cap {
                    break;
                }
                let mut seen = HashSet::new();
                for fact in store.outgoing(&path.node, None)? {
                    if seen.insert(fact.predicate.clone()) {
                        next.push(Path {
                            node: fact.predicate,
                            tags: path.tags.clone(),
                        });
                    }
                }
            }
            next
        }
        Step::Has { predicate, object } => {
            let mut next = Vec::new();
            for path in paths {
                if next.len() >= cap {
                    break;
                }
                let hit = store
                    .outgoing(&path.node, Some(predicate.as_str()))?
                    .iter()
                    .any(|f| &f.object == object);
                if hit {
                    next.push(path);
                }
            }
            next
        }
        Step::Is(ids) => paths.into_iter().filter(|p| ids.contains(&p.node)).collect(),
        Step::Tag(name) => paths
            .into_iter()
            .map(|mut p| {
                p.tags.insert(name.clone(), p.node.clone());
                p
            })
            .collect(),
        Step::Back(name) => paths
            .into_iter()
            .filter_map(|mut p| {
                let node = p.tags.get(name)?.clone();
                p.node = node;
                Some(p)
            })
            .collect(),
        Step::Unique => {
            let mut seen = HashSet::new();
            paths
                .into_iter()
                .filter(|p| seen.insert(p.node.clone()))
                .collect()
        }
        Step::Skip(n) => paths.into_iter().skip(*n).collect(),
        Step::Limit(n) => paths.into_iter().take(*n).collect(),
    };

    // one vertex may fork past the cap
    next.truncate(cap);
    Ok(next)
}

fn fork(path: &Path, node: String, tag: Option<&str>, predicate: &str) -> Path {
    let mut tags = path.tags.clone();
    if let Some(tag) = tag {
        tags.insert(tag.to_string(), predicate.to_string());
    }
    Path { node, tags }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Fact;
    use crate::storage::MemoryFactStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_store() -> MemoryFactStore {
        let store = MemoryFactStore::new();
        store
            .insert_batch(&[
                Fact::new("main", "has-var", "argc"),
                Fact::new("main", "has-var", "argv"),
                Fact::new("argc", "has-var-type", "int"),
                Fact::new("argv", "has-var-type", "char**"),
                Fact::new("main.c", "contains", "main"),
                Fact::new("main", "calls", "helper"),
                Fact::new("main", "calls", "helper"),
            ])
            .unwrap();
        store
    }

    fn run(store: &MemoryFactStore, expr: &str) -> Vec<Binding> {
        TraversalQuery::parse(expr)
            .unwrap()
            .execute(store, usize::MAX)
            .unwrap()
    }

    fn nodes(bindings: &[Binding]) -> Vec<&str> {
        bindings.iter().filter_map(|b| b.node.as_deref()).collect()
    }

    #[test]
    fn out_follows_predicate() {
        let store = sample_store();
        let result = run(&store, "g.V('main').Out('has-var').All()");
        assert_eq!(nodes(&result), vec!["argc", "argv"]);
    }

    #[test]
    fn in_follows_reverse_edges() {
        let store = sample_store();
        let result = run(&store, "g.V('main').In().All()");
        assert_eq!(nodes(&result), vec!["main.c"]);
    }

    #[test]
    fn parallel_facts_yield_parallel_results() {
        let store = sample_store();
        let result = run(&store, "g.V('main').Out('calls').All()");
        assert_eq!(nodes(&result), vec!["helper", "helper"]);

        let unique = run(&store, "g.V('main').Out('calls').Unique().All()");
        assert_eq!(nodes(&unique), vec!["helper"]);
    }

    #[test]
    fn tags_bind_subject_predicate_object() {
        let store = sample_store();
        let result = run(
            &store,
            "g.V('argc').Tag('subject').Out(null, 'predicate').Tag('object').All()",
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].tag("subject"), Some("argc"));
        assert_eq!(result[0].tag("predicate"), Some("has-var-type"));
        assert_eq!(result[0].tag("object"), Some("int"));
    }

    #[test]
    fn has_filters_by_outgoing_fact() {
        let store = sample_store();
        let result = run(&store, "g.V().Has('has-var-type', 'int').All()");
        assert_eq!(nodes(&result), vec!["argc"]);
    }

    #[test]
    fn back_returns_to_tagged_vertex() {
        let store = sample_store();
        let result = run(
            &store,
            "g.V('main').Tag('fn').Out('has-var').Has('has-var-type', 'int').Back('fn').All()",
        );
        assert_eq!(nodes(&result), vec!["main"]);
    }

    #[test]
    fn out_predicates_lists_distinct_predicates() {
        let store = sample_store();
        let result = run(&store, "g.V('main').OutPredicates().All()");
        assert_eq!(nodes(&result), vec!["has-var", "calls"]);
    }

    #[test]
    fn count_returns_scalar() {
        let store = sample_store();
        let result = run(&store, "g.V('main').Out().Count()");
        assert_eq!(result, vec![Binding::value("4")]);
    }

    #[test]
    fn skip_limit_and_is() {
        let store = sample_store();
        let result = run(&store, "g.V().Skip(1).Limit(2).All()");
        assert_eq!(nodes(&result), vec!["argc", "argv"]);

        let result = run(&store, "g.V().Is('int', 'nope').All()");
        assert_eq!(nodes(&result), vec!["int"]);
    }

    #[test]
    fn unknown_start_vertex_yields_nothing() {
        let store = sample_store();
        assert!(run(&store, "g.V('ghost').All()").is_empty());
    }

    #[test]
    fn execute_truncates_to_limit() {
        let store = sample_store();
        let result = TraversalQuery::parse("g.V().All()")
            .unwrap()
            .execute(&store, 3)
            .unwrap();
        assert_eq!(result.len(), 3);
    }

    /// Counts adjacency lookups made against the wrapped store
    struct CountingStore {
        inner: MemoryFactStore,
        lookups: AtomicUsize,
    }

    impl FactStore for CountingStore {
        fn insert(&self, fact: &Fact) -> StorageResult<()> {
            self.inner.insert(fact)
        }

        fn insert_batch(&self, facts: &[Fact]) -> StorageResult<usize> {
            self.inner.insert_batch(facts)
        }

        fn nodes(&self) -> StorageResult<Vec<String>> {
            self.inner.nodes()
        }

        fn outgoing(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.outgoing(node, predicate)
        }

        fn incoming(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.incoming(node, predicate)
        }

        fn fact_count(&self) -> StorageResult<usize> {
            self.inner.fact_count()
        }
    }

    fn fan_out_store() -> CountingStore {
        let inner = MemoryFactStore::new();
        let mut facts = Vec::new();
        for i in 0..100 {
            facts.push(Fact::new("hub", "links", format!("n{}", i)));
            facts.push(Fact::new(format!("n{}", i), "next", format!("m{}", i)));
        }
        inner.insert_batch(&facts).unwrap();
        CountingStore {
            inner,
            lookups: AtomicUsize::new(0),
        }
    }

    #[test]
    fn limit_bounds_last_follow_step() {
        let store = fan_out_store();
        let query = TraversalQuery::parse("g.V('hub').Out('links').Out('next').Tag('end').All()").unwrap();

        let result = query.execute(&store, 3).unwrap();
        assert_eq!(nodes(&result), vec!["m0", "m1", "m2"]);
        // start check, one hub lookup, then three of the hundred `next` lookups
        assert!(store.lookups.load(Ordering::SeqCst) <= 6);

        store.lookups.store(0, Ordering::SeqCst);
        let result = query.execute(&store, usize::MAX).unwrap();
        assert_eq!(result.len(), 100);
        assert!(store.lookups.load(Ordering::SeqCst) > 100);
    }

    #[test]
    fn limit_is_not_pushed_past_filters_or_count() {
        let store = fan_out_store();

        let filtered = TraversalQuery::parse("g.V('hub').Out('links').Is('n50', 'n99').All()")
            .unwrap()
            .execute(&store, 1)
            .unwrap();
        assert_eq!(nodes(&filtered), vec!["n50"]);

        let skipped = TraversalQuery::parse("g.V('hub').Out('links').Skip(10).All()")
            .unwrap()
            .execute(&store, 2)
            .unwrap();
        assert_eq!(nodes(&skipped), vec!["n10", "n11"]);

        let counted = TraversalQuery::parse("g.V('hub').Out('links').Count()")
            .unwrap()
            .execute(&store, 1)
            .unwrap();
        assert_eq!(counted[0].value.as_deref(), Some("100"));
    }
}
