//! In-memory storage backend

use super::traits::{FactStore, StorageResult};
use crate::graph::Fact;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    facts: Vec<Fact>,
    /// subject -> indexes into `facts`
    by_subject: HashMap<String, Vec<usize>>,
    /// object -> indexes into `facts`
    by_object: HashMap<String, Vec<usize>>,
    /// distinct nodes in first-seen order
    nodes: Vec<String>,
    seen: HashSet<String>,
}

impl Inner {
    fn push(&mut self, fact: Fact) {
        let idx = self.facts.len();
        for node in [&fact.subject, &fact.object] {
            if self.seen.insert(node.clone()) {
                self.nodes.push(node.clone());
            }
        }
        self.by_subject
            .entry(fact.subject.clone())
            .or_default()
            .push(idx);
        self.by_object.entry(fact.object.clone()).or_default().push(idx);
        self.facts.push(fact);
    }

    fn select(
        &self,
        index: &HashMap<String, Vec<usize>>,
        node: &str,
        predicate: Option<&str>,
    ) -> Vec<Fact> {
        index
            .get(node)
            .map(|idxs| {
                idxs.iter()
                    .map(|&i| &self.facts[i])
                    .filter(|f| predicate.map_or(true, |p| f.predicate == p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Process-local fact store
///
/// Holds every fact in insertion order with subject and object indexes.
/// Contents are lost when the store is dropped.
#[derive(Debug, Default)]
pub struct MemoryFactStore {
    inner: Mutex<Inner>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FactStore for MemoryFactStore {
    fn insert(&self, fact: &Fact) -> StorageResult<()> {
        self.inner().push(fact.clone());
        Ok(())
    }

    fn insert_batch(&self, facts: &[Fact]) -> StorageResult<usize> {
        let mut inner = self.inner();
        for fact in facts {
            inner.push(fact.clone());
        }
        Ok(facts.len())
    }

    fn nodes(&self) -> StorageResult<Vec<String>> {
        Ok(self.inner().nodes.clone())
    }

    fn outgoing(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
        let inner = self.inner();
        Ok(inner.select(&inner.by_subject, node, predicate))
    }

    fn incoming(&self, node: &str, predicate: Option<&str>) -> StorageResult<Vec<Fact>> {
        let inner = self.inner();
        Ok(inner.select(&inner.by_object, node, predicate))
    }

    fn fact_count(&self) -> StorageResult<usize> {
        Ok(self.inner().facts.len())
    }
}
