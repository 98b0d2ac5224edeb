//! Shared helpers for pbg integration tests

#![allow(dead_code)]

use pbg::provider::provider_fn;
use pbg::{BehaviorGraph, MemoryFactStore, Provider};
use std::sync::{Arc, Mutex};

/// Names of providers in the order they ran
#[derive(Clone, Default)]
pub struct RunLog(Arc<Mutex<Vec<String>>>);

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that records `name` and writes one fact about itself
    pub fn provider(&self, name: &'static str) -> Arc<dyn Provider> {
        let log = self.0.clone();
        provider_fn(move |graph, _| {
            log.lock().unwrap().push(name.to_string());
            graph.add_fact(name, "executed", "true")?;
            Ok(())
        })
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

pub fn memory_graph() -> BehaviorGraph {
    BehaviorGraph::with_store(Arc::new(MemoryFactStore::new()))
}

/// `(s, p, o)` facts numbered `0..n`
pub fn numbered_facts(n: usize) -> Vec<(String, String, String)> {
    (0..n)
        .map(|i| (format!("pc-{}", i), "read-address".to_string(), format!("0x{:x}", i)))
        .collect()
}
