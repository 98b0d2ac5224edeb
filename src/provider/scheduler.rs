//! Dependency-ordered provider execution
//!
//! Providers are ordered by the longest dependency chain below them: roots
//! first, then everything one step above a root, and so on. Equal priorities
//! run in name order so a plan is reproducible. Execution is sequential and
//! the first failing provider aborts the run.

use super::options::OptionError;
use super::registry::ProviderRegistry;
use super::traits::ProviderError;
use crate::graph::{BehaviorGraph, GraphError};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("provider '{0}' is already registered")]
    DuplicateProvider(String),

    #[error("no provider named '{0}'")]
    UnknownProvider(String),

    #[error("no root provider: every provider declares a dependency")]
    NoRoots,

    #[error("provider '{provider}' depends on '{dependency}', which cannot be reached from any root")]
    UnreachableDependency { provider: String, dependency: String },

    #[error("dependency cycle among providers: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error("whitelist names unknown provider '{0}'")]
    UnknownWhitelistEntry(String),

    #[error("invalid options for provider '{provider}': {source}")]
    InvalidOptions {
        provider: String,
        source: OptionError,
    },

    #[error("provider '{provider}' failed: {source}")]
    ProviderFailed {
        provider: String,
        source: ProviderError,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// One step of an execution plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub name: String,
    /// 1 for roots, otherwise one more than the deepest dependency
    pub priority: usize,
    pub dependencies: Vec<String>,
}

/// Providers in the order they will run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub entries: Vec<PlanEntry>,
}

impl ExecutionPlan {
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            write!(f, "{:>3}. {} (priority {})", i + 1, entry.name, entry.priority)?;
            if !entry.dependencies.is_empty() {
                write!(f, " after {}", entry.dependencies.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Timing and output of one provider invocation
#[derive(Debug, Clone)]
pub struct ProviderRun {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Facts committed to the store while the provider ran
    pub facts_added: usize,
}

/// What an execution did, in order
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub runs: Vec<ProviderRun>,
    /// Providers left out by the whitelist
    pub skipped: Vec<String>,
}

impl ExecutionReport {
    pub fn executed(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Orders and runs the providers of one registry
pub struct Scheduler<'r> {
    registry: &'r ProviderRegistry,
}

impl<'r> Scheduler<'r> {
    pub fn new(registry: &'r ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Compute the execution order from the current registry state
    pub fn plan(&self) -> Result<ExecutionPlan, SchedulerError> {
        let depths = self.registry.depths()?;

        let mut heap: BinaryHeap<Reverse<(usize, String)>> = depths
            .into_iter()
            .map(|(name, depth)| Reverse((depth + 1, name)))
            .collect();

        let mut entries = Vec::with_capacity(heap.len());
        while let Some(Reverse((priority, name))) = heap.pop() {
            let dependencies = self.registry.dependencies(&name).unwrap_or_default();
            entries.push(PlanEntry {
                name,
                priority,
                dependencies,
            });
        }
        Ok(ExecutionPlan { entries })
    }

    /// Run every planned provider against `graph`, one at a time.
    ///
    /// A non-empty `whitelist` restricts the run to the providers it names;
    /// the others are skipped without changing the relative order. Each
    /// provider gets the options set on `graph` under its name (empty if
    /// none), validated against its schema first.
    pub async fn execute(
        &self,
        graph: &mut BehaviorGraph,
        whitelist: &[String],
    ) -> Result<ExecutionReport, SchedulerError> {
        let plan = self.plan()?;

        let mut allowed = whitelist.to_vec();
        allowed.sort();
        allowed.dedup();
        if let Some(unknown) = allowed.iter().find(|name| !self.registry.contains(name)) {
            return Err(SchedulerError::UnknownWhitelistEntry(unknown.clone()));
        }

        let mut report = ExecutionReport::default();
        for entry in plan.entries {
            if !allowed.is_empty() && allowed.binary_search(&entry.name).is_err() {
                debug!(provider = %entry.name, "not whitelisted, skipping");
                report.skipped.push(entry.name);
                continue;
            }

            let provider = self
                .registry
                .get(&entry.name)
                .ok_or_else(|| SchedulerError::UnknownProvider(entry.name.clone()))?;
            let options = graph.options(&entry.name).cloned().unwrap_or_default();
            provider
                .option_schema()
                .validate(&options)
                .map_err(|source| SchedulerError::InvalidOptions {
                    provider: entry.name.clone(),
                    source,
                })?;

            let span = info_span!("provider", name = %entry.name);
            let before = graph.fact_count()?;
            let started_at = Utc::now();
            let clock = Instant::now();

            provider
                .provide(graph, &options)
                .instrument(span.clone())
                .await
                .map_err(|source| SchedulerError::ProviderFailed {
                    provider: entry.name.clone(),
                    source,
                })?;

            let elapsed = clock.elapsed();
            let facts_added = graph.fact_count()?.saturating_sub(before);
            span.in_scope(|| {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    facts = facts_added,
                    "provider finished"
                )
            });

            report.runs.push(ProviderRun {
                name: entry.name,
                started_at,
                elapsed,
                facts_added,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{provider_fn, Provider};
    use crate::storage::MemoryFactStore;
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Arc<dyn Provider> {
        let log = log.clone();
        provider_fn(move |graph, _| {
            log.lock().unwrap().push(name.to_string());
            graph.add_fact(name, "ran", "true")?;
            Ok(())
        })
    }

    fn graph() -> BehaviorGraph {
        BehaviorGraph::with_store(Arc::new(MemoryFactStore::new()))
    }

    #[test]
    fn plan_orders_by_depth_then_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry.register("zeta", recorder(&log, "zeta"), ["alpha"]).unwrap();
        registry.register("beta", recorder(&log, "beta"), Vec::<String>::new()).unwrap();
        registry.register("alpha", recorder(&log, "alpha"), Vec::<String>::new()).unwrap();
        registry.register("gamma", recorder(&log, "gamma"), ["zeta", "beta"]).unwrap();

        let plan = Scheduler::new(&registry).plan().unwrap();
        assert_eq!(plan.names(), vec!["alpha", "beta", "zeta", "gamma"]);
        assert_eq!(
            plan.entries.iter().map(|e| e.priority).collect::<Vec<_>>(),
            vec![1, 1, 2, 3]
        );
    }

    #[test]
    fn plan_renders_for_display() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry.register("files", recorder(&log, "files"), Vec::<String>::new()).unwrap();
        registry.register("memtrace", recorder(&log, "memtrace"), ["files"]).unwrap();

        let text = Scheduler::new(&registry).plan().unwrap().to_string();
        assert_eq!(
            text,
            "  1. files (priority 1)\n  2. memtrace (priority 2) after files\n"
        );
    }

    #[tokio::test]
    async fn execute_reports_runs_and_fact_deltas() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry.register("a", recorder(&log, "a"), Vec::<String>::new()).unwrap();
        registry.register("b", recorder(&log, "b"), ["a"]).unwrap();

        let mut graph = graph();
        let report = Scheduler::new(&registry)
            .execute(&mut graph, &[])
            .await
            .unwrap();

        assert_eq!(report.executed(), vec!["a", "b"]);
        assert!(report.runs.iter().all(|r| r.facts_added == 1));
        assert!(report.skipped.is_empty());
    }

    #[tokio::test]
    async fn unknown_whitelist_entry_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry.register("a", recorder(&log, "a"), Vec::<String>::new()).unwrap();

        let err = Scheduler::new(&registry)
            .execute(&mut graph(), &["a".to_string(), "elf".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownWhitelistEntry(name) if name == "elf"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_provider_aborts_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ProviderRegistry::new();
        registry.register("a", recorder(&log, "a"), Vec::<String>::new()).unwrap();
        registry
            .register(
                "broken",
                provider_fn(|_, _| Err(ProviderError::Failed("bad input".into()))),
                ["a"],
            )
            .unwrap();
        registry.register("c", recorder(&log, "c"), ["broken"]).unwrap();

        let mut graph = graph();
        let err = Scheduler::new(&registry)
            .execute(&mut graph, &[])
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::ProviderFailed { ref provider, .. } if provider == "broken"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert_eq!(graph.fact_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn options_are_validated_before_running() {
        use crate::provider::{FnProvider, OptionKind, OptionSchema, ProviderOptions};

        let registry = ProviderRegistry::new();
        let provider = FnProvider::new(|_: &mut BehaviorGraph, _: &ProviderOptions| Ok(()))
            .with_schema(OptionSchema::default().required("memTraceFile", OptionKind::String));
        registry
            .register("memtrace", Arc::new(provider), Vec::<String>::new())
            .unwrap();

        let mut graph = graph();
        graph.set_options("memtrace", ProviderOptions::new().with("memTraceFile", 3));
        let err = Scheduler::new(&registry)
            .execute(&mut graph, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidOptions { .. }));
    }
}
