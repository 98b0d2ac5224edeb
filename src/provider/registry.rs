//! Catalog of providers and their declared dependencies

use super::scheduler::SchedulerError;
use super::traits::Provider;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

struct Entry {
    provider: Arc<dyn Provider>,
    dependencies: Vec<String>,
}

#[derive(Default)]
struct State {
    providers: BTreeMap<String, Entry>,
    /// Forward edges: provider -> providers that depend on it
    dependents: HashMap<String, Vec<String>>,
    /// Memoized `distance(from, to)`; `None` means `to` is not reachable
    distances: HashMap<(String, String), Option<usize>>,
    /// Longest dependency chain below each provider
    depths: Option<BTreeMap<String, usize>>,
}

impl State {
    fn invalidate(&mut self) {
        self.distances.clear();
        self.depths = None;
    }
}

/// Registry of providers.
///
/// Built once at startup and handed to the scheduler. Registration is
/// guarded by a mutex, as are the distance and depth caches, which are
/// dropped whenever the provider set changes.
#[derive(Default)]
pub struct ProviderRegistry {
    state: Mutex<State>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `provider` under `name`, to run after every name in
    /// `dependencies`. A name that is already taken leaves the registry
    /// unchanged.
    pub fn register<I, D>(
        &self,
        name: impl Into<String>,
        provider: Arc<dyn Provider>,
        dependencies: I,
    ) -> Result<(), SchedulerError>
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let name = name.into();
        let mut state = self.lock();
        if state.providers.contains_key(&name) {
            return Err(SchedulerError::DuplicateProvider(name));
        }

        let mut deps: Vec<String> = Vec::new();
        for dep in dependencies.into_iter().map(Into::into) {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }

        for dep in &deps {
            state
                .dependents
                .entry(dep.clone())
                .or_default()
                .push(name.clone());
        }
        debug!(provider = %name, dependencies = ?deps, "registered provider");
        state.providers.insert(
            name,
            Entry {
                provider,
                dependencies: deps,
            },
        );
        state.invalidate();
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().providers.is_empty()
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.lock().providers.keys().cloned().collect()
    }

    /// Providers with no dependencies, sorted by name
    pub fn roots(&self) -> Vec<String> {
        self.lock()
            .providers
            .iter()
            .filter(|(_, entry)| entry.dependencies.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.lock()
            .providers
            .get(name)
            .map(|entry| entry.provider.clone())
    }

    pub fn dependencies(&self, name: &str) -> Option<Vec<String>> {
        self.lock()
            .providers
            .get(name)
            .map(|entry| entry.dependencies.clone())
    }

    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.lock()
            .dependents
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Length of the longest dependency chain from `from` down to `to`.
    ///
    /// `Ok(None)` when `to` is not below `from`. Results are memoized until
    /// the next registration.
    pub fn distance(&self, from: &str, to: &str) -> Result<Option<usize>, SchedulerError> {
        let mut state = self.lock();
        for name in [from, to] {
            if !state.providers.contains_key(name) {
                return Err(SchedulerError::UnknownProvider(name.to_string()));
            }
        }
        let mut path = Vec::new();
        distance_in(&mut state, from, to, &mut path)
    }

    /// Longest chain below every provider, computed in one topological pass.
    ///
    /// Roots have depth 0. Fails on a dependency that was never registered
    /// and on cycles.
    pub(crate) fn depths(&self) -> Result<BTreeMap<String, usize>, SchedulerError> {
        let mut state = self.lock();
        if let Some(depths) = &state.depths {
            return Ok(depths.clone());
        }

        for (name, entry) in &state.providers {
            if let Some(missing) = entry
                .dependencies
                .iter()
                .find(|dep| !state.providers.contains_key(*dep))
            {
                return Err(SchedulerError::UnreachableDependency {
                    provider: name.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut pending: HashMap<&str, usize> = state
            .providers
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.dependencies.len()))
            .collect();
        let mut queue: VecDeque<&str> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(name, _)| *name)
            .collect();

        if queue.is_empty() && !state.providers.is_empty() {
            return Err(SchedulerError::NoRoots);
        }

        let mut depths: BTreeMap<String, usize> = BTreeMap::new();
        while let Some(name) = queue.pop_front() {
            let depth = *depths.entry(name.to_string()).or_insert(0);
            for dependent in state.dependents.get(name).into_iter().flatten() {
                let slot = depths.entry(dependent.clone()).or_insert(0);
                *slot = (*slot).max(depth + 1);
                if let Some(n) = pending.get_mut(dependent.as_str()) {
                    *n -= 1;
                    if *n == 0 {
                        queue.push_back(dependent.as_str());
                    }
                }
            }
        }

        let mut stuck: Vec<String> = pending
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .map(|(name, _)| name.to_string())
            .collect();
        if !stuck.is_empty() {
            stuck.sort();
            return Err(SchedulerError::DependencyCycle(stuck));
        }

        state.depths = Some(depths.clone());
        Ok(depths)
    }
}

fn distance_in(
    state: &mut State,
    from: &str,
    to: &str,
    path: &mut Vec<String>,
) -> Result<Option<usize>, SchedulerError> {
    if from == to {
        return Ok(Some(0));
    }
    let key = (from.to_string(), to.to_string());
    if let Some(cached) = state.distances.get(&key) {
        return Ok(*cached);
    }
    if let Some(start) = path.iter().position(|n| n == from) {
        let mut cycle = path[start..].to_vec();
        cycle.push(from.to_string());
        return Err(SchedulerError::DependencyCycle(cycle));
    }

    let deps = match state.providers.get(from) {
        Some(entry) => entry.dependencies.clone(),
        None => return Err(SchedulerError::UnknownProvider(from.to_string())),
    };

    path.push(from.to_string());
    let mut longest = None;
    for dep in &deps {
        if !state.providers.contains_key(dep) {
            return Err(SchedulerError::UnreachableDependency {
                provider: from.to_string(),
                dependency: dep.clone(),
            });
        }
        if let Some(d) = distance_in(state, dep, to, path)? {
            longest = longest.max(Some(d + 1));
        }
    }
    path.pop();

    state.distances.insert(key, longest);
    Ok(longest)
}
