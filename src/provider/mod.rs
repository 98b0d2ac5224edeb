//! Providers and their scheduling
//!
//! Providers register by name with the names they depend on. The
//! `Scheduler` orders them by longest dependency chain and runs them one
//! at a time against a `BehaviorGraph`.

mod files;
mod memtrace;
mod options;
mod registry;
mod scheduler;
mod traits;

pub use files::FilesProvider;
pub use memtrace::MemTraceProvider;
pub use options::{OptionError, OptionKind, OptionSchema, ProviderOptions};
pub use registry::ProviderRegistry;
pub use scheduler::{
    ExecutionPlan, ExecutionReport, PlanEntry, ProviderRun, Scheduler, SchedulerError,
};
pub use traits::{provider_fn, FnProvider, Provider, ProviderError};

use std::sync::Arc;

/// Register the providers that ship with pbg
pub fn register_builtin(registry: &ProviderRegistry) -> Result<(), SchedulerError> {
    registry.register("files", Arc::new(FilesProvider), Vec::<String>::new())?;
    registry.register("memtrace", Arc::new(MemTraceProvider), ["files"])?;
    Ok(())
}
