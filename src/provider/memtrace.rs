//! Memory access trace loader
//!
//! Reads a CSV trace with a `pc,kind,address` header and emits
//! `(pc, <kind>-address, address)` for every access.

use super::options::{OptionKind, OptionSchema, ProviderOptions};
use super::traits::{Provider, ProviderError};
use crate::graph::BehaviorGraph;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Loads the trace named by `memTraceFile`. Without that option the
/// provider does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemTraceProvider;

/// Split one trace row into `(pc, predicate, address)`
fn parse_row(row: &str) -> Option<(&str, String, &str)> {
    let mut parts = row.split(',');
    let (pc, kind, address) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let (pc, kind, address) = (pc.trim(), kind.trim(), address.trim());
    if pc.is_empty() || kind.is_empty() || address.is_empty() {
        return None;
    }
    Some((pc, format!("{}-address", kind), address))
}

#[async_trait]
impl Provider for MemTraceProvider {
    fn option_schema(&self) -> OptionSchema {
        OptionSchema::default().optional("memTraceFile", OptionKind::String)
    }

    async fn provide(
        &self,
        graph: &mut BehaviorGraph,
        options: &ProviderOptions,
    ) -> Result<(), ProviderError> {
        let Some(path) = options.str("memTraceFile")? else {
            info!("no memory trace file configured, skipping");
            return Ok(());
        };

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| ProviderError::Io {
                path: path.into(),
                source,
            })?;

        let summary = graph
            .add_facts_from_stream(move |tx| async move {
                let mut rows = BufReader::new(file).split(b'\n');
                let mut row = 0usize;
                let mut skipped = 0usize;

                while let Some(raw) = rows.next_segment().await? {
                    row += 1;
                    // header
                    if row == 1 {
                        continue;
                    }
                    let Ok(line) = std::str::from_utf8(&raw) else {
                        skipped += 1;
                        continue;
                    };
                    let line = line.trim_end_matches('\r');
                    if line.is_empty() {
                        continue;
                    }
                    match parse_row(line) {
                        Some((pc, predicate, address)) => tx.emit(pc, predicate, address).await?,
                        None => skipped += 1,
                    }
                }

                if skipped > 0 {
                    debug!(skipped, "skipped malformed trace rows");
                }
                Ok::<_, Box<dyn std::error::Error + Send + Sync>>(())
            })
            .await?;

        info!(accesses = summary.facts, batches = summary.batches.len(), "memory trace loaded");
        Ok(())
    }
}
