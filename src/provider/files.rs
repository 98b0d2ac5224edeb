//! Source file loader
//!
//! Emits, for every loaded file:
//! - `(dir, contains-file, file)`
//! - `(file, has-text, content)`
//! - `(file, has-line, line-N)` and `(file:line-N, line-content, text)`,
//!   through stream mode since files can be long

use super::options::{OptionKind, OptionSchema, ProviderOptions};
use super::traits::{Provider, ProviderError};
use crate::graph::BehaviorGraph;
use crate::ingest::StreamClosed;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const CONTAINS_FILE: &str = "contains-file";
pub const HAS_TEXT: &str = "has-text";
pub const HAS_LINE: &str = "has-line";
pub const LINE_CONTENT: &str = "line-content";

/// Loads source text from `sourceDir` (walked recursively, optionally
/// filtered by `extensions`) and from an explicit `sourceFiles` list.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilesProvider;

impl FilesProvider {
    fn collect(options: &ProviderOptions) -> Result<Vec<PathBuf>, ProviderError> {
        let mut files = Vec::new();

        if let Some(dir) = options.str("sourceDir")? {
            let extensions = options.string_list("extensions")?.unwrap_or_default();
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if entry.file_type().is_file() && matches_extension(entry.path(), &extensions) {
                    files.push(entry.into_path());
                }
            }
        }

        if let Some(listed) = options.string_list("sourceFiles")? {
            files.extend(listed.into_iter().map(PathBuf::from));
        }

        Ok(files)
    }

    async fn load(graph: &mut BehaviorGraph, path: &Path) -> Result<usize, ProviderError> {
        let dir = path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let file = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => {
                warn!(path = %path.display(), "not a file, skipping");
                return Ok(0);
            }
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                return Ok(0);
            }
        };

        graph.add_fact(dir, CONTAINS_FILE, file.as_str())?;
        graph.add_fact(file.as_str(), HAS_TEXT, content.as_str())?;

        let lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        let count = lines.len();
        graph
            .add_facts_from_stream(move |tx| async move {
                for (i, text) in lines.into_iter().enumerate() {
                    let line = format!("line-{}", i + 1);
                    tx.emit(file.as_str(), HAS_LINE, line.as_str()).await?;
                    tx.emit(format!("{}:{}", file, line), LINE_CONTENT, text).await?;
                }
                Ok::<_, StreamClosed>(())
            })
            .await?;

        debug!(path = %path.display(), lines = count, "loaded source file");
        Ok(count)
    }
}

fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |ext| {
            extensions
                .iter()
                .any(|want| want.trim_start_matches('.') == ext)
        })
}

#[async_trait]
impl Provider for FilesProvider {
    fn option_schema(&self) -> OptionSchema {
        OptionSchema::default()
            .optional("sourceDir", OptionKind::String)
            .optional("extensions", OptionKind::StringList)
            .optional("sourceFiles", OptionKind::StringList)
    }

    async fn provide(
        &self,
        graph: &mut BehaviorGraph,
        options: &ProviderOptions,
    ) -> Result<(), ProviderError> {
        let files = Self::collect(options)?;
        if files.is_empty() {
            info!("no source files configured, skipping");
            return Ok(());
        }

        let mut lines = 0;
        for path in &files {
            lines += Self::load(graph, path).await?;
        }
        info!(files = files.len(), lines, "source files loaded");
        Ok(())
    }
}
