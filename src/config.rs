//! Project configuration files
//!
//! A project file names the options for each provider, an optional
//! whitelist, and the ingestion settings. JSON and YAML are both accepted,
//! chosen by file extension. A JSON file holding only a provider→options map
//! is read as a project with default settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Threshold of the first streaming batch; each flush doubles it.
pub const DEFAULT_STREAM_BATCH: usize = 10_000;

/// Maximum number of rows a query returns.
pub const DEFAULT_QUERY_LIMIT: usize = 2_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("options for provider '{0}' must be an object")]
    NotAnObject(String),
}

/// Ingestion settings applied when a graph is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Buffer `add_fact` writes and flush every `auto_bulk` facts (0 = off)
    pub auto_bulk: usize,
    /// Keep a uniform sample of this many facts (0 = off)
    pub reservoir: usize,
    /// First batch threshold for streaming producers
    pub stream_base_batch: usize,
    /// Row cap for queries
    pub query_limit: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            auto_bulk: 0,
            reservoir: 0,
            stream_base_batch: DEFAULT_STREAM_BATCH,
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

/// A project file: provider options plus run settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub providers: BTreeMap<String, Map<String, Value>>,
    pub whitelist: Vec<String>,
    pub ingest: IngestConfig,
}

impl ProjectConfig {
    /// Load a project file, picking the format from its extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );

        let value: Value = if is_yaml {
            serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?
        };

        Self::from_value(value).map_err(|err| match err {
            FromValueError::Shape(name) => ConfigError::NotAnObject(name),
            FromValueError::Json(source) => ConfigError::Json {
                path: path.to_path_buf(),
                source,
            },
        })
    }

    fn from_value(value: Value) -> Result<Self, FromValueError> {
        let is_project = value.as_object().map_or(false, |obj| {
            obj.keys()
                .all(|k| matches!(k.as_str(), "providers" | "whitelist" | "ingest"))
        });

        if is_project {
            return serde_json::from_value(value).map_err(FromValueError::Json);
        }

        // Bare provider -> options map
        let mut providers = BTreeMap::new();
        if let Value::Object(obj) = value {
            for (name, options) in obj {
                match options {
                    Value::Object(map) => {
                        providers.insert(name, map);
                    }
                    Value::Null => {
                        providers.insert(name, Map::new());
                    }
                    _ => return Err(FromValueError::Shape(name)),
                }
            }
        }

        Ok(Self {
            providers,
            ..Self::default()
        })
    }
}

enum FromValueError {
    Shape(String),
    Json(serde_json::Error),
}

/// Split a comma separated whitelist, dropping blank entries
pub fn parse_whitelist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
