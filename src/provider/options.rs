//! Typed per-provider option bags and their schemas

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OptionError {
    #[error("missing required option '{0}'")]
    Missing(String),

    #[error("option '{key}' must be {expected}")]
    Mistyped { key: String, expected: &'static str },

    #[error("unknown option '{0}'")]
    Unknown(String),
}

/// Configuration handed to one provider at execution time.
///
/// Wraps a JSON object. Accessors return `Ok(None)` when a key is absent and
/// `OptionError::Mistyped` when it holds the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderOptions(Map<String, Value>);

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn str(&self, key: &str) -> Result<Option<&str>, OptionError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(mistyped(key, OptionKind::String)),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&str, OptionError> {
        self.str(key)?
            .ok_or_else(|| OptionError::Missing(key.to_string()))
    }

    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, OptionError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(Some)
                .ok_or_else(|| mistyped(key, OptionKind::StringList)),
            Some(_) => Err(mistyped(key, OptionKind::StringList)),
        }
    }

    pub fn u64(&self, key: &str) -> Result<Option<u64>, OptionError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| mistyped(key, OptionKind::Integer)),
        }
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, OptionError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(mistyped(key, OptionKind::Bool)),
        }
    }
}

impl From<Map<String, Value>> for ProviderOptions {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn mistyped(key: &str, kind: OptionKind) -> OptionError {
    OptionError::Mistyped {
        key: key.to_string(),
        expected: kind.describe(),
    }
}

/// Value kinds an option can be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    StringList,
    Integer,
    Bool,
    Object,
}

impl OptionKind {
    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::StringList => "a list of strings",
            Self::Integer => "a non-negative integer",
            Self::Bool => "a boolean",
            Self::Object => "an object",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::StringList => value
                .as_array()
                .map_or(false, |items| items.iter().all(Value::is_string)),
            Self::Integer => value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
struct OptionSpec {
    key: String,
    kind: OptionKind,
    required: bool,
}

/// Declared option keys for a provider.
///
/// An empty schema accepts anything. Once any key is declared, options are
/// checked strictly: undeclared keys, missing required keys, and values of
/// the wrong kind are rejected.
#[derive(Debug, Clone, Default)]
pub struct OptionSchema {
    specs: Vec<OptionSpec>,
}

impl OptionSchema {
    /// Schema that accepts any options
    pub fn any() -> Self {
        Self::default()
    }

    pub fn required(mut self, key: impl Into<String>, kind: OptionKind) -> Self {
        self.specs.push(OptionSpec {
            key: key.into(),
            kind,
            required: true,
        });
        self
    }

    pub fn optional(mut self, key: impl Into<String>, kind: OptionKind) -> Self {
        self.specs.push(OptionSpec {
            key: key.into(),
            kind,
            required: false,
        });
        self
    }

    pub fn validate(&self, options: &ProviderOptions) -> Result<(), OptionError> {
        if self.specs.is_empty() {
            return Ok(());
        }

        if let Some(unknown) = options
            .keys()
            .find(|k| !self.specs.iter().any(|s| s.key == *k))
        {
            return Err(OptionError::Unknown(unknown.to_string()));
        }

        for spec in &self.specs {
            match options.get(&spec.key) {
                None | Some(Value::Null) if spec.required => {
                    return Err(OptionError::Missing(spec.key.clone()))
                }
                None | Some(Value::Null) => {}
                Some(value) if !spec.kind.accepts(value) => {
                    return Err(mistyped(&spec.key, spec.kind))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}
