//! Hierarchical key/value configuration.
//!
//! Keys are dotted paths. A lookup that misses strips the last segment and
//! retries, so `speed.med` falls back to `speed` before the caller's default.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::{MindError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Parses YAML, flattening nested mappings into dotted keys.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(yaml).map_err(MindError::ConfigParse)?;
        let mut config = Self::new();
        config.merge_value("", root);
        Ok(config)
    }

    /// Loads a YAML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| MindError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Adds every entry of a YAML value under `prefix`.
    pub fn merge_value(&mut self, prefix: &str, value: Value) {
        match value {
            Value::Mapping(map) => {
                for (key, value) in map {
                    let Some(segment) = scalar_key(&key) else {
                        continue;
                    };
                    let path = if prefix.is_empty() {
                        segment
                    } else {
                        format!("{prefix}.{segment}")
                    };
                    self.merge_value(&path, value);
                }
            }
            Value::Null if prefix.is_empty() => {}
            value => {
                self.values.insert(prefix.to_string(), value);
            }
        }
    }

    /// Raw value for `key`, falling back through its dotted parents.
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        let mut key = key;
        loop {
            if let Some(value) = self.values.get(key) {
                return Some(value);
            }
            let (parent, _) = key.rsplit_once('.')?;
            key = parent;
        }
    }

    /// Typed value for `key` (with fallback), or `default` when nothing matches.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        match self.lookup(key) {
            Some(value) => {
                serde_yaml::from_value(value.clone()).map_err(|source| MindError::ConfigType {
                    key: key.to_string(),
                    source,
                })
            }
            None => Ok(default),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn scalar_key(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
