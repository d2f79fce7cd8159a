//! Adapter configuration.
//!
//! A thin, explicit configuration object over a YAML document with
//! dotted-path typed lookups, read during initialization only:
//!
//! ```rust
//! use gantry::config::Config;
//!
//! let config = Config::from_yaml_str("server:\n  cors: false\n").unwrap();
//! assert!(!config.get::<bool>("server.cors", true));
//! assert_eq!(config.get::<u16>("server.port", 8080), 8080);
//! ```

use serde::de::DeserializeOwned;
use std::path::Path;

/// Key-path configuration lookup with typed defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    root: serde_yaml::Value,
}

impl Config {
    /// Empty configuration; every lookup yields its default.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let root = serde_yaml::from_str(yaml)?;
        Ok(Self { root })
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&raw)
    }

    /// Look up `path` ("server.cors") and deserialize into `T`; the default
    /// is returned when the path is missing or the value has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, path: &str, default: T) -> T {
        let mut node = &self.root;
        for segment in path.split('.') {
            match node.get(segment) {
                Some(child) => node = child,
                None => return default,
            }
        }
        serde_yaml::from_value(node.clone()).unwrap_or(default)
    }
}
