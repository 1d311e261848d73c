//! # Configuration Module
//!
//! Process-wide configuration as a flat key space.
//!
//! ## Key Features
//! - YAML files are flattened into dot-joined keys (`config-server.url`)
//! - Environment variable overrides (`MICROSERVICE_NAME` -> `microservice.name`)
//! - Typed accessors with defaults through the [`ConfigAccessor`] trait
//! - Deployment-mode helpers such as [`select_url`]

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::configserver::flatten::flatten;
use crate::core::error::{BootstrapError, BootstrapResult};

/// Key holding the microservice name
pub const MICROSERVICE_NAME_KEY: &str = "microservice.name";

/// Key holding the config-server base URL
pub const CONFIG_SERVER_URL_KEY: &str = "config-server.url";

/// Key toggling internal TLS for service-to-service calls
pub const INTERNAL_TLS_ENABLED_KEY: &str = "internal.tls.enabled";

/// Read access to the process-wide configuration
pub trait ConfigAccessor: Send + Sync {
    /// Raw string value of a key, if present
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_or_default_string(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    fn get_or_default_bool(&self, key: &str, default: bool) -> bool {
        self.get_string(key)
            .and_then(|value| value.trim().parse::<bool>().ok())
            .unwrap_or(default)
    }

    fn get_or_default_duration(&self, key: &str, default: Duration) -> Duration {
        self.get_string(key)
            .and_then(|value| humantime::parse_duration(value.trim()).ok())
            .unwrap_or(default)
    }
}

/// Pick the plain or TLS variant of a URL for the current deployment mode
pub fn select_url<'a>(tls_enabled: bool, http_url: &'a str, https_url: &'a str) -> &'a str {
    if tls_enabled {
        https_url
    } else {
        http_url
    }
}

/// Flat property store
///
/// Keys are kept in a `BTreeMap` so dumps and iteration are stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, Value>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load properties from a YAML file, flattening nested sections
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> BootstrapResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            BootstrapError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let properties = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), keys = properties.len(), "Loaded properties file");
        Ok(properties)
    }

    /// Parse properties from YAML text
    pub fn from_yaml_str(content: &str) -> BootstrapResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| BootstrapError::config(format!("Failed to parse config: {}", e)))?;

        match document {
            Value::Object(map) => Ok(Self::from_nested(&map)),
            Value::Null => Ok(Self::new()),
            other => Err(BootstrapError::config(format!(
                "Config root must be a mapping, got {}",
                other
            ))),
        }
    }

    /// Build properties from a nested document
    pub fn from_nested(nested: &Map<String, Value>) -> Self {
        Self {
            values: flatten(nested).into_iter().collect(),
        }
    }

    /// Apply environment overrides from the current process
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `NAME=value` style overrides
    ///
    /// Names are lowercased and `_` becomes `.`, so `CONFIG_SERVER_URL`
    /// overrides `config.server.url`. Keys with dashes such as
    /// `config-server.url` are also matched by treating `-` and `.` as equal.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in vars {
            let key = env_to_key(name.as_ref());
            if key.is_empty() {
                continue;
            }

            let existing = self
                .values
                .keys()
                .find(|candidate| normalize(candidate) == key)
                .cloned();

            self.values
                .insert(existing.unwrap_or(key), Value::String(value.into()));
        }
    }

    /// Overlay another flat map; incoming values win
    pub fn extend(&mut self, flat: Map<String, Value>) {
        self.values.extend(flat);
    }

    pub fn set<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl ConfigAccessor for Properties {
    fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

fn env_to_key(name: &str) -> String {
    name.trim().to_lowercase().replace('_', ".")
}

fn normalize(key: &str) -> String {
    key.replace('-', ".")
}
