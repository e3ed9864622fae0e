//! # Configuration
//!
//! A plain string key/value store. Applications seed it with defaults and
//! then layer overrides on top:
//!
//! ```rust
//! use echo_core::EchoConfig;
//!
//! let mut config = EchoConfig::new();
//! config.set("http.port", "8000");
//! config.load_vars("ECHOBLOGS__", [("ECHOBLOGS__HTTP__PORT".to_string(), "9000".to_string())]);
//!
//! assert_eq!(config.get("http.port"), Some("9000"));
//! ```
//!
//! Environment keys drop the prefix, lowercase, and turn `__` into `.`:
//! `ECHOBLOGS__AUTH__JWT__SECRET` → `auth.jwt.secret`.

use std::collections::HashMap;
use std::time::Duration;

use crate::errors::EchoError;

#[derive(Debug, Default, Clone)]
pub struct EchoConfig {
    values: HashMap<String, String>,
}

impl EchoConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set `key` only when nothing is there yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Overlay process environment variables carrying `prefix`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.set(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(self.values.clone())
    }
}

/// Read-only copy of the configuration handed to services and hooks.
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.trim().parse::<u16>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse::<i64>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" => Some(false),
                _ => None,
            })
    }

    /// Durations use humantime syntax (`5m`, `1day`, `90s`).
    pub fn get_duration(&self, key: &str) -> anyhow::Result<Option<Duration>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => humantime::parse_duration(raw.trim())
                .map(Some)
                .map_err(|e| {
                    EchoError::general_error(format!("Invalid duration for '{key}': {e}"))
                        .into_anyhow()
                }),
        }
    }

    pub fn require(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key).ok_or_else(|| {
            EchoError::general_error(format!("Missing configuration key '{key}'")).into_anyhow()
        })
    }
}
