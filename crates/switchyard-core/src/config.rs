//! Container configuration.
//!
//! Settings come from a TOML document or from environment variables. Every
//! field is optional and falls back to [`defaults`].

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable names.
pub mod env_vars {
    /// Plugin directories, separated like `PATH`.
    pub const PLUGIN_DIR: &str = "SWITCHYARD_PLUGIN_DIR";
    pub const RECURSIVE: &str = "SWITCHYARD_RECURSIVE";
    pub const LEAK_POLICY: &str = "SWITCHYARD_LEAK_POLICY";
    /// Log filter, takes precedence over `RUST_LOG`.
    pub const LOG: &str = "SWITCHYARD_LOG";
}

/// Default values.
pub mod defaults {
    pub const RECURSIVE: bool = false;
    pub const LOG_FILTER: &str = "info";
}

/// What teardown does when plugins or the router are still referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeakPolicy {
    /// Panic after logging. Default in debug builds.
    Panic,
    /// Log and continue; leaked libraries stay mapped. Default in release builds.
    Log,
}

impl Default for LeakPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Log
        }
    }
}

impl FromStr for LeakPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "panic" => Ok(Self::Panic),
            "log" => Ok(Self::Log),
            _ => Err(ConfigError::InvalidValue {
                key: env_vars::LEAK_POLICY,
                value: s.to_string(),
            }),
        }
    }
}

/// Settings for [`PluginContainer`](crate::container::PluginContainer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Directories (or single library files) loaded by `load_configured`.
    pub plugin_dirs: Vec<PathBuf>,

    /// Descend into subdirectories of each plugin directory.
    pub recursive: bool,

    pub leak_policy: LeakPolicy,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            plugin_dirs: Vec::new(),
            recursive: defaults::RECURSIVE,
            leak_policy: LeakPolicy::default(),
        }
    }
}

impl ContainerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse settings from a TOML document.
    ///
    /// ```toml
    /// plugin_dirs = ["/usr/lib/myapp/plugins"]
    /// recursive = true
    /// leak_policy = "log"
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dirs) = lookup(env_vars::PLUGIN_DIR) {
            config.plugin_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        if let Some(value) = lookup(env_vars::RECURSIVE) {
            config.recursive = parse_bool(env_vars::RECURSIVE, &value)?;
        }
        if let Some(value) = lookup(env_vars::LEAK_POLICY) {
            config.leak_policy = value.parse()?;
        }

        Ok(config)
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dirs.push(dir.into());
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_leak_policy(mut self, leak_policy: LeakPolicy) -> Self {
        self.leak_policy = leak_policy;
        self
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
