//! Error types for Switchyard.
//!
//! Dispatch itself never produces an error: an unhandled intent is `None` and
//! an unobserved event is an empty list. Errors only come out of loading,
//! registration, plugin initialisation, configuration and teardown.

use std::path::PathBuf;

use crate::info::PluginInfo;

/// Failure to turn a file into an activated plugin.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Path does not exist.
    #[error("Plugin path does not exist: {0}")]
    NotFound(PathBuf),

    /// Path exists but does not carry the platform's library extension.
    #[error("Not a dynamic library: {0}")]
    NotALibrary(PathBuf),

    /// The operating system refused to map the library.
    #[error("Failed to open library {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The library does not export the plugin entry point.
    #[error("Missing entry point in {path}: {source}")]
    MissingEntryPoint {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// The entry point returned a null instance.
    #[error("Entry point of {path} returned a null plugin")]
    NullInstance { path: PathBuf },
}

/// Registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// A different Rust type is already bound to this identity.
    #[error("{kind} identity {identity} is already bound to another message type")]
    TypeMismatch {
        kind: &'static str,
        identity: String,
    },
}

/// Error returned by [`Plugin::init`](crate::plugin::Plugin::init).
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// The plugin could not set itself up.
    #[error("Plugin initialization failed: {0}")]
    InitFailed(String),

    /// A registration performed during `init` was rejected.
    #[error(transparent)]
    Router(#[from] RouterError),
}

/// Teardown failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContainerError {
    /// Someone outside the container still holds the router or a plugin.
    #[error(
        "Ownership leak at teardown: {router_refs} external router reference(s), {} plugin(s) still referenced",
        plugins.len()
    )]
    OwnershipLeak {
        router_refs: usize,
        plugins: Vec<PluginInfo>,
    },
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Unified error type for Switchyard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Router(#[from] RouterError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leak_message_counts_plugins() {
        let err = ContainerError::OwnershipLeak {
            router_refs: 1,
            plugins: vec![PluginInfo::new("calc", semver::Version::new(1, 0, 0))],
        };
        assert_eq!(
            err.to_string(),
            "Ownership leak at teardown: 1 external router reference(s), 1 plugin(s) still referenced"
        );
    }

    #[test]
    fn test_plugin_error_from_router_error() {
        let err: PluginError = RouterError::TypeMismatch {
            kind: "intent",
            identity: "Add@v1".into(),
        }
        .into();
        assert!(matches!(err, PluginError::Router(_)));

        let err: Error = err.into();
        assert!(err.to_string().contains("Add@v1"));
    }
}
