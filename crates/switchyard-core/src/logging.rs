//! Logging setup for hosts and tests.

use tracing_subscriber::EnvFilter;

use crate::config::{defaults, env_vars};

/// Install a `fmt` subscriber filtered by `SWITCHYARD_LOG`, then `RUST_LOG`,
/// then `info`.
///
/// Returns `false` if a global subscriber was already installed, so calling
/// it from several tests is fine.
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(env_vars::LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(defaults::LOG_FILTER))
}
