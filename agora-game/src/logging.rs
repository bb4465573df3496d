//! `tracing` subscriber setup for hosts.

use tracing_subscriber::EnvFilter;

use crate::config::GeneralConfig;

/// Install a global formatter.
///
/// `RUST_LOG` wins over `general.log_level`. Returns `false` if a global
/// subscriber was already installed (tests, embedding hosts).
pub fn init(general: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Same as [`init`], emitting one JSON object per event.
pub fn init_json(general: &GeneralConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
