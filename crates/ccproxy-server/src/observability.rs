//! Log setup for the proxy.
//!
//! Logging starts at `info` before the configuration is read, then switches to
//! `logging.level` through a reload handle. `RUST_LOG`, when set, wins over both.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// HTTP and TLS internals that drown proxy logs below `info`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "h2", "reqwest", "rustls"];

/// Installs the global subscriber. Calling it again is a no-op.
pub fn init_tracing() {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for("info")),
        None => filter_for("info"),
    };

    let (filter, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switches to the configured level unless `RUST_LOG` is set.
pub fn apply_logging_level(logging: &LoggingConfig) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(e) = handle.modify(|f| *f = filter_for(&logging.level)) {
        tracing::warn!(error = %e, level = %logging.level, "could not apply logging level");
    }
}

/// Filter directives for `level`: the proxy at `level`, noisy client and
/// server internals capped at `info`.
fn directives(level: &str) -> String {
    let level = level.to_ascii_lowercase();
    let mut out = level.clone();
    if matches!(level.as_str(), "debug" | "trace") {
        for target in QUIET_TARGETS {
            out.push_str(&format!(",{target}=info"));
        }
    }
    out
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::new(directives(level))
}
