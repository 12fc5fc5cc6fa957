//! Log output for the command-line tool.
//!
//! Human-readable lines on stderr. The filter comes from `GENSERIALIZE_LOG`
//! when set (same syntax as `RUST_LOG`), otherwise from the configured level.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "GENSERIALIZE_LOG";

/// Level used when neither the environment nor the config sets one.
pub const DEFAULT_LEVEL: &str = "info";

/// Pick the fallback filter: `-v` forces debug, then the config, then info.
pub fn default_filter(configured: Option<&str>, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    configured.unwrap_or(DEFAULT_LEVEL).to_string()
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(default_filter: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true);

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "genserialize starting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(None, false), "info");
        assert_eq!(default_filter(Some("warn"), false), "warn");
        assert_eq!(default_filter(Some("warn"), true), "debug");
    }
}
