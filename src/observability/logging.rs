//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("uzh_wallet={},warn", level)
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into());
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    if let Err(e) = result {
        eprintln!("logging already initialised: {}", e);
    }
}
