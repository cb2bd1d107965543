//! Pieces shared by the codefix relay's crates: configuration, the completion client, and
//! logging setup.

pub mod config;
pub mod llm;
pub mod test_util;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise everything at `info` (or `debug` when `verbose`) is
/// printed.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}
