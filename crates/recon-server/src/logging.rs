//! Logging initialization and configuration.
//!
//! Sets up the tracing subscriber from CLI flags, falling back to
//! `RUST_LOG` and then to `info`.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::{Cli, LogFormat};

/// Initialize the logging subsystem based on CLI flags.
///
/// `--verbose`/`--debug` and `--quiet` take precedence over `RUST_LOG`.
/// Logs go to stderr.
///
/// # Errors
///
/// Returns an error if the global tracing subscriber cannot be set.
pub fn initialize_logging(cli: &Cli) -> Result<()> {
    let filter = match flag_level(cli) {
        Some(level) => EnvFilter::new(level.as_str().to_ascii_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr);

    match cli.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Level forced by verbosity flags, if any.
fn flag_level(cli: &Cli) -> Option<Level> {
    if cli.verbose || cli.debug {
        Some(Level::DEBUG)
    } else if cli.quiet {
        Some(Level::ERROR)
    } else {
        None
    }
}
