// ABOUTME: Shared logging setup for krilin binaries
// ABOUTME: init() for one-shot commands, init_file() for interactive chat, init_for() for scoped output

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// File logging for the interactive chat loop, so log lines never interleave
/// with streamed reply text. Default: WARN level, RUST_LOG override.
/// Logs to <config dir>/krilin/{app_name}.log
/// If setup fails, prints a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) {
    if let Err(e) = init_file_inner(app_name) {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

/// Directory that holds krilin log files.
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("krilin"))
}

fn init_file_inner(app_name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = log_dir().ok_or("could not determine config directory")?;
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join(format!("{app_name}.log")))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_ansi(false)
        .init();

    Ok(())
}

/// Crate-filtered logging to stderr. Default: INFO for the named crate, WARN for everything else.
pub fn init_for(crate_name: &str) {
    let filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(crate_directive(crate_name));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn crate_directive(crate_name: &str) -> tracing_subscriber::filter::Directive {
    // Cargo package names use dashes, tracing targets use underscores.
    let target = crate_name.replace('-', "_");
    format!("{target}=info")
        .parse()
        .unwrap_or_else(|_| tracing::Level::INFO.into())
}
