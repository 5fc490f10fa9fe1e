//! Logger setup for the player binary

use log::SetLoggerError;

/// Install the global logger. `RUST_LOG` still wins over `filter`.
///
/// Fails if a logger is already installed in this process.
pub fn init_logging(filter: &str) -> Result<(), SetLoggerError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_secs()
        .try_init()
}
