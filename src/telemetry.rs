//! Tracing setup for embedding binaries.

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber with an env-filter defaulting to `info`.
///
/// Intended for the bot binary's startup path; library users with their
/// own subscriber should skip this.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();
}
