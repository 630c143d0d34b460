use std::io;

use tracing_subscriber::EnvFilter;

/// Diagnostics go to stderr so stdout stays the game transcript.
/// `RUST_LOG` overrides the default `warn` filter.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}
