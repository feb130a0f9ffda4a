//! Centralized tracing initialization for the controller binaries.
//!
//! Installs a process-wide subscriber so events from helper threads (the
//! stdin listener, for one) reach the same output as the control loop.

use eyre::eyre;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize tracing with a global subscriber.
///
/// - Respects the RUST_LOG environment variable (defaults to "info")
/// - Outputs compact logs without target, file or line metadata
///
/// Fails if a global subscriber is already installed.
///
/// # Example
/// ```no_run
/// use pick_place_lib::init_tracing;
///
/// fn main() -> eyre::Result<()> {
///     init_tracing()?;
///     // Control loop here
///     Ok(())
/// }
/// ```
pub fn init_tracing() -> eyre::Result<()> {
    use tracing_subscriber::layer::SubscriberExt;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_subscriber_reaches_spawned_threads() {
        init_tracing().expect("first init succeeds");

        let enabled = thread::spawn(|| tracing::enabled!(tracing::Level::ERROR))
            .join()
            .expect("thread panicked");
        assert!(enabled);

        assert!(init_tracing().is_err());
    }
}
