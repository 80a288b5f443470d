//! Development-time tracing for the inspector binary.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the binary so embedding applications keep control of their output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format. Later calls keep the first subscriber.
///
/// # Example
/// ```bash
/// RUST_LOG=inspector=debug cargo run -- replay trace.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies a second `init` leaves the installed subscriber in place.
    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
    }
}
