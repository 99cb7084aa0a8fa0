//! Centralized tracing initialization for the bridge nodes.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the process-wide tracing subscriber.
///
/// - Respects the `RUST_LOG` environment variable (defaults to "info")
/// - Outputs compact logs without target, file or line metadata
///
/// The subscriber is global, so events from tokio worker threads (Ctrl-C
/// handling, zenoh, HTTP calls) are logged too. Calling this again once a
/// subscriber is installed has no effect.
///
/// # Example
/// ```no_run
/// use joint_bridge_lib::init_tracing;
///
/// fn main() {
///     init_tracing();
///     // node code here
/// }
/// ```
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    if let Err(e) = result {
        tracing::debug!("Tracing already initialized: {}", e);
    }
}
