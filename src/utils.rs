//! Small shared helpers

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing with env-filter support. Safe to call more than
/// once (later calls are no-ops), so tests can share it.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Current Unix timestamp in seconds
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
