//! Observability: tracing initialization for binaries and tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` when set. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "svmort=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
