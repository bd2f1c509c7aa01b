pub mod api; // Local HTTP surface
pub mod config;
pub mod engine_service; // Single-engine lock
pub mod models;
pub mod pipeline;

mod log_audit;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}
