//! Medbook - Medical appointment booking
//! REST API server, typed client and operator CLI

pub mod engine;

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "medbook=info,tower_http=info";

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
