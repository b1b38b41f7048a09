pub mod auth;
pub mod config;
pub mod connectors;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod http;

pub use connectors::registry::ConnectorRegistry;
pub use connectors::runner::Invocation;
pub use envelope::Envelope;
pub use errors::{RelayError, RelayResult};

/// Install the global tracing subscriber (stderr, `RUST_LOG` aware, default `info`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
