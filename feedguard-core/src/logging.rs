// File: feedguard-core/src/logging.rs

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    let mut filter = EnvFilter::from_default_env();
    match default_directive.parse() {
        Ok(directive) => filter = filter.add_directive(directive),
        Err(e) => eprintln!("Ignoring bad log directive '{}': {}", default_directive, e),
    }
    let sub = fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(sub);
}
