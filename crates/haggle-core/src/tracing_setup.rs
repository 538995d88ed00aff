use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Initialize the global subscriber with `RUST_LOG`-style filtering, falling
/// back to the given directive. Safe to call more than once; later calls are
/// no-ops.
pub fn init_tracing_with_default(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
