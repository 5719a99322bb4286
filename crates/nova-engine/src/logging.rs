//! Tracing subscriber setup for binaries and demos.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn";

/// Install a formatting subscriber filtered by `RUST_LOG`.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init() {
    init_with_default(DEFAULT_FILTER);
}

/// Like [`init`], with a custom fallback filter.
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_does_not_panic() {
        init();
        init_with_default("debug");
    }
}
